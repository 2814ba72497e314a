use super::{permitted, spawn_detached};
use crate::errors::Result;
use crate::events::{Event, EventKind, Sink, Throttle};
use log::debug;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BEEP_PROGRAM: &str = "beep";
const PLAY_PROGRAM: &str = "ffplay";
const BEEP_REPEAT: Duration = Duration::from_secs(1);

/// Audible alarm for the one state where a fan may be stuck in manual mode
#[derive(Debug)]
pub struct SoundSink {
    beep: bool,
    sound_file: Option<PathBuf>,
    beep_throttle: Mutex<Throttle>,
    sound_throttle: Mutex<Throttle>,
}

impl SoundSink {
    /// `restart_interval` is the minimum time before the sound file is started again
    pub fn new(beep: bool, sound_file: Option<PathBuf>, restart_interval: Duration) -> Self {
        Self {
            beep,
            sound_file,
            beep_throttle: Mutex::new(Throttle::new(BEEP_REPEAT)),
            sound_throttle: Mutex::new(Throttle::new(restart_interval)),
        }
    }

    /// Which alarms are due for `kind` at `now`, as `(beep, sound)`
    fn due(&self, kind: EventKind, now: Instant) -> (bool, bool) {
        if kind != EventKind::AutomaticModeSetError {
            return (false, false);
        }
        let beep = self.beep && permitted(&self.beep_throttle, kind, now);
        let sound = self.sound_file.is_some() && permitted(&self.sound_throttle, kind, now);
        (beep, sound)
    }
}

impl Sink for SoundSink {
    fn name(&self) -> &'static str {
        "sound"
    }

    fn notify(&self, event: &Event) -> Result<()> {
        let (beep, sound) = self.due(event.kind, Instant::now());

        if beep {
            debug!("Beeping for {:?}", event.kind);
            spawn_detached(BEEP_PROGRAM, &[])?;
        }
        if let (true, Some(file)) = (sound, &self.sound_file) {
            debug!("Playing {}", file.display());
            let file = file.to_string_lossy();
            spawn_detached(
                PLAY_PROGRAM,
                &["-loglevel", "panic", "-nodisp", "-autoexit", &file],
            )?;
        }
        Ok(())
    }
}
