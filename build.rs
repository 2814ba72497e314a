//! Build metadata for the version banner printed by `fan-curve-daemon` at startup

use std::process::Command;

/// Trimmed stdout of a successful `git` invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    let metadata = [
        ("GIT_DESC", git(&["describe", "--always", "--dirty", "--tags"])),
        ("GIT_HASH", git(&["rev-parse", "--short", "HEAD"])),
        ("BUILD_TIME", Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())),
    ];
    for (key, value) in metadata {
        if let Some(value) = value {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
