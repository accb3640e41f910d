//! Build script: embeds the git short hash and checks GPU toolkits.
//!
//! The hash feeds `vaani::version_string()`. GPU checks run before
//! whisper-rs-sys compiles so a missing toolkit fails with a readable message.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if std::env::var_os("CARGO_FEATURE_CUDA").is_some() {
        require_tool("nvcc", &["--version"], "CUDA toolkit");
    }
    if std::env::var_os("CARGO_FEATURE_VULKAN").is_some() {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK");
    }
}

/// Panic with an install hint when `tool` cannot be executed.
fn require_tool(tool: &str, args: &[&str], what: &str) {
    match Command::new(tool).args(args).output() {
        Ok(out) if out.status.success() => {
            println!("cargo::warning={} detected ({})", what, tool);
        }
        _ => panic!(
            "\n\n`{tool}` not found: {what} is not installed.\n\
             Install it, or build without the GPU feature: cargo build --release\n"
        ),
    }
}
