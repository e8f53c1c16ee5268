use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let hash = hash.unwrap_or_else(|| {
        println!("cargo:warning=Unable to determine git hash, using 'unknown'");
        String::from("unknown")
    });

    println!("cargo:rustc-env=BTMGR_GIT_HASH={hash}");
}
