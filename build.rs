use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown-os".into());
    let target_arch =
        std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "unknown-arch".into());

    let git_sha = git_short_sha().unwrap_or_else(|| "nogit".to_string());

    let short = if git_sha == "nogit" {
        format!("{pkg_version}+{target_os}-{target_arch}")
    } else {
        format!("{pkg_version}+{target_os}-{target_arch}.{git_sha}")
    };
    let long = format!("{short}\npackage: {pkg_version}\ngit: {git_sha}");

    println!("cargo:rustc-env=VMSH_BUILD_VERSION={short}");
    println!("cargo:rustc-env=VMSH_BUILD_LONG_VERSION={long}");
}

fn git_short_sha() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8(out.stdout).ok()?.trim().to_string();
    if sha.is_empty() {
        None
    } else {
        Some(sha)
    }
}
