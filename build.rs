use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    // short hash, "+dirty" when the work tree has uncommitted changes
    let revision = match git(&["rev-parse", "--short=8", "HEAD"]).filter(|h| !h.is_empty()) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.is_empty());
            if dirty {
                format!("{}+dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };

    // SOURCE_DATE_EPOCH pins the stamp for reproducible builds
    let built_at = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now);

    println!("cargo:rustc-env=BUILD_REVISION={}", revision);
    println!(
        "cargo:rustc-env=BUILD_DATE={}",
        built_at.format("%Y-%m-%d %H:%M UTC")
    );

    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
