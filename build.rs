use std::process::Command;

fn main() {
    let fallback = env!("CARGO_PKG_VERSION").to_string();
    let version = match Command::new("git").args(["describe", "--tags", "--always"]).output() {
        Ok(out) if out.status.success() => {
            let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
            s.strip_prefix('v').map(str::to_string).unwrap_or(s)
        }
        _ => fallback,
    };
    println!("cargo:rustc-env=GIT_VERSION={version}");
}
