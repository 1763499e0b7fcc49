//! Release check against the GitHub releases API.
//!
//! The network is only contacted by the explicit `version` command; every
//! other command just reads the day-old cache and prints a notice when a
//! newer release is already known.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cloudctl_core::Paths;
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const RELEASES_API: &str = "https://api.github.com/repos/chukul/cloudctl/releases/latest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const CHECK_INTERVAL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct VersionCheck {
    last_checked: DateTime<Utc>,
    latest_version: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
}

/// `cloudctl version`: print the version, force a release check, report.
pub async fn run_version() -> Result<()> {
    println!("cloudctl version v{CURRENT_VERSION}");

    match fetch_latest().await {
        Err(e) => eprintln!("Unable to check for updates: {e}"),
        Ok((latest, url)) => {
            if let Ok(paths) = Paths::resolve() {
                let _ = save_check(&paths, &latest);
            }
            if is_newer(&latest, CURRENT_VERSION) {
                eprintln!("\nUpdate available: v{CURRENT_VERSION} -> {latest}");
                eprintln!("   Download: {url}");
            } else {
                eprintln!("You're running the latest version.");
            }
        }
    }
    Ok(())
}

/// Print an upgrade hint from the cache, without touching the network.
pub fn cached_notice() {
    let Ok(paths) = Paths::resolve() else { return };
    let Ok(raw) = std::fs::read_to_string(paths.version_check()) else {
        return;
    };
    let Ok(check) = serde_json::from_str::<VersionCheck>(&raw) else {
        return;
    };

    let age = Utc::now() - check.last_checked;
    if age > chrono::Duration::hours(CHECK_INTERVAL_HOURS) {
        return;
    }
    if is_newer(&check.latest_version, CURRENT_VERSION) {
        eprintln!(
            "Update available: v{CURRENT_VERSION} -> {} (run 'cloudctl version' for details)",
            check.latest_version
        );
    }
}

async fn fetch_latest() -> Result<(String, String)> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let release: Release = client
        .get(RELEASES_API)
        .header("User-Agent", "cloudctl")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok((release.tag_name, release.html_url))
}

fn save_check(paths: &Paths, latest: &str) -> Result<()> {
    use std::io::Write;

    std::fs::create_dir_all(paths.root())?;
    let check = VersionCheck {
        last_checked: Utc::now(),
        latest_version: latest.to_string(),
    };

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(paths.version_check())?;
    file.write_all(serde_json::to_string(&check)?.as_bytes())?;
    Ok(())
}

fn is_newer(latest: &str, current: &str) -> bool {
    // Lexical comparison over semver-shaped tags, matching the upstream
    // release naming.
    let latest = latest.trim_start_matches('v');
    let current = current.trim_start_matches('v');
    latest > current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison() {
        assert!(is_newer("v1.2.0", "1.1.0"));
        assert!(!is_newer("v1.1.0", "1.1.0"));
        assert!(!is_newer("1.0.9", "v1.1.0"));
    }
}
