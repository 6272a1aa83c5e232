//! Release notes
//!
//! Proxy releases as returned by `fetch_releases`, ordered for display.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Release information from the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub version: String,
    pub release_date: String,
    #[serde(default)]
    pub is_beta: bool,
    #[serde(default)]
    pub is_latest: bool,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub whats_new: Vec<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Downloadable binary attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Release {
    /// Release date, accepting full RFC 3339 timestamps or plain dates
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.release_date) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Date for display, falling back to the raw string
    pub fn display_date(&self) -> String {
        self.released_at()
            .map(|dt| dt.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|| self.release_date.clone())
    }
}

/// Releases to list, newest first. Betas only when the user opted in.
pub fn visible_releases(releases: &[Release], include_beta: bool) -> Vec<&Release> {
    let mut visible: Vec<&Release> = releases
        .iter()
        .filter(|r| include_beta || !r.is_beta)
        .collect();
    // Unparseable dates sort last
    visible.sort_by(|a, b| b.released_at().cmp(&a.released_at()));
    visible
}

/// Release notes view state
#[derive(Debug, Clone, Default)]
pub struct ReleaseNotes {
    releases: Vec<Release>,
    loaded: bool,
    error: Option<String>,
}

impl ReleaseNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&mut self, result: Result<Vec<Release>, crate::bridge::BridgeError>) {
        self.loaded = true;
        match result {
            Ok(releases) => {
                self.releases = releases;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch releases: {}", e);
                self.error = Some(e.reason());
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn visible(&self, include_beta: bool) -> Vec<&Release> {
        visible_releases(&self.releases, include_beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(version: &str, date: &str, beta: bool) -> Release {
        Release {
            id: version.to_string(),
            version: version.to_string(),
            release_date: date.to_string(),
            is_beta: beta,
            is_latest: false,
            changelog: String::new(),
            whats_new: Vec::new(),
            assets: Vec::new(),
        }
    }

    #[test]
    fn test_sorted_newest_first_and_beta_hidden() {
        let releases = vec![
            release("1.0.0", "2024-01-10", false),
            release("1.2.0-beta", "2024-03-01T12:00:00Z", true),
            release("1.1.0", "2024-02-01", false),
            release("0.9.0", "sometime", false),
        ];

        let stable: Vec<_> = visible_releases(&releases, false)
            .into_iter()
            .map(|r| r.version.as_str())
            .collect();
        assert_eq!(stable, vec!["1.1.0", "1.0.0", "0.9.0"]);

        let all = visible_releases(&releases, true);
        assert_eq!(all[0].version, "1.2.0-beta");
    }

    #[test]
    fn test_display_date() {
        assert_eq!(release("1", "2024-02-01", false).display_date(), "February 1, 2024");
        assert_eq!(release("1", "soon", false).display_date(), "soon");
    }
}
