use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use url::Url;

use crate::windows::EventWindow;

/// Built-in window table, used when no external file is configured. Bounds are
/// UTC instants taken from the event schedule; the same JSON shape works for
/// the `EVENT_WINDOWS_PATH` file.
const DEFAULT_WINDOWS_JSON: &str = r#"[
  {"name": "Event I",   "title": "Marketplace Event I (December 19th - 23rd)", "start": "2024-12-19T00:00:00Z", "end": "2024-12-23T23:59:59.999Z"},
  {"name": "Event II",  "title": "Marketplace Event II (March 20th - 22nd)",   "start": "2025-03-20T00:00:00Z", "end": "2025-03-22T23:59:59.999Z"},
  {"name": "Event III", "title": "Marketplace Event III (May 16th - 19th)",    "start": "2025-05-16T00:00:00Z", "end": "2025-05-19T23:59:59.999Z"},
  {"name": "Event IV",  "title": "Marketplace Event IV (June 26th - 30th)",    "start": "2025-06-26T00:00:00Z", "end": "2025-06-30T23:59:59.999Z"},
  {"name": "Event V",   "title": "Marketplace Event V (July 11th - 13th)",     "start": "2025-07-11T00:00:00Z", "end": "2025-07-14T23:59:59.999Z"}
]"#;

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub snapshot_path: PathBuf,
    pub windows_path: Option<PathBuf>,
    pub refresh_secs: u64,
    pub live_window: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let endpoint = env::var("ANALYTICS_ENDPOINT").context("ANALYTICS_ENDPOINT not set")?;
        Url::parse(&endpoint).context("ANALYTICS_ENDPOINT is not a valid URL")?;

        let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let snapshot_path = env::var("SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base.join("data").join("analytics-snapshot.csv"));
        let windows_path = env::var("EVENT_WINDOWS_PATH").ok().map(PathBuf::from);

        let refresh_secs: u64 = env::var("REFRESH_INTERVAL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let request_timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let live_window = env::var("LIVE_WINDOW").unwrap_or_else(|_| "Event V".to_string());

        Ok(Config {
            endpoint: endpoint.trim().to_string(),
            snapshot_path,
            windows_path,
            refresh_secs,
            live_window,
            request_timeout_secs,
        })
    }

    /// Loads the window table once at startup, from the configured JSON file
    /// when present, else the built-in schedule.
    pub fn load_windows(&self) -> Result<Vec<EventWindow>> {
        let text = match &self.windows_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading event windows from {}", path.display()))?,
            None => DEFAULT_WINDOWS_JSON.to_string(),
        };
        let windows: Vec<EventWindow> =
            serde_json::from_str(&text).context("parsing event window table")?;
        Ok(windows)
    }
}

pub fn default_windows() -> Vec<EventWindow> {
    // The embedded table is valid JSON by construction.
    serde_json::from_str(DEFAULT_WINDOWS_JSON).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_parse_in_schedule_order() {
        let windows = default_windows();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].name, "Event I");
        assert_eq!(windows[4].name, "Event V");
        assert!(windows[4].start.unwrap() < windows[4].end.unwrap());
    }

    #[test]
    fn windows_load_from_external_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windows.json");
        std::fs::write(
            &path,
            r#"[{"name": "Event VI", "start": "2025-09-01T00:00:00Z", "end": "2025-09-03T23:59:59.999Z"}]"#,
        )
        .unwrap();
        let config = Config {
            endpoint: "http://localhost/api".to_string(),
            snapshot_path: PathBuf::from("unused.csv"),
            windows_path: Some(path),
            refresh_secs: 900,
            live_window: "Event VI".to_string(),
            request_timeout_secs: 10,
        };
        let windows = config.load_windows().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].name, "Event VI");
        assert!(windows[0].title.is_empty());
    }
}
