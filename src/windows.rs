use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::record::TransactionRecord;

/// Name of the pseudo-window that bypasses classification entirely.
pub const ALL_WINDOW: &str = "All";

/// A named marketplace event interval in UTC. `None` bounds are unbounded.
/// Intervals are closed on both ends; no grace buffer is applied around them.
#[derive(Debug, Clone, Deserialize)]
pub struct EventWindow {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl EventWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if instant < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if instant > end {
                return false;
            }
        }
        true
    }
}

/// Assigns a record to the first window in declared list order whose interval
/// contains its timestamp. Windows are not supposed to overlap, but list order
/// is the tie-break when they do. Missing or unparsable timestamps classify
/// as `None`.
pub fn classify<'a>(
    record: &TransactionRecord,
    windows: &'a [EventWindow],
) -> Option<&'a EventWindow> {
    let ts = record.timestamp()?;
    windows.iter().find(|w| w.contains(ts))
}

/// Projects the records belonging to one window. The `"All"` pseudo-window
/// returns the full set unfiltered, including records whose timestamps never
/// parsed.
pub fn filter_by_window(
    records: &[TransactionRecord],
    windows: &[EventWindow],
    name: &str,
) -> Vec<TransactionRecord> {
    if name == ALL_WINDOW {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| classify(r, windows).is_some_and(|w| w.name == name))
        .cloned()
        .collect()
}

pub fn find_window<'a>(windows: &'a [EventWindow], name: &str) -> Option<&'a EventWindow> {
    windows.iter().find(|w| w.name == name)
}

/// Per-window classification counts. A window with zero records and records
/// with unusable timestamps are different conditions, so the report keeps
/// them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReport {
    pub per_window: Vec<(String, usize)>,
    pub unclassified: usize,
    pub unparsable_timestamps: usize,
}

pub fn window_report(records: &[TransactionRecord], windows: &[EventWindow]) -> WindowReport {
    let mut per_window: Vec<(String, usize)> =
        windows.iter().map(|w| (w.name.clone(), 0)).collect();
    let mut unclassified = 0usize;
    let mut unparsable = 0usize;

    for record in records {
        if record.timestamp().is_none() {
            unparsable += 1;
            continue;
        }
        match classify(record, windows) {
            Some(window) => {
                if let Some(slot) = per_window.iter_mut().find(|(n, _)| *n == window.name) {
                    slot.1 += 1;
                }
            }
            None => unclassified += 1,
        }
    }

    for (name, count) in &per_window {
        info!(window = %name, count, "window classification");
    }
    if unparsable > 0 {
        warn!(count = unparsable, "records with unusable timestamps excluded from windows");
    }
    info!(unclassified, "records outside every window");

    WindowReport {
        per_window,
        unclassified,
        unparsable_timestamps: unparsable,
    }
}
