use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::gateway::{FetchOrigin, Gateway};
use crate::record::TransactionRecord;
use crate::windows::{filter_by_window, find_window, window_report, EventWindow, ALL_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Owns the full record set and the window-filtered projection derived from
/// it. Window selection only re-filters the data already in memory; fetching
/// happens on explicit refresh or on the live-window timer.
pub struct RefreshController {
    gateway: Gateway,
    windows: Vec<EventWindow>,
    live_window: String,
    selected: String,
    state: RefreshState,
    full_data: Vec<TransactionRecord>,
    data: Vec<TransactionRecord>,
    in_flight: bool,
}

impl RefreshController {
    pub fn new(gateway: Gateway, windows: Vec<EventWindow>, live_window: String) -> Self {
        Self {
            gateway,
            windows,
            live_window,
            selected: ALL_WINDOW.to_string(),
            state: RefreshState::Idle,
            full_data: Vec::new(),
            data: Vec::new(),
            in_flight: false,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    pub fn selected_window(&self) -> &str {
        &self.selected
    }

    pub fn selected_window_meta(&self) -> Option<&EventWindow> {
        find_window(&self.windows, &self.selected)
    }

    pub fn windows(&self) -> &[EventWindow] {
        &self.windows
    }

    /// Unfiltered source of truth for the session.
    pub fn full_data(&self) -> &[TransactionRecord] {
        &self.full_data
    }

    /// Current window projection, recomputed on selection and refresh.
    pub fn data(&self) -> &[TransactionRecord] {
        &self.data
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Switches the active window. Purely a synchronous re-filter of the held
    /// full set; never triggers a fetch.
    pub fn select_window(&mut self, name: &str) {
        self.selected = name.to_string();
        self.data = filter_by_window(&self.full_data, &self.windows, &self.selected);
        debug!(
            window = %self.selected,
            records = self.data.len(),
            "window selection re-filtered in memory"
        );
    }

    /// The refresh timer only runs while the live window is selected.
    pub fn timer_armed(&self) -> bool {
        self.selected == self.live_window
    }

    /// Full re-fetch cycle. The record set is replaced in one assignment once
    /// the fetch completes, then the current window filter is re-applied — a
    /// response that raced a window switch is simply filtered against the now
    /// current window. Overlapping ticks skip: at most one fetch is in flight.
    pub async fn refresh(&mut self) -> Result<(), CoreError> {
        if self.in_flight {
            debug!("refresh already in flight, skipping tick");
            return Ok(());
        }
        self.in_flight = true;
        self.state = RefreshState::Loading;

        let result = self.gateway.fetch(None).await;
        self.in_flight = false;

        match result {
            Ok(outcome) => {
                if outcome.origin == FetchOrigin::Sample {
                    warn!("running on embedded sample data");
                }
                self.full_data = outcome.records;
                self.data = filter_by_window(&self.full_data, &self.windows, &self.selected);
                self.state = RefreshState::Ready;
                window_report(&self.full_data, &self.windows);
                Ok(())
            }
            Err(err) => {
                self.state = RefreshState::Failed;
                Err(err)
            }
        }
    }

    /// Watch loop: initial fetch, then timed refreshes while the live window
    /// is selected, re-running `on_cycle` with the current projection after
    /// every completed cycle.
    pub async fn run<F>(&mut self, period: Duration, mut on_cycle: F) -> Result<(), CoreError>
    where
        F: FnMut(&[TransactionRecord], &[TransactionRecord]),
    {
        self.refresh().await?;
        on_cycle(&self.full_data, &self.data);

        let mut ticker = interval(period);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            if !self.timer_armed() {
                debug!(window = %self.selected, "timer disarmed for non-live window");
                continue;
            }
            match self.refresh().await {
                Ok(()) => {
                    info!(
                        records = self.full_data.len(),
                        window = %self.selected,
                        "refresh cycle complete"
                    );
                    on_cycle(&self.full_data, &self.data);
                }
                Err(err) => warn!("refresh cycle failed: {err}"),
            }
        }
    }
}
