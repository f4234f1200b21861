//! Run-wide state shared by the manager and every strategy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Whether orders reach a real brokerage account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Backtest,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Live => f.write_str("live"),
            RunMode::Backtest => f.write_str("backtest"),
        }
    }
}

/// Mode, warm-up bookkeeping and the current trading day.
///
/// Created once at startup and handed to the manager.
#[derive(Debug, Clone)]
pub struct RunContext {
    mode: RunMode,
    /// Warm-up length in days
    warm_up: Option<u32>,
    warm_up_from_strategy: bool,
    warming_up: bool,
    today: Option<NaiveDate>,
}

impl RunContext {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            warm_up: None,
            warm_up_from_strategy: false,
            warming_up: false,
            today: None,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == RunMode::Live
    }

    pub fn warm_up(&self) -> Option<u32> {
        self.warm_up
    }

    fn apply_warm_up(&mut self, days: u32) {
        self.warm_up = Some(days);
        self.warming_up = days > 0;
        debug!(days, "Warm-up period set");
    }

    /// Set the warm-up period, unless a strategy has already asked for one.
    pub fn set_warm_up(&mut self, days: u32) {
        if !self.warm_up_from_strategy {
            self.apply_warm_up(days);
        }
    }

    /// Warm-up requested by a strategy; the longest request wins.
    pub fn set_warm_up_from_strategy(&mut self, days: u32) {
        self.warm_up_from_strategy = true;
        match self.warm_up {
            Some(current) if current >= days => {}
            _ => self.apply_warm_up(days),
        }
    }

    pub fn is_warming_up(&self) -> bool {
        self.warming_up
    }

    pub fn finish_warm_up(&mut self) {
        self.warming_up = false;
    }

    pub fn today(&self) -> Option<NaiveDate> {
        self.today
    }

    /// Advance the clock. Returns true when a new trading day started.
    pub fn update_time(&mut self, now: DateTime<Utc>) -> bool {
        let date = now.date_naive();
        if self.today == Some(date) {
            return false;
        }
        self.today = Some(date);
        debug!(" - - - - {} - - - - ", date);
        true
    }
}
