//! The single owner of the application state.
//!
//! A [`Tracker`] loads the state through the migration pipeline, applies
//! [`Edit`]s synchronously and writes the whole state back after each one.

use log::{debug, error, warn};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TrackerError};
use crate::forecast::{resolve_rows, ResolvedRow, SENSITIVITY_RANGE};
use crate::migrate::parse_state;
use crate::portfolio::PortfolioSummary;
use crate::schema::{GlobalState, InputSet};
use crate::store::StateStore;

// "remaining_days", "remaining-days" and "remainingDays" all name the same field
fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

/// Parses a user-entered number. Only finite values are accepted.
pub fn parse_number(s: &str) -> Result<f64> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(TrackerError::InvalidNumber(s.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    TotalTweet,
    Average,
    Elapsed,
    RemainingDays,
    RemainingHours,
    Sensitivity,
}

impl FromStr for InputField {
    type Err = TrackerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "totaltweet" | "totaltweettarget" | "total" => Ok(InputField::TotalTweet),
            "average" | "avg" => Ok(InputField::Average),
            "elapsed" => Ok(InputField::Elapsed),
            "remainingdays" | "days" => Ok(InputField::RemainingDays),
            "remaininghours" | "hours" => Ok(InputField::RemainingHours),
            "sensitivity" => Ok(InputField::Sensitivity),
            _ => Err(TrackerError::UnknownField {
                target: "input set",
                field: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeField {
    Shares,
    Cost,
    Pnl,
}

impl FromStr for RangeField {
    type Err = TrackerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "shares" => Ok(RangeField::Shares),
            "cost" => Ok(RangeField::Cost),
            "pnl" => Ok(RangeField::Pnl),
            _ => Err(TrackerError::UnknownField {
                target: "price range",
                field: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityField {
    Share,
    Cost,
    Sold,
    NetPnl,
}

impl FromStr for ActivityField {
    type Err = TrackerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "share" | "shares" => Ok(ActivityField::Share),
            "cost" => Ok(ActivityField::Cost),
            "sold" => Ok(ActivityField::Sold),
            "netpnl" => Ok(ActivityField::NetPnl),
            _ => Err(TrackerError::UnknownField {
                target: "activity",
                field: s.to_string(),
            }),
        }
    }
}

/// One user edit. Targets are checked before anything is changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Input { set: InputSet, field: InputField, value: f64 },
    RowAverage { row: usize, value: f64 },
    RowGroup { row: usize, value: String },
    RowMark { row: usize, value: String },
    BlockTitle { block: usize, title: String },
    CurrentPrice { block: usize, value: f64 },
    PriceRange { block: usize, label: String, field: RangeField, value: f64 },
    Activity { block: usize, row: usize, field: ActivityField, value: f64 },
    ActivityNote { block: usize, row: usize, text: String },
}

fn check_index(index: usize, len: usize, err: fn(usize, usize) -> TrackerError) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(err(index, len))
    }
}

fn row_err(index: usize, len: usize) -> TrackerError {
    TrackerError::RowOutOfRange { index, len }
}

fn block_err(index: usize, len: usize) -> TrackerError {
    TrackerError::BlockOutOfRange { index, len }
}

fn activity_err(index: usize, len: usize) -> TrackerError {
    TrackerError::ActivityOutOfRange { index, len }
}

impl Edit {
    pub fn apply(self, state: &mut GlobalState) -> Result<()> {
        let rows = state.calculation_rows.len();
        let blocks = state.trading_blocks.len();

        match self {
            Edit::Input { set, field, value } => {
                let inputs = state.inputs_mut(set);
                match field {
                    InputField::TotalTweet => inputs.total_tweet = value,
                    InputField::Average => inputs.average = value,
                    InputField::Elapsed => inputs.elapsed = value,
                    InputField::RemainingDays => inputs.remaining_days = value,
                    InputField::RemainingHours => inputs.remaining_hours = value,
                    InputField::Sensitivity => {
                        let (low, high) = SENSITIVITY_RANGE;
                        if !(low..=high).contains(&value) {
                            warn!("Sensitivity {value} is outside the usual range [{low}, {high}]");
                        }
                        inputs.sensitivity = value;
                    }
                }
            }
            Edit::RowAverage { row, value } => {
                let i = check_index(row, rows, row_err)?;
                state.calculation_rows[i].avg_daily_tweet = value;
            }
            Edit::RowGroup { row, value } => {
                let i = check_index(row, rows, row_err)?;
                state.calculation_rows[i].group = value;
            }
            Edit::RowMark { row, value } => {
                let i = check_index(row, rows, row_err)?;
                state.calculation_rows[i].mark = value;
            }
            Edit::BlockTitle { block, title } => {
                let b = check_index(block, blocks, block_err)?;
                state.trading_blocks[b].title = title;
            }
            Edit::CurrentPrice { block, value } => {
                let b = check_index(block, blocks, block_err)?;
                state.trading_blocks[b].current_price = value;
            }
            Edit::PriceRange {
                block,
                label,
                field,
                value,
            } => {
                let b = check_index(block, blocks, block_err)?;
                let row = state.trading_blocks[b]
                    .price_ranges
                    .iter_mut()
                    .find(|r| r.range == label.trim())
                    .ok_or_else(|| TrackerError::UnknownRange(label.clone()))?;
                match field {
                    RangeField::Shares => row.shares = value,
                    RangeField::Cost => row.cost = value,
                    RangeField::Pnl => row.pnl = value,
                }
            }
            Edit::Activity {
                block,
                row,
                field,
                value,
            } => {
                let b = check_index(block, blocks, block_err)?;
                let activities = &mut state.trading_blocks[b].activities;
                let i = check_index(row, activities.len(), activity_err)?;
                let activity = &mut activities[i];
                match field {
                    ActivityField::Share => activity.share = value,
                    ActivityField::Cost => activity.cost = value,
                    ActivityField::Sold => activity.sold = value,
                    ActivityField::NetPnl => activity.net_pnl = value,
                }
            }
            Edit::ActivityNote { block, row, text } => {
                let b = check_index(block, blocks, block_err)?;
                let activities = &mut state.trading_blocks[b].activities;
                let i = check_index(row, activities.len(), activity_err)?;
                activities[i].activity = text;
            }
        }
        Ok(())
    }
}

pub struct Tracker<S: StateStore> {
    state: GlobalState,
    store: S,
}

impl<S: StateStore> Tracker<S> {
    /// Loads and upgrades the stored blob, or starts from the default state.
    ///
    /// An upgraded or fresh state is written back right away. When the stored
    /// blob cannot be read, the tracker starts from defaults but leaves the
    /// blob untouched until the first edit.
    pub fn open(store: S) -> Self {
        let (state, write_back) = match store.load() {
            Ok(Some(bytes)) => match parse_state(&bytes) {
                Ok(state) => (state, true),
                Err(e) => {
                    error!("Failed to parse saved state, keeping it until the next edit: {e}");
                    (GlobalState::default(), false)
                }
            },
            Ok(None) => {
                debug!("No saved state, starting from defaults");
                (GlobalState::default(), true)
            }
            Err(e) => {
                warn!("Could not read saved state: {e}");
                (GlobalState::default(), false)
            }
        };
        let tracker = Tracker { state, store };
        if write_back {
            tracker.persist();
        }
        tracker
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies `edit` and writes the state back. A failed write is logged and
    /// the in-memory change is kept.
    pub fn edit(&mut self, edit: Edit) -> Result<()> {
        debug!("Applying {edit:?}");
        edit.apply(&mut self.state)?;
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let result = serde_json::to_vec(&self.state)
            .map_err(TrackerError::from)
            .and_then(|bytes| self.store.save(&bytes));
        if let Err(e) = result {
            warn!("Failed to save state: {e}");
        }
    }

    pub fn forecast_table(&self, set: InputSet) -> Vec<ResolvedRow> {
        resolve_rows(&self.state.calculation_rows, self.state.inputs(set))
    }

    pub fn summary(&self) -> PortfolioSummary {
        PortfolioSummary::new(&self.state)
    }

    /// The state as pretty-printed JSON, the same shape as the stored blob.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state)?)
    }

    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.export_json()?)?;
        Ok(())
    }
}
