//! Tweet-count forecasting and trading-block tracking.
//!
//! The state lives in one [`GlobalState`] owned by a [`Tracker`]. Saved blobs
//! from any earlier schema generation are upgraded by [`migrate`] on load;
//! forecasts and dashboard totals are derived on every read.

pub mod block;
pub mod error;
pub mod forecast;
pub mod format;
pub mod migrate;
pub mod portfolio;
pub mod schema;
pub mod store;
pub mod tracker;

pub use error::{Result, TrackerError};
pub use schema::{GlobalState, InputSet};
pub use store::{MemoryStore, SledStore, StateStore};
pub use tracker::{Edit, Tracker};
