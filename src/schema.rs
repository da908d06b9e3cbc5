//! Persisted state shape and its canonical defaults.
//!
//! Every type here is source-of-truth data. Forecast values and block
//! aggregates are derived on demand (see `forecast` and `aggregate`) and are
//! never serialized.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

/// Row counts and price-range labels of one schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaGeneration {
    pub version: u32,
    pub calculation_rows: usize,
    pub activity_rows: usize,
    pub trading_blocks: usize,
    pub price_ranges: &'static [&'static str],
}

pub const GENERATION_1: SchemaGeneration = SchemaGeneration {
    version: 1,
    calculation_rows: 15,
    activity_rows: 10,
    trading_blocks: 3,
    price_ranges: &[
        "300 - 319", "320 - 339", "340 - 359", "360 - 379", "380 - 399", "400 - 419",
        "420 - 439", "440 - 459", "460 - 479", "480 - 499", "500 - 519", "520 - 539",
        "540 - 559", "560 - 579",
    ],
};

pub const GENERATION_2: SchemaGeneration = SchemaGeneration {
    version: 2,
    calculation_rows: 20,
    activity_rows: 10,
    trading_blocks: 3,
    price_ranges: &[
        "280 - 299", "300 - 319", "320 - 339", "340 - 359", "360 - 379", "380 - 399",
        "400 - 419", "420 - 439", "440 - 459", "460 - 479", "480 - 499", "500 - 519",
        "520 - 539", "540 - 559", "560 - 579", "580 - 599",
    ],
};

pub const GENERATION_3: SchemaGeneration = SchemaGeneration {
    version: 3,
    calculation_rows: 20,
    activity_rows: 20,
    trading_blocks: 3,
    price_ranges: &[
        "240 - 259", "260 - 279", "280 - 299", "300 - 319", "320 - 339", "340 - 359",
        "360 - 379", "380 - 399", "400 - 419", "420 - 439", "440 - 459", "460 - 479",
        "480 - 499", "500 - 519", "520 - 539", "540 - 559", "560 - 579", "580 - 599",
        "600 - 619", "620 - 639",
    ],
};

/// The generation every load is upgraded to.
pub const CURRENT: SchemaGeneration = GENERATION_3;

/// Price a freshly created trading block starts with.
pub const DEFAULT_CURRENT_PRICE: f64 = 420.0;

/// Title of the block at `index` when it has to be created.
pub fn default_block_title(index: usize) -> String {
    format!("Day {}", index + 1)
}

/// Selects one of the two side-by-side input sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSet {
    #[default]
    A,
    B,
}

impl FromStr for InputSet {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" => Ok(InputSet::A),
            "b" => Ok(InputSet::B),
            _ => Err(TrackerError::UnknownInputSet(s.to_string())),
        }
    }
}

impl fmt::Display for InputSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSet::A => write!(f, "A"),
            InputSet::B => write!(f, "B"),
        }
    }
}

// Saved blobs are read one value at a time. A value of the wrong type is
// replaced by its default and logged; it never discards its neighbours.

pub(crate) fn read_number(obj: &Map<String, Value>, key: &str, what: &str) -> f64 {
    match obj.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                warn!("Reading {what}.{key} from text '{s}'");
                v
            }
            _ => {
                warn!("Replacing non-numeric {what}.{key} '{s}' with 0");
                0.0
            }
        },
        Some(other) => {
            warn!("Replacing {what}.{key} = {other} with 0");
            0.0
        }
    }
}

pub(crate) fn read_optional_number(obj: &Map<String, Value>, key: &str, what: &str) -> Option<f64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(_) => Some(read_number(obj, key, what)),
    }
}

fn read_text(obj: &Map<String, Value>, key: &str, what: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => {
            warn!("Reading {what}.{key} = {v} as text");
            v.to_string()
        }
        Some(other) => {
            warn!("Replacing {what}.{key} = {other} with empty text");
            String::new()
        }
    }
}

/// Reads an array of rows. `None` when the value is absent, `null` or not an array.
pub(crate) fn read_rows<T: From<Value>>(value: Option<Value>, what: &str) -> Option<Vec<T>> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items.into_iter().map(T::from).collect()),
        Some(other) => {
            warn!("Ignoring {what}: expected a list, found {other}");
            None
        }
    }
}

pub(crate) fn into_object(value: Value, what: &str) -> Option<Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj),
        Value::Null => {
            warn!("Replacing null {what} with an empty one");
            None
        }
        other => {
            warn!("Replacing {what} = {other} with an empty one");
            None
        }
    }
}

/// One forecasting parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ForecastInputs {
    pub total_tweet: f64,
    pub average: f64,
    pub elapsed: f64,
    pub remaining_days: f64,
    pub remaining_hours: f64,
    pub sensitivity: f64,
}

impl From<Value> for ForecastInputs {
    fn from(value: Value) -> Self {
        let what = "input set";
        let Some(obj) = into_object(value, what) else {
            return Self::default();
        };
        // `totalTweetTarget` is an older name of `totalTweet`
        let total_key = match obj.get("totalTweet") {
            None | Some(Value::Null) if obj.contains_key("totalTweetTarget") => "totalTweetTarget",
            _ => "totalTweet",
        };
        Self {
            total_tweet: read_number(&obj, total_key, what),
            average: read_number(&obj, "average", what),
            elapsed: read_number(&obj, "elapsed", what),
            remaining_days: read_number(&obj, "remainingDays", what),
            remaining_hours: read_number(&obj, "remainingHours", what),
            sensitivity: read_number(&obj, "sensitivity", what),
        }
    }
}

/// A row of the forecast table. The forecast itself is not stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct CalculationRow {
    pub avg_daily_tweet: f64,
    pub group: String,
    pub mark: String,
}

impl From<Value> for CalculationRow {
    fn from(value: Value) -> Self {
        let what = "calculation row";
        let Some(obj) = into_object(value, what) else {
            return Self::default();
        };
        Self {
            avg_daily_tweet: read_number(&obj, "avgDailyTweet", what),
            group: read_text(&obj, "group", what),
            mark: read_text(&obj, "mark", what),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct PriceRangeRow {
    pub range: String,
    pub shares: f64,
    pub cost: f64,
    pub pnl: f64,
}

impl From<Value> for PriceRangeRow {
    fn from(value: Value) -> Self {
        let what = "price range";
        let Some(obj) = into_object(value, what) else {
            return Self::default();
        };
        Self {
            range: read_text(&obj, "range", what),
            shares: read_number(&obj, "shares", what),
            cost: read_number(&obj, "cost", what),
            pnl: read_number(&obj, "pnl", what),
        }
    }
}

impl PriceRangeRow {
    pub fn zeroed(range: &str) -> Self {
        Self {
            range: range.to_string(),
            ..Self::default()
        }
    }
}

/// One line of a block's activity log. `net_pnl` is user-entered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ActivityRow {
    pub activity: String,
    pub share: f64,
    pub cost: f64,
    pub sold: f64,
    pub net_pnl: f64,
}

impl From<Value> for ActivityRow {
    fn from(value: Value) -> Self {
        let what = "activity";
        let Some(obj) = into_object(value, what) else {
            return Self::default();
        };
        Self {
            activity: read_text(&obj, "activity", what),
            share: read_number(&obj, "share", what),
            cost: read_number(&obj, "cost", what),
            sold: read_number(&obj, "sold", what),
            net_pnl: read_number(&obj, "netPnl", what),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct TradingBlock {
    pub title: String,
    pub current_price: f64,
    pub price_ranges: Vec<PriceRangeRow>,
    pub activities: Vec<ActivityRow>,
}

impl From<Value> for TradingBlock {
    fn from(value: Value) -> Self {
        let what = "trading block";
        let Some(mut obj) = into_object(value, what) else {
            return Self::default();
        };
        Self {
            title: read_text(&obj, "title", what),
            current_price: read_number(&obj, "currentPrice", what),
            price_ranges: read_rows(obj.remove("priceRanges"), "price ranges").unwrap_or_default(),
            activities: read_rows(obj.remove("activities"), "activities").unwrap_or_default(),
        }
    }
}

impl TradingBlock {
    /// A block holding every canonical range and a full activity log, all zeroed.
    pub fn empty(title: impl Into<String>, generation: &SchemaGeneration) -> Self {
        Self {
            title: title.into(),
            current_price: DEFAULT_CURRENT_PRICE,
            price_ranges: generation
                .price_ranges
                .iter()
                .map(|label| PriceRangeRow::zeroed(label))
                .collect(),
            activities: vec![ActivityRow::default(); generation.activity_rows],
        }
    }
}

/// The whole application state, persisted as one blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalState {
    pub inputs_a: ForecastInputs,
    pub inputs_b: ForecastInputs,
    pub calculation_rows: Vec<CalculationRow>,
    pub trading_blocks: Vec<TradingBlock>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::default_for(&CURRENT)
    }
}

impl GlobalState {
    pub fn default_for(generation: &SchemaGeneration) -> Self {
        Self {
            inputs_a: ForecastInputs::default(),
            inputs_b: ForecastInputs::default(),
            calculation_rows: vec![CalculationRow::default(); generation.calculation_rows],
            trading_blocks: (0..generation.trading_blocks)
                .map(|i| TradingBlock::empty(default_block_title(i), generation))
                .collect(),
        }
    }

    pub fn inputs(&self, set: InputSet) -> &ForecastInputs {
        match set {
            InputSet::A => &self.inputs_a,
            InputSet::B => &self.inputs_b,
        }
    }

    pub fn inputs_mut(&mut self, set: InputSet) -> &mut ForecastInputs {
        match set {
            InputSet::A => &mut self.inputs_a,
            InputSet::B => &mut self.inputs_b,
        }
    }
}
