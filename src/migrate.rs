//! Upgrades a persisted blob of any earlier generation to the current schema.
//!
//! Loading runs every [`UpgradeStep`] in [`UpgradeStep::all`] order on every
//! blob. Each step only fills gaps, so applying the pipeline to its own output
//! changes nothing.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{Result, TrackerError};
use crate::schema::{
    default_block_title, into_object, read_optional_number, read_rows, CalculationRow,
    ForecastInputs, GlobalState, PriceRangeRow, SchemaGeneration, TradingBlock, CURRENT,
};

/// Tolerant view of a persisted blob: every section may be absent, and the
/// flat scalars of the first generation are still accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct StoredState {
    pub inputs_a: Option<ForecastInputs>,
    pub inputs_b: Option<ForecastInputs>,
    pub calculation_rows: Option<Vec<CalculationRow>>,
    pub trading_blocks: Option<Vec<TradingBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tweet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_hours: Option<f64>,
}

fn read_inputs(value: Option<Value>, what: &str) -> Option<ForecastInputs> {
    match value {
        None | Some(Value::Null) => None,
        Some(obj @ Value::Object(_)) => Some(ForecastInputs::from(obj)),
        Some(other) => {
            warn!("Ignoring {what} = {other}");
            None
        }
    }
}

impl From<Value> for StoredState {
    fn from(value: Value) -> Self {
        let what = "saved state";
        let Some(mut obj) = into_object(value, what) else {
            return Self::default();
        };
        Self {
            inputs_a: read_inputs(obj.remove("inputsA"), "inputsA"),
            inputs_b: read_inputs(obj.remove("inputsB"), "inputsB"),
            calculation_rows: read_rows(obj.remove("calculationRows"), "calculationRows"),
            trading_blocks: read_rows(obj.remove("tradingBlocks"), "tradingBlocks"),
            total_tweet: read_optional_number(&obj, "totalTweet", what),
            average: read_optional_number(&obj, "average", what),
            elapsed: read_optional_number(&obj, "elapsed", what),
            remaining_days: read_optional_number(&obj, "remainingDays", what),
            remaining_hours: read_optional_number(&obj, "remainingHours", what),
        }
    }
}

impl From<GlobalState> for StoredState {
    fn from(state: GlobalState) -> Self {
        Self {
            inputs_a: Some(state.inputs_a),
            inputs_b: Some(state.inputs_b),
            calculation_rows: Some(state.calculation_rows),
            trading_blocks: Some(state.trading_blocks),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStep {
    CalculationRows,
    InputSets,
    TradingBlocks,
    Activities,
    PriceRanges,
}

impl UpgradeStep {
    /// Every step, in pipeline order.
    pub fn all() -> [UpgradeStep; 5] {
        [
            UpgradeStep::CalculationRows,
            UpgradeStep::InputSets,
            UpgradeStep::TradingBlocks,
            UpgradeStep::Activities,
            UpgradeStep::PriceRanges,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeStep::CalculationRows => "calculation_rows",
            UpgradeStep::InputSets => "input_sets",
            UpgradeStep::TradingBlocks => "trading_blocks",
            UpgradeStep::Activities => "activities",
            UpgradeStep::PriceRanges => "price_ranges",
        }
    }

    pub fn apply(&self, state: &mut StoredState, target: &SchemaGeneration) {
        match self {
            UpgradeStep::CalculationRows => {
                let rows = state.calculation_rows.get_or_insert_with(Vec::new);
                pad_to(rows, target.calculation_rows);
            }
            UpgradeStep::InputSets => backfill_inputs(state),
            UpgradeStep::TradingBlocks => {
                let blocks = state.trading_blocks.get_or_insert_with(Vec::new);
                while blocks.len() < target.trading_blocks {
                    let title = default_block_title(blocks.len());
                    blocks.push(TradingBlock::empty(title, target));
                }
            }
            UpgradeStep::Activities => {
                for block in state.trading_blocks.iter_mut().flatten() {
                    pad_to(&mut block.activities, target.activity_rows);
                }
            }
            UpgradeStep::PriceRanges => {
                for block in state.trading_blocks.iter_mut().flatten() {
                    reconcile_ranges(block, target.price_ranges);
                }
            }
        }
    }
}

/// Appends default rows until `rows` has `len` entries. Never truncates.
pub fn pad_to<T: Default>(rows: &mut Vec<T>, len: usize) {
    if rows.len() < len {
        rows.resize_with(len, T::default);
    }
}

fn backfill_inputs(state: &mut StoredState) {
    if state.inputs_a.is_none() {
        state.inputs_a = Some(ForecastInputs {
            total_tweet: state.total_tweet.unwrap_or(0.0),
            average: state.average.unwrap_or(0.0),
            elapsed: state.elapsed.unwrap_or(0.0),
            remaining_days: state.remaining_days.unwrap_or(0.0),
            remaining_hours: state.remaining_hours.unwrap_or(0.0),
            sensitivity: 0.0,
        });
    }
    if state.inputs_b.is_none() {
        // ForecastInputs is Copy: B gets its own value, not a view of A.
        state.inputs_b = state.inputs_a;
    }
}

/// Rebuilds `block.price_ranges` in canonical label order.
///
/// Rows whose label is canonical keep their values, missing labels get a zeroed
/// row. Rows with a non-canonical label are kept after the canonical ones in
/// their original order. A repeated label keeps only its first row.
pub fn reconcile_ranges(block: &mut TradingBlock, canonical: &[&str]) {
    let mut seen = HashSet::new();
    let mut rows: Vec<Option<PriceRangeRow>> = Vec::with_capacity(block.price_ranges.len());
    for row in block.price_ranges.drain(..) {
        if seen.insert(row.range.clone()) {
            rows.push(Some(row));
        } else {
            warn!(
                "Dropping duplicate price range '{}' in block '{}'",
                row.range, block.title
            );
        }
    }

    let mut rebuilt: Vec<PriceRangeRow> = canonical
        .iter()
        .map(|label| {
            rows.iter_mut()
                .find(|r| r.as_ref().is_some_and(|r| r.range == *label))
                .and_then(Option::take)
                .unwrap_or_else(|| PriceRangeRow::zeroed(label))
        })
        .collect();

    let extras: Vec<PriceRangeRow> = rows.into_iter().flatten().collect();
    if !extras.is_empty() {
        let labels: Vec<&str> = extras.iter().map(|r| r.range.as_str()).collect();
        warn!(
            "Keeping non-canonical price ranges {:?} in block '{}'",
            labels, block.title
        );
    }
    rebuilt.extend(extras);
    block.price_ranges = rebuilt;
}

/// Runs the whole pipeline against `target`.
pub fn migrate_to(mut stored: StoredState, target: &SchemaGeneration) -> GlobalState {
    debug!("Upgrading saved state to schema v{}", target.version);
    for step in UpgradeStep::all() {
        step.apply(&mut stored, target);
    }
    GlobalState {
        inputs_a: stored.inputs_a.unwrap_or_default(),
        inputs_b: stored.inputs_b.unwrap_or_default(),
        calculation_rows: stored.calculation_rows.unwrap_or_default(),
        trading_blocks: stored.trading_blocks.unwrap_or_default(),
    }
}

pub fn migrate(stored: StoredState) -> GlobalState {
    migrate_to(stored, &CURRENT)
}

/// Parses and upgrades a persisted blob.
///
/// Only bytes that are not JSON, or JSON whose top level is not an object,
/// are an error. Any value of the wrong type inside is repaired in place.
pub fn parse_state(bytes: &[u8]) -> Result<GlobalState> {
    match serde_json::from_slice::<Value>(bytes)? {
        value @ Value::Object(_) => Ok(migrate(StoredState::from(value))),
        other => Err(TrackerError::UnreadableState(other.to_string())),
    }
}

/// Like [`parse_state`], but an unreadable blob is logged and yields the default state.
pub fn load_state(bytes: &[u8]) -> GlobalState {
    parse_state(bytes).unwrap_or_else(|e| {
        error!("Failed to parse saved state: {e}");
        GlobalState::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActivityRow, GENERATION_1, GENERATION_2};

    fn remigrate(state: &GlobalState) -> GlobalState {
        let bytes = serde_json::to_vec(state).unwrap();
        load_state(&bytes)
    }

    fn v1_blob() -> String {
        let rows: Vec<_> = (0..GENERATION_1.calculation_rows)
            .map(|i| serde_json::json!({"avgDailyTweet": i as f64, "forecastRange": 0, "group": "", "mark": ""}))
            .collect();
        let ranges: Vec<_> = GENERATION_1
            .price_ranges
            .iter()
            .map(|r| serde_json::json!({"range": r, "shares": 1, "cost": 10, "pnl": 12}))
            .collect();
        let activities: Vec<_> = (0..GENERATION_1.activity_rows)
            .map(|_| serde_json::json!({"activity": "buy", "share": 1, "cost": 5, "sold": 7, "netPnl": 2}))
            .collect();
        serde_json::json!({
            "totalTweet": 250,
            "average": 48.5,
            "elapsed": 3,
            "remainingDays": 4,
            "calculationRows": rows,
            "tradingBlocks": [
                {"title": "Mon", "currentPrice": 400, "priceRanges": ranges, "activities": activities}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_pad_never_truncates() {
        let mut short = vec![1, 2, 3];
        pad_to(&mut short, 5);
        assert_eq!(short, vec![1, 2, 3, 0, 0]);

        let mut long = vec![1, 2, 3, 4, 5, 6];
        pad_to(&mut long, 5);
        assert_eq!(long, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_legacy_scalars_become_input_set_a() {
        let state = load_state(v1_blob().as_bytes());
        assert_eq!(state.inputs_a.total_tweet, 250.0);
        assert_eq!(state.inputs_a.average, 48.5);
        assert_eq!(state.inputs_a.elapsed, 3.0);
        assert_eq!(state.inputs_a.remaining_days, 4.0);
        assert_eq!(state.inputs_a.remaining_hours, 0.0);
        assert_eq!(state.inputs_a.sensitivity, 0.0);
        assert_eq!(state.inputs_b, state.inputs_a);
    }

    #[test]
    fn test_input_sets_are_independent_after_backfill() {
        let mut state = load_state(v1_blob().as_bytes());
        state.inputs_b.average = 99.0;
        assert_eq!(state.inputs_a.average, 48.5);
    }

    #[test]
    fn test_existing_input_b_is_kept() {
        let blob = r#"{"inputsA": {"average": 10}, "inputsB": {"average": 20}, "average": 5}"#;
        let state = load_state(blob.as_bytes());
        assert_eq!(state.inputs_a.average, 10.0);
        assert_eq!(state.inputs_b.average, 20.0);
    }

    #[test]
    fn test_v1_blob_is_upgraded() {
        let state = load_state(v1_blob().as_bytes());

        assert_eq!(state.calculation_rows.len(), CURRENT.calculation_rows);
        for (i, row) in state.calculation_rows.iter().enumerate() {
            if i < GENERATION_1.calculation_rows {
                assert_eq!(row.avg_daily_tweet, i as f64);
            } else {
                assert_eq!(*row, CalculationRow::default());
            }
        }

        assert_eq!(state.trading_blocks.len(), 3);
        let block = &state.trading_blocks[0];
        assert_eq!(block.title, "Mon");
        assert_eq!(block.current_price, 400.0);
        assert_eq!(block.activities.len(), CURRENT.activity_rows);
        assert_eq!(block.activities[0].activity, "buy");
        assert_eq!(block.activities[0].net_pnl, 2.0);
        assert_eq!(block.activities[GENERATION_1.activity_rows], ActivityRow::default());

        let labels: Vec<&str> = block.price_ranges.iter().map(|r| r.range.as_str()).collect();
        assert_eq!(labels, CURRENT.price_ranges);
        for row in &block.price_ranges {
            if GENERATION_1.price_ranges.contains(&row.range.as_str()) {
                assert_eq!(row.cost, 10.0);
                assert_eq!(row.pnl, 12.0);
            } else {
                assert_eq!(row.cost, 0.0);
            }
        }

        assert_eq!(state.trading_blocks[1].title, "Day 2");
        assert_eq!(state.trading_blocks[2].title, "Day 3");
    }

    #[test]
    fn test_migration_is_idempotent() {
        let blobs = [
            v1_blob(),
            "{}".to_string(),
            r#"{"calculationRows": null, "tradingBlocks": [{"priceRanges": null}]}"#.to_string(),
            r#"{"tradingBlocks": [{"title": "x", "priceRanges": [
                {"range": "999 - 1019", "cost": 1},
                {"range": "420 - 439", "cost": 3},
                {"range": "420 - 439", "cost": 4}
            ]}]}"#
                .to_string(),
            serde_json::to_string(&GlobalState::default()).unwrap(),
            r#"{"inputsA": {"average": 77}, "calculationRows": [{"avgDailyTweet": 5}, null]}"#
                .to_string(),
            r#"{"tradingBlocks": [null, {"title": "x", "priceRanges": [{"range": "420 - 439", "cost": "12"}]}]}"#
                .to_string(),
            r#"{"inputsB": {"totalTweet": 1, "totalTweetTarget": 2, "average": "9"}, "average": [3]}"#
                .to_string(),
            r#"{"calculationRows": {"0": 1}, "tradingBlocks": [{"currentPrice": "high", "activities": [7]}]}"#
                .to_string(),
        ];
        for blob in blobs {
            let once = load_state(blob.as_bytes());
            let twice = remigrate(&once);
            assert_eq!(once, twice, "blob: {blob}");
        }
    }

    #[test]
    fn test_each_step_is_idempotent() {
        let stored: StoredState = serde_json::from_str(&v1_blob()).unwrap();
        for step in UpgradeStep::all() {
            let mut once = stored.clone();
            step.apply(&mut once, &CURRENT);
            let mut twice = once.clone();
            step.apply(&mut twice, &CURRENT);
            assert_eq!(once, twice, "step {}", step.as_str());
        }
    }

    #[test]
    fn test_reconcile_order_and_completeness() {
        let mut block = TradingBlock {
            title: "t".to_string(),
            current_price: 0.0,
            price_ranges: vec![
                PriceRangeRow { range: "c".into(), shares: 3.0, cost: 30.0, pnl: 33.0 },
                PriceRangeRow { range: "a".into(), shares: 1.0, cost: 10.0, pnl: 11.0 },
            ],
            activities: vec![],
        };
        reconcile_ranges(&mut block, &["a", "b", "c"]);

        let labels: Vec<&str> = block.price_ranges.iter().map(|r| r.range.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(block.price_ranges[0].cost, 10.0);
        assert_eq!(block.price_ranges[1], PriceRangeRow::zeroed("b"));
        assert_eq!(block.price_ranges[2].pnl, 33.0);
    }

    #[test]
    fn test_reconcile_keeps_extras_and_drops_duplicates() {
        let mut block = TradingBlock {
            price_ranges: vec![
                PriceRangeRow { range: "old-2".into(), cost: 2.0, ..Default::default() },
                PriceRangeRow { range: "a".into(), cost: 1.0, ..Default::default() },
                PriceRangeRow { range: "a".into(), cost: 9.0, ..Default::default() },
                PriceRangeRow { range: "old-1".into(), cost: 1.0, ..Default::default() },
            ],
            ..Default::default()
        };
        reconcile_ranges(&mut block, &["a", "b"]);

        let labels: Vec<&str> = block.price_ranges.iter().map(|r| r.range.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "old-2", "old-1"]);
        assert_eq!(block.price_ranges[0].cost, 1.0);
    }

    #[test]
    fn test_shrinking_generation_keeps_long_sequences() {
        let state = GlobalState::default();
        let migrated = migrate_to(StoredState::from(state.clone()), &GENERATION_2);
        assert_eq!(migrated.calculation_rows.len(), CURRENT.calculation_rows);
        assert_eq!(migrated.trading_blocks[0].activities.len(), CURRENT.activity_rows);

        let labels: Vec<&str> = migrated.trading_blocks[0]
            .price_ranges
            .iter()
            .map(|r| r.range.as_str())
            .collect();
        assert_eq!(&labels[..GENERATION_2.price_ranges.len()], GENERATION_2.price_ranges);
        assert_eq!(labels.len(), CURRENT.price_ranges.len());
    }

    #[test]
    fn test_malformed_blob_falls_back_to_default() {
        assert_eq!(load_state(b"{not json"), GlobalState::default());
        assert_eq!(load_state(b""), GlobalState::default());
        assert_eq!(load_state(b"[1, 2]"), GlobalState::default());
    }

    #[test]
    fn test_parse_state_rejects_only_unreadable_blobs() {
        assert!(matches!(parse_state(b"{not json"), Err(TrackerError::Serialization(_))));
        assert!(matches!(parse_state(b"42"), Err(TrackerError::UnreadableState(_))));
        assert!(matches!(parse_state(b"null"), Err(TrackerError::UnreadableState(_))));
        assert_eq!(parse_state(b"{}").unwrap(), GlobalState::default());
    }

    #[test]
    fn test_null_row_keeps_the_rest_of_the_state() {
        let blob = r#"{
            "inputsA": {"average": 77},
            "calculationRows": [{"avgDailyTweet": 5}, null],
            "tradingBlocks": [{"title": "Keep me"}]
        }"#;
        let state = parse_state(blob.as_bytes()).unwrap();
        assert_eq!(state.inputs_a.average, 77.0);
        assert_eq!(state.inputs_b.average, 77.0);
        assert_eq!(state.calculation_rows[0].avg_daily_tweet, 5.0);
        assert_eq!(state.calculation_rows[1], CalculationRow::default());
        assert_eq!(state.calculation_rows.len(), CURRENT.calculation_rows);
        assert_eq!(state.trading_blocks[0].title, "Keep me");
    }

    #[test]
    fn test_null_block_is_replaced_in_place() {
        let state = load_state(br#"{"tradingBlocks": [null, {"title": "Second"}]}"#);
        assert_eq!(state.trading_blocks[0].title, "");
        assert_eq!(state.trading_blocks[0].price_ranges.len(), CURRENT.price_ranges.len());
        assert_eq!(state.trading_blocks[1].title, "Second");
        assert_eq!(state.trading_blocks[2].title, "Day 3");
    }

    #[test]
    fn test_numeric_text_cost_is_kept() {
        let blob = r#"{"tradingBlocks": [{"title": "x", "priceRanges": [{"range": "420 - 439", "cost": "12"}]}]}"#;
        let state = load_state(blob.as_bytes());
        let row = state.trading_blocks[0]
            .price_ranges
            .iter()
            .find(|r| r.range == "420 - 439")
            .unwrap();
        assert_eq!(row.cost, 12.0);
    }

    #[test]
    fn test_total_tweet_and_its_old_name_together() {
        let blob = r#"{"inputsA": {"totalTweet": 120, "totalTweetTarget": 300, "average": 44}}"#;
        let state = load_state(blob.as_bytes());
        assert_eq!(state.inputs_a.total_tweet, 120.0);
        assert_eq!(state.inputs_a.average, 44.0);
    }

    #[test]
    fn test_wrong_typed_sections_are_rebuilt() {
        let blob = r#"{
            "inputsA": "fast",
            "inputsB": {"average": 12},
            "calculationRows": 3,
            "tradingBlocks": [{"title": "Mon", "currentPrice": "410", "activities": {"a": 1}}],
            "average": "oops"
        }"#;
        let state = load_state(blob.as_bytes());
        assert_eq!(state.inputs_a, ForecastInputs::default());
        assert_eq!(state.inputs_b.average, 12.0);
        assert_eq!(state.calculation_rows.len(), CURRENT.calculation_rows);
        assert_eq!(state.trading_blocks[0].title, "Mon");
        assert_eq!(state.trading_blocks[0].current_price, 410.0);
        assert_eq!(state.trading_blocks[0].activities.len(), CURRENT.activity_rows);
    }

    #[test]
    fn test_default_state_needs_no_migration() {
        let state = GlobalState::default();
        assert_eq!(migrate(StoredState::from(state.clone())), state);
    }
}
