use comfy_table::{
    presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
    Table,
};

use crate::format::{format_grouped, format_signed};
use crate::schema::TradingBlock;

/// Derived figures of one trading block. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    title: String,
    range_cost: f64,
    range_pnl: f64,
    range_shares: f64,
    activity_cost: f64,
    activity_sold: f64,
}

impl BlockSummary {
    pub fn from_block(block: &TradingBlock) -> Self {
        let mut summary = BlockSummary {
            title: block.title.clone(),
            range_cost: 0.0,
            range_pnl: 0.0,
            range_shares: 0.0,
            activity_cost: 0.0,
            activity_sold: 0.0,
        };

        for row in &block.price_ranges {
            summary.range_cost += row.cost;
            summary.range_pnl += row.pnl;
            summary.range_shares += row.shares;
        }
        for row in &block.activities {
            summary.activity_cost += row.cost;
            summary.activity_sold += row.sold;
        }
        summary
    }

    pub fn get_name(&self) -> &str {
        if self.title.is_empty() {
            "unnamed"
        } else {
            &self.title
        }
    }

    pub fn range_cost(&self) -> f64 {
        self.range_cost
    }

    pub fn range_pnl(&self) -> f64 {
        self.range_pnl
    }

    pub fn range_shares(&self) -> f64 {
        self.range_shares
    }

    /// Range PnL net of what the ranges cost.
    pub fn range_net(&self) -> f64 {
        self.range_pnl - self.range_cost
    }

    /// Sum of `sold - cost` over the activity log.
    pub fn activity_unrealized(&self) -> f64 {
        self.activity_sold - self.activity_cost
    }

    pub fn total_pnl(&self) -> f64 {
        self.range_net() + self.activity_unrealized()
    }
}

fn money_cell(v: f64) -> Cell {
    let c = if v >= 0.0 { TColor::Green } else { TColor::Red };
    Cell::new(format_signed(v))
        .set_alignment(CellAlignment::Right)
        .fg(c)
}

fn number_cell(v: f64) -> Cell {
    if v == 0.0 {
        Cell::new("-").set_alignment(CellAlignment::Right)
    } else {
        Cell::new(format_grouped(v, 2)).set_alignment(CellAlignment::Right)
    }
}

// Print one block: its price ranges, its activity log and the session badges
pub fn print_block(index: usize, block: &TradingBlock) {
    let summary = BlockSummary::from_block(block);

    println!(
        "#{index} {} | price {} | cost {} | session total {}",
        summary.get_name(),
        format_grouped(block.current_price, 2),
        format_grouped(summary.range_cost(), 2),
        format_signed(summary.total_pnl())
    );

    let mut ranges = Table::new();
    ranges
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(80)
        .set_header(vec![
            Cell::new("Range").add_attribute(Attribute::Bold),
            Cell::new("Shares").add_attribute(Attribute::Bold),
            Cell::new("Cost").add_attribute(Attribute::Bold),
            Cell::new("PnL").add_attribute(Attribute::Bold),
        ]);
    for row in &block.price_ranges {
        ranges.add_row(vec![
            Cell::new(&row.range),
            number_cell(row.shares),
            number_cell(row.cost),
            number_cell(row.pnl),
        ]);
    }
    ranges.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        number_cell(summary.range_shares()),
        number_cell(summary.range_cost()),
        money_cell(summary.range_net()),
    ]);

    let mut activities = Table::new();
    activities
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Activity").add_attribute(Attribute::Bold),
            Cell::new("Share").add_attribute(Attribute::Bold),
            Cell::new("Cost").add_attribute(Attribute::Bold),
            Cell::new("Sold").add_attribute(Attribute::Bold),
            Cell::new("Net PnL").add_attribute(Attribute::Bold),
        ]);
    for (i, row) in block.activities.iter().enumerate() {
        activities.add_row(vec![
            Cell::new(i),
            Cell::new(&row.activity),
            number_cell(row.share),
            number_cell(row.cost),
            number_cell(row.sold),
            number_cell(row.net_pnl),
        ]);
    }
    activities.add_row(vec![
        Cell::new(""),
        Cell::new("UNREALIZED").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        money_cell(summary.activity_unrealized()),
    ]);

    println!("{ranges}");
    println!("{activities}");
}
