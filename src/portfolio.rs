use crate::block::BlockSummary;
use crate::format::{format_grouped, format_signed};
use crate::schema::GlobalState;
use colored::Colorize;
use piechart::{Chart, Color};

/// Dashboard roll-up over every trading block, rebuilt on each read.
pub struct PortfolioSummary {
    pub blocks: Vec<BlockSummary>,
}

impl PortfolioSummary {
    pub fn new(state: &GlobalState) -> PortfolioSummary {
        PortfolioSummary {
            blocks: state
                .trading_blocks
                .iter()
                .map(BlockSummary::from_block)
                .collect(),
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.blocks.iter().map(BlockSummary::range_cost).sum()
    }

    pub fn total_pnl(&self) -> f64 {
        self.blocks.iter().map(BlockSummary::total_pnl).sum()
    }

    pub fn total_activity_unrealized(&self) -> f64 {
        self.blocks
            .iter()
            .map(BlockSummary::activity_unrealized)
            .sum()
    }

    pub fn net_liquidity(&self) -> f64 {
        self.total_cost() + self.total_pnl()
    }

    /// Cost share of each block with a positive cost, as (name, cost, percent).
    pub fn get_allocation(&self) -> Vec<(String, f64, f64)> {
        let total_cost: f64 = self
            .blocks
            .iter()
            .map(BlockSummary::range_cost)
            .filter(|cost| *cost > 0.0)
            .sum();

        self.blocks
            .iter()
            .filter(|b| b.range_cost() > 0.0)
            .map(|b| {
                let cost = b.range_cost();
                (b.get_name().to_string(), cost, cost / total_cost * 100.0)
            })
            .collect()
    }

    // Print the headline figures and the session breakdown table
    pub fn print(&self) {
        use comfy_table::{
            presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor,
            ContentArrangement, Table,
        };

        let total_pnl = self.total_pnl();
        let headline = format!("Total PnL {}", format_signed(total_pnl));
        if total_pnl >= 0.0 {
            println!("{}", headline.green().bold());
        } else {
            println!("{}", headline.red().bold());
        }

        let mut summary = Table::new();
        summary
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(80)
            .set_header(vec![
                Cell::new("Total Invested").add_attribute(Attribute::Bold),
                Cell::new("Unrealized PnL").add_attribute(Attribute::Bold),
                Cell::new("Net Liquidity").add_attribute(Attribute::Bold),
            ]);

        let colorize_money = |v: f64| {
            let c = if v >= 0.0 { TColor::Green } else { TColor::Red };
            Cell::new(format_signed(v))
                .set_alignment(CellAlignment::Right)
                .fg(c)
        };

        summary.add_row(vec![
            Cell::new(format_grouped(self.total_cost(), 2)).set_alignment(CellAlignment::Right),
            colorize_money(self.total_activity_unrealized()),
            Cell::new(format_grouped(self.net_liquidity(), 2)).set_alignment(CellAlignment::Right),
        ]);

        let mut sessions = Table::new();
        sessions
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(80)
            .set_header(vec![
                Cell::new("Session").add_attribute(Attribute::Bold),
                Cell::new("Cost").add_attribute(Attribute::Bold),
                Cell::new("Unrealized").add_attribute(Attribute::Bold),
                Cell::new("Total PnL").add_attribute(Attribute::Bold),
            ]);

        for block in &self.blocks {
            sessions.add_row(vec![
                Cell::new(block.get_name()),
                Cell::new(format_grouped(block.range_cost(), 2))
                    .set_alignment(CellAlignment::Right),
                colorize_money(block.activity_unrealized()),
                colorize_money(block.total_pnl()),
            ]);
        }

        sessions.add_row(vec![
            Cell::new("TOTAL").add_attribute(Attribute::Bold),
            Cell::new(format_grouped(self.total_cost(), 2))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
            colorize_money(self.total_activity_unrealized()).add_attribute(Attribute::Bold),
            colorize_money(total_pnl).add_attribute(Attribute::Bold),
        ]);

        println!("{summary}");
        println!("{sessions}");
    }

    // Print the allocation in descending order %-wise
    pub fn print_allocation(&self) {
        let mut allocation = self.get_allocation();
        allocation.sort_by(|a, b| b.2.total_cmp(&a.2));

        println!("====================================");
        for (name, _, percentage) in allocation {
            println!("{name: >12} | {percentage: >10.2}");
        }
    }

    pub fn draw_pie_chart(&self) {
        let colors = [
            Color::Blue,
            Color::Purple,
            Color::Cyan,
            Color::Red,
            Color::Yellow,
            Color::Green,
        ];

        let data: Vec<piechart::Data> = self
            .get_allocation()
            .into_iter()
            .enumerate()
            .map(|(i, (name, cost, _))| piechart::Data {
                label: name,
                value: cost as f32,
                color: Some(colors[i % colors.len()].into()),
                fill: '•',
            })
            .collect();

        if data.is_empty() {
            println!("No cost recorded yet.");
            return;
        }

        Chart::new()
            .legend(true)
            .radius(9)
            .aspect_ratio(3)
            .draw(&data);
    }
}
