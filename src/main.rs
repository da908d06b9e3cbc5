use clap::{arg, value_parser, ArgMatches, Command};
use eyre::{eyre, WrapErr};
use serde::Deserialize;
use serde::Serialize;

use tweet_tracker::block::print_block;
use tweet_tracker::forecast::{print_comparison, print_forecast};
use tweet_tracker::tracker::{parse_number, ActivityField, InputField, RangeField};
use tweet_tracker::{Edit, InputSet, SledStore, StateStore, Tracker};

#[derive(Serialize, Deserialize)]
struct Config {
    database_path: String,
    export_file: String,
    default_set: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "tracker_database".to_string(),
            export_file: "elon_tracker_data.json".to_string(),
            default_set: "A".to_string(),
        }
    }
}

fn index_arg(name: &'static str, help: &'static str) -> clap::Arg {
    clap::Arg::new(name)
        .help(help)
        .required(true)
        .value_parser(value_parser!(usize))
}

fn cli() -> Command {
    Command::new("tweet_tracker")
        .about("Forecast tweet counts and track trading blocks")
        .arg_required_else_help(true)
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("forecast")
                .about("Show the forecast table for one input set")
                .arg(arg!(-s --set <SET> "Input set to use (a or b)").required(false))
                .arg(arg!(-c --compare "Show input sets A and B side by side").conflicts_with("set")),
        )
        .subcommand(Command::new("dashboard").about("Show cost and PnL across all trading blocks"))
        .subcommand(
            Command::new("block")
                .about("Show the price ranges and activities of a trading block")
                .arg(index_arg("BLOCK", "Block index, starting at 0")),
        )
        .subcommand(
            Command::new("set-input")
                .about("Set a forecast parameter")
                .arg(arg!(<SET> "Input set (a or b)"))
                .arg(arg!(<FIELD> "total_tweet, average, elapsed, remaining_days, remaining_hours or sensitivity"))
                .arg(arg!(<VALUE> "New value").allow_negative_numbers(true)),
        )
        .subcommand(
            Command::new("set-row")
                .about("Edit a calculation row")
                .arg(index_arg("ROW", "Row index, starting at 0"))
                .arg(arg!(<FIELD> "avg, group or mark"))
                .arg(arg!(<VALUE> "New value").allow_negative_numbers(true)),
        )
        .subcommand(
            Command::new("set-range")
                .about("Edit a price range of a trading block")
                .arg(index_arg("BLOCK", "Block index, starting at 0"))
                .arg(arg!(<LABEL> "Range label, e.g. \"420 - 439\""))
                .arg(arg!(<FIELD> "shares, cost or pnl"))
                .arg(arg!(<VALUE> "New value").allow_negative_numbers(true)),
        )
        .subcommand(
            Command::new("set-activity")
                .about("Edit an activity row of a trading block")
                .arg(index_arg("BLOCK", "Block index, starting at 0"))
                .arg(index_arg("ROW", "Activity index, starting at 0"))
                .arg(arg!(<FIELD> "activity, share, cost, sold or net_pnl"))
                .arg(arg!(<VALUE> "New value").allow_negative_numbers(true)),
        )
        .subcommand(
            Command::new("rename-block")
                .about("Rename a trading block")
                .arg(index_arg("BLOCK", "Block index, starting at 0"))
                .arg(arg!(<TITLE> "New title")),
        )
        .subcommand(
            Command::new("set-price")
                .about("Set the current price of a trading block")
                .arg(index_arg("BLOCK", "Block index, starting at 0"))
                .arg(arg!(<PRICE> "Current price")),
        )
        .subcommand(
            Command::new("export")
                .about("Write the whole state to a pretty-printed JSON file")
                .arg(arg!([FILE] "Output file")),
        )
}

fn string<'a>(matches: &'a ArgMatches, name: &str) -> eyre::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| eyre!("missing argument {name}"))
}

fn index(matches: &ArgMatches, name: &str) -> eyre::Result<usize> {
    matches
        .get_one::<usize>(name)
        .copied()
        .ok_or_else(|| eyre!("missing argument {name}"))
}

fn row_edit(row: usize, field: &str, value: &str) -> eyre::Result<Edit> {
    match field.trim().to_lowercase().as_str() {
        "avg" | "average" | "avg_daily_tweet" | "avgdailytweet" => Ok(Edit::RowAverage {
            row,
            value: parse_number(value)?,
        }),
        "group" => Ok(Edit::RowGroup {
            row,
            value: value.to_string(),
        }),
        "mark" => Ok(Edit::RowMark {
            row,
            value: value.to_string(),
        }),
        _ => Err(eyre!("Unknown field '{field}' for calculation row")),
    }
}

fn activity_edit(block: usize, row: usize, field: &str, value: &str) -> eyre::Result<Edit> {
    if field.trim().eq_ignore_ascii_case("activity") {
        return Ok(Edit::ActivityNote {
            block,
            row,
            text: value.to_string(),
        });
    }
    Ok(Edit::Activity {
        block,
        row,
        field: field.parse::<ActivityField>()?,
        value: parse_number(value)?,
    })
}

fn run<S: StateStore>(tracker: &mut Tracker<S>, matches: &ArgMatches, cfg: &Config) -> eyre::Result<()> {
    match matches.subcommand() {
        Some(("forecast", m)) if m.get_flag("compare") => {
            let state = tracker.state();
            print_comparison(&state.inputs_a, &state.inputs_b, &state.calculation_rows);
        }
        Some(("forecast", m)) => {
            let set: InputSet = match m.get_one::<String>("set") {
                Some(s) => s.parse()?,
                None => cfg.default_set.parse()?,
            };
            let state = tracker.state();
            print_forecast(set, state.inputs(set), &state.calculation_rows);
        }
        Some(("dashboard", _)) => {
            let summary = tracker.summary();
            summary.print();
            summary.draw_pie_chart();
            summary.print_allocation();
        }
        Some(("block", m)) => {
            let b = index(m, "BLOCK")?;
            let block = tracker
                .state()
                .trading_blocks
                .get(b)
                .ok_or_else(|| eyre!("Trading block {b} does not exist"))?;
            print_block(b, block);
        }
        Some(("set-input", m)) => {
            let set: InputSet = string(m, "SET")?.parse()?;
            tracker.edit(Edit::Input {
                set,
                field: string(m, "FIELD")?.parse::<InputField>()?,
                value: parse_number(string(m, "VALUE")?)?,
            })?;
            let state = tracker.state();
            print_forecast(set, state.inputs(set), &state.calculation_rows);
        }
        Some(("set-row", m)) => {
            let edit = row_edit(index(m, "ROW")?, string(m, "FIELD")?, string(m, "VALUE")?)?;
            tracker.edit(edit)?;
            let set: InputSet = cfg.default_set.parse()?;
            let state = tracker.state();
            print_forecast(set, state.inputs(set), &state.calculation_rows);
        }
        Some(("set-range", m)) => {
            let b = index(m, "BLOCK")?;
            tracker.edit(Edit::PriceRange {
                block: b,
                label: string(m, "LABEL")?.to_string(),
                field: string(m, "FIELD")?.parse::<RangeField>()?,
                value: parse_number(string(m, "VALUE")?)?,
            })?;
            print_block(b, &tracker.state().trading_blocks[b]);
        }
        Some(("set-activity", m)) => {
            let b = index(m, "BLOCK")?;
            let edit = activity_edit(b, index(m, "ROW")?, string(m, "FIELD")?, string(m, "VALUE")?)?;
            tracker.edit(edit)?;
            print_block(b, &tracker.state().trading_blocks[b]);
        }
        Some(("rename-block", m)) => {
            let b = index(m, "BLOCK")?;
            tracker.edit(Edit::BlockTitle {
                block: b,
                title: string(m, "TITLE")?.to_string(),
            })?;
            println!("Block {b} is now '{}'", tracker.state().trading_blocks[b].title);
        }
        Some(("set-price", m)) => {
            let b = index(m, "BLOCK")?;
            tracker.edit(Edit::CurrentPrice {
                block: b,
                value: parse_number(string(m, "PRICE")?)?,
            })?;
            print_block(b, &tracker.state().trading_blocks[b]);
        }
        Some(("export", m)) => {
            let file = m
                .get_one::<String>("FILE")
                .cloned()
                .unwrap_or_else(|| cfg.export_file.clone());
            tracker
                .export_to(&file)
                .wrap_err_with(|| format!("Error writing {file}"))?;
            println!("Exported state to {file}");
        }
        _ => (),
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cfg: Config = confy::load("tweet_tracker", "config")?;
    let matches = cli().get_matches();

    if let Some(_matches) = matches.subcommand_matches("config") {
        println!(
            "Your config file is located here: \n{}",
            confy::get_configuration_file_path("tweet_tracker", "config")?.display()
        );
        return Ok(());
    }

    let store = SledStore::open(&cfg.database_path)
        .wrap_err_with(|| format!("Error opening database {}", cfg.database_path))?;
    let mut tracker = Tracker::open(store);
    run(&mut tracker, &matches, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweet_tracker::MemoryStore;

    fn run_args(tracker: &mut Tracker<MemoryStore>, args: &[&str]) -> eyre::Result<()> {
        let mut argv = vec!["tweet_tracker"];
        argv.extend_from_slice(args);
        let matches = cli().try_get_matches_from(argv)?;
        run(tracker, &matches, &Config::default())
    }

    #[test]
    fn test_cli() {
        let matches = cli().get_matches_from(vec!["tweet_tracker", "forecast", "--set", "b"]);
        assert_eq!(matches.subcommand_name(), Some("forecast"));
        cli().debug_assert();
    }

    #[test]
    fn test_forecast_compare() {
        let matches = cli().get_matches_from(vec!["tweet_tracker", "forecast", "--compare"]);
        let m = matches.subcommand_matches("forecast").unwrap();
        assert!(m.get_flag("compare"));
        assert!(cli()
            .try_get_matches_from(vec!["tweet_tracker", "forecast", "-c", "-s", "b"])
            .is_err());

        let mut tracker = Tracker::open(MemoryStore::default());
        run_args(&mut tracker, &["set-input", "b", "average", "60"]).unwrap();
        run_args(&mut tracker, &["forecast", "--compare"]).unwrap();
        run_args(&mut tracker, &["forecast", "-s", "b"]).unwrap();
        assert_eq!(tracker.state().inputs_a.average, 0.0);
        assert_eq!(tracker.state().inputs_b.average, 60.0);
    }

    #[test]
    fn test_set_commands_edit_state() {
        let mut tracker = Tracker::open(MemoryStore::default());
        run_args(&mut tracker, &["set-input", "b", "sensitivity", "-3"]).unwrap();
        run_args(&mut tracker, &["set-row", "2", "avg", "41.5"]).unwrap();
        run_args(&mut tracker, &["set-row", "2", "mark", "watch"]).unwrap();
        run_args(&mut tracker, &["set-range", "0", "420 - 439", "pnl", "80"]).unwrap();
        run_args(&mut tracker, &["set-activity", "1", "4", "activity", "scalp"]).unwrap();
        run_args(&mut tracker, &["set-activity", "1", "4", "sold", "12"]).unwrap();
        run_args(&mut tracker, &["rename-block", "2", "Friday"]).unwrap();

        let state = tracker.state();
        assert_eq!(state.inputs_b.sensitivity, -3.0);
        assert_eq!(state.calculation_rows[2].avg_daily_tweet, 41.5);
        assert_eq!(state.calculation_rows[2].mark, "watch");
        assert_eq!(state.trading_blocks[1].activities[4].activity, "scalp");
        assert_eq!(state.trading_blocks[1].activities[4].sold, 12.0);
        assert_eq!(state.trading_blocks[2].title, "Friday");
        assert_eq!(tracker.summary().total_pnl(), 92.0);
    }

    #[test]
    fn test_bad_input_is_reported() {
        let mut tracker = Tracker::open(MemoryStore::default());
        assert!(run_args(&mut tracker, &["set-input", "c", "average", "1"]).is_err());
        assert!(run_args(&mut tracker, &["set-row", "2", "avg", "lots"]).is_err());
        assert!(run_args(&mut tracker, &["set-row", "2", "colour", "red"]).is_err());
        assert!(run_args(&mut tracker, &["block", "7"]).is_err());
        assert_eq!(*tracker.state(), tweet_tracker::GlobalState::default());
    }
}
