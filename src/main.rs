use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::str::FromStr;

use tracing::error;
use tracing_subscriber::EnvFilter;

use sharpsim::analysis::{self, BatchStats, DistStats, RunSummary};
use sharpsim::config::GameConfig;
use sharpsim::portfolio::Allocation;
use sharpsim::scoring::ScoreCard;
use sharpsim::seed::MarketSeed;
use sharpsim::session::{Session, TurnReport};
use sharpsim::{GameError, Result};

#[derive(Debug)]
struct Args {
    seed: Option<u64>,
    turns: Option<u32>,
    days: Option<u32>,
    config_path: Option<String>,
    market_path: Option<String>,
    alloc: Option<String>,
    output_path: String,
    runs: Option<u64>,
    csv_path: Option<String>,
    quiet: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args {
        seed: None,
        turns: None,
        days: None,
        config_path: None,
        market_path: None,
        alloc: None,
        output_path: "turns.ndjson".to_string(),
        runs: None,
        csv_path: None,
        quiet: false,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| GameError::invalid_config(format!("{flag} requires a value")))
        };
        match flag {
            "--seed" => parsed.seed = Some(number(flag, &value()?)?),
            "--turns" => parsed.turns = Some(number(flag, &value()?)?),
            "--days" => parsed.days = Some(number(flag, &value()?)?),
            "--config" => parsed.config_path = Some(value()?),
            "--market" => parsed.market_path = Some(value()?),
            "--alloc" => parsed.alloc = Some(value()?),
            "--output" => parsed.output_path = value()?,
            "--runs" => parsed.runs = Some(number(flag, &value()?)?),
            "--csv" => parsed.csv_path = Some(value()?),
            "--quiet" => parsed.quiet = true,
            other => return Err(GameError::invalid_config(format!("unknown flag {other}"))),
        }
        i += 1;
    }
    Ok(parsed)
}

fn number<T: FromStr>(flag: &str, text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| GameError::invalid_config(format!("{flag}: cannot parse {text:?}")))
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(exit_status(&e));
        }
    };

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sharpsim failed");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 for bad input (flags, config, seed, allocation), 1 for I/O and parse
/// failures reading files.
fn exit_status(e: &GameError) -> u8 {
    if e.is_contract_violation() { 2 } else { 1 }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config_path {
        Some(path) => GameConfig::from_path(path)?,
        None => GameConfig::canonical(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(turns) = args.turns {
        config.max_turns = turns;
        config.event_turns.retain(|t| t.0 <= turns);
    }
    if let Some(days) = args.days {
        config.days_per_turn = days;
    }
    config.validate()?;

    let market = match &args.market_path {
        Some(path) => MarketSeed::from_path(path)?,
        None => MarketSeed::canonical(),
    };
    let allocation = match &args.alloc {
        Some(text) => Allocation::parse(text)?,
        None => Allocation::equal_split(&market.symbols()),
    };

    match args.runs {
        Some(n) => run_many(args, &config, &market, &allocation, n),
        None => run_once(args, config, &market, &allocation),
    }
}

fn run_once(args: &Args, config: GameConfig, market: &MarketSeed, allocation: &Allocation) -> Result<()> {
    let mut session = Session::new(config, market)?;
    let baseline = session.current_value();

    let mut writer = BufWriter::new(File::create(&args.output_path)?);
    let mut reports = Vec::new();
    while !session.is_complete() {
        let report = session.play_turn(allocation)?;
        serde_json::to_writer(&mut writer, &report)?;
        writeln!(writer)?;
        reports.push(report);
    }
    writer.flush()?;

    let card = session.scorecard()?;
    if !args.quiet {
        println!("Turns played: {} → {}", reports.len(), args.output_path);
        print_turns(baseline, &reports);
        print_scorecard(&card);
    }
    Ok(())
}

fn run_many(
    args: &Args,
    config: &GameConfig,
    market: &MarketSeed,
    allocation: &Allocation,
    n: u64,
) -> Result<()> {
    let runs = analysis::run_batch(config, market, allocation, n)?;

    if let Some(path) = &args.csv_path {
        write_runs_csv(&runs, path)?;
    }

    if !args.quiet {
        print_runs(&runs);
        match analysis::summarize(&runs) {
            Some(stats) if n >= 2 => print_distribution(&stats),
            _ => eprintln!("Warning: Distribution requires >= 2 runs"),
        }
    }
    Ok(())
}

fn print_turns(baseline: f64, reports: &[TurnReport]) {
    println!("\n=== Turns ===");
    println!("{:>4} | {:>14} | {:>8} | {:>12} | {}", "Turn", "Value", "Turn%", "Cash", "Event");
    println!("{}", "-".repeat(72));

    let mut prev = baseline;
    for r in reports {
        println!(
            "{:>4} | {:>14.2} | {:>7.2}% | {:>12.2} | {}",
            r.turn,
            r.value,
            (r.value / prev - 1.0) * 100.0,
            r.cash,
            r.event.as_ref().map(|e| e.name.as_str()).unwrap_or("-"),
        );
        prev = r.value;
    }
}

fn print_scorecard(card: &ScoreCard) {
    if !card.events.is_empty() {
        println!("\n=== Event log ===");
        for e in &card.events {
            println!("  turn {:>2}  {:<20} {}", e.turn, e.name, e.headline);
        }
    }

    println!("\n=== Score ===");
    println!("  Baseline value: {:>14.2}", card.baseline_value);
    println!("  Final value:    {:>14.2}", card.final_value);
    println!("  Total return:   {:>13.2}%", card.total_return * 100.0);
    println!("  Sharpe score:   {:>14.3}", card.score);
}

fn write_runs_csv(runs: &[RunSummary], path: &str) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "seed,score,total_return,final_value,events")?;
    for r in runs {
        writeln!(
            w,
            "{},{:.6},{:.6},{:.2},{}",
            r.seed,
            r.score,
            r.total_return,
            r.final_value,
            r.events.join(";"),
        )?;
    }
    w.flush()?;
    Ok(())
}

fn print_runs(runs: &[RunSummary]) {
    println!("\n=== Per-Run Results ===");
    println!("{:>6} | {:>7} | {:>8} | {:>14} | {}", "Seed", "Score", "Return%", "Final", "Events");
    println!("{}", "-".repeat(80));
    for r in runs {
        println!(
            "{:>6} | {:>7.3} | {:>7.2}% | {:>14.2} | {}",
            r.seed,
            r.score,
            r.total_return * 100.0,
            r.final_value,
            r.events.join(", "),
        );
    }
}

fn print_dist_row(label: &str, ds: &DistStats, scale: f64) {
    println!(
        "{:>8} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2}",
        label,
        ds.min * scale,
        ds.p5 * scale,
        ds.p25 * scale,
        ds.p50 * scale,
        ds.p75 * scale,
        ds.p95 * scale,
        ds.max * scale,
        ds.mean * scale,
        ds.std_dev * scale,
    );
}

fn print_distribution(stats: &BatchStats) {
    println!("\n=== Multi-Run Distribution (N={} runs) ===", stats.runs);
    println!(
        "{:>8} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7}",
        "", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    print_dist_row("Score", &stats.score, 1.0);
    print_dist_row("Return%", &stats.total_return, 100.0);

    if !stats.event_counts.is_empty() {
        println!("\n--- Event frequency ---");
        for (id, count) in &stats.event_counts {
            println!(
                "  {:<20} {:>6} ({:>5.1}%)",
                id,
                count,
                *count as f64 / stats.runs as f64 * 100.0
            );
        }
    }
}
