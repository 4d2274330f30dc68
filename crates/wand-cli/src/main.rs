//! `wand` - console front end for Creative Wand sessions

mod console;
mod weights;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use console::ConsoleTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wand_core::{verify_chain, SessionBlueprint, SessionId, TurnRecord, WandConfig};
use wand_gateway::{HttpCriticGateway, HttpGenerationGateway};

fn cli() -> Command {
    Command::new("wand")
        .version(wand_core::VERSION)
        .about("Creative Wand collaborative story sessions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run one session on this terminal")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Seed for the wand's random choices"),
                )
                .arg(
                    Arg::new("json-logs")
                        .long("json-logs")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines on stderr"),
                ),
        )
        .subcommand(
            Command::new("weights")
                .about("Print topic weight curves for a set of sketches")
                .arg(
                    Arg::new("slots")
                        .long("slots")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Number of slots"),
                )
                .arg(
                    Arg::new("variance")
                        .long("variance")
                        .default_value("1.0")
                        .value_parser(value_parser!(f64))
                        .help("Curve sharpness"),
                )
                .arg(
                    Arg::new("sketch")
                        .long("sketch")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Sketch as Topic:start:end (repeatable)"),
                ),
        )
        .subcommand(Command::new("config").about("Print the default configuration as TOML"))
        .subcommand(
            Command::new("validate-log")
                .about("Verify the hash chain of a JSON-lines turn log")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to <session>.jsonl"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: &ArgMatches) -> Result<()> {
    init_tracing(args.get_flag("json-logs"));

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => WandConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WandConfig::default(),
    };
    let generation = HttpGenerationGateway::from_config(&config.gateways)?;
    let critic = HttpCriticGateway::from_config(&config.gateways)?;
    let timeout = config.session.reply_timeout();

    let mut blueprint = SessionBlueprint::new(config, Arc::new(generation), Arc::new(critic))?;
    if let Some(seed) = args.get_one::<u64>("seed") {
        blueprint = blueprint.with_seed(*seed);
    }

    let transport = Arc::new(ConsoleTransport::new(timeout));
    let mut orchestrator = blueprint.build(SessionId::random(), transport)?;
    let summary = orchestrator.run().await;

    println!(
        "\nSession {} ended ({:?}): {} turn(s) used, {} left, {} record(s).",
        summary.session_id,
        summary.reason,
        summary.turns_used,
        summary.turns_left,
        summary.records
    );
    Ok(())
}

fn print_weights(args: &ArgMatches) -> Result<()> {
    let slots = *args.get_one::<usize>("slots").context("missing --slots")?;
    let variance = *args.get_one::<f64>("variance").context("missing --variance")?;
    let sketches = args
        .get_many::<String>("sketch")
        .into_iter()
        .flatten()
        .map(|s| weights::parse_sketch(s))
        .collect::<Result<Vec<_>>>()?;

    for sketch in &sketches {
        if let Err(err) = sketch.validate(slots) {
            eprintln!("warning: {sketch}: {err}");
        }
    }
    let curves = wand_sketch::generate_weights(&sketches, slots, variance)?;
    print!("{}", weights::render_weights(&curves));
    Ok(())
}

fn validate_log(args: &ArgMatches) -> Result<()> {
    let path = args.get_one::<PathBuf>("path").context("missing path")?;
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let records = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, l)| {
            serde_json::from_str::<TurnRecord>(l).with_context(|| format!("line {}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    verify_chain(&records)?;
    println!("Log integrity: VALID");
    println!("Records checked: {}", records.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("weights", args)) => print_weights(args),
        Some(("config", _)) => {
            print!("{}", WandConfig::default().to_toml()?);
            Ok(())
        }
        Some(("validate-log", args)) => validate_log(args),
        _ => Ok(()),
    }
}
