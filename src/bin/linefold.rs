//! Command-line interface for linefold.
//!
//! Reads lines from a file or standard input, joins them, folds `++` into
//! `^`, and prints the result re-wrapped at a fixed width.
//!
//! Usage:
//!   linefold [FILE] [--width N] [--capacity N] [--marker C --substitute C]
//!            [--stop WORD | --no-stop] [--oversize split|truncate|reject]

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use linefold::config::{DEFAULT_STOP_SENTINEL, PipelineConfig};
use linefold::pipeline::Pipeline;
use linefold::stage::{LineSource, ReaderSource, WriterSink};
use std::io::{self, BufReader, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("warn");
    init_tracing(level);

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Command {
    Command::new("linefold")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Join input lines, fold marker pairs and re-wrap the text at a fixed width")
        .arg(
            Arg::new("path")
                .help("Input file (defaults to standard input)")
                .index(1),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .short('w')
                .help("Output line width in characters")
                .value_parser(value_parser!(usize))
                .default_value("80"),
        )
        .arg(
            Arg::new("capacity")
                .long("capacity")
                .short('c')
                .help("Items each inter-stage channel can hold")
                .value_parser(value_parser!(usize))
                .default_value("50"),
        )
        .arg(
            Arg::new("max-line-len")
                .long("max-line-len")
                .help("Maximum input line length in characters")
                .value_parser(value_parser!(usize))
                .default_value("1000"),
        )
        .arg(
            Arg::new("marker")
                .long("marker")
                .help("Character whose adjacent pairs are folded")
                .value_parser(value_parser!(char))
                .default_value("+"),
        )
        .arg(
            Arg::new("substitute")
                .long("substitute")
                .help("Replacement for one folded marker pair")
                .value_parser(value_parser!(char))
                .default_value("^"),
        )
        .arg(
            Arg::new("stop")
                .long("stop")
                .help("Input line that ends the stream")
                .default_value(DEFAULT_STOP_SENTINEL)
                .conflicts_with("no-stop"),
        )
        .arg(
            Arg::new("no-stop")
                .long("no-stop")
                .help("Read until end of input, ignoring any stop line")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("oversize")
                .long("oversize")
                .help("What to do with input lines longer than --max-line-len")
                .value_parser(["split", "truncate", "reject"])
                .default_value("split"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Log level when LINEFOLD_LOG is unset (error, warn, info, debug, trace)")
                .default_value("warn"),
        )
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env("LINEFOLD_LOG")
        .or_else(|_| EnvFilter::try_new(format!("linefold={}", level)))
        .unwrap_or_else(|_| EnvFilter::new("linefold=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn config_from(matches: &ArgMatches) -> linefold::Result<PipelineConfig> {
    let mut config = PipelineConfig::default();
    if let Some(&width) = matches.get_one::<usize>("width") {
        config = config.with_width(width);
    }
    if let Some(&capacity) = matches.get_one::<usize>("capacity") {
        config = config.with_capacity(capacity);
    }
    if let Some(&max) = matches.get_one::<usize>("max-line-len") {
        config = config.with_max_line_len(max);
    }
    if let (Some(&marker), Some(&substitute)) = (
        matches.get_one::<char>("marker"),
        matches.get_one::<char>("substitute"),
    ) {
        config = config.with_marker(marker, substitute);
    }
    if matches.get_flag("no-stop") {
        config = config.without_stop_sentinel();
    } else if let Some(stop) = matches.get_one::<String>("stop") {
        config = config.with_stop_sentinel(stop.clone());
    }
    if let Some(policy) = matches.get_one::<String>("oversize") {
        config = config.with_oversize(policy.parse()?);
    }
    config.validate()?;
    Ok(config)
}

fn run(matches: &ArgMatches) -> linefold::Result<()> {
    let config = config_from(matches)?;

    let source: Box<dyn LineSource> = match matches.get_one::<String>("path") {
        Some(path) => Box::new(ReaderSource::open(path)?),
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                match &config.stop_sentinel {
                    Some(stop) => {
                        eprintln!("Enter text (type '{}' on a new line to end input):", stop)
                    }
                    None => eprintln!("Enter text (end input with Ctrl-D):"),
                }
            }
            Box::new(ReaderSource::new(BufReader::new(stdin)).with_name("stdin"))
        }
    };
    let sink = WriterSink::new(io::stdout()).with_name("stdout");

    let report = Pipeline::new(config)?.run(source, sink)?;
    tracing::info!(
        lines_written = report.lines_written(),
        stop = ?report.stop_reason(),
        "done"
    );
    Ok(())
}
