use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use rosebus::topic_log;
use rosebus::{robot, Scheduler, SchedulerConfig, SchedulerError, TickRecord};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt::init();

    let matches = App::new("rosebus")
        .version("0.1.0")
        .author("Robot Systems Engineering Team")
        .about("Tick-driven robot scheduler with live logging and replay")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON scheduler configuration")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("ticks")
                .short("n")
                .long("ticks")
                .value_name("COUNT")
                .help("Stop after this many ticks (0 runs until interrupted)")
                .takes_value(true)
                .default_value("0")
                .global(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Tick count must be a non-negative integer".into()),
                }),
        )
        .arg(
            Arg::with_name("period-ms")
                .long("period-ms")
                .value_name("MILLIS")
                .help("Tick period, overriding the configuration")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(p) if p > 0 => Ok(()),
                    _ => Err("Tick period must be a positive integer".into()),
                }),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Drive the demo robot live and record a topic log")
                .arg(
                    Arg::with_name("log-dir")
                        .long("log-dir")
                        .value_name("DIR")
                        .help("Directory for the recorded log")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("mirror")
                        .long("mirror")
                        .value_name("ADDR")
                        .help("Mirror every tick record to this UDP address")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("lenient")
                        .long("lenient")
                        .help("Keep running when hardware fails to initialize"),
                ),
        )
        .subcommand(
            SubCommand::with_name("replay")
                .about("Re-run the demo robot against a recorded log")
                .arg(
                    Arg::with_name("log")
                        .long("log")
                        .value_name("FILE")
                        .help("Recorded topic log")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("graph").about("Print the demo topic network as Graphviz DOT"),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Summarize a recorded topic log")
                .arg(
                    Arg::with_name("log")
                        .long("log")
                        .value_name("FILE")
                        .help("Recorded topic log")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => SchedulerConfig::from_json_file(path)?,
        None => SchedulerConfig::default(),
    };

    match matches.subcommand() {
        ("run", Some(sub_matches)) => handle_run(&matches, sub_matches, config).await,
        ("replay", Some(sub_matches)) => handle_replay(&matches, sub_matches, config).await,
        ("graph", _) => {
            handle_graph(config);
            Ok(())
        }
        ("inspect", Some(sub_matches)) => handle_inspect(sub_matches),
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            Ok(())
        }
    }
}

fn tick_limit(matches: &ArgMatches<'_>) -> Option<u64> {
    match matches.value_of("ticks").and_then(|v| v.parse::<u64>().ok()) {
        Some(0) | None => None,
        Some(limit) => Some(limit),
    }
}

fn apply_period(matches: &ArgMatches<'_>, config: &mut SchedulerConfig) {
    if let Some(period) = matches.value_of("period-ms").and_then(|v| v.parse::<u64>().ok()) {
        config.tick_period_ms = period;
    }
}

async fn handle_run(
    matches: &ArgMatches<'_>,
    sub_matches: &ArgMatches<'_>,
    mut config: SchedulerConfig,
) -> CliResult {
    config.mode = rosebus::ExecutionMode::Live;
    apply_period(matches, &mut config);
    if let Some(dir) = sub_matches.value_of("log-dir") {
        config.log_dir = PathBuf::from(dir);
    }
    if let Some(address) = sub_matches.value_of("mirror") {
        config.mirror_address = Some(address.parse()?);
    }
    if sub_matches.is_present("lenient") {
        config.strict_hardware_init = false;
    }

    println!("{}", "Rosebus - live run".bright_blue().bold());
    let mut scheduler = Scheduler::new(config);
    robot::install_demo(&mut scheduler);
    drive(&mut scheduler, tick_limit(matches)).await
}

async fn handle_replay(
    matches: &ArgMatches<'_>,
    sub_matches: &ArgMatches<'_>,
    mut config: SchedulerConfig,
) -> CliResult {
    config.mode = rosebus::ExecutionMode::Simulation;
    config.replay_log = sub_matches.value_of("log").map(PathBuf::from);
    apply_period(matches, &mut config);

    println!("{}", "Rosebus - replay".bright_blue().bold());
    let mut scheduler = Scheduler::new(config);
    robot::install_demo(&mut scheduler);
    drive(&mut scheduler, tick_limit(matches)).await
}

/// Tick `scheduler` on its configured period until the tick limit, the end
/// of a replay log, a fault or Ctrl+C.
async fn drive(scheduler: &mut Scheduler, limit: Option<u64>) -> CliResult {
    if let Err(e) = scheduler.initialize() {
        error!("Initialization failed: {}", e);
        println!("{} {}", "Initialization failed:".bright_red(), e);
        return Err(e.into());
    }
    if let Some(path) = scheduler.log_path() {
        println!("{} {}", "Recording to".dimmed(), path.display());
    }

    let period = Duration::from_millis(scheduler.config().tick_period_ms.max(1));
    let mut interval = time::interval(period);
    let mut last_record: Option<TickRecord> = None;
    let outcome = loop {
        if limit.is_some_and(|limit| scheduler.stats().ticks >= limit) {
            break Ok(());
        }

        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break Ok(());
            }
        }

        match scheduler.periodic() {
            Ok(record) => last_record = Some(record),
            Err(SchedulerError::ReplayExhausted { ticks }) => {
                info!("Replay finished after {} ticks", ticks);
                break Ok(());
            }
            Err(e) => {
                error!("Tick failed: {}", e);
                break Err(e);
            }
        }
    };

    if let Err(e) = scheduler.shutdown() {
        warn!("Shutdown failed: {}", e);
    }
    print_summary(scheduler, last_record.as_ref());
    outcome.map_err(Into::into)
}

fn print_summary(scheduler: &Scheduler, last_record: Option<&TickRecord>) {
    let stats = scheduler.stats();
    println!("{}", "Run summary".bright_blue().bold());
    println!("{} {}", "Ticks:".bright_white(), stats.ticks);
    println!("{} {}", "Commands completed:".bright_white(), stats.commands_completed);
    println!("{} {}", "Topics published:".bright_white(), stats.topics_published);
    println!("{} {}", "Topics replayed:".bright_white(), stats.topics_replayed);
    println!("{} {}", "Log records:".bright_white(), stats.log_records_written);

    let pose = last_record.and_then(|record| record.topics.get(robot::ODOMETRY_TOPIC));
    if let Some(pose) = pose {
        let field = |name: &str| pose.message.get(name).and_then(|v| v.as_f64()).unwrap_or(0.0);
        println!(
            "{} x={:.3} m y={:.3} m heading={:.3} rad",
            "Final pose:".bright_white(),
            field("x_m"),
            field("y_m"),
            field("heading_rad")
        );
    }
    match scheduler.root_command() {
        Some(command) => println!("{} {}", "Pending command:".yellow(), command.name()),
        None => println!("{}", "Command chain complete".bright_green()),
    }
}

fn handle_graph(config: SchedulerConfig) {
    let mut scheduler = Scheduler::new(config);
    robot::install_demo(&mut scheduler);
    print!("{}", scheduler.network_graph_dot());
}

fn handle_inspect(sub_matches: &ArgMatches<'_>) -> CliResult {
    let path = sub_matches.value_of("log").unwrap_or_default();
    let (times, contents) = topic_log::load(path)?;
    let index = topic_log::index(&times, &contents)?;

    println!("{} {}", "Log:".bright_white(), path);
    println!("{} {}", "Ticks:".bright_white(), times.len());
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        println!("{} {:.3} s", "Duration:".bright_white(), last - first);
    }
    if let Some(entries) = times.first().and_then(|&time| index.lookup(time)) {
        println!("{}", "Topics:".bright_white());
        for (name, entry) in entries {
            let message = serde_json::Value::Object(entry.message.clone());
            println!("  {} {}", name.bright_cyan(), message);
        }
    }
    Ok(())
}
