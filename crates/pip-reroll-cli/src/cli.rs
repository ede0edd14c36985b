//! Command handling for the headless host
//!
//! Usage:
//!   pip-reroll watch [--region l,t,r,b] [--min-rank R] [--min-count N] [--min-ss N]
//!                    [--poll-ms N] [--slots] [--log-events] [--max-secs N]
//!   pip-reroll capture --region l,t,r,b --out <file.png>
//!   pip-reroll listen [--port N] [--count N]
//!   pip-reroll config show|init [--force]
//!
//! Global options:
//!   --config <path>    Use this config file instead of the default one
//!   --log-file <path>  Write logs to a file instead of stderr
//!   --json             Output in JSON format

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pip_reroll_core::notify::DEFAULT_SLOTS_PORT;
use pip_reroll_core::{
    platform_capturer, CaptureGeometry, ChannelHost, Config, DetectedObject, PaletteClassifier,
    Processor, Rank, RankCounts, SlotListener, UiUpdate,
};
use tracing::warn;

/// How often the watch loop wakes up to check the time limit
const WATCH_TICK: Duration = Duration::from_millis(250);

/// CLI command to execute
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Watch(WatchArgs),
    Capture {
        region: CaptureGeometry,
        out: PathBuf,
    },
    Listen {
        port: u16,
        count: Option<usize>,
    },
    ConfigShow,
    ConfigInit {
        force: bool,
    },
}

/// Overrides applied on top of the config file for `watch`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchArgs {
    pub region: Option<CaptureGeometry>,
    pub min_rank: Option<Rank>,
    pub min_count: Option<usize>,
    pub min_ss: Option<usize>,
    pub poll_ms: Option<u64>,
    pub slots: bool,
    pub log_events: bool,
    pub max_secs: Option<u64>,
}

impl WatchArgs {
    /// Apply the overrides to a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(region) = self.region {
            config.region = Some(region);
        }
        if let Some(rank) = self.min_rank {
            config.criteria.minimum_rank = rank;
        }
        if let Some(count) = self.min_count {
            config.criteria.minimum_count = count;
        }
        if let Some(ss) = self.min_ss {
            config.criteria.minimum_ss_count = ss;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.timing.poll_delay_ms = poll_ms;
        }
        if self.slots {
            config.enable_slots_socket = true;
        }
        if self.log_events {
            config.enable_logging = true;
        }
    }
}

/// CLI options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// Parse CLI arguments and return command + options
pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut command_name: Option<String> = None;
    let mut config_action: Option<String> = None;

    let mut watch = WatchArgs::default();
    let mut region: Option<CaptureGeometry> = None;
    let mut out: Option<PathBuf> = None;
    let mut port = DEFAULT_SLOTS_PORT;
    let mut count: Option<usize> = None;
    let mut force = false;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--json" => options.json = true,
            "--force" => force = true,
            "--slots" => watch.slots = true,
            "--log-events" => watch.log_events = true,
            "--config" => options.config_path = Some(PathBuf::from(value(args, &mut i)?)),
            "--log-file" => options.log_file = Some(PathBuf::from(value(args, &mut i)?)),
            "--region" => region = Some(parse_region(value(args, &mut i)?)?),
            "--out" => out = Some(PathBuf::from(value(args, &mut i)?)),
            "--min-rank" => {
                let raw = value(args, &mut i)?;
                watch.min_rank = Some(raw.parse().map_err(|_| {
                    format!("Invalid rank '{}'. Use one of: F, D, C, B, A, S, SS", raw)
                })?);
            }
            "--min-count" => watch.min_count = Some(parse_number(arg, value(args, &mut i)?)?),
            "--min-ss" => watch.min_ss = Some(parse_number(arg, value(args, &mut i)?)?),
            "--poll-ms" => watch.poll_ms = Some(parse_number(arg, value(args, &mut i)?)?),
            "--max-secs" => watch.max_secs = Some(parse_number(arg, value(args, &mut i)?)?),
            "--port" => port = parse_number(arg, value(args, &mut i)?)?,
            "--count" => count = Some(parse_number(arg, value(args, &mut i)?)?),
            _ if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            _ if command_name.is_none() => command_name = Some(arg.to_string()),
            _ if command_name.as_deref() == Some("config") && config_action.is_none() => {
                config_action = Some(arg.to_string())
            }
            _ => return Err(format!("Unexpected argument: {}", arg)),
        }
        i += 1;
    }

    let command = match command_name.as_deref() {
        Some("watch") => {
            watch.region = region;
            CliCommand::Watch(watch)
        }
        Some("capture") => CliCommand::Capture {
            region: region.ok_or("capture requires --region l,t,r,b")?,
            out: out.ok_or("capture requires --out <file>")?,
        },
        Some("listen") => CliCommand::Listen { port, count },
        Some("config") => match config_action.as_deref() {
            Some("show") | None => CliCommand::ConfigShow,
            Some("init") => CliCommand::ConfigInit { force },
            Some(other) => return Err(format!("Unknown config action: {}. Use: show, init", other)),
        },
        Some(other) => return Err(format!("Unknown command: {}", other)),
        None => {
            return Err(
                "No command specified. Use: watch, capture, listen, or config".to_string(),
            )
        }
    };

    Ok((command, options))
}

/// Take the value following the flag at `args[*i]`.
fn value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, raw))
}

fn parse_region(raw: &str) -> Result<CaptureGeometry, String> {
    let region: CaptureGeometry = raw
        .parse()
        .map_err(|_| format!("Invalid region '{}'. Use: left,top,right,bottom", raw))?;
    if !region.is_valid() {
        return Err(format!(
            "Region {} must have positive width and height",
            region
        ));
    }
    Ok(region)
}

/// Run CLI command
pub fn run(command: CliCommand, options: CliOptions) -> anyhow::Result<()> {
    match command {
        CliCommand::Watch(args) => run_watch(args, options),
        CliCommand::Capture { region, out } => run_capture(region, &out, options),
        CliCommand::Listen { port, count } => run_listen(port, count, options),
        CliCommand::ConfigShow => run_config_show(options),
        CliCommand::ConfigInit { force } => run_config_init(force, options),
    }
}

fn load_config(options: &CliOptions) -> anyhow::Result<Config> {
    match &options.config_path {
        Some(path) => Ok(Config::load_from(path)?),
        None => Ok(Config::load()),
    }
}

/// How a watch run ended
struct WatchOutcome {
    objects: Vec<DetectedObject>,
    counts: RankCounts,
    reason: Option<String>,
}

fn run_watch(args: WatchArgs, options: CliOptions) -> anyhow::Result<()> {
    let mut config = load_config(&options)?;
    args.apply(&mut config);
    config.validate()?;

    if config.region.is_none() {
        anyhow::bail!("No capture region configured. Pass --region l,t,r,b or set one in the config file");
    }

    let (tx, rx) = mpsc::channel();
    // The worker owns the only sender, so the channel disconnects when it exits
    let mut handle = Processor::new(
        &config,
        config.live_settings(),
        platform_capturer(),
        PaletteClassifier::new(config.classifier),
        Arc::new(ChannelHost::new(tx)),
    )
    .start()?;

    if !options.json {
        println!(
            "Watching {} until {} (poll {}ms)",
            config.region.map(|r| r.to_string()).unwrap_or_default(),
            config.criteria.describe(),
            config.timing.poll_delay_ms
        );
    }

    let deadline = args
        .max_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let outcome = follow_updates(&rx, deadline, || handle.is_finished(), options.json);

    handle.stop();

    // The confirmation status line follows the stop update
    if !options.json {
        for update in rx.try_iter() {
            if let UiUpdate::Status(message) = update {
                println!("{}", message);
            }
        }
    }

    let stopped = outcome.is_some();
    let outcome = outcome.unwrap_or_else(|| WatchOutcome {
        objects: Vec::new(),
        counts: handle.counts(),
        reason: None,
    });
    print_watch_outcome(&outcome, &config, &options);

    if !stopped {
        drop(handle);
        std::process::exit(2);
    }
    Ok(())
}

/// Print updates until a stop is confirmed, the deadline passes or the
/// worker goes away.
fn follow_updates(
    rx: &Receiver<UiUpdate>,
    deadline: Option<Instant>,
    is_finished: impl Fn() -> bool,
    json: bool,
) -> Option<WatchOutcome> {
    let mut last_counts: Option<RankCounts> = None;
    let mut last_transient: Option<String> = None;

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return None;
        }

        match rx.recv_timeout(WATCH_TICK) {
            Ok(UiUpdate::Status(message)) => {
                if !json {
                    println!("{}", message);
                }
            }
            Ok(UiUpdate::Transient(message)) => {
                // Capture failures repeat every retry; show each streak once
                if last_transient.as_deref() != Some(message.as_str()) {
                    eprintln!("{}", message);
                    last_transient = Some(message);
                }
            }
            Ok(UiUpdate::Detections(objects)) => {
                last_transient = None;
                let counts = RankCounts::from_objects(&objects);
                if !json && last_counts != Some(counts) {
                    println!("Counts: {}", counts);
                }
                last_counts = Some(counts);
            }
            Ok(UiUpdate::StopConfirmed {
                objects,
                counts,
                reason,
            }) => {
                return Some(WatchOutcome {
                    objects,
                    counts,
                    reason: Some(reason),
                });
            }
            Err(RecvTimeoutError::Timeout) => {
                if is_finished() {
                    warn!("Processor exited without confirming a stop");
                    return None;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn print_watch_outcome(outcome: &WatchOutcome, config: &Config, options: &CliOptions) {
    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "stopped": outcome.reason.is_some(),
                "reason": outcome.reason,
                "criteria": config.criteria,
                "counts": outcome.counts,
                "objects": outcome.objects,
            })
        );
        return;
    }

    match &outcome.reason {
        Some(reason) => {
            println!();
            println!("Stop confirmed: {}", reason);
            println!("  Counts:  {}", outcome.counts);
            println!(
                "  Ranks:   {}",
                outcome
                    .objects
                    .iter()
                    .map(|o| o.rank.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }
        None => {
            println!();
            println!("No stop confirmed before the watch ended.");
            println!("  Last counts: {}", outcome.counts);
        }
    }
}

fn run_capture(region: CaptureGeometry, out: &Path, options: CliOptions) -> anyhow::Result<()> {
    let mut capturer = platform_capturer();
    let frame = capturer.capture(Some(&region))?;
    frame.save_to_file(out)?;

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "region": region,
                "width": frame.width,
                "height": frame.height,
                "path": out.to_string_lossy(),
            })
        );
    } else {
        println!(
            "Saved {}x{} capture of {} to {}",
            frame.width,
            frame.height,
            region,
            out.display()
        );
    }
    Ok(())
}

fn run_listen(port: u16, count: Option<usize>, options: CliOptions) -> anyhow::Result<()> {
    let listener = SlotListener::bind(port)?;
    if !options.json {
        println!("Slot display listening on {}", listener.local_addr()?);
    }

    let mut received = 0;
    while count.map_or(true, |limit| received < limit) {
        match listener.accept_one() {
            Ok(ranks) => {
                received += 1;
                if options.json {
                    println!("{}", serde_json::to_string(&ranks)?);
                } else {
                    let labels: Vec<&str> = ranks.iter().map(|r| r.as_str()).collect();
                    println!("[{}]", labels.join(" | "));
                }
            }
            Err(e) => eprintln!("Warning: Ignoring bad slot update: {}", e),
        }
    }
    Ok(())
}

fn run_config_show(options: CliOptions) -> anyhow::Result<()> {
    let config = load_config(&options)?;
    let path = options.config_path.clone().or_else(Config::config_path);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        match path {
            Some(path) if path.exists() => println!("# {}", path.display()),
            Some(path) => println!("# {} (not found, showing defaults)", path.display()),
            None => println!("# defaults"),
        }
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}

fn run_config_init(force: bool, options: CliOptions) -> anyhow::Result<()> {
    let path = options
        .config_path
        .clone()
        .or_else(Config::config_path)
        .ok_or_else(|| anyhow::anyhow!("No config directory available"))?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it",
            path.display()
        );
    }

    Config::default().save_to(&path)?;
    if !options.json {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("{}", serde_json::json!({ "path": path.to_string_lossy() }));
    }
    Ok(())
}

/// Print CLI help
pub fn print_help() {
    println!("pip-reroll v{}", env!("CARGO_PKG_VERSION"));
    println!("Watch a screen region and stop the reroll run when enough good pips show up");
    println!();
    println!("USAGE:");
    println!("    pip-reroll <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    watch               Run the processing loop until a stop is confirmed");
    println!("    capture             Save one capture of --region to --out");
    println!("    listen              Print rank lists sent to the slot display");
    println!("    config show|init    Print the config, or write the default one");
    println!();
    println!("WATCH OPTIONS:");
    println!("    --region l,t,r,b    Capture region in screen pixels");
    println!("    --min-rank <R>      Lowest rank that counts (F, D, C, B, A, S, SS)");
    println!("    --min-count <N>     Pips at or above --min-rank needed to stop");
    println!("    --min-ss <N>        SS pips additionally needed (0 disables)");
    println!("    --poll-ms <N>       Delay between iterations");
    println!("    --slots             Forward the top ranks to the slot display");
    println!("    --log-events        Record confirmed stops to the decision log");
    println!("    --max-secs <N>      Give up after N seconds (exit code 2)");
    println!();
    println!("OTHER OPTIONS:");
    println!("    --out <file.png>    Output file for capture");
    println!("    --port <N>          Port for listen (default {})", DEFAULT_SLOTS_PORT);
    println!("    --count <N>         Exit listen after N updates");
    println!("    --force             Overwrite an existing config on init");
    println!("    --config <path>     Config file to use");
    println!("    --log-file <path>   Write logs to a file");
    println!("    --json              Output in JSON format");
    println!("    --help              Show this help message");
    println!();
    println!("Logging is controlled by RUST_LOG (default: warn,pip_reroll=info).");
}
