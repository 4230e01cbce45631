//! GameKit Interop CLI Application
//!
//! Command-line driver for the gamekit-interop library. It can:
//! - Probe a native bridge library for the entry points the bindings need
//! - Run a scripted matchmaker session against the simulated runtime
//! - Run the same session (without events) against a real bridge library
//! - Print the outcome as text or JSON

use anyhow::{bail, Context, Result};
use clap::Parser;
use gamekit_interop::simulator::SimulatedRuntime;
use gamekit_interop::{BackendKind, Bridge, BridgeConfig, DynamicRuntime};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod report;
mod session;

use config::AppConfig;
use report::ProbeReport;

/// GameKit Interop - Drive the turn-based matchmaker bindings
#[derive(Parser, Debug)]
#[command(name = "gamekit-interop-cli")]
#[command(about = "Exercise the GameKit turn-based matchmaker bindings", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Native bridge library to load (selects the dynamic backend)
    #[arg(long, value_name = "FILE")]
    library: Option<PathBuf>,

    /// Use the in-process simulated runtime
    #[arg(long, conflicts_with = "library")]
    simulate: bool,

    /// Only check which required symbols the library exports
    #[arg(long, requires = "library")]
    probe: bool,

    /// Override the controller's "show existing matches" flag
    #[arg(long, value_name = "BOOL")]
    show_existing_matches: Option<bool>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("GameKit Interop CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using interop library v{}", gamekit_interop::VERSION);

    if args.probe {
        if let Some(library) = &args.library {
            return probe_mode(library, args.json);
        }
    }

    session_mode(&args)
}

/// Probe mode - list the required symbols and whether each one is exported
fn probe_mode(library: &Path, json: bool) -> Result<()> {
    let symbols = DynamicRuntime::probe(library)
        .with_context(|| format!("Failed to probe {:?}", library))?;

    let report = ProbeReport {
        library: library.display().to_string(),
        symbols,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    let missing = report.missing();
    if missing > 0 {
        bail!("{} required symbol(s) missing from {:?}", missing, library);
    }
    Ok(())
}

/// Session mode - build a controller, attach a delegate, fire scripted events
fn session_mode(args: &Args) -> Result<()> {
    let mut app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            let config = config::load_config(path)?;
            log::debug!("Configuration loaded successfully");
            config
        }
        None => AppConfig::default(),
    };

    app.bridge = bridge_config(&app.bridge, args);
    if let Some(show) = args.show_existing_matches {
        app.matchmaker.show_existing_matches = Some(show);
    }

    let (bridge, simulator) = match app.bridge.backend {
        BackendKind::Simulated => {
            let sim = Arc::new(SimulatedRuntime::new());
            (Bridge::new(sim.clone()), Some(sim))
        }
        BackendKind::Dynamic | BackendKind::Linked => {
            (Bridge::from_config(&app.bridge).context("Failed to create bridge")?, None)
        }
    };
    log::info!("Using {} backend", bridge.runtime().name());

    let report = session::run_session(
        &bridge,
        simulator.as_deref(),
        &app.matchmaker,
        &app.session.events,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    Ok(())
}

/// Apply command-line overrides on top of the configured backend
fn bridge_config(configured: &BridgeConfig, args: &Args) -> BridgeConfig {
    if args.simulate {
        BridgeConfig::new().with_backend(BackendKind::Simulated)
    } else if let Some(library) = &args.library {
        BridgeConfig::new().with_library(library)
    } else {
        configured.clone()
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_library_flag_selects_dynamic_backend() {
        let args = parse(&["gamekit-interop-cli", "--library", "libbridge.dylib"]);
        let config = bridge_config(&BridgeConfig::default(), &args);

        assert_eq!(config.backend, BackendKind::Dynamic);
        assert_eq!(config.library.as_deref(), Some(Path::new("libbridge.dylib")));
    }

    #[test]
    fn test_simulate_flag_overrides_config_file() {
        let configured = BridgeConfig::new().with_library(Path::new("libbridge.dylib"));
        let args = parse(&["gamekit-interop-cli", "--simulate"]);

        assert_eq!(bridge_config(&configured, &args).backend, BackendKind::Simulated);
    }

    #[test]
    fn test_probe_requires_library() {
        assert!(Args::try_parse_from(["gamekit-interop-cli", "--probe"]).is_err());
    }

    #[test]
    fn test_show_existing_matches_takes_bool() {
        let args = parse(&["gamekit-interop-cli", "--show-existing-matches", "false"]);
        assert_eq!(args.show_existing_matches, Some(false));
    }

    #[test]
    fn test_probe_missing_library_fails() {
        assert!(probe_mode(Path::new("does/not/exist.dylib"), false).is_err());
    }
}
