//! dbgp-play - runs a playground script under a DBGp client.
//!
//! The engine connects to the client (an IDE listening on `--host:--port`),
//! halts before the first line and then runs the script under its control.
//! Without a client the script runs unattached.

use anyhow::Context;
use clap::Parser;
use dbgp_engine::config::EngineConfig;
use dbgp_engine::dbgp_warn;
use dbgp_engine::debugger::{ExitReason, Session};
use dbgp_engine::log::PROTOCOL_TARGET;
use dbgp_engine::playground::Playground;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client address, overrides the config file.
    #[clap(long, env = "DBGP_HOST")]
    host: Option<String>,

    /// Client port, overrides the config file.
    #[clap(long, env = "DBGP_PORT")]
    port: Option<u16>,

    /// Config file (default: ~/.config/dbgp-engine/config.toml)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Start running right away instead of halting before the first line.
    #[clap(long)]
    no_break: bool,

    /// Disable engine logging.
    #[clap(short, long)]
    quiet: bool,

    script: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dbgp_engine::log::init(args.quiet);

    let mut config = EngineConfig::from_file(args.config.as_deref()).unwrap_or_default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let mut playground = Playground::load(&args.script)
        .with_context(|| format!("load {}", args.script.display()))?;
    playground.set_echo(true);

    let terminate = playground.termination_flag();
    ctrlc::set_handler(move || terminate.store(true, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    let mut session = Session::new(config);
    match session.connect(&mut playground) {
        Ok(()) if !args.no_break => {
            if let Err(err) = session.break_now(&mut playground) {
                dbgp_warn!(target: PROTOCOL_TARGET, "initial break failed: {err:#}");
            }
        }
        Ok(()) => {}
        Err(err) => {
            dbgp_warn!(target: PROTOCOL_TARGET, "no debugger client, running unattached: {err:#}")
        }
    }

    let result = playground.run(&mut session);
    let reason = match result {
        Ok(()) => ExitReason::Ok,
        Err(_) => ExitReason::Error,
    };
    session.exit(reason);
    result.context("script failed")
}
