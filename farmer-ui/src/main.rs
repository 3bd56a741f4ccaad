//! Farmer console: dashboard, command input and optional HTTP control bridge.

mod bridge;
mod console;
mod input;
mod routes;
mod sse;
mod state;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use farmer::dispatcher::{Dispatch, Dispatcher, command_queue};
use farmer::io::config::{FarmConfig, load_config};
use farmer::orchestrator::{EngineSettings, NewProfile, Orchestrator};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::state::BridgeState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "farmer")]
#[command(about = "Run progress farming workers for several accounts at once")]
struct Args {
    /// Config file (TOML); missing file means defaults
    #[arg(long, default_value = "farmer.toml")]
    config: PathBuf,

    /// Start the HTTP control bridge
    #[arg(long)]
    api: bool,

    /// Address for the control bridge
    #[arg(long)]
    bind: Option<String>,

    /// Port for the control bridge
    #[arg(long)]
    port: Option<u16>,

    /// Number of profiles to set up at startup (skips the question)
    #[arg(long)]
    profiles: Option<u32>,
}

fn main() -> Result<()> {
    farmer::logging::init();

    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if args.api {
        config.bridge.enabled = true;
    }
    if let Some(bind) = args.bind {
        config.bridge.bind = bind;
    }
    if let Some(port) = args.port {
        config.bridge.port = port;
    }

    let startup = input::startup_profiles(
        &mut io::stdin().lock(),
        &mut io::stdout(),
        args.profiles,
        config.base_delay(),
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build runtime")?;
    runtime.block_on(run(config, startup))
}

async fn run(config: FarmConfig, startup: Vec<NewProfile>) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config.connector(), EngineSettings::from_config(&config));
    for profile in startup {
        orchestrator.add_profile(profile);
    }

    let (sender, mut queue) = command_queue();
    input::spawn_stdin_reader(sender.clone())?;
    let bridge_state = BridgeState::new(orchestrator.registry(), sender, config.refresh_interval());

    let mut bridge_addr: Option<SocketAddr> = None;
    if config.bridge.enabled {
        bridge_addr = start_bridge(&config, &bridge_state).await;
    }

    let mut dispatcher = Dispatcher::new();
    let mut prompt: Option<String> = None;
    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let mut quit = false;
        for queued in queue.drain() {
            match dispatcher.dispatch_queued(&queued, &mut orchestrator) {
                Dispatch::Prompt(text) => prompt = Some(text),
                Dispatch::EnableBridge if bridge_addr.is_none() => {
                    bridge_addr = start_bridge(&config, &bridge_state).await;
                }
                Dispatch::Quit => {
                    quit = true;
                    break;
                }
                Dispatch::Applied | Dispatch::Ignored | Dispatch::EnableBridge => {}
            }
        }
        if !dispatcher.is_prompting() {
            prompt = None;
        }
        redraw(&orchestrator, bridge_addr, prompt.as_deref());
        if quit {
            break;
        }
    }

    queue.close();
    let outcomes = orchestrator.shutdown(SHUTDOWN_GRACE).await;
    info!(workers = outcomes.len(), "all workers finished");
    redraw(&orchestrator, bridge_addr, None);
    Ok(())
}

async fn start_bridge(config: &FarmConfig, state: &BridgeState) -> Option<SocketAddr> {
    match bridge::start(&config.bridge.bind, config.bridge.port, state.clone()).await {
        Ok(addr) => Some(addr),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "control bridge unavailable");
            None
        }
    }
}

fn redraw<C>(orchestrator: &Orchestrator<C>, bridge: Option<SocketAddr>, prompt: Option<&str>)
where
    C: farmer::io::transport::Connector,
{
    if let Err(err) = console::draw(&orchestrator.status(), bridge, prompt) {
        warn!(err = %err, "dashboard redraw failed");
    }
}
