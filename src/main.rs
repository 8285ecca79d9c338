use std::io;

use ambi_yeelight::cli::Args;
use ambi_yeelight::{AmbiSwitch, PhilipsTv, Position, YeelightBulb};
use clap::{CommandFactory, Parser};
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_positions() {
    println!("{}", "Accepted display options:".bright_white().bold());
    for name in Position::names() {
        let pos: Position = match name.parse() {
            Ok(p) => p,
            Err(_) => continue,
        };
        if pos.name() == name {
            println!("  {}", name.bright_cyan());
        } else {
            println!("  {} {}", name.cyan(), format!("(alias of {})", pos.name()).dimmed());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "ambi-yeelight", &mut io::stdout());
        return Ok(());
    }

    if args.list_positions {
        print_positions();
        return Ok(());
    }

    init_tracing(&args.log_level);

    let config = args.resolve_config()?;
    let switch_cfg = config.validate()?;

    let tv = PhilipsTv::builder(config.host.clone())
        .api_version(config.api_version)
        .credentials(config.username.clone(), config.password.clone())
        .request_timeout(config.request_timeout())
        .build()?;
    let bulb = YeelightBulb::new(switch_cfg.primary_bulb()).with_timeout(config.request_timeout());

    let switch = AmbiSwitch::new(switch_cfg, tv, bulb);
    info!(
        name = %switch.name(),
        tv = %config.host,
        bulb = %switch.config().primary_bulb(),
        position = %switch.config().position,
        "starting"
    );

    if !switch.turn_on().await {
        warn!("could not start following; will keep polling");
    }

    let mut ticker = tokio::time::interval(config.scan_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                switch.update().await;
                let state = switch.snapshot();
                info!(
                    state = switch.state(),
                    available = state.available,
                    tv_reachable = state.tv_reachable,
                    following = switch.is_following(),
                    "poll"
                );
            }
            _ = &mut shutdown => {
                info!("interrupted, turning off");
                break;
            }
        }
    }

    switch.turn_off().await;
    Ok(())
}
