use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};

use servo_controller::{
    ButtonHandler, Config, ConsolePayload, ServoController, SoftPwm, WidgetBackend,
};

#[derive(Parser)]
#[command(
    name = "servo-payload",
    about = "Exposes a PWM servo as a toggle button in the ground-control app"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,

    /// Drive the toggle from stdin instead of the payload SDK
    #[arg(long)]
    simulate: bool,
}

fn init_logger(config_level: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config_level.to_lowercase());
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.parse_filters(&filter);
    builder.init();
}

async fn wait_for_signal() -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("waiting for SIGINT")?,
        _ = sigterm.recv() => {}
    }
    info!("shutdown signal received");
    Ok(())
}

/// Feeds the command ingress from stdin, mimicking the SDK's press/release
/// callback pair per button push.
async fn simulate(
    handler: &ButtonHandler,
    controller: &ServoController,
) -> anyhow::Result<()> {
    println!("simulation mode: type 'toggle', 'status' or 'quit'");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => return result,
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    return Ok(());
                };
                match line.trim().to_ascii_lowercase().as_str() {
                    "toggle" => {
                        handler.handle_event(handler.button_id(), true);
                        handler.handle_event(handler.button_id(), false);
                    }
                    "status" => println!("{}", controller.status()),
                    "quit" => return Ok(()),
                    "" => {}
                    other => println!("unknown command '{}', use toggle | status | quit", other),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    init_logger(&config.system.log_level);

    info!(
        "{} v{} starting on GPIO {}",
        config.psdk.app_name, config.psdk.app_version, config.servo.gpio_pin
    );

    let payload = Arc::new(ConsolePayload);
    let controller = Arc::new(ServoController::new(
        config.clone(),
        Box::new(SoftPwm::new()),
        payload.clone(),
    ));

    controller
        .initialize()
        .await
        .context("failed to initialize servo controller")?;

    if let Err(err) = payload.register_button(&config.psdk) {
        controller.shutdown().await;
        bail!("failed to register toggle button: {err}");
    }
    let handler = ButtonHandler::new(config.psdk.button_id.clone(), controller.clone());

    info!(
        "button '{}' available in the ground-control app, Ctrl+C to exit",
        config.psdk.button_name
    );

    let result = if args.simulate {
        simulate(&handler, &controller).await
    } else {
        wait_for_signal().await
    };

    controller.shutdown().await;
    info!("system stopped");
    result
}
