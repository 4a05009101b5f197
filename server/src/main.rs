use clap::Parser;
use log::info;
use server::cli::DifficultyArg;
use server::network::{Server, ServerMessage};
use shared::{MatchConfig, TICK_RATE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Difficulty used until a lobby changes it
    #[arg(short, long, value_enum, default_value = "normal")]
    difficulty: DifficultyArg,

    /// Start with the speed ramp enabled
    #[arg(long)]
    speed_ramp: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);
    let config = MatchConfig {
        difficulty: args.difficulty.into(),
        speed_ramp: args.speed_ramp,
    };

    info!(
        "Starting server at {} Hz ({:?}, speed ramp {})",
        tick_rate, config.difficulty, config.speed_ramp
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        config,
    )
    .await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = handle.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
