use clap::Parser;
use log::{error, info};
use server::config::{default_rooms, ServerConfig};
use server::network::{Server, ServerMessage};
use server::world::World;
use shared::{FOOD_TARGET, TICK_MS, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative growth arena server")]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value_t = 8080)]
    port: u16,

    /// Milliseconds per room tick
    #[clap(short, long, default_value_t = TICK_MS)]
    tick_ms: u64,

    /// Number of rooms to open
    #[clap(short, long, default_value_t = 2)]
    rooms: usize,

    /// Maximum players per room
    #[clap(long, default_value_t = 200)]
    capacity: usize,

    /// Food each room keeps alive
    #[clap(long, default_value_t = FOOD_TARGET)]
    food_target: usize,

    /// Bots per room
    #[clap(long, default_value_t = 0)]
    bots: usize,

    #[clap(long, default_value_t = WORLD_WIDTH)]
    world_width: f32,

    #[clap(long, default_value_t = WORLD_HEIGHT)]
    world_height: f32,

    /// Maximum connected clients across all rooms
    #[clap(short, long, default_value_t = 400)]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[clap(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Seed for reproducible food and bot placement
    #[clap(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_duration: Duration::from_millis(args.tick_ms.max(1)),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.timeout_secs),
        world: World::checked(args.world_width, args.world_height)?,
        rooms: default_rooms(args.rooms, args.capacity, args.food_target, args.bots),
        seed: args.seed,
    };

    info!(
        "Starting server on {} ({} rooms, {:?} per tick, world {}x{})",
        config.bind_addr,
        config.rooms.len(),
        config.tick_duration,
        args.world_width,
        args.world_height
    );

    let mut server = Server::new(config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            if let Err(e) = shutdown.send(ServerMessage::Shutdown) {
                error!("Failed to signal shutdown: {}", e);
            }
        }
    });

    server.run().await?;
    Ok(())
}
