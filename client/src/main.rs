use clap::Parser;
use log::info;

use client::network::{Client, RoomIntent};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to use in the room
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Room code to join; omit to create a new room
    #[arg(short = 'r', long)]
    room: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let intent = match args.room {
        Some(room_code) => RoomIntent::Join { room_code },
        None => RoomIntent::Create,
    };

    let mut client = Client::new(&args.server, &args.name, intent).await?;

    client.run().await?;

    Ok(())
}
