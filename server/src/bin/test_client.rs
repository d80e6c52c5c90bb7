//! Headless client that exercises a running server end to end.

use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{JoinRequest, MoveIntent, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Connects, joins a room and wanders around")]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Display name to join with
    #[clap(short, long, default_value = "wanderer")]
    name: String,

    /// Number of moves to send before leaving
    #[clap(short, long, default_value_t = 25)]
    moves: u32,
}

async fn send(socket: &UdpSocket, packet: &Packet, server: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;
    Ok(())
}

/// Waits for the next packet the predicate accepts, skipping the rest.
async fn wait_for<F>(socket: &UdpSocket, buf: &mut [u8], accept: F) -> Result<Packet, Box<dyn std::error::Error>>
where
    F: Fn(&Packet) -> bool,
{
    loop {
        let (len, _) = timeout(Duration::from_secs(3), socket.recv_from(buf)).await??;
        match deserialize::<Packet>(&buf[..len]) {
            Ok(packet) if accept(&packet) => return Ok(packet),
            Ok(_) => {}
            Err(e) => println!("Failed to deserialize packet: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let mut buf = vec![0u8; 65536];

    send(&socket, &Packet::Connect { client_version: PROTOCOL_VERSION }, args.server).await?;
    let client_id = match wait_for(&socket, &mut buf, |p| {
        matches!(p, Packet::Connected { .. } | Packet::Disconnected { .. })
    })
    .await?
    {
        Packet::Connected { client_id } => client_id,
        other => {
            println!("Connection refused: {:?}", other);
            return Ok(());
        }
    };
    println!("Connected as client {}", client_id);

    send(&socket, &Packet::ListRooms, args.server).await?;
    let rooms = match wait_for(&socket, &mut buf, |p| matches!(p, Packet::RoomList { .. })).await? {
        Packet::RoomList { rooms } => rooms,
        _ => Vec::new(),
    };
    for room in &rooms {
        println!(
            "  Room {} '{}' {:?}: {}/{}",
            room.id, room.name, room.tags, room.players_cur, room.players_max
        );
    }
    let room_id = match rooms.first() {
        Some(room) => room.id,
        None => {
            println!("Server has no rooms");
            return Ok(());
        }
    };

    let join = Packet::Join {
        room_id,
        request: JoinRequest {
            name: Some(args.name.clone()),
            ..Default::default()
        },
    };
    send(&socket, &join, args.server).await?;
    let player_id = match wait_for(&socket, &mut buf, |p| {
        matches!(p, Packet::Init { .. } | Packet::Error { .. })
    })
    .await?
    {
        Packet::Init { id, .. } => id,
        other => {
            println!("Join rejected: {:?}", other);
            return Ok(());
        }
    };
    println!("Joined room {} as player {}", room_id, player_id);

    for i in 0..args.moves {
        // Head for the nearest food in the latest snapshot, or drift in a circle.
        let snapshot = match wait_for(&socket, &mut buf, |p| matches!(p, Packet::GameState(_))).await? {
            Packet::GameState(snapshot) => snapshot,
            _ => continue,
        };

        let intent = match snapshot.player(player_id) {
            Some(me) => snapshot
                .foods
                .iter()
                .min_by(|a, b| {
                    let da = (a.x - me.x).powi(2) + (a.y - me.y).powi(2);
                    let db = (b.x - me.x).powi(2) + (b.y - me.y).powi(2);
                    da.total_cmp(&db)
                })
                .map(|food| MoveIntent::Target { x: food.x, y: food.y }),
            None => {
                println!("Player {} is gone from the room", player_id);
                break;
            }
        }
        .unwrap_or_else(|| {
            let angle = i as f32 / 5.0;
            MoveIntent::Direction {
                x: angle.cos(),
                y: angle.sin(),
            }
        });

        if let Some(me) = snapshot.player(player_id) {
            println!(
                "Tick {}: pos=({:.1}, {:.1}) radius={:.1} score={} foods={} leader={:?}",
                snapshot.tick,
                me.x,
                me.y,
                me.radius,
                me.score,
                snapshot.foods.len(),
                snapshot.leaderboard.first().map(|e| &e.name)
            );
        }

        send(&socket, &Packet::Move { intent }, args.server).await?;
        sleep(Duration::from_millis(200)).await;
    }

    send(&socket, &Packet::Chat { text: "bye".to_string() }, args.server).await?;
    send(&socket, &Packet::Leave, args.server).await?;
    send(&socket, &Packet::Disconnect, args.server).await?;
    println!("Test client finished");

    Ok(())
}
