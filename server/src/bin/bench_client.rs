//! Headless load generator: drives a benchmark server with joins, moves
//! and leaves.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, timeout, Instant};

type ClientError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to drive
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Number of concurrent players
    #[clap(short, long, default_value = "32")]
    players: usize,
    /// Move commands per second per player
    #[clap(short, long, default_value = "10")]
    rate: u32,
    /// How long to run, in seconds
    #[clap(short, long, default_value = "30")]
    duration: u64,
    /// Probability per player of leaving and rejoining halfway through
    #[clap(long, default_value = "0.1")]
    churn: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    println!(
        "Driving {} with {} players at {} moves/s for {}s",
        args.server, args.players, args.rate, args.duration
    );

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut tasks = Vec::with_capacity(args.players);
    for player in 0..args.players {
        tasks.push(tokio::spawn(drive_player(
            args.server,
            args.rate,
            deadline,
            args.churn.clamp(0.0, 1.0),
            player as u64,
        )));
    }

    let mut moves_sent = 0u64;
    let mut failed = 0usize;
    for task in tasks {
        match task.await? {
            Ok(moves) => moves_sent += moves,
            Err(cause) => {
                eprintln!("player task failed: {}", cause);
                failed += 1;
            }
        }
    }

    println!(
        "Done: {} moves sent, {} of {} players failed",
        moves_sent, failed, args.players
    );
    Ok(())
}

/// One player's life: connect, send moves until the deadline (possibly
/// leaving and rejoining once along the way), then disconnect.
async fn drive_player(
    server: SocketAddr,
    rate: u32,
    deadline: Instant,
    churn: f64,
    seed: u64,
) -> Result<u64, ClientError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let mut rng = StdRng::seed_from_u64(seed);

    // Churned players exercise the structural join/leave path mid-run.
    let mut rejoin_at = if rng.gen_bool(churn) {
        Some(deadline - (deadline - Instant::now()) / 2)
    } else {
        None
    };

    let mut player_id = connect(&socket, server).await?;
    let mut moves_sent = 0u64;
    let mut ticker = interval(Duration::from_secs_f64(1.0 / rate.max(1) as f64));

    while Instant::now() < deadline {
        ticker.tick().await;

        if let Some(at) = rejoin_at {
            if Instant::now() >= at {
                rejoin_at = None;
                send(&socket, server, &Packet::Disconnect { player_id }).await?;
                sleep(Duration::from_millis(200)).await;
                player_id = connect(&socket, server).await?;
            }
        }

        let direction = rng.gen_range(0..4u8);
        send(
            &socket,
            server,
            &Packet::Move {
                player_id,
                direction,
            },
        )
        .await?;
        moves_sent += 1;
    }

    send(&socket, server, &Packet::Disconnect { player_id }).await?;
    Ok(moves_sent)
}

async fn connect(socket: &UdpSocket, server: SocketAddr) -> Result<u32, ClientError> {
    send(
        socket,
        server,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let mut buffer = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer)).await??;
    match deserialize::<Packet>(&buffer[..len])? {
        Packet::Connected { player_id } => Ok(player_id),
        Packet::Refused { reason } => Err(format!("server refused: {}", reason).into()),
        other => Err(format!("unexpected reply: {:?}", other).into()),
    }
}

async fn send(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Result<(), ClientError> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}
