//! UDP transport: decodes wire packets into typed commands and routes
//! them to the owning shard's queue.

use crate::command::{Command, RoundRobin, ShardPolicy};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tokio::net::UdpSocket;

struct PlayerRoute {
    shard: usize,
    addr: SocketAddr,
}

/// Owns the player registry and the join placement policy. Lives entirely
/// on the transport task; the workers only ever see the typed commands
/// coming out of their queues.
pub struct ShardRouter {
    shards: Vec<Sender<Command>>,
    policy: Box<dyn ShardPolicy>,
    players: HashMap<u32, PlayerRoute>,
    next_player_id: u32,
    max_players: usize,
}

impl ShardRouter {
    pub fn new(shards: Vec<Sender<Command>>, max_players: usize) -> Self {
        Self::with_policy(shards, max_players, Box::new(RoundRobin::new()))
    }

    pub fn with_policy(
        shards: Vec<Sender<Command>>,
        max_players: usize,
        policy: Box<dyn ShardPolicy>,
    ) -> Self {
        Self {
            shards,
            policy,
            players: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Routes one decoded packet. Returns the reply to send back to the
    /// sender, if the packet warrants one.
    pub fn route(&mut self, packet: Packet, addr: SocketAddr) -> Option<Packet> {
        match packet {
            Packet::Connect { client_version } => self.handle_connect(client_version, addr),
            Packet::Move {
                player_id,
                direction,
            } => {
                match self.players.get(&player_id) {
                    Some(route) => {
                        let _ = self.shards[route.shard].send(Command::Move {
                            id: player_id,
                            direction,
                        });
                    }
                    None => warn!("move from unknown player {} at {}", player_id, addr),
                }
                None
            }
            Packet::Disconnect { player_id } => {
                match self.players.remove(&player_id) {
                    Some(route) => {
                        let _ = self.shards[route.shard].send(Command::Leave { id: player_id });
                        info!("player {} disconnected", player_id);
                    }
                    None => warn!("disconnect from unknown player {} at {}", player_id, addr),
                }
                None
            }
            other => {
                warn!("unexpected packet from {}: {:?}", addr, other);
                None
            }
        }
    }

    fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) -> Option<Packet> {
        if client_version != PROTOCOL_VERSION {
            return Some(Packet::Refused {
                reason: format!(
                    "protocol version mismatch: server {}, client {}",
                    PROTOCOL_VERSION, client_version
                ),
            });
        }
        if self.players.len() >= self.max_players {
            return Some(Packet::Refused {
                reason: "server full".to_string(),
            });
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;
        let shard = self.policy.assign(player_id, self.shards.len());

        if self.shards[shard]
            .send(Command::Join {
                id: player_id,
                addr,
            })
            .is_err()
        {
            // The worker side is gone, which means the run is over.
            return Some(Packet::Refused {
                reason: "server shutting down".to_string(),
            });
        }

        self.players.insert(player_id, PlayerRoute { shard, addr });
        info!(
            "player {} connected from {} onto shard {}",
            player_id, addr, shard
        );
        Some(Packet::Connected { player_id })
    }
}

/// Binds the benchmark's UDP endpoint.
pub async fn bind(port: u16) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    info!("Listening on {}", socket.local_addr()?);
    Ok(socket)
}

/// Receive loop: datagram in, packet decoded, command routed, optional
/// reply sent. Malformed datagrams are dropped with a diagnostic.
pub async fn run(socket: UdpSocket, mut router: ShardRouter) {
    let mut buffer = [0u8; 2048];

    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                Ok(packet) => {
                    if let Some(reply) = router.route(packet, addr) {
                        match serialize(&reply) {
                            Ok(data) => {
                                if let Err(cause) = socket.send_to(&data, addr).await {
                                    warn!("failed to reply to {}: {}", addr, cause);
                                }
                            }
                            Err(cause) => error!("failed to encode reply: {}", cause),
                        }
                    }
                }
                Err(_) => warn!("dropping malformed datagram from {}", addr),
            },
            Err(cause) => {
                error!("error receiving datagram: {}", cause);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
