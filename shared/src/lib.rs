use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const PLAYER_SPEED: f32 = 120.0;
pub const QUEST_DRIFT_SPEED: f32 = 40.0;
pub const DEFAULT_WORLD_WIDTH: f32 = 800.0;
pub const DEFAULT_WORLD_HEIGHT: f32 = 600.0;

/// Wire packets exchanged between clients and the benchmark server.
///
/// The first group travels client to server, the second server to client.
/// Everything is bincode-encoded, one packet per UDP datagram.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Move {
        player_id: u32,
        direction: u8,
    },
    Disconnect {
        player_id: u32,
    },

    Connected {
        player_id: u32,
    },
    Refused {
        reason: String,
    },
}

/// Movement directions with their raw wire codes.
///
/// The wire carries the bare `u8` so that stale or buggy clients can send
/// codes this version does not know; those are rejected where the command
/// is applied, not at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    /// Velocity vector for a player heading this way, in units per second.
    pub fn velocity(self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -PLAYER_SPEED),
            Direction::Down => (0.0, PLAYER_SPEED),
            Direction::Left => (-PLAYER_SPEED, 0.0),
            Direction::Right => (PLAYER_SPEED, 0.0),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0 => Ok(Direction::Up),
            1 => Ok(Direction::Down),
            2 => Ok(Direction::Left),
            3 => Ok(Direction::Right),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_code_roundtrip() {
        for direction in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let decoded = Direction::try_from(direction.code()).unwrap();
            assert_eq!(decoded, direction);
        }
    }

    #[test]
    fn test_unknown_direction_code_rejected() {
        for code in [4u8, 17, 255] {
            assert_eq!(Direction::try_from(code), Err(code));
        }
    }

    #[test]
    fn test_direction_velocity_axes() {
        let (vx, vy) = Direction::Left.velocity();
        assert_eq!(vx, -PLAYER_SPEED);
        assert_eq!(vy, 0.0);

        let (vx, vy) = Direction::Down.velocity();
        assert_eq!(vx, 0.0);
        assert_eq!(vy, PLAYER_SPEED);
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect { client_version } => assert_eq!(client_version, PROTOCOL_VERSION),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_move() {
        let packet = Packet::Move {
            player_id: 7,
            direction: Direction::Right.code(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Move {
                player_id,
                direction,
            } => {
                assert_eq!(player_id, 7);
                assert_eq!(direction, Direction::Right.code());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_refused() {
        let packet = Packet::Refused {
            reason: "server full".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Refused { reason } => assert_eq!(reason, "server full"),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
