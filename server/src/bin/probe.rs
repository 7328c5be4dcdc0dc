//! Headless probe client for smoke-testing a running server
//!
//! Joins the matchmaking queue, heartbeats, and fires a scripted shot
//! whenever it holds the turn and the table is at rest. Run two probes
//! against one server to watch a full game play out in the logs.

use bincode::{deserialize, serialize};
use shared::{MoveIntent, Packet, PROTOCOL_VERSION};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::interval;

// Get current timestamp in milliseconds
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

async fn send(socket: &UdpSocket, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
    socket.send(&serialize(packet)?).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let server_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(&server_addr).await?;
    println!("Probe bound to {}, joining {}", socket.local_addr()?, server_addr);

    send(
        &socket,
        &Packet::Join {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let mut heartbeat = interval(Duration::from_secs(1));
    let mut seat = None;
    let mut buffer = [0u8; 8192];

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                send(&socket, &Packet::Heartbeat { timestamp: now_millis() }).await?;
            }
            result = socket.recv(&mut buffer) => {
                let len = result?;
                let packet: Packet = match deserialize(&buffer[..len]) {
                    Ok(packet) => packet,
                    Err(_) => continue,
                };

                match packet {
                    Packet::Waiting => {
                        println!("Waiting for an opponent...");
                    }
                    Packet::Start { session_id, seat: assigned } => {
                        println!("Session {} started, playing seat {}", session_id, assigned);
                        seat = Some(assigned);
                    }
                    Packet::State { bodies, scores, current_player, game_over, winner, .. } => {
                        if game_over {
                            println!("Game over, winner: {:?}", winner);
                            return Ok(());
                        }

                        let table_at_rest = bodies.iter().all(|b| b.speed() == 0.0);
                        if table_at_rest && Some(current_player) == seat {
                            println!(
                                "Our turn (scores {}-{}), shooting",
                                scores[0].len(),
                                scores[1].len()
                            );
                            send(&socket, &Packet::Move {
                                intent: MoveIntent::Shoot { angle: 0.0, power: 700.0 },
                            }).await?;
                        }
                    }
                    Packet::OpponentMove { intent } => {
                        println!("Opponent move: {:?}", intent);
                    }
                    Packet::OpponentLeft => {
                        println!("Opponent left");
                        return Ok(());
                    }
                    Packet::MoveRejected { reason } => {
                        println!("Move rejected: {}", reason);
                    }
                    Packet::Error { message } => {
                        println!("Server error: {}", message);
                    }
                    _ => {}
                }
            }
        }
    }
}
