//! Integration tests for the paired-session game server
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use server::arbiter::{RuleEvent, TurnState};
use server::session::{DisconnectOutcome, MoveOutcome, PairOutcome, SessionTable};
use shared::{BodyKind, MoveIntent, Packet, CUE_SPAWN, POCKETS, PROTOCOL_VERSION};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

const DT: f32 = 1.0 / 60.0;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Join {
                client_version: PROTOCOL_VERSION,
            },
            Packet::Move {
                intent: MoveIntent::Shoot {
                    angle: 0.75,
                    power: 420.0,
                },
            },
            Packet::Restart,
            Packet::Waiting,
            Packet::Start {
                session_id: 1,
                seat: 0,
            },
            Packet::OpponentLeft,
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();

            match (&packet, &deserialized) {
                (Packet::Join { .. }, Packet::Join { .. }) => {}
                (Packet::Move { .. }, Packet::Move { .. }) => {}
                (Packet::Restart, Packet::Restart) => {}
                (Packet::Waiting, Packet::Waiting) => {}
                (Packet::Start { .. }, Packet::Start { .. }) => {}
                (Packet::OpponentLeft, Packet::OpponentLeft) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// Tests real UDP socket communication with the wire format
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::Join {
            client_version: PROTOCOL_VERSION,
        };
        let serialized = serialize(&test_packet).unwrap();

        client_socket.send_to(&serialized, server_addr).unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        match received_packet {
            Packet::Join { client_version } => assert_eq!(client_version, PROTOCOL_VERSION),
            _ => panic!("Wrong packet type received"),
        }
    }
}

/// GAME FLOW TESTS
mod game_flow_tests {
    use super::*;

    fn paired_table() -> (SessionTable, u64) {
        let mut table = SessionTable::new();
        assert_eq!(table.pair_waiting(1), Ok(PairOutcome::Waiting));
        match table.pair_waiting(2) {
            Ok(PairOutcome::Paired { session_id }) => (table, session_id),
            other => panic!("Expected pairing, got {:?}", other),
        }
    }

    /// Runs the simulation until the current shot settles.
    fn run_until_settled(table: &mut SessionTable, session_id: u64) -> Vec<RuleEvent> {
        let mut all_events = Vec::new();

        for _ in 0..5000 {
            for update in table.tick(DT) {
                all_events.extend(update.events);
            }

            let session = table.session(session_id).expect("session vanished");
            if !matches!(session.arbiter().state(), TurnState::Simulating { .. }) {
                return all_events;
            }
        }

        panic!("Shot never settled");
    }

    #[test]
    fn pairing_assigns_seats_in_join_order() {
        let (table, session_id) = paired_table();
        let session = table.session(session_id).unwrap();

        assert_eq!(session.players(), [1, 2]);
        assert_eq!(session.seat_of(1), Some(0));
        assert_eq!(session.seat_of(2), Some(1));
        assert_eq!(
            session.arbiter().state(),
            TurnState::AwaitingShot { player: 0 }
        );
        assert_eq!(session.bodies().len(), 16);
    }

    #[test]
    fn full_shot_cycle_passes_turn() {
        let (mut table, session_id) = paired_table();

        // Straight down from the spawn: settles without touching a ball
        // or a pocket.
        let outcome = table.submit_move(
            1,
            MoveIntent::Shoot {
                angle: std::f32::consts::FRAC_PI_2,
                power: 300.0,
            },
        );
        assert_eq!(outcome, MoveOutcome::Committed { session_id });

        let events = run_until_settled(&mut table, session_id);
        assert!(events.contains(&RuleEvent::TurnPassed { to: 1 }));

        let session = table.session(session_id).unwrap();
        assert_eq!(session.arbiter().current_player(), Some(1));

        // The previous shooter is now the wrong seat.
        let outcome = table.submit_move(
            1,
            MoveIntent::Shoot {
                angle: 0.0,
                power: 300.0,
            },
        );
        assert_eq!(
            outcome,
            MoveOutcome::Rejected {
                reason: "not your turn"
            }
        );
    }

    #[test]
    fn scratch_grants_opponent_two_shots() {
        let (mut table, session_id) = paired_table();

        // Seat 0 sinks the cue into the bottom-left pocket.
        let pocket = POCKETS[3];
        let delta = pocket.sub(&CUE_SPAWN);
        table.submit_move(
            1,
            MoveIntent::Shoot {
                angle: delta.y.atan2(delta.x),
                power: 600.0,
            },
        );
        let events = run_until_settled(&mut table, session_id);
        assert!(events.contains(&RuleEvent::CueScratched));

        // The cue is back on the table and seat 1 holds a bonus turn.
        let session = table.session(session_id).unwrap();
        let cue = session
            .bodies()
            .iter()
            .find(|b| b.kind == BodyKind::Cue)
            .unwrap();
        assert_eq!(cue.position, CUE_SPAWN);
        assert_eq!(session.arbiter().current_player(), Some(1));
        assert_eq!(session.arbiter().extra_turns(), 1);

        // First quiet shot consumes the bonus without switching.
        table.submit_move(
            2,
            MoveIntent::Shoot {
                angle: std::f32::consts::FRAC_PI_2,
                power: 300.0,
            },
        );
        let events = run_until_settled(&mut table, session_id);
        assert!(events.contains(&RuleEvent::ExtraTurnConsumed {
            player: 1,
            remaining: 0,
        }));
        let session = table.session(session_id).unwrap();
        assert_eq!(session.arbiter().current_player(), Some(1));

        // Second quiet shot hands the turn back.
        table.submit_move(
            2,
            MoveIntent::Shoot {
                angle: std::f32::consts::FRAC_PI_2,
                power: 300.0,
            },
        );
        let events = run_until_settled(&mut table, session_id);
        assert!(events.contains(&RuleEvent::TurnPassed { to: 0 }));
    }

    #[test]
    fn aim_updates_relay_to_opponent() {
        let (mut table, session_id) = paired_table();

        let outcome = table.submit_move(1, MoveIntent::Aim { angle: 2.0 });
        assert_eq!(
            outcome,
            MoveOutcome::Updated {
                session_id,
                opponent: 2,
                intent: MoveIntent::Aim { angle: 2.0 },
            }
        );
    }

    #[test]
    fn disconnect_removes_session_from_table() {
        let (mut table, session_id) = paired_table();

        assert_eq!(
            table.on_disconnect(1),
            Some(DisconnectOutcome::SessionEnded {
                session_id,
                remaining: 2,
            })
        );

        assert!(table.session(session_id).is_none());
        assert_eq!(
            table.submit_move(2, MoveIntent::Aim { angle: 0.0 }),
            MoveOutcome::NotInSession
        );

        // The survivor can queue up again.
        assert_eq!(table.pair_waiting(2), Ok(PairOutcome::Waiting));
    }

    #[test]
    fn restart_only_after_game_over() {
        let (mut table, _) = paired_table();
        assert!(table.restart(1).is_err());
        assert!(table.restart(99).is_err());
    }
}
