//! Performance sanity checks for critical simulation paths

use server::physics::{step, Bounds};
use server::session::{MoveOutcome, PairOutcome, SessionTable};
use shared::{Body, BodyKind, MoveIntent, Team, Vec2};
use std::time::Instant;

const DT: f32 = 1.0 / 60.0;

fn full_table() -> Vec<Body> {
    let mut bodies = vec![Body::new(0, BodyKind::Cue, Vec2 { x: 200.0, y: 300.0 })];
    for id in 1..16 {
        let kind = if id == 8 {
            BodyKind::Black
        } else if id % 2 == 0 {
            BodyKind::Colored(Team::Blue)
        } else {
            BodyKind::Colored(Team::Red)
        };
        let mut body = Body::new(
            id,
            kind,
            Vec2 {
                x: 150.0 + (id as f32) * 30.0,
                y: 200.0 + (id as f32 % 5.0) * 40.0,
            },
        );
        body.velocity = Vec2 {
            x: ((id as f32) * 37.0) % 300.0 - 150.0,
            y: ((id as f32) * 61.0) % 300.0 - 150.0,
        };
        bodies.push(body);
    }
    bodies
}

/// Benchmarks the full physics step with a busy table
#[test]
fn benchmark_physics_step_full_table() {
    let mut bodies = full_table();
    let bounds = Bounds::default();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        step(&mut bodies, &bounds, DT);
    }

    let duration = start.elapsed();
    println!(
        "Physics step: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A 16-body step should stay comfortably within one second for 10k ticks
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks collision-heavy stepping with every body clustered
#[test]
fn benchmark_clustered_collision_resolution() {
    let bounds = Bounds::default();
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        // Re-cluster each round so pairs keep overlapping.
        let mut bodies: Vec<Body> = (0..8)
            .map(|id| {
                let mut body = Body::new(id, BodyKind::Cue, Vec2 {
                    x: 400.0 + id as f32 * 5.0,
                    y: 300.0,
                });
                body.velocity = Vec2 { x: 50.0, y: 0.0 };
                body
            })
            .collect();
        step(&mut bodies, &bounds, DT);
    }

    let duration = start.elapsed();
    println!(
        "Clustered step: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks ticking many independent sessions at once
#[test]
fn benchmark_many_independent_sessions() {
    let mut table = SessionTable::new();
    let session_count = 32;

    for pair in 0..session_count {
        let first = (pair * 2 + 1) as u32;
        let second = (pair * 2 + 2) as u32;
        assert_eq!(table.pair_waiting(first), Ok(PairOutcome::Waiting));
        assert!(matches!(
            table.pair_waiting(second),
            Ok(PairOutcome::Paired { .. })
        ));

        // Seat 0 of every session fires a shot so all tables are busy.
        let outcome = table.submit_move(
            first,
            MoveIntent::Shoot {
                angle: std::f32::consts::FRAC_PI_2,
                power: 300.0,
            },
        );
        assert!(matches!(outcome, MoveOutcome::Committed { .. }));
    }

    let ticks = 1000;
    let start = Instant::now();
    for _ in 0..ticks {
        table.tick(DT);
    }
    let duration = start.elapsed();

    println!(
        "{} sessions x {} ticks in {:?} ({:.2} µs/tick)",
        session_count,
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    // Every session either settled or is still simulating; none vanished.
    assert_eq!(table.len(), session_count);
    assert!(duration.as_secs() < 5);
}
