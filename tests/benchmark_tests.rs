//! Performance benchmarks for critical game systems

use server::collision::{orb_pass, tag_pass};
use server::session::GameSession;
use shared::{orb_radius, Orb, Player, Vec2};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::mpsc;

fn full_roster() -> BTreeMap<u32, Player> {
    let mut players = BTreeMap::new();
    for i in 0..4u32 {
        players.insert(i + 1, Player::new(i + 1, &format!("Player{}", i), false, i as usize));
    }
    players
}

/// Benchmarks tag detection over a full room
#[test]
fn benchmark_tag_detection() {
    let players = full_roster();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = tag_pass(&players, i as u64);
    }

    let duration = start.elapsed();
    println!(
        "Tag detection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second for 100k iterations
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks orb overlap detection with a crowded arena
#[test]
fn benchmark_orb_detection() {
    let players = full_roster();
    let orbs: Vec<Orb> = (0..40)
        .map(|i| Orb {
            id: i,
            value: 5,
            radius: orb_radius(5),
            position: Vec2::new(30.0 + (i as f32) * 25.0, 360.0),
        })
        .collect();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = orb_pass(&players, &orbs);
    }

    let duration = start.elapsed();
    println!(
        "Orb detection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the full simulation step at match scale
#[tokio::test]
async fn benchmark_session_tick() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = GameSession::new("BENCHA", 1, "Alice", tx);
    session.add_player(2, "Bob").unwrap();
    session.add_player(3, "Carol").unwrap();
    session.add_player(4, "Dave").unwrap();
    assert!(session.start(0));

    session.set_velocity(1, 1.0, 0.0, false);
    session.set_velocity(2, -1.0, 0.5, true);
    session.set_velocity(3, 0.0, -1.0, false);

    // A full five-minute match is 18 000 ticks
    let ticks = shared::MATCH_DURATION_TICKS;
    let start = Instant::now();

    for i in 1..=ticks {
        session.tick(i * 16);
        // Drain emitted events so the channel does not grow unbounded
        while rx.try_recv().is_ok() {}
    }

    let duration = start.elapsed();
    println!(
        "Session tick: {} ticks in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    // An entire match worth of simulation should take well under 5 seconds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};
    use shared::{GamePhase, Packet};

    let players: Vec<Player> = (0..4)
        .map(|i| Player::new(i + 1, &format!("Player{}", i), i == 0, i as usize))
        .collect();
    let orbs: Vec<Orb> = (0..16)
        .map(|i| Orb {
            id: i,
            value: 10,
            radius: orb_radius(10),
            position: Vec2::new(i as f32 * 60.0 + 40.0, 200.0),
        })
        .collect();

    let packet = Packet::GameUpdate {
        players,
        orbs,
        timer_sec: 287,
        phase: GamePhase::Playing,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks interpolation buffer sampling under render load
#[test]
fn benchmark_interpolation_sampling() {
    use client::interpolation::{InterpolationBuffer, Snapshot};

    let mut buffer = InterpolationBuffer::new();
    for i in 0..20u64 {
        let players: Vec<Player> = (0..4)
            .map(|p| {
                let mut player = Player::new(p + 1, "bench", false, p as usize);
                player.position.x += i as f32;
                player
            })
            .collect();
        buffer.push(Snapshot {
            time_ms: i * 16,
            players,
            orbs: vec![],
        });
    }

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = buffer.sample(100 + (i % 200) as u64);
    }

    let duration = start.elapsed();
    println!(
        "Interpolation sampling: {} samples in {:?} ({:.2} μs/sample)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should handle 10k samples in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks room registry throughput with many short-lived rooms
#[tokio::test]
async fn benchmark_room_churn() {
    use server::registry::RoomRegistry;

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let mut registry = RoomRegistry::new(tx);

    let iterations = 1_000;
    let start = Instant::now();

    for i in 0..iterations {
        let creator = i * 2 + 1;
        let joiner = i * 2 + 2;
        let (code, _) = registry.create_room(creator, "Host").unwrap();
        registry.join_room(joiner, "Guest", &code).await.unwrap();
        registry.leave_room(creator).await.unwrap();
        registry.leave_room(joiner).await.unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Room churn: {} create/join/leave cycles in {:?} ({:.2} μs/cycle)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(registry.room_count(), 0);
    // Should complete 1000 cycles in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
