//! Integration tests for the arena engine, driven through in-memory
//! connections.

use std::collections::HashMap;
use std::net::SocketAddr;

use lightcycle_arena::{Arena, ArenaConfig, ArenaError, ArenaState};
use lightcycle_protocol::{ClientPacket, Direction, PlayerId};
use lightcycle_session::{PlayerSession, SessionRegistry};
use lightcycle_transport::{ConnectionHandle, MemoryPeer};
use rand::seq::SliceRandom;

// =========================================================================
// Helpers
// =========================================================================

struct Table {
    registry: SessionRegistry,
    peers: HashMap<String, MemoryPeer>,
}

impl Table {
    fn new(names: &[&str]) -> Self {
        let mut table = Self {
            registry: SessionRegistry::new(),
            peers: HashMap::new(),
        };
        for name in names {
            table.registry.insert(PlayerSession::new(*name, "pw")).unwrap();
            table.connect(name);
        }
        table
    }

    /// Binds a fresh connection to `name`, replacing any previous one.
    fn connect(&mut self, name: &str) {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let (conn, peer) = ConnectionHandle::memory(addr);
        self.registry.bind(name, conn).unwrap();
        self.peers.insert(name.to_string(), peer);
    }

    fn drop_connection(&mut self, name: &str) {
        let session = self.registry.get(name).unwrap();
        session.connection().unwrap().disconnect();
    }

    fn steer(&mut self, name: &str, direction: Direction) {
        self.registry
            .get_mut(name)
            .unwrap()
            .handle_packet(ClientPacket::Move(Some(direction)));
    }

    fn lines(&mut self, name: &str) -> Vec<String> {
        self.peers.get_mut(name).unwrap().lines()
    }

    fn start(&mut self, order: &[&str]) -> Arena {
        let names: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        Arena::start(&names, &mut self.registry, ArenaConfig::default()).unwrap()
    }
}

// =========================================================================
// Start
// =========================================================================

#[test]
fn test_start_announces_game_and_opening_positions() {
    let mut table = Table::new(&["alice", "bob"]);
    let arena = table.start(&["alice", "bob"]);

    assert_eq!(arena.width(), 4);
    assert_eq!(arena.height(), 4);
    assert_eq!(arena.state(), ArenaState::Running);
    assert_eq!(
        table.lines("alice"),
        vec!["game|4|4|0", "pos|0|0|0", "pos|1|1|1", "tick"]
    );
    assert_eq!(
        table.lines("bob"),
        vec!["game|4|4|1", "pos|0|0|0", "pos|1|1|1", "tick"]
    );
    assert_eq!(arena.cell((1, 1)), Some(PlayerId(1)));
}

#[test]
fn test_start_skips_disconnected_users() {
    let mut table = Table::new(&["alice", "bob"]);
    table.drop_connection("bob");

    let arena = table.start(&["alice", "bob"]);
    assert_eq!(arena.participant_count(), 1);
    assert_eq!(arena.width(), 2);
    assert!(!arena.contains("bob"));
}

#[test]
fn test_start_without_connected_users_fails() {
    let mut table = Table::new(&["alice"]);
    table.drop_connection("alice");

    let names = vec!["alice".to_string()];
    let err = Arena::start(&names, &mut table.registry, ArenaConfig::default()).unwrap_err();
    assert!(matches!(err, ArenaError::NoParticipants));
}

// =========================================================================
// Movement
// =========================================================================

#[test]
fn test_tick_defaults_to_up_and_wraps() {
    let mut table = Table::new(&["alice", "bob"]);
    let mut arena = table.start(&["alice", "bob"]);
    table.lines("alice");

    assert_eq!(arena.tick(&mut table.registry), None);
    assert_eq!(table.lines("alice"), vec!["pos|0|0|3", "pos|1|1|0", "tick"]);
    assert_eq!(arena.cell((0, 3)), Some(PlayerId(0)));
    assert_eq!(arena.cell((0, 0)), Some(PlayerId(0)));
}

#[test]
fn test_tick_consumes_each_move_once() {
    let mut table = Table::new(&["alice", "bob"]);
    let mut arena = table.start(&["alice", "bob"]);

    table.steer("alice", Direction::Right);
    table.steer("alice", Direction::Down);
    arena.tick(&mut table.registry);
    assert_eq!(table.registry.get("alice").unwrap().pos(), (0, 1));

    // No new move: the default takes her up into her own trail.
    arena.tick(&mut table.registry);
    assert_eq!(table.registry.get("alice").unwrap().pos(), (0, 1));
    assert!(!table.registry.get("alice").unwrap().is_alive());
    assert_eq!(arena.cell((0, 0)), None);
}

// =========================================================================
// Death and termination
// =========================================================================

#[test]
fn test_player_crashing_into_trail_loses() {
    // A at (0,0) goes down, then right into B's spawn cell (1,1).
    let mut table = Table::new(&["a", "b"]);
    let mut arena = table.start(&["a", "b"]);
    table.lines("a");
    table.lines("b");

    table.steer("a", Direction::Down);
    table.steer("b", Direction::Up);
    assert_eq!(arena.tick(&mut table.registry), None);
    assert_eq!(table.lines("a"), vec!["pos|0|0|1", "pos|1|1|0", "tick"]);

    table.steer("a", Direction::Right);
    table.steer("b", Direction::Up);
    let outcome = arena.tick(&mut table.registry).expect("match should end");

    assert_eq!(outcome.winners, vec!["b"]);
    assert_eq!(outcome.losers, vec!["a"]);
    assert_eq!(outcome.ticks, 2);
    assert_eq!(arena.state(), ArenaState::Ended);
    assert_eq!(table.lines("a"), vec!["die|0", "pos|1|1|3", "tick", "lose|0|1"]);
    assert_eq!(table.lines("b"), vec!["die|0", "pos|1|1|3", "tick", "win|1|0"]);

    // A's trail is gone, B's stays.
    assert_eq!(arena.cell((0, 0)), None);
    assert_eq!(arena.cell((0, 1)), None);
    assert_eq!(arena.cell((1, 3)), Some(PlayerId(1)));

    // Ended arenas ignore further ticks.
    assert_eq!(arena.tick(&mut table.registry), None);
    assert!(table.lines("b").is_empty());
}

#[test]
fn test_match_end_takes_winner_off_the_board() {
    let mut table = Table::new(&["a", "b"]);
    let mut arena = table.start(&["a", "b"]);
    table.steer("a", Direction::Down);
    arena.tick(&mut table.registry);
    table.steer("a", Direction::Right);
    let outcome = arena.tick(&mut table.registry).expect("match should end");
    assert_eq!(outcome.winners, vec!["b"]);
    table.lines("b");

    let winner = table.registry.get_mut("b").unwrap();
    assert!(!winner.is_alive());
    assert_eq!(winner.handle_packet(ClientPacket::Chat("hi".into())), None);
    assert_eq!(winner.chat(), None);
    assert_eq!(table.lines("b"), vec!["error|ERROR_CHAT_NOT_ALIVE"]);
}

#[test]
fn test_simultaneous_entry_kills_both_regardless_of_order() {
    // a (0,0) → right, b (1,1) → up: both claim (1,0). c (2,2) → up survives.
    let mut names = vec!["a", "b", "c"];
    let mut rng = rand::rng();

    for _ in 0..10 {
        names.shuffle(&mut rng);
        let mut table = Table::new(&names);
        let mut arena = table.start(&["a", "b", "c"]);
        // Spawn order is fixed above; shuffle the order moves arrive in.
        for name in &names {
            let direction = match *name {
                "a" => Direction::Right,
                _ => Direction::Up,
            };
            table.steer(name, direction);
        }

        let outcome = arena.tick(&mut table.registry).expect("one survivor ends it");
        let mut losers = outcome.losers.clone();
        losers.sort();
        assert_eq!(losers, vec!["a", "b"]);
        assert_eq!(outcome.winners, vec!["c"]);
        assert_eq!(arena.cell((1, 0)), None);
    }
}

#[test]
fn test_simultaneous_entry_independent_of_participant_order() {
    // Same geometry with the participant list itself shuffled: whoever
    // spawns at (0,0) goes right, whoever spawns at (1,1) goes up.
    let mut rng = rand::rng();
    for _ in 0..10 {
        let mut order = vec!["a", "b", "c"];
        order.shuffle(&mut rng);
        let mut table = Table::new(&order);
        let mut arena = table.start(&order);

        table.steer(order[0], Direction::Right);
        table.steer(order[1], Direction::Up);
        table.steer(order[2], Direction::Up);

        let outcome = arena.tick(&mut table.registry).expect("one survivor ends it");
        assert_eq!(outcome.winners, vec![order[2].to_string()]);
        let peer_lines = table.lines(order[2]);
        assert!(peer_lines.contains(&"die|0|1".to_string()), "{peer_lines:?}");
    }
}

#[test]
fn test_lone_player_death_has_no_winner() {
    let mut table = Table::new(&["solo"]);
    let mut arena = table.start(&["solo"]);
    assert_eq!(arena.width(), 2);
    table.lines("solo");

    // Up twice on a 2×2 torus lands back on the spawn cell.
    assert_eq!(arena.tick(&mut table.registry), None);
    let outcome = arena.tick(&mut table.registry).expect("lone death ends it");

    assert!(outcome.winners.is_empty());
    assert_eq!(outcome.losers, vec!["solo"]);
    assert_eq!(table.lines("solo"), vec!["pos|0|0|1", "tick", "die|0", "tick", "lose|0|1"]);
    assert_eq!(table.registry.get("solo").unwrap().rating(), 1000.0);
}

#[test]
fn test_disconnect_sweep_kills_and_releases_trail() {
    let mut table = Table::new(&["a", "b", "c"]);
    let mut arena = table.start(&["a", "b", "c"]);
    arena.tick(&mut table.registry);
    table.lines("a");

    table.drop_connection("b");
    assert_eq!(arena.tick(&mut table.registry), None);

    assert_eq!(arena.alive_count(), 2);
    assert_eq!(arena.cell((1, 1)), None);
    assert_eq!(arena.cell((1, 0)), None);
    let lines = table.lines("a");
    assert_eq!(lines[0], "die|1");
    assert!(!lines.iter().any(|l| l.starts_with("pos|1|")));
}

#[test]
fn test_reconnect_does_not_resume_participation() {
    let mut table = Table::new(&["a", "b"]);
    let mut arena = table.start(&["a", "b"]);

    // b comes back on a new connection before the next tick.
    table.connect("b");
    let outcome = arena.tick(&mut table.registry).expect("b is out");

    assert_eq!(outcome.winners, vec!["a"]);
    assert_eq!(outcome.losers, vec!["b"]);
    // The new connection is not a participant and sees nothing from the
    // arena except its own result.
    assert_eq!(table.lines("b"), vec!["lose|0|1"]);
}

// =========================================================================
// Ratings
// =========================================================================

#[test]
fn test_match_end_updates_ratings_and_conserves_total() {
    let mut table = Table::new(&["a", "b", "c"]);
    table.registry.get_mut("c").unwrap().set_rating(1200.0);
    let mut arena = table.start(&["a", "b", "c"]);

    table.steer("a", Direction::Right);
    table.steer("b", Direction::Up);
    arena.tick(&mut table.registry).expect("ends");

    let total: f64 = ["a", "b", "c"]
        .iter()
        .map(|n| table.registry.get(n).unwrap().rating())
        .sum();
    assert!((total - 3200.0).abs() < 1e-9);
    assert!(table.registry.get("c").unwrap().rating() > 1200.0);
    // a and b tied for last.
    assert_eq!(
        table.registry.get("a").unwrap().rating(),
        table.registry.get("b").unwrap().rating()
    );
}

// =========================================================================
// Late join, chat, snapshot
// =========================================================================

#[test]
fn test_try_add_spawns_on_next_free_diagonal() {
    let mut table = Table::new(&["a", "b"]);
    let mut arena = table.start(&["a", "b"]);
    table.registry.insert(PlayerSession::new("c", "pw")).unwrap();
    table.connect("c");

    let id = arena.try_add("c", &mut table.registry).unwrap();
    assert_eq!(id, PlayerId(2));
    assert_eq!(arena.cell((2, 2)), Some(PlayerId(2)));
    assert_eq!(table.lines("c"), vec!["game|4|4|2"]);

    arena.tick(&mut table.registry);
    assert_eq!(table.lines("c"), vec!["pos|0|0|3", "pos|1|1|0", "pos|2|2|1", "tick"]);

    assert!(matches!(
        arena.try_add("c", &mut table.registry),
        Err(ArenaError::AlreadyJoined(..))
    ));
    assert!(matches!(
        arena.try_add("ghost", &mut table.registry),
        Err(ArenaError::UnknownSession(_))
    ));
}

#[test]
fn test_broadcast_chat_relays_to_participants() {
    let mut table = Table::new(&["a", "b"]);
    let arena = table.start(&["a", "b"]);
    table.lines("a");
    table.lines("b");

    arena.broadcast_chat("b", "hi there", &table.registry).unwrap();
    assert_eq!(table.lines("a"), vec!["message|1|hi there"]);
    assert_eq!(table.lines("b"), vec!["message|1|hi there"]);

    assert!(matches!(
        arena.broadcast_chat("zed", "x", &table.registry),
        Err(ArenaError::NotParticipant(..))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_shape() {
    let mut table = Table::new(&["a", "b"]);
    let mut arena = table.start(&["a", "b"]);
    table.steer("a", Direction::Down);
    table
        .registry
        .get_mut("b")
        .unwrap()
        .handle_packet(ClientPacket::Chat("gl".into()));
    arena.tick(&mut table.registry);

    let json = serde_json::to_value(arena.snapshot(&table.registry)).unwrap();
    assert_eq!(json["width"], 4);
    assert_eq!(json["tick"], 1);
    assert_eq!(json["players"][0]["name"], "a");
    assert_eq!(json["players"][0]["alive"], true);
    assert_eq!(json["players"][0]["pos"], serde_json::json!({"x": 0, "y": 1}));
    assert_eq!(
        json["players"][0]["moves"],
        serde_json::json!([{"x": 0, "y": 0}, {"x": 0, "y": 1}])
    );
    assert!(json["players"][0].get("chat").is_none());
    assert_eq!(json["players"][1]["chat"], "gl");

    tokio::time::advance(std::time::Duration::from_secs(5)).await;
    let json = serde_json::to_value(arena.snapshot(&table.registry)).unwrap();
    assert!(json["players"][1].get("chat").is_none());
}
