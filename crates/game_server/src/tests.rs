//! Session manager tests: admission, lifecycle, command ordering, fault
//! containment and idle reclamation.

use crate::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strife_event_system::{
    async_trait, json, to_payload, EventError, EventHandler, EventKind, GameEvent, Payload, PlayerId, SessionId, Value,
};
use strife_game::{FixedDice, GamePhase, GameSnapshot, GameState, StateBroadcaster};

fn command(kind: EventKind, payload: Value) -> GameEvent {
    GameEvent::new(kind, to_payload(payload))
}

fn join(player: &str) -> GameEvent {
    command(EventKind::PlayerJoin, json!({ "player": player }))
}

async fn run(session: &GameSession, kind: EventKind, payload: Value) -> CommandResult {
    session
        .submit(command(kind, payload))
        .expect("command should be accepted")
        .outcome()
        .await
}

fn config(max_sessions: usize) -> ServerConfig {
    ServerConfig {
        max_sessions,
        ..ServerConfig::default()
    }
}

/// Alice (Challenger) and Bob (Defender) seated and the game started.
async fn start_duel(session: &GameSession) {
    for player in ["alice", "bob"] {
        assert_eq!(run(session, EventKind::PlayerJoin, json!({ "player": player })).await, Ok(()));
    }
    let picks = [("alice", "Aria", "CHALLENGER"), ("bob", "Brom", "DEFENDER")];
    for (player, character, archetype) in picks {
        let payload = json!({ "player": player, "character": character, "archetype": archetype });
        assert_eq!(run(session, EventKind::CharacterSelect, payload).await, Ok(()));
    }
    assert_eq!(run(session, EventKind::GameStart, json!({})).await, Ok(()));
}

fn has_log(snapshot: &GameSnapshot, needle: &str) -> bool {
    snapshot.logs.iter().any(|entry| entry.message.contains(needle))
}

// ----------------------------------------------------------------------------
// Admission
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_capacity_is_enforced_and_released_on_end() {
    let manager = create_manager_with_config(config(2));
    manager.create_session(SessionId::from("a")).await.unwrap();
    manager.create_session(SessionId::from("b")).await.unwrap();

    let refused = manager.create_session(SessionId::from("c")).await.unwrap_err();
    assert_eq!(refused, ServerError::CapacityExhausted { max: 2 });
    assert_eq!(manager.available_slots(), 0);

    manager.end_session(&SessionId::from("a")).await.unwrap();
    assert_eq!(manager.available_slots(), 1);
    manager.create_session(SessionId::from("c")).await.unwrap();

    let stats = manager.stats();
    assert_eq!(stats.live_sessions, 2);
    assert_eq!(stats.sessions_created, 3);
    assert_eq!(stats.sessions_ended, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_creation_never_exceeds_capacity() {
    let manager = create_manager_with_config(config(4));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            manager.create_session(SessionId::new(format!("s{}", i))).await
        }));
    }

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e, ServerError::CapacityExhausted { max: 4 }),
        }
    }
    assert_eq!(created, 4);
    assert_eq!(manager.session_count(), 4);
    assert_eq!(manager.available_slots(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_duplicate_ids_admit_one_session() {
    let manager = create_manager();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            manager.create_session(SessionId::from("same")).await
        }));
    }

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e, ServerError::DuplicateSession(SessionId::from("same"))),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(manager.available_slots(), 99);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_end_churn_respects_capacity() {
    let manager = create_manager_with_config(config(3));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            let id = SessionId::new(format!("w{}", worker));
            for _ in 0..20 {
                if manager.create_session(id.clone()).await.is_ok() {
                    assert!(manager.session_count() <= 3);
                    tokio::task::yield_now().await;
                    manager.end_session(&id).await.unwrap();
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(manager.session_count(), 0);
    assert_eq!(manager.available_slots(), 3);
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_after_end_reports_missing_session() {
    let manager = create_manager();
    let id = SessionId::from("gone");
    let session = manager.create_session(id.clone()).await.unwrap();
    manager.end_session(&id).await.unwrap();

    let rejected = manager.submit(&id, join("alice")).unwrap_err();
    assert_eq!(rejected.error, ServerError::SessionNotFound(id.clone()));
    assert!(rejected.event.is_canceled());
    assert_eq!(rejected.event.error(), Some("Session not found: gone"));

    // A handle kept from before the end is refused as well.
    let rejected = session.submit(join("alice")).unwrap_err();
    assert_eq!(rejected.error, ServerError::SessionNotFound(id.clone()));
    assert!(!session.is_active());

    assert_eq!(
        manager.end_session(&id).await,
        Err(ServerError::SessionNotFound(id))
    );
}

#[tokio::test]
async fn test_end_finishes_in_flight_command_and_rejects_queued() {
    let manager = create_manager();
    let id = SessionId::from("draining");
    let session = manager.create_session(id.clone()).await.unwrap();

    let guard = session.state().await;
    let in_flight = session.submit(join("alice")).unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    let queued = session.submit(join("bob")).unwrap();

    let ending = {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::spawn(async move { manager.end_session(&id).await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    drop(guard);

    assert_eq!(in_flight.outcome().await, Ok(()));
    assert!(queued.outcome().await.is_err());
    ending.await.unwrap().unwrap();

    let state = session.state().await;
    assert_eq!(state.player_in_order, vec![PlayerId::from("alice")]);
    assert!(manager.get_session(&id).is_none());
}

#[tokio::test]
async fn test_concurrent_ends_hold_the_slot_until_the_worker_exits() {
    let manager = create_manager_with_config(config(1));
    let id = SessionId::from("one");
    let session = manager.create_session(id.clone()).await.unwrap();

    let guard = session.state().await;
    let in_flight = session.submit(join("alice")).unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    let enders: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            tokio::spawn(async move { manager.end_session(&id).await })
        })
        .collect();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    // Neither end may release the permit while the command is still pending.
    assert!(enders.iter().all(|ender| !ender.is_finished()));
    assert_eq!(manager.available_slots(), 0);
    assert!(matches!(
        manager.create_session(SessionId::from("two")).await,
        Err(ServerError::CapacityExhausted { .. })
    ));

    drop(guard);
    assert_eq!(in_flight.outcome().await, Ok(()));

    let mut ended = 0;
    for ender in enders {
        match ender.await.unwrap() {
            Ok(()) => ended += 1,
            Err(e) => assert_eq!(e, ServerError::SessionNotFound(id.clone())),
        }
    }
    assert_eq!(ended, 1);
    assert_eq!(manager.stats().sessions_ended, 1);
    assert_eq!(manager.available_slots(), 1);
    assert!(manager.create_session(SessionId::from("two")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_reclaim_racing_explicit_end_waits_for_in_flight_command() {
    let manager = create_manager_with_config(ServerConfig {
        max_sessions: 1,
        idle_timeout_secs: 60,
        ..ServerConfig::default()
    });
    let id = SessionId::from("stale");
    let session = manager.create_session(id.clone()).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    let guard = session.state().await;
    let in_flight = session.submit(join("alice")).unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    let reclaim = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.reclaim_idle().await })
    };
    let ending = {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::spawn(async move { manager.end_session(&id).await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert!(!reclaim.is_finished());
    assert!(!ending.is_finished());
    assert_eq!(manager.available_slots(), 0);

    drop(guard);
    assert_eq!(in_flight.outcome().await, Ok(()));

    let reclaimed = reclaim.await.unwrap();
    let ended = ending.await.unwrap();
    assert_eq!(reclaimed.len() + usize::from(ended.is_ok()), 1);
    let stats = manager.stats();
    assert_eq!(stats.sessions_ended, 1);
    assert_eq!(stats.sessions_reclaimed, reclaimed.len() as u64);
    assert_eq!(stats.available_slots, 1);
    assert_eq!(session.state().await.player_in_order, vec![PlayerId::from("alice")]);
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() {
    let manager = create_manager_with_config(ServerConfig {
        queue_capacity: 1,
        ..ServerConfig::default()
    });
    let session = manager.create_session(SessionId::from("busy")).await.unwrap();

    let guard = session.state().await;
    let first = session.submit(join("p1")).unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    let second = session.submit(join("p2")).unwrap();
    let rejected = session.submit(join("p3")).unwrap_err();

    assert!(matches!(rejected.error, ServerError::QueueFault(_)));
    assert!(rejected.event.is_canceled());
    assert!(rejected.event.error().is_some());
    drop(guard);

    assert_eq!(first.outcome().await, Ok(()));
    assert_eq!(second.outcome().await, Ok(()));
    let stats = session.stats(tokio::time::Instant::now());
    assert_eq!(stats.commands_processed, 2);
    assert_eq!(stats.commands_rejected, 1);
}

#[tokio::test]
async fn test_shutdown_ends_every_session_and_refuses_new_ones() {
    let manager = create_manager();
    for id in ["x", "y", "z"] {
        manager.create_session(SessionId::from(id)).await.unwrap();
    }

    manager.shutdown_all().await;

    assert_eq!(manager.session_count(), 0);
    assert_eq!(manager.available_slots(), 100);
    assert!(manager.shutdown_state().is_shutdown_complete());
    assert_eq!(
        manager.create_session(SessionId::from("late")).await.unwrap_err(),
        ServerError::ShuttingDown
    );
}

// ----------------------------------------------------------------------------
// Ordering and exclusion
// ----------------------------------------------------------------------------

/// Records any overlap between two runs of the same listener.
struct Exclusive {
    in_flight: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler<GameState> for Exclusive {
    async fn handle(&self, _event: &mut GameEvent, _state: &mut GameState) -> Result<Option<Payload>, EventError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(None)
    }

    fn handler_name(&self) -> &str {
        "exclusive"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commands_run_one_at_a_time_in_submission_order() {
    let manager = create_manager();
    let session = manager.create_session(SessionId::from("ordered")).await.unwrap();

    let overlaps = Arc::new(AtomicUsize::new(0));
    session.state().await.dispatcher().register(
        EventKind::PlayerJoin,
        Arc::new(Exclusive {
            in_flight: Arc::new(AtomicUsize::new(0)),
            overlaps: Arc::clone(&overlaps),
        }),
        0,
    );

    let mut submitters = Vec::new();
    for submitter in 0..8 {
        let session = Arc::clone(&session);
        submitters.push(tokio::spawn(async move {
            let mut receipts = Vec::new();
            for n in 0..10 {
                receipts.push(session.submit(join(&format!("p{}-{}", submitter, n))).unwrap());
            }
            for receipt in receipts {
                assert_eq!(receipt.outcome().await, Ok(()));
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let order = session.snapshot().await.player_in_order;
    assert_eq!(order.len(), 80);
    for submitter in 0..8 {
        let own: Vec<String> = order
            .iter()
            .map(PlayerId::as_str)
            .filter(|player| player.starts_with(&format!("p{}-", submitter)))
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = (0..10).map(|n| format!("p{}-{}", submitter, n)).collect();
        assert_eq!(own, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sessions_progress_independently() {
    let manager = create_manager();
    let busy = manager.create_session(SessionId::from("busy")).await.unwrap();
    let free = manager.create_session(SessionId::from("free")).await.unwrap();

    let guard = busy.state().await;
    let blocked = busy.submit(join("alice")).unwrap();

    assert_eq!(run(&free, EventKind::PlayerJoin, json!({ "player": "bob" })).await, Ok(()));
    drop(guard);
    assert_eq!(blocked.outcome().await, Ok(()));
}

// ----------------------------------------------------------------------------
// Fault containment
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_validation_errors_are_reported_and_session_continues() {
    let manager = create_manager();
    let session = manager.create_session(SessionId::from("strict")).await.unwrap();

    let missing = run(&session, EventKind::PlayerJoin, json!({})).await.unwrap_err();
    assert!(missing.contains("requires a 'player' string"));

    let unsupported = run(&session, EventKind::DiceRoll, json!({})).await.unwrap_err();
    assert!(unsupported.contains("unsupported command DICE_ROLL"));

    let unknown = run(&session, EventKind::PlayCard, json!({ "player": "ghost", "card": "ace" }))
        .await
        .unwrap_err();
    assert_eq!(unknown, "Unknown player: ghost");

    let archetype = json!({ "player": "ghost", "character": "G", "archetype": "WIZARD" });
    assert!(run(&session, EventKind::CharacterSelect, archetype).await.is_err());

    assert_eq!(run(&session, EventKind::PlayerJoin, json!({ "player": "alice" })).await, Ok(()));
    assert_eq!(session.snapshot().await.player_in_order, vec![PlayerId::from("alice")]);
}

#[tokio::test]
async fn test_heal_command_requires_an_amount() {
    let manager = create_manager();
    let session = manager.create_session(SessionId::from("heals")).await.unwrap();
    start_duel(&session).await;

    let missing = run(&session, EventKind::PreHeal, json!({ "target": "bob" })).await.unwrap_err();
    assert!(missing.contains("requires an 'amount' count"));
    assert!(!has_log(&session.snapshot().await, "recovered"));

    let negative = run(&session, EventKind::PreHeal, json!({ "target": "bob", "amount": -5 })).await;
    assert!(negative.is_err());

    assert_eq!(run(&session, EventKind::PreHeal, json!({ "target": "bob", "amount": 5 })).await, Ok(()));
    assert!(has_log(&session.snapshot().await, "recovered"));
}

#[derive(Debug, Default)]
struct FailsOnce {
    fired: AtomicBool,
}

impl StateBroadcaster for FailsOnce {
    fn broadcast(&self, _session_id: &SessionId, _snapshot: GameSnapshot) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            panic!("snapshot sink unavailable");
        }
    }
}

#[tokio::test]
async fn test_fatal_fault_releases_lock_and_session_keeps_working() {
    let manager = Arc::new(GameManager::new(ServerConfig::default()).with_broadcaster(Arc::new(FailsOnce::default())));
    let session = manager.create_session(SessionId::from("faulty")).await.unwrap();

    for player in ["alice", "bob"] {
        assert_eq!(run(&session, EventKind::PlayerJoin, json!({ "player": player })).await, Ok(()));
    }
    for (player, character) in [("alice", "Aria"), ("bob", "Brom")] {
        let payload = json!({ "player": player, "character": character, "archetype": "BALANCE" });
        assert_eq!(run(&session, EventKind::CharacterSelect, payload).await, Ok(()));
    }

    let fault = run(&session, EventKind::GameStart, json!({})).await.unwrap_err();
    assert!(fault.starts_with("Fatal session fault"));
    assert!(fault.contains("snapshot sink unavailable"));
    assert!(session.is_active());
    assert_eq!(session.stats(tokio::time::Instant::now()).faults, 1);

    assert_eq!(run(&session, EventKind::TurnEnd, json!({ "player": "alice" })).await, Ok(()));
    assert_eq!(session.snapshot().await.current_turn, Some(PlayerId::from("bob")));
}

// ----------------------------------------------------------------------------
// Routing
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_commands_drive_a_full_round() {
    let manager = Arc::new(GameManager::new(ServerConfig::default()).with_dice(Arc::new(FixedDice(2))));
    let session = manager.create_session(SessionId::from("duel")).await.unwrap();
    start_duel(&session).await;

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.phase, GamePhase::InProgress);
    assert_eq!(snapshot.current_turn, Some(PlayerId::from("alice")));

    let attack = json!({ "attacker": "alice", "defender": "bob" });
    assert_eq!(run(&session, EventKind::PreAttack, attack).await, Ok(()));
    let heal = json!({ "target": "bob", "amount": 50 });
    assert_eq!(run(&session, EventKind::PreHeal, heal).await, Ok(()));

    let snapshot = session.snapshot().await;
    assert!(has_log(&snapshot, "Brom took 80 damage, remaining HP: 920"));
    assert!(has_log(&snapshot, "Brom recovered 50 HP, current HP: 970"));

    assert_eq!(run(&session, EventKind::TurnEnd, json!({ "player": "alice" })).await, Ok(()));
    assert_eq!(run(&session, EventKind::TurnEnd, json!({ "player": "bob" })).await, Ok(()));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.round, 2);
    assert_eq!(snapshot.current_turn, Some(PlayerId::from("alice")));

    let out_of_turn = run(&session, EventKind::TurnEnd, json!({ "player": "bob" })).await;
    assert_eq!(out_of_turn, Err("It is not bob's turn".to_string()));
}

#[tokio::test]
async fn test_character_select_attaches_named_traits() {
    let manager = create_manager();
    let session = manager.create_session(SessionId::from("traits")).await.unwrap();
    assert_eq!(run(&session, EventKind::PlayerJoin, json!({ "player": "alice" })).await, Ok(()));

    let payload = json!({
        "player": "alice",
        "character": "Aria",
        "archetype": "beast",
        "traits": ["KEEN_EYE", "quickened"]
    });
    assert_eq!(run(&session, EventKind::CharacterSelect, payload).await, Ok(()));

    let state = session.state().await;
    assert_eq!(state.traits_of(&PlayerId::from("alice")).len(), 2);

    drop(state);
    let bad = json!({ "player": "alice", "character": "Aria2", "archetype": "BEAST", "traits": ["FLYING"] });
    assert!(run(&session, EventKind::CharacterSelect, bad).await.is_err());
}

#[tokio::test]
async fn test_inbound_command_routes_by_session_id() {
    let manager = create_manager();
    manager.create_session(SessionId::from("table-1")).await.unwrap();

    let command: InboundCommand = serde_json::from_value(json!({
        "session_id": "table-1",
        "kind": "PLAYER_JOIN",
        "payload": { "player": "alice" }
    }))
    .unwrap();
    assert_eq!(manager.submit_command(command).unwrap().outcome().await, Ok(()));

    let stray: InboundCommand = serde_json::from_value(json!({
        "session_id": "table-9",
        "kind": "PLAYER_JOIN",
        "payload": { "player": "alice" }
    }))
    .unwrap();
    let rejected = manager.submit_command(stray).unwrap_err();
    assert_eq!(rejected.error, ServerError::SessionNotFound(SessionId::from("table-9")));
    assert_eq!(rejected.event.get_str("player"), Some("alice"));
}

#[tokio::test]
async fn test_team_system_toggles_through_session() {
    let manager = create_manager();
    let session = manager.create_session(SessionId::from("teams")).await.unwrap();

    assert!(session.team_system_activate().await);
    assert!(!session.team_system_activate().await);
    assert!(session.snapshot().await.is_team_system_active);
    assert!(session.team_system_deactivate().await);
    assert!(!session.team_system_deactivate().await);
}

// ----------------------------------------------------------------------------
// Idle reclamation
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reclaim_ends_only_sessions_past_the_timeout() {
    let manager = create_manager_with_config(ServerConfig {
        idle_timeout_secs: 3600,
        ..ServerConfig::default()
    });
    let old = manager.create_session(SessionId::from("old")).await.unwrap();
    tokio::time::advance(Duration::from_secs(1800)).await;
    manager.create_session(SessionId::from("young")).await.unwrap();

    let at_threshold = old.created_at() + Duration::from_secs(3600);
    assert!(manager.reclaim_idle_at(at_threshold).await.is_empty());

    tokio::time::advance(Duration::from_secs(1801)).await;
    let reclaimed = manager.reclaim_idle().await;

    assert_eq!(reclaimed, vec![SessionId::from("old")]);
    assert!(!old.is_active());
    assert!(manager.get_session(&SessionId::from("young")).is_some());
    assert_eq!(manager.stats().sessions_reclaimed, 1);
    assert_eq!(manager.available_slots(), 99);
}

#[tokio::test(start_paused = true)]
async fn test_idle_sweep_reclaims_and_stops_on_shutdown() {
    let manager = create_manager_with_config(ServerConfig {
        idle_timeout_secs: 600,
        sweep_interval_secs: 300,
        ..ServerConfig::default()
    });
    manager.create_session(SessionId::from("stale")).await.unwrap();
    let sweep = manager.start_idle_sweep().expect("sweep enabled");

    tokio::time::sleep(Duration::from_secs(1000)).await;
    assert_eq!(manager.session_count(), 0);
    assert_eq!(manager.stats().sessions_reclaimed, 1);

    manager.shutdown_state().initiate_shutdown();
    sweep.await.unwrap();
}

#[test]
fn test_sweep_disabled_with_zero_interval() {
    let manager = create_manager_with_config(ServerConfig {
        sweep_interval_secs: 0,
        ..ServerConfig::default()
    });
    assert!(manager.start_idle_sweep().is_none());
}

#[test]
fn test_config_validation() {
    assert!(ServerConfig::default().validate().is_ok());
    assert!(config(0).validate().is_err());
    let no_queue = ServerConfig {
        queue_capacity: 0,
        ..ServerConfig::default()
    };
    assert!(no_queue.validate().is_err());
}
