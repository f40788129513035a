//! Cross-component tests driving the orchestrator through its façade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use world_core::{
    BroadcastFilter, CharacterId, Clock, Coordinates, KeyEcho, ManualClock, MapId,
    MapInstanceKind, Packet, PersistenceGateway, SessionKickFilter, ShutdownState, SyncNotice,
};

use crate::error::WorldError;
use crate::maps::InstanceBag;
use crate::rng::RandomService;
use crate::session::{CharacterField, Session};
use crate::sync::SyncBridge;
use crate::test_support::{drain, test_record, TestGateway};
use crate::world::WorldContext;

struct TestWorld {
    context: Arc<WorldContext>,
    gateway: Arc<TestGateway>,
    clock: Arc<ManualClock>,
}

fn settings_map() -> HashMap<String, String> {
    [
        ("node_group", "alpha"),
        ("channel_id", "1"),
        ("rate_xp", "5"),
        ("rate_drop", "3"),
        ("rate_gold", "2"),
        ("max_gold", "1000000000"),
        ("max_level", "99"),
        ("refresh_timeout_secs", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

async fn build_world_with_channel(
    map_ids: &[i16],
    channel: broadcast::Sender<SyncNotice>,
) -> TestWorld {
    let gateway = Arc::new(TestGateway::with_maps(map_ids));
    let clock = Arc::new(ManualClock::new());
    let context = WorldContext::bootstrap(
        &settings_map(),
        gateway.clone() as Arc<dyn PersistenceGateway>,
        Arc::new(KeyEcho),
        clock.clone() as Arc<dyn Clock>,
        Arc::new(RandomService::with_seed(42)),
        channel,
        ShutdownState::new(),
    )
    .await
    .expect("bootstrap should succeed");
    TestWorld {
        context,
        gateway,
        clock,
    }
}

async fn build_world(map_ids: &[i16]) -> TestWorld {
    build_world_with_channel(map_ids, SyncBridge::standalone_channel()).await
}

/// Registers a session and walks it onto the persistent instance of `map_id`.
async fn join(
    world: &TestWorld,
    id: i64,
    name: &str,
    map_id: i16,
) -> (Arc<Session>, mpsc::UnboundedReceiver<Packet>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Arc::new(Session::new(test_record(id, name), tx));
    world.context.register_session(session.clone());
    let instance = world
        .context
        .find_persistent_instance_of(MapId(map_id))
        .expect("persistent instance should exist");
    world
        .context
        .change_map_instance(CharacterId(id), instance.id(), Coordinates::new(50, 50))
        .await
        .expect("transition should succeed");
    drain(&mut rx);
    (session, rx)
}

async fn wait_revive_settled(session: &Session) {
    for _ in 0..400 {
        if !session.revive_pending() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("revive countdown never settled");
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_without_map_definitions_is_fatal() {
    let gateway = Arc::new(TestGateway::new());
    let result = WorldContext::bootstrap(
        &settings_map(),
        gateway as Arc<dyn PersistenceGateway>,
        Arc::new(KeyEcho),
        Arc::new(ManualClock::new()) as Arc<dyn Clock>,
        Arc::new(RandomService::with_seed(1)),
        SyncBridge::standalone_channel(),
        ShutdownState::new(),
    )
    .await;
    assert!(matches!(result, Err(WorldError::NoMapDefinitions)));
}

#[tokio::test(flavor = "multi_thread")]
async fn transition_resynchronizes_and_notifies_occupants() {
    let world = build_world(&[1]).await;
    let (_ada, mut ada_rx) = join(&world, 1, "Ada", 1).await;

    // Grace enters the same instance after Ada.
    let (tx, mut grace_rx) = mpsc::unbounded_channel();
    let grace = Arc::new(Session::new(test_record(2, "Grace"), tx));
    world.context.register_session(grace.clone());
    let instance = world
        .context
        .find_persistent_instance_of(MapId(1))
        .expect("persistent instance should exist");
    world
        .context
        .change_map_instance(CharacterId(2), instance.id(), Coordinates::new(10, 10))
        .await
        .expect("transition should succeed");

    let to_grace = drain(&mut grace_rx);
    assert!(to_grace
        .iter()
        .any(|p| matches!(p, Packet::CharacterInfo { name, .. } if name == "Grace")));
    assert!(to_grace
        .iter()
        .any(|p| matches!(p, Packet::MapEntered { map_id, .. } if *map_id == MapId(1))));
    // Ada shows up in Grace's nearby-entity set.
    assert!(to_grace
        .iter()
        .any(|p| matches!(p, Packet::EntityIn { name, .. } if name == "Ada")));
    // Ada sees Grace arrive.
    assert!(drain(&mut ada_rx)
        .iter()
        .any(|p| matches!(p, Packet::EntityIn { name, .. } if name == "Grace")));
}

#[tokio::test(flavor = "multi_thread")]
async fn stored_coordinates_update_only_on_persistent_entry() {
    let world = build_world(&[1, 5]).await;
    let (session, _rx) = join(&world, 1, "Ada", 1).await;

    let generated = world
        .context
        .create_instance(MapId(5), MapInstanceKind::Generated, false, InstanceBag::default())
        .await
        .expect("create should succeed");
    world
        .context
        .change_map_instance(CharacterId(1), generated.id(), Coordinates::new(3, 4))
        .await
        .expect("transition should succeed");
    {
        let character = session.character().await;
        assert_eq!(character.map_id, MapId(1));
        assert_eq!(character.position, Coordinates::new(3, 4));
    }

    let persistent = world
        .context
        .find_persistent_instance_of(MapId(5))
        .expect("persistent instance should exist");
    world
        .context
        .change_map_instance(CharacterId(1), persistent.id(), Coordinates::new(7, 8))
        .await
        .expect("transition should succeed");
    let character = session.character().await;
    assert_eq!(character.map_id, MapId(5));
    assert_eq!((character.map_x, character.map_y), (7, 8));
}

#[tokio::test(flavor = "multi_thread")]
async fn persistent_auto_revive_moves_to_scattered_anchor() {
    let world = build_world(&[1]).await;
    let (session, _rx) = join(&world, 1, "Ada", 1).await;
    session.character_mut().await.set_field(CharacterField::Hp, 0);

    world
        .context
        .request_revive(CharacterId(1))
        .expect("revive request should start");
    world.clock.advance(30);
    wait_revive_settled(&session).await;

    let character = session.character().await;
    assert_eq!(character.hp, 1);
    assert_eq!(character.mp, 1);
    // Level 30 is above the penalty threshold: dignity drops by the level.
    assert_eq!(character.dignity, 70);
    // The respawn anchor is (50, 50); scatter stays within three cells.
    assert!((character.position.x - 50).abs() <= 3);
    assert!((character.position.y - 50).abs() <= 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn second_death_during_pending_countdown_is_ignored() {
    let world = build_world(&[1]).await;
    let (session, _rx) = join(&world, 1, "Ada", 1).await;
    session.character_mut().await.set_field(CharacterField::Hp, 0);

    world
        .context
        .request_revive(CharacterId(1))
        .expect("revive request should start");
    world
        .context
        .request_revive(CharacterId(1))
        .expect("second request is accepted but ignored");

    world.clock.advance(30);
    wait_revive_settled(&session).await;

    // One countdown ran, one penalty applied.
    assert_eq!(session.character().await.dignity, 70);
    assert_eq!(world.clock.ticks_claimed(), 30);
}

#[tokio::test(flavor = "multi_thread")]
async fn challenge_revive_consumes_lives_until_terminal() {
    let world = build_world(&[1, 5]).await;
    let (ada, _ada_rx) = join(&world, 1, "Ada", 1).await;
    let (grace, mut grace_rx) = join(&world, 2, "Grace", 1).await;

    let challenge = world
        .context
        .create_instance(
            MapId(5),
            MapInstanceKind::TimedChallenge,
            false,
            InstanceBag::new(2),
        )
        .await
        .expect("create should succeed");
    for id in [1, 2] {
        world
            .context
            .change_map_instance(CharacterId(id), challenge.id(), Coordinates::new(5, 5))
            .await
            .expect("transition should succeed");
    }

    // First death spends the spare life: back to 1/1 in place.
    ada.character_mut().await.set_field(CharacterField::Hp, 0);
    world
        .context
        .request_revive(CharacterId(1))
        .expect("revive request should start");
    world.clock.advance(30);
    wait_revive_settled(&ada).await;
    assert_eq!(ada.character().await.hp, 1);
    assert!(challenge.bag().is_marked_dead(CharacterId(1)));
    assert_eq!(
        ada.current_instance(),
        Some(challenge.id()),
        "challenge revive stays in place"
    );
    // Everyone on the instance sees the comeback and its visual.
    let to_grace = drain(&mut grace_rx);
    assert!(to_grace
        .iter()
        .any(|p| matches!(p, Packet::Revived { character_id } if *character_id == CharacterId(1))));
    assert!(to_grace
        .iter()
        .any(|p| matches!(p, Packet::Effect { character_id, .. } if *character_id == CharacterId(1))));

    // Second death finds no spendable life: terminal 0/0 for this run.
    grace.character_mut().await.set_field(CharacterField::Hp, 0);
    world
        .context
        .request_revive(CharacterId(2))
        .expect("revive request should start");
    world.clock.advance(30);
    wait_revive_settled(&grace).await;
    let character = grace.character().await;
    assert_eq!((character.hp, character.mp), (0, 0));
    assert!(!challenge.bag().is_marked_dead(CharacterId(2)));
}

#[tokio::test(flavor = "multi_thread")]
async fn announcement_task_is_registered_exactly_once() {
    let world = build_world(&[1]).await;
    world.context.start(&[]);
    // A second start attempt must not double any task frequency.
    world.context.start(&[]);
    assert_eq!(
        world.context.scheduler().registrations_named("announcement"),
        1
    );
    assert_eq!(world.context.scheduler().registrations_named("save-all"), 1);
    world.context.stop().await;
    assert!(world.context.shutdown.is_settled());
}

#[tokio::test(flavor = "multi_thread")]
async fn facade_refresh_without_echo_times_out() {
    let channel = SyncBridge::standalone_channel();
    // Keep the channel alive without running any receive loop.
    let _keep_open = channel.subscribe();
    let world = build_world_with_channel(&[1], channel).await;

    let err = world.context.on_bazaar_changed(42).await.unwrap_err();
    assert!(matches!(err, WorldError::RefreshTimeout { id: 42, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn facade_refresh_round_trip_reconciles_mirror() {
    let world = build_world(&[1]).await;
    world.context.start(&[]);
    world.gateway.insert_bazaar(world_core::BazaarListing {
        listing_id: 9,
        seller_id: CharacterId(1),
        seller_name: "Ada".to_string(),
        item_id: 100,
        price: 250,
        amount: 2,
    });

    world
        .context
        .on_bazaar_changed(9)
        .await
        .expect("round trip should complete");
    assert!(world.context.mirrors().bazaar_listing(9).await.is_some());
    world.context.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn kick_filter_matches_by_account_only() {
    let world = build_world(&[1]).await;
    let (ada, _ada_rx) = join(&world, 1, "Ada", 1).await;
    let (grace, _grace_rx) = join(&world, 2, "Grace", 1).await;

    world
        .context
        .on_session_kicked(&SessionKickFilter::by_account("acct-Ada"))
        .await;
    assert!(!ada.is_connected());
    assert!(grace.is_connected());

    // An empty filter matches nothing.
    world
        .context
        .on_session_kicked(&SessionKickFilter::default())
        .await;
    assert!(grace.is_connected());
}

#[tokio::test(flavor = "multi_thread")]
async fn save_all_persists_every_connected_character() {
    let world = build_world(&[1]).await;
    join(&world, 1, "Ada", 1).await;
    join(&world, 2, "Grace", 1).await;

    world.context.save_all().await.expect("save should succeed");
    let saved = world.gateway.saved_characters();
    assert!(saved.contains(&CharacterId(1)));
    assert!(saved.contains(&CharacterId(2)));
}

#[tokio::test(flavor = "multi_thread")]
async fn mail_reload_pings_sessions_with_unread_mail() {
    let world = build_world(&[1]).await;
    let (_ada, mut ada_rx) = join(&world, 1, "Ada", 1).await;
    let (_grace, mut grace_rx) = join(&world, 2, "Grace", 1).await;

    world.gateway.set_mail(vec![world_core::MailRecord {
        mail_id: 1,
        recipient_id: CharacterId(1),
        title: "hello".to_string(),
        is_read: false,
    }]);
    world
        .context
        .reload_mail()
        .await
        .expect("reload should succeed");

    assert!(drain(&mut ada_rx)
        .iter()
        .any(|p| matches!(p, Packet::MailNotice { unread: 1 })));
    assert!(drain(&mut grace_rx)
        .iter()
        .all(|p| !matches!(p, Packet::MailNotice { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_item_sweep_notifies_the_owner() {
    let world = build_world(&[1]).await;
    let (session, mut rx) = join(&world, 1, "Ada", 1).await;
    session.character_mut().await.transient_items = vec![crate::session::TransientItem {
        item_id: 77,
        expires_at: chrono::Utc::now() - chrono::Duration::seconds(1),
    }];

    world
        .context
        .sweep_expired_items()
        .await
        .expect("sweep should succeed");

    assert!(session.character().await.transient_items.is_empty());
    assert!(drain(&mut rx)
        .iter()
        .any(|p| matches!(p, Packet::Info { text } if text.contains("ITEM_TIMEOUT"))));
}

#[tokio::test(flavor = "multi_thread")]
async fn cross_node_whisper_reaches_only_the_named_target() {
    let world = build_world(&[1]).await;
    let (_ada, mut ada_rx) = join(&world, 1, "Ada", 1).await;
    let (_grace, mut grace_rx) = join(&world, 2, "Grace", 1).await;

    let envelope = world_core::CrossNodeEnvelope {
        origin_group: "alpha".to_string(),
        sender: "Grace".to_string(),
        recipient: world_core::Recipient::Name("Ada".to_string()),
        text: "psst".to_string(),
        origin_channel: 2,
        kind: world_core::MessageKind::Whisper,
    };
    world.context.on_cross_node_message(&envelope).await;

    let to_ada = drain(&mut ada_rx);
    // Delivered with the cross-channel annotation (origin channel 2 != 1).
    assert!(to_ada
        .iter()
        .any(|p| matches!(p, Packet::Say { text, .. } if text.contains("psst") && text.contains("CHANNEL_TAG"))));
    assert!(drain(&mut grace_rx).is_empty());

    // Envelopes for another node group are dropped.
    let foreign = world_core::CrossNodeEnvelope {
        origin_group: "beta".to_string(),
        ..envelope
    };
    world.context.on_cross_node_message(&foreign).await;
    assert!(drain(&mut ada_rx).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn disposing_an_instance_detaches_it_before_teardown() {
    let world = build_world(&[1, 5]).await;
    let instance = world
        .context
        .create_instance(MapId(5), MapInstanceKind::Generated, false, InstanceBag::default())
        .await
        .expect("create should succeed");
    let id = instance.id();

    assert!(world.context.remove_instance(id));
    assert!(world.context.find_instance(id).is_none());
    // Broadcasting through a stale handle is a silent no-op.
    instance.broadcast(
        Packet::Message {
            text: "late".to_string(),
        },
        BroadcastFilter::Everyone,
    );
}
