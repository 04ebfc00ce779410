//! Integration tests for the observer API endpoints.
//!
//! The router is driven through `tower::ServiceExt` without a TCP server,
//! but every request reaches a real snapshot cache and a real simulation
//! thread.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use simgate_core::config::{CacheConfig, ServletsConfig};
use simgate_core::{
    EventBus, HostControl, HostReport, IdentityRegistry, IntegrationSupervisor, LiveKind,
    MainThreadBridge, MethodRegistry, OperationTable, ParamSpec, ParamType, Reporter, SimError,
    Simulation, SnapshotCache, spawn_simulation,
};
use simgate_observer::{AppState, build_router};
use simgate_types::{DetailLevel, KeyId, ObjectKind, SimEvent};
use tower::ServiceExt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

struct Fighter {
    id: Uuid,
    name: String,
    health: i64,
}

struct Banner {
    name: String,
}

struct Arena {
    fighters: Vec<Fighter>,
    banners: Vec<Banner>,
}

impl Simulation for Arena {
    fn tick(&mut self, _tick: u64) {}

    fn drain_events(&mut self) -> Vec<SimEvent> {
        Vec::new()
    }
}

struct FighterKind;

impl LiveKind<Arena> for FighterKind {
    const KIND: ObjectKind = ObjectKind::new("fighter");
    type Live = Fighter;

    fn identify(live: &Fighter) -> KeyId {
        KeyId::Uuid(live.id)
    }

    fn parse_id(raw: &str) -> Result<KeyId, SimError> {
        Ok(KeyId::parse_uuid(raw)?)
    }

    fn resolve<'w>(world: &'w Arena, id: &KeyId) -> Option<&'w Fighter> {
        let uuid = id.as_uuid()?;
        world.fighters.iter().find(|fighter| fighter.id == uuid)
    }

    fn resolve_mut<'w>(world: &'w mut Arena, id: &KeyId) -> Option<&'w mut Fighter> {
        let uuid = id.as_uuid()?;
        world.fighters.iter_mut().find(|fighter| fighter.id == uuid)
    }

    fn enumerate(world: &Arena) -> Vec<&Fighter> {
        world.fighters.iter().collect()
    }

    fn capture(live: &Fighter, detail: DetailLevel) -> Value {
        match detail {
            DetailLevel::Basic => json!({ "name": live.name }),
            DetailLevel::Full => json!({ "name": live.name, "health": live.health }),
        }
    }
}

struct BannerKind;

impl LiveKind<Arena> for BannerKind {
    const KIND: ObjectKind = ObjectKind::new("banner");
    type Live = Banner;

    fn identify(live: &Banner) -> KeyId {
        KeyId::Name(live.name.clone())
    }

    fn parse_id(raw: &str) -> Result<KeyId, SimError> {
        Ok(KeyId::parse_name(raw)?)
    }

    fn resolve<'w>(world: &'w Arena, id: &KeyId) -> Option<&'w Banner> {
        world.banners.iter().find(|banner| KeyId::Name(banner.name.clone()) == *id)
    }

    fn resolve_mut<'w>(world: &'w mut Arena, id: &KeyId) -> Option<&'w mut Banner> {
        world.banners.iter_mut().find(|banner| KeyId::Name(banner.name.clone()) == *id)
    }

    fn enumerate(world: &Arena) -> Vec<&Banner> {
        world.banners.iter().collect()
    }

    fn capture(live: &Banner, _detail: DetailLevel) -> Value {
        json!({ "name": live.name })
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    router: Router,
    control: Arc<HostControl>,
    host: Option<JoinHandle<HostReport>>,
    alice: Uuid,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.control.request_stop();
        if let Some(host) = self.host.take() {
            host.join().unwrap();
        }
    }
}

fn fixture(deadline: Duration) -> Fixture {
    let bridge = Arc::new(MainThreadBridge::new(deadline, Reporter::log_only()));
    let mut identities = IdentityRegistry::new();
    identities.register::<FighterKind>().unwrap();
    identities.register::<BannerKind>().unwrap();

    let mut methods = MethodRegistry::new(&identities);
    methods
        .register::<FighterKind, _>(
            "heal",
            "Restore health",
            vec![ParamSpec::required("amount", ParamType::Integer)],
            |fighter: &mut Fighter, args| {
                fighter.health = fighter.health.saturating_add(args.i64("amount")?);
                Ok(json!(fighter.health))
            },
        )
        .unwrap();
    methods
        .register::<FighterKind, _>("taunt", "Always fails", vec![], |_fighter: &mut Fighter, _args| {
            Err(SimError::ExecutionFailed(String::from("the crowd is silent")))
        })
        .unwrap();
    methods
        .register::<FighterKind, _>("rest", "Holds the simulation thread", vec![], |_fighter: &mut Fighter, _args| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Value::Null)
        })
        .unwrap();

    let mut servlets = ServletsConfig::default();
    servlets.enabled.insert(String::from("banner"), false);
    let operations = OperationTable::build(&identities, &methods, &servlets);

    let mut supervisor = IntegrationSupervisor::new();
    supervisor.register("economy", || false);
    let integrations = supervisor.apply(&servlets);

    let cache = Arc::new(SnapshotCache::new(
        Arc::clone(&bridge),
        Arc::new(identities),
        Arc::new(methods),
        &CacheConfig::default(),
    ));

    let control = Arc::new(HostControl::new(10));
    let alice = Uuid::new_v4();
    let host = spawn_simulation(
        "arena-sim",
        Arc::clone(&bridge),
        Arc::new(EventBus::new()),
        Arc::clone(&control),
        move || Arena {
            fighters: vec![
                Fighter {
                    id: alice,
                    name: String::from("Alice"),
                    health: 10,
                },
                Fighter {
                    id: Uuid::new_v4(),
                    name: String::from("Bob"),
                    health: 20,
                },
            ],
            banners: vec![Banner {
                name: String::from("red"),
            }],
        },
    )
    .unwrap();

    let stats_bridge = Arc::clone(&bridge);
    let state = AppState::new(cache, operations)
        .with_integrations(integrations)
        .with_control(Arc::clone(&control))
        .with_bridge_stats(Arc::new(move || stats_bridge.stats()));

    Fixture {
        router: build_router(Arc::new(state)),
        control,
        host: Some(host),
        alice,
    }
}

async fn get(fixture: &Fixture, uri: &str) -> (StatusCode, Value) {
    send(fixture, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn invoke(fixture: &Fixture, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(fixture, request).await
}

async fn send(fixture: &Fixture, request: Request<Body>) -> (StatusCode, Value) {
    let response = fixture.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn list_returns_basic_snapshots_by_default() {
    let fixture = fixture(Duration::from_secs(2));
    let (status, json) = get(&fixture, "/api/fighter").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    let objects = json["objects"].as_array().unwrap();
    assert!(objects.iter().all(|object| object["detail"] == "basic"));
    assert!(objects.iter().all(|object| object["fields"].get("health").is_none()));
}

#[tokio::test]
async fn details_flag_selects_full_capture() {
    let fixture = fixture(Duration::from_secs(2));
    let uri = format!("/api/fighter/{}?details=true", fixture.alice);
    let (status, json) = get(&fixture, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"]["kind"], "fighter");
    assert_eq!(json["key"]["id"], fixture.alice.to_string());
    assert_eq!(json["detail"], "full");
    assert_eq!(json["fields"], json!({ "name": "Alice", "health": 10 }));
}

#[tokio::test]
async fn missing_object_is_404_and_malformed_id_is_400() {
    let fixture = fixture(Duration::from_secs(2));
    let (status, json) = get(&fixture, &format!("/api/fighter/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);

    let (status, _json) = get(&fixture, "/api/fighter/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_and_disabled_kinds_are_404() {
    let fixture = fixture(Duration::from_secs(2));
    let (status, _json) = get(&fixture, "/api/dragon").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _json) = get(&fixture, "/api/banner").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _json) = get(&fixture, "/api/banner/red").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoke_runs_method_and_returns_result() {
    let fixture = fixture(Duration::from_secs(2));
    let uri = format!("/api/fighter/{}/invoke", fixture.alice);
    let (status, json) = invoke(&fixture, &uri, &json!({ "method": "heal", "params": { "amount": 5 } })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["method"], "heal");
    assert_eq!(json["result"], 15);

    let (_status, json) = get(&fixture, &format!("/api/fighter/{}?details=true", fixture.alice)).await;
    assert_eq!(json["fields"]["health"], 15);
}

#[tokio::test]
async fn invoke_errors_map_to_statuses() {
    let fixture = fixture(Duration::from_secs(2));
    let uri = format!("/api/fighter/{}/invoke", fixture.alice);

    let (status, _json) = invoke(&fixture, &uri, &json!({ "method": "heal", "params": { "amount": "lots" } })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _json) = invoke(&fixture, &uri, &json!({ "method": "fly" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = invoke(&fixture, &uri, &json!({ "method": "taunt" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("the crowd is silent"));
}

#[tokio::test]
async fn slow_simulation_answers_504() {
    let fixture = fixture(Duration::from_millis(100));
    let uri = format!("/api/fighter/{}/invoke", fixture.alice);
    let (status, json) = invoke(&fixture, &uri, &json!({ "method": "rest" })).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["status"], 504);
}

#[tokio::test]
async fn operations_skip_disabled_kinds() {
    let fixture = fixture(Duration::from_secs(2));
    let (status, json) = get(&fixture, "/api/operations").await;
    assert_eq!(status, StatusCode::OK);
    // list + get + three invoke entries, all for the fighter kind
    assert_eq!(json["count"], 5);
    let operations = json["operations"].as_array().unwrap();
    assert!(operations.iter().all(|op| op["kind"] == "fighter"));
    assert!(operations.iter().any(|op| op["name"] == "fighter.invoke.heal"));
}

#[tokio::test]
async fn status_and_integrations() {
    let fixture = fixture(Duration::from_secs(2));
    let _listed = get(&fixture, "/api/fighter").await;

    let (status, json) = get(&fixture, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["host"]["paused"], false);
    assert!(json["bridge"]["submitted"].as_u64().unwrap() >= 1);

    let (status, json) = get(&fixture, "/api/integrations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["integrations"]["economy"], "not_found");
}

#[tokio::test]
async fn operator_pauses_resumes_and_repaces_the_host() {
    let fixture = fixture(Duration::from_secs(2));

    let (status, json) = invoke(&fixture, "/api/operator/pause", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["paused"], true);
    assert!(fixture.control.is_paused());

    // Reads keep working while ticks are paused.
    let (status, _json) = get(&fixture, "/api/fighter").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = invoke(&fixture, "/api/operator/resume", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["paused"], false);

    let (status, json) = invoke(&fixture, "/api/operator/speed", &json!({ "tick_interval_ms": 250 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["previous_interval_ms"], 10);
    assert_eq!(json["new_interval_ms"], 250);
    assert_eq!(fixture.control.tick_interval_ms(), 250);

    let (status, json) = invoke(&fixture, "/api/operator/speed", &json!({ "tick_interval_ms": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert_eq!(fixture.control.tick_interval_ms(), 250);
}
