//! Backend protocol tests
//!
//! Moon and Aurora sessions run against a local axum server that imitates both
//! vendor APIs: password login, paged logbook listing, sync cursors, climb
//! lookups, and transient 503s.

use axum::extract::{Form, Path, Query, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use boardlog::boards::{BoardRegistry, Credentials, Secret};
use boardlog::config::{Config, HumanDuration};
use boardlog::error::BoardError;
use boardlog::grades::{GradeScale, GradeTables};
use boardlog::http::{HttpClient, RetryPolicy};
use boardlog::logbook::{Aggregator, LogbookEntry, RecordPolicy};
use boardlog::sink::{SinkOptions, write_logbook};
use chrono::NaiveDate;
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PASSWORD: &str = "correct horse";
const MOON_TOKEN: &str = "moon-token";
const AURORA_TOKEN: &str = "aurora-token";
const EPOCH: &str = "1970-01-01 00:00:00.000000";
const SECOND_CURSOR: &str = "2023-05-02 10:00:00.000000";

#[derive(Default)]
struct MockState {
    moon_pages: AtomicU32,
    /// 503 responses still to serve for Moon page 2
    moon_failures: AtomicU32,
    /// Leave "Total" out of Moon pages
    moon_without_total: AtomicBool,
    /// Serve an unparseable date for the second Moon entry
    moon_bad_date: AtomicBool,
    setup_ids: Mutex<Vec<Option<String>>>,
    login_hosts: Mutex<Vec<String>>,
    sync_cursors: Mutex<Vec<String>>,
    climb_lookups: AtomicU32,
}

type Shared = Arc<MockState>;

fn moon_fixture() -> Vec<Value> {
    vec![
        json!({
            "Problem": {"Name": "Hard Rain", "Grade": "6B+"},
            "DateClimbed": "2023-05-01T00:00:00",
            "NumberOfTries": 3,
            "Angle": 40
        }),
        json!({
            "Problem": {"Name": "Easy Peasy", "Grade": "6a"},
            "DateClimbed": "2023-05-02T00:00:00",
            "NumberOfTries": 1,
            "Angle": 40
        }),
        json!({
            "Problem": {"Name": "Crimpfest", "Grade": "7A"},
            "DateClimbed": "2023-06-10T00:00:00",
            "NumberOfTries": 8,
            "Angle": 25
        }),
    ]
}

async fn moon_token(Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").map(String::as_str);
    let password = form.get("password").map(String::as_str);

    if grant != Some("password") || password != Some(PASSWORD) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "The user name or password is incorrect."
            })),
        )
            .into_response();
    }

    Json(json!({"access_token": MOON_TOKEN, "token_type": "bearer", "expires_in": 3600}))
        .into_response()
}

async fn moon_entries(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.moon_pages.fetch_add(1, Ordering::SeqCst);

    let bearer = format!("Bearer {}", MOON_TOKEN);
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(bearer.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let size: usize = query
        .get("pageSize")
        .and_then(|p| p.parse().ok())
        .unwrap_or(40);
    state
        .setup_ids
        .lock()
        .unwrap()
        .push(query.get("setupId").cloned());

    if page == 2 && state.moon_failures.load(Ordering::SeqCst) > 0 {
        state.moon_failures.fetch_sub(1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let mut all = moon_fixture();
    if state.moon_bad_date.load(Ordering::SeqCst) {
        all[1]["DateClimbed"] = json!("n/a");
    }
    let data: Vec<Value> = all.iter().skip((page - 1) * size).take(size).cloned().collect();

    if state.moon_without_total.load(Ordering::SeqCst) {
        return Json(json!({"Data": data})).into_response();
    }
    Json(json!({"Data": data, "Total": all.len()})).into_response()
}

async fn aurora_login(
    State(state): State<Shared>,
    Path(host_base): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.login_hosts.lock().unwrap().push(host_base);

    if body["password"] != PASSWORD || body["tou"] != "accepted" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "Invalid username or password"})),
        )
            .into_response();
    }

    Json(json!({"session": {"token": AURORA_TOKEN, "user_id": 42}})).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let cookie = format!("token={}", AURORA_TOKEN);
    headers.get(COOKIE).and_then(|v| v.to_str().ok()) == Some(cookie.as_str())
}

async fn aurora_sync(
    State(state): State<Shared>,
    Path(host_base): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let cursor = form.get("ascents").cloned().unwrap_or_default();
    state.sync_cursors.lock().unwrap().push(cursor.clone());

    // never advances its cursor
    if host_base == "stallboardapp" {
        return Json(json!({
            "ascents": [],
            "user_syncs": [{"table_name": "ascents", "last_synchronized_at": cursor}],
            "_complete": false
        }))
        .into_response();
    }

    let body = if cursor == EPOCH {
        json!({
            "ascents": [
                {
                    "uuid": "a1", "climb_uuid": "c1", "angle": 40, "bid_count": 2,
                    "difficulty": 18, "climbed_at": "2023-05-01 18:22:11.000000",
                    "is_listed": true
                },
                {
                    "uuid": "a2", "climb_uuid": "c9", "angle": 40, "bid_count": 1,
                    "difficulty": 20, "climbed_at": "2023-05-01 19:00:00.000000",
                    "is_listed": false
                },
                {
                    "uuid": "a3", "climb_uuid": "c2", "angle": 45, "bid_count": 1,
                    "difficulty": 23, "climbed_at": SECOND_CURSOR,
                    "is_listed": true
                }
            ],
            "user_syncs": [{"table_name": "ascents", "last_synchronized_at": SECOND_CURSOR}],
            "_complete": false
        })
    } else if cursor == SECOND_CURSOR {
        json!({
            "ascents": [
                {
                    "uuid": "a4", "climb_uuid": "c1", "angle": 40, "bid_count": 5,
                    "difficulty": 18, "climbed_at": "2023-05-03 08:00:00.000000",
                    "is_listed": true
                }
            ],
            "user_syncs": [
                {"table_name": "ascents", "last_synchronized_at": "2023-05-03 08:00:00.000000"}
            ],
            "_complete": true
        })
    } else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    Json(body).into_response()
}

async fn aurora_climb(
    State(state): State<Shared>,
    Path((_host_base, uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.climb_lookups.fetch_add(1, Ordering::SeqCst);

    match uuid.as_str() {
        "c1" => Json(json!({"uuid": "c1", "name": "Kilter Classic"})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_mock_backends(state: Shared) -> String {
    let app = Router::new()
        .route("/token", post(moon_token))
        .route("/v1/_moonapi/logbook/entries", get(moon_entries))
        .route("/{host_base}/sessions", post(aurora_login))
        .route("/{host_base}/sync", post(aurora_sync))
        .route("/{host_base}/climbs/{uuid}", get(aurora_climb))
        .with_state(state);

    // Bind to random available port
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", bound_addr)
}

struct Harness {
    state: Shared,
    aggregator: Aggregator,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(MockState::default()).await
    }

    async fn start_with(state: MockState) -> Self {
        Self::start_paged(state, 2).await
    }

    async fn start_paged(state: MockState, page_size: u32) -> Self {
        let state = Arc::new(state);
        let base = start_mock_backends(state.clone()).await;

        let mut config = Config::default();
        config.moon.api_url = base.clone();
        config.moon.page_size = page_size;
        config.aurora.url_template = format!("{}/{{host_base}}", base);
        config
            .aurora
            .host_bases
            .insert("stall".to_string(), "stallboardapp".to_string());
        config.retry.backoff = HumanDuration::from_millis(0);
        config.validate().unwrap();

        let retry = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        };
        let http = HttpClient::new(&config.http, retry).unwrap();
        let registry = BoardRegistry::with_defaults(&config, http);

        Self {
            state,
            aggregator: Aggregator::new(Arc::new(registry), Arc::new(GradeTables::standard())),
        }
    }

    async fn entries(&self, board: &str, scale: GradeScale) -> Vec<Result<LogbookEntry, BoardError>> {
        self.aggregator
            .aggregate(board, credentials(), scale)
            .await
            .unwrap()
            .collect()
            .await
    }
}

fn credentials() -> Credentials {
    Credentials::new("alex", Secret::new(PASSWORD))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_moon_logbook_pages() {
    let harness = Harness::start().await;

    let entries: Vec<LogbookEntry> = harness
        .entries("moonboard2016", GradeScale::Font)
        .await
        .into_iter()
        .map(|entry| entry.unwrap())
        .collect();

    assert_eq!(
        entries,
        vec![
            LogbookEntry {
                board: "moonboard2016".to_string(),
                angle: Some(40),
                name: "Hard Rain".to_string(),
                date: date(2023, 5, 1),
                grade: "6B+".to_string(),
                tries: 3,
            },
            LogbookEntry {
                board: "moonboard2016".to_string(),
                angle: Some(40),
                name: "Easy Peasy".to_string(),
                date: date(2023, 5, 2),
                grade: "6A".to_string(),
                tries: 1,
            },
            LogbookEntry {
                board: "moonboard2016".to_string(),
                angle: Some(25),
                name: "Crimpfest".to_string(),
                date: date(2023, 6, 10),
                grade: "7A".to_string(),
                tries: 8,
            },
        ]
    );

    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 2);
    assert_eq!(
        *harness.state.setup_ids.lock().unwrap(),
        vec![Some("1".to_string()), Some("1".to_string())]
    );
}

#[tokio::test]
async fn test_generic_moon_board_reads_every_setup() {
    let harness = Harness::start().await;

    let grades: Vec<String> = harness
        .entries("moonboard", GradeScale::Hueco)
        .await
        .into_iter()
        .map(|entry| entry.unwrap().grade)
        .collect();

    assert_eq!(grades, vec!["V4", "V3", "V6"]);
    assert!(harness.state.setup_ids.lock().unwrap().iter().all(Option::is_none));
}

#[tokio::test]
async fn test_moon_rejects_bad_password() {
    let harness = Harness::start().await;

    let result = harness
        .aggregator
        .aggregate(
            "moonboard2024",
            Credentials::new("alex", Secret::new("hunter2")),
            GradeScale::Font,
        )
        .await;

    match result {
        Err(BoardError::Authentication { board, reason }) => {
            assert_eq!(board, "moonboard2024");
            assert!(reason.contains("incorrect"));
            assert!(!reason.contains("hunter2"));
        }
        Err(other) => panic!("expected authentication error, got {other}"),
        Ok(_) => panic!("expected authentication error, got a logbook"),
    }
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_moon_page_retried_after_503() {
    let state = MockState::default();
    state.moon_failures.store(1, Ordering::SeqCst);
    let harness = Harness::start_with(state).await;

    let entries = harness.entries("moonboard2019", GradeScale::Font).await;

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(Result::is_ok));
    // page 1, failed page 2, page 2 again
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_moon_page_failure_surfaces_after_retries() {
    let state = MockState::default();
    state.moon_failures.store(10, Ordering::SeqCst);
    let harness = Harness::start_with(state).await;

    let entries = harness.entries("moonboard2019", GradeScale::Font).await;

    assert_eq!(entries.len(), 3);
    assert!(entries[0].is_ok());
    assert!(entries[1].is_ok());
    match &entries[2] {
        Err(BoardError::Transport(message)) => assert!(message.contains("503")),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_moon_pages_without_total() {
    let state = MockState::default();
    state.moon_without_total.store(true, Ordering::SeqCst);
    let harness = Harness::start_paged(state, 1).await;

    let names: Vec<String> = harness
        .entries("moonboard2016", GradeScale::Font)
        .await
        .into_iter()
        .map(|entry| entry.unwrap().name)
        .collect();

    assert_eq!(names, vec!["Hard Rain", "Easy Peasy", "Crimpfest"]);
    // three full pages, then an empty one
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_moon_short_page_without_total_ends_listing() {
    let state = MockState::default();
    state.moon_without_total.store(true, Ordering::SeqCst);
    let harness = Harness::start_with(state).await;

    let entries = harness.entries("moonboard2016", GradeScale::Font).await;

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(Result::is_ok));
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_moon_bad_date_skips_only_that_entry() {
    let state = MockState::default();
    state.moon_bad_date.store(true, Ordering::SeqCst);
    let harness = Harness::start_with(state).await;

    let mut logbook = harness
        .aggregator
        .aggregate("moonboard2016", credentials(), GradeScale::Font)
        .await
        .unwrap();
    let mut names = Vec::new();
    while let Some(entry) = logbook.next().await {
        names.push(entry.unwrap().name);
    }

    assert_eq!(names, vec!["Hard Rain", "Crimpfest"]);
    let stats = logbook.stats();
    assert_eq!(stats.malformed_skipped, 1);
    assert_eq!(stats.entries_emitted, 2);
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_moon_bad_date_fails_run_when_configured() {
    let state = MockState::default();
    state.moon_bad_date.store(true, Ordering::SeqCst);
    let harness = Harness::start_with(state).await;

    let entries: Vec<Result<LogbookEntry, BoardError>> = harness
        .aggregator
        .clone()
        .with_record_policy(RecordPolicy::Fail)
        .aggregate("moonboard2016", credentials(), GradeScale::Font)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].as_ref().unwrap().name, "Hard Rain");
    match &entries[1] {
        Err(BoardError::MalformedRecord(message)) => assert!(message.contains("n/a")),
        other => panic!("expected malformed record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_aurora_sync_follows_cursor() {
    let harness = Harness::start().await;

    let entries: Vec<LogbookEntry> = harness
        .entries("kilter", GradeScale::Font)
        .await
        .into_iter()
        .map(|entry| entry.unwrap())
        .collect();

    let summary: Vec<(&str, Option<u16>, NaiveDate, &str, u32)> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.angle, e.date, e.grade.as_str(), e.tries))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Kilter Classic", Some(40), date(2023, 5, 1), "6B", 2),
            ("c2", Some(45), date(2023, 5, 2), "7A+", 1),
            ("Kilter Classic", Some(40), date(2023, 5, 3), "6B", 5),
        ]
    );
    assert!(entries.iter().all(|e| e.board == "kilter"));

    assert_eq!(
        *harness.state.sync_cursors.lock().unwrap(),
        vec![EPOCH.to_string(), SECOND_CURSOR.to_string()]
    );
    // c1 is looked up once per run
    assert_eq!(harness.state.climb_lookups.load(Ordering::SeqCst), 2);
    assert_eq!(
        *harness.state.login_hosts.lock().unwrap(),
        vec!["kilterboardapp".to_string()]
    );
}

#[tokio::test]
async fn test_aurora_host_base_mapping() {
    let harness = Harness::start().await;

    let entries = harness.entries("tension", GradeScale::Hueco).await;

    assert_eq!(entries.len(), 3);
    assert_eq!(
        *harness.state.login_hosts.lock().unwrap(),
        vec!["tensionboardapp2".to_string()]
    );
}

#[tokio::test]
async fn test_aurora_rejects_bad_password() {
    let harness = Harness::start().await;

    let result = harness
        .aggregator
        .aggregate(
            "decoy",
            Credentials::new("alex", Secret::new("hunter2")),
            GradeScale::Font,
        )
        .await;

    assert!(matches!(result, Err(BoardError::Authentication { board, .. }) if board == "decoy"));
    assert!(harness.state.sync_cursors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_aurora_stalled_sync_is_an_error() {
    let harness = Harness::start().await;

    let entries = harness.entries("stall", GradeScale::Font).await;

    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0], Err(BoardError::Transport(_))));
    assert_eq!(harness.state.sync_cursors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_board_makes_no_requests() {
    let harness = Harness::start().await;

    let result = harness
        .aggregator
        .aggregate("unknown-board-xyz", credentials(), GradeScale::Font)
        .await;

    assert!(matches!(result, Err(BoardError::UnknownBoard(_))));
    assert_eq!(harness.state.moon_pages.load(Ordering::SeqCst), 0);
    assert!(harness.state.login_hosts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_logbook_to_csv() {
    let harness = Harness::start().await;

    let mut logbook = harness
        .aggregator
        .aggregate("moonboard2017", credentials(), GradeScale::Hueco)
        .await
        .unwrap();

    let mut out = Vec::new();
    let rows = write_logbook(&mut logbook, &mut out, SinkOptions::default())
        .await
        .unwrap();

    assert_eq!(rows, 3);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "board,angle,name,date,grade,tries\n\
         moonboard2017,40,Hard Rain,2023-05-01,V4,3\n\
         moonboard2017,40,Easy Peasy,2023-05-02,V3,1\n\
         moonboard2017,25,Crimpfest,2023-06-10,V6,8\n"
    );
    assert_eq!(logbook.stats().entries_emitted, 3);
}
