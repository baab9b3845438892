use super::*;
use axum::http::{HeaderValue, Request};
use isles_engine::{
    Context, HttpRemote, IslandBoard, MemorySnapshotStore, Presenter, RemoteStore,
    SettingsScreen, SnapshotStore,
};
use isles_protocol::{Session, UiUpdate, User};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use tower::ServiceExt;

fn temp_db() -> PathBuf {
    std::env::temp_dir().join(format!(
        "isles-server-test-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ))
}

fn temp_store() -> RecordStore {
    let store = RecordStore::new(temp_db());
    let _ = store.open().expect("open db");
    store
}

fn session(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(SESSION_HEADER, HeaderValue::from_str(token).unwrap());
    headers
}

#[test]
fn games_are_scoped_to_their_owner() {
    let store = temp_store();
    store.create_game(Some("ann"), "Ann's save", &[]).unwrap();
    store.create_game(Some("bob"), "Bob's save", &[]).unwrap();
    store.create_game(None, "Nobody's save", &[]).unwrap();

    let ann = store.list_games(Some("ann")).unwrap();
    assert_eq!(ann.len(), 1);
    assert_eq!(ann[0].name, "Ann's save");
    assert!(store.list_games(None).unwrap().is_empty());

    let id = ann[0].object_id.clone().unwrap();
    assert!(store
        .update_game(Some("bob"), &id, "stolen", &[])
        .unwrap()
        .is_none());
    assert!(!store.delete_game(Some("bob"), &id).unwrap());
    assert!(store.delete_game(Some("ann"), &id).unwrap());
}

#[test]
fn island_url_follows_name_and_game_delete_cascades() {
    let store = temp_store();
    let game = store.create_game(Some("ann"), "Save", &[]).unwrap();
    let game_id = game.object_id.unwrap();

    let island = store
        .create_island(Some("ann"), &game_id, "Old Town")
        .unwrap()
        .unwrap();
    assert_eq!(island.url, "old-town");
    let island_id = island.object_id.unwrap();

    let renamed = store
        .update_island(Some("ann"), &island_id, "Crown Falls")
        .unwrap()
        .unwrap();
    assert_eq!(renamed.url, "crown-falls");
    assert_eq!(renamed.game, game_id);

    assert!(store
        .create_island(Some("bob"), &game_id, "Intruder")
        .unwrap()
        .is_none());

    assert_eq!(store.list_islands(Some("ann"), &game_id).unwrap().len(), 1);
    assert!(store.delete_game(Some("ann"), &game_id).unwrap());
    assert!(store
        .list_islands(Some("ann"), &game_id)
        .unwrap()
        .is_empty());
}

#[test]
fn game_order_is_stored_and_misses_report_absent() {
    let store = temp_store();
    let game = store.create_game(Some("ann"), "Save", &[]).unwrap();
    let id = game.object_id.unwrap();
    let order = ["i2".to_string(), "i1".to_string()];
    store.update_game(Some("ann"), &id, "Save", &order).unwrap();
    assert_eq!(store.list_games(Some("ann")).unwrap()[0].islands, order);

    assert!(store
        .update_game(Some("ann"), "game-missing", "Save", &[])
        .unwrap()
        .is_none());
    assert!(store
        .update_island(Some("ann"), "island-missing", "Nope")
        .unwrap()
        .is_none());
    assert!(!store.delete_island(Some("ann"), "island-missing").unwrap());
}

#[tokio::test]
async fn create_game_rejects_blank_name() {
    let state = State(Arc::new(AppState {
        store: temp_store(),
    }));
    let err = api_games_create(state, session("ann"), Json(Game::draft("  ")))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
    assert_eq!(err.1 .0.error, "name is required");
}

#[tokio::test]
async fn update_missing_game_is_404() {
    let state = State(Arc::new(AppState {
        store: temp_store(),
    }));
    let err = api_games_update(
        state,
        Path("game-missing".to_string()),
        session("ann"),
        Json(Game::draft("Save")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn island_for_unknown_game_is_rejected() {
    let state = State(Arc::new(AppState {
        store: temp_store(),
    }));
    let err = api_islands_create(state, session("ann"), Json(Island::draft("Foo", "nope")))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn anonymous_list_is_empty() {
    let store = temp_store();
    store.create_game(None, "Orphan", &[]).unwrap();
    let state = State(Arc::new(AppState { store }));
    let list = api_games_list(state, HeaderMap::new()).await.unwrap();
    assert!(list.0.results.is_empty());
}

#[tokio::test]
async fn peers_outside_allowlist_are_forbidden() {
    let app = build_router(AppState {
        store: temp_store(),
    });
    let mut req = Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    req.extensions_mut()
        .insert(axum::extract::ConnectInfo(SocketAddr::from((
            Ipv4Addr::new(8, 8, 8, 8),
            5000,
        ))));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[test]
fn allowlist_and_origin_rules() {
    assert!(is_allowed_peer_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    assert!(is_allowed_peer_ip(IpAddr::V4(Ipv4Addr::new(100, 64, 1, 2))));
    assert!(!is_allowed_peer_ip(IpAddr::V4(Ipv4Addr::new(100, 128, 0, 1))));
    assert!(!is_allowed_peer_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 4))));

    let ok = HeaderValue::from_static("http://localhost:5173");
    let bad = HeaderValue::from_static("http://localhost.evil.example");
    assert!(is_allowed_local_origin(&ok));
    assert!(!is_allowed_local_origin(&bad));
    assert!(is_http_origin_for_host("https://127.0.0.1", "127.0.0.1"));
}

/// Accepts every confirmation and answers prompts from a queue.
#[derive(Default)]
struct AutoPresenter {
    renders: usize,
    alerts: Vec<String>,
    prompts: VecDeque<String>,
}

impl Presenter for AutoPresenter {
    fn render(&mut self, _update: UiUpdate) {
        self.renders += 1;
    }

    fn redirect(&mut self, _path: &str) {}

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn confirm(&mut self, _message: &str) -> bool {
        true
    }

    fn prompt(&mut self, _message: &str, _default: &str) -> Option<String> {
        self.prompts.pop_front()
    }
}

#[tokio::test]
async fn http_client_round_trip_against_live_server() {
    let db = temp_db();
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_listener(listener, db.clone(), async {
        let _ = stop_rx.await;
    }));

    let remote =
        HttpRemote::new(format!("http://{addr}")).with_session_token(Some("ann".to_string()));
    let user = User {
        username: "ann".to_string(),
        session_token: "ann".to_string(),
    };
    let mut ctx = Context::new(
        MemorySnapshotStore::new(),
        remote,
        AutoPresenter::default(),
        Session::signed_in(user),
    );
    ctx.presenter.prompts.push_back("Big Britannia".to_string());

    {
        let mut screen = SettingsScreen::open(&mut ctx).await.unwrap();
        assert!(screen.games().is_empty());
        screen.create_game("Old World").await.unwrap();
        screen.load_game(0).unwrap();
    }

    let (game_id, island_ids) = {
        let mut board = IslandBoard::open(&mut ctx).await.unwrap().unwrap();
        for name in ["Crown Falls", "New Hope", "Trelawney"] {
            board.create_island(name).await.unwrap();
        }
        let ids: Vec<String> = board
            .islands()
            .iter()
            .filter_map(|i| i.object_id.clone())
            .collect();
        board.reorder_island(&ids[2], Some(1)).await.unwrap();
        board.rename_island(&ids[0]).await.unwrap();
        board.delete_island(&ids[1]).await.unwrap();
        let game_id = board.game().object_id.clone().unwrap();
        (game_id, board.game().islands.clone())
    };
    assert!(ctx.presenter.alerts.is_empty(), "{:?}", ctx.presenter.alerts);
    assert!(ctx.presenter.renders > 0);

    let store = RecordStore::new(&db);
    let game = store
        .list_games(Some("ann"))
        .unwrap()
        .into_iter()
        .find(|g| g.object_id.as_deref() == Some(game_id.as_str()))
        .unwrap();
    assert_eq!(game.islands, island_ids);
    assert_eq!(island_ids.len(), 2);

    let islands = store.list_islands(Some("ann"), &game_id).unwrap();
    let renamed = islands
        .iter()
        .find(|i| i.object_id.as_ref() == Some(&island_ids[1]))
        .unwrap();
    assert_eq!(renamed.name, "Big Britannia");
    assert_eq!(renamed.url, "big-britannia");

    let cached = ctx.snapshots.islands().unwrap().unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[0].name, "Trelawney");

    // Unknown ids surface as remote errors with the server's message.
    let err = ctx.remote.delete_island("island-missing").await.unwrap_err();
    assert!(err.to_string().contains("404"));

    let _ = stop_tx.send(());
    server.await.unwrap().unwrap();
}
