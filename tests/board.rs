//! End-to-end tests: a real server on a loopback port, driven by WebSocket
//! clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use agora::api::{serve_with_shutdown, ApiConfig, AppState};
use agora::store::{SqliteStore, Store};
use agora::websocket::ConnectionRegistry;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("static");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<html></html>").unwrap();

        let store: Arc<dyn Store> =
            Arc::new(SqliteStore::open(&dir.path().join("agora.db")).unwrap());
        store
            .ensure_categories(&["tech".to_string(), "news".to_string()])
            .await
            .unwrap();

        let config = ApiConfig {
            static_dir: static_dir.clone(),
            index_file: static_dir.join("index.html"),
            bcrypt_cost: 4,
            ..ApiConfig::new("127.0.0.1", 0)
        };
        let state = AppState::new(store, config);
        let registry = Arc::clone(&state.registry);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve_with_shutdown(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            registry,
            shutdown: Some(tx),
            _dir: dir,
        }
    }

    /// Connect and wait until the server has registered the connection
    async fn connect(&self) -> Client {
        let before = self.registry.len();
        let (client, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .unwrap();
        self.wait_for_connections(before + 1).await;
        client
    }

    async fn wait_for_connections(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.registry.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} connections, have {}",
                expected,
                self.registry.len()
            )
        });
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert that nothing arrives within a short window
async fn assert_silent(client: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(next.is_err(), "unexpected frame: {:?}", next);
}

fn register(username: &str) -> Value {
    json!({
        "action": "register",
        "email": format!("{}@example.com", username),
        "first-name": "Test",
        "last-name": "User",
        "username": username,
        "password": "p1",
        "age": 30,
        "gender": "other"
    })
}

#[tokio::test]
async fn test_login_replies_only_to_requester() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    send(&mut a, register("alice")).await;
    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "Registration");
    assert_eq!(reply["success"], true);

    send(
        &mut a,
        json!({"action": "login", "identifier": "alice", "password": "p1"}),
    )
    .await;
    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "Login");
    assert_eq!(reply["data"]["loggedInUsername"], "alice");
    assert!(reply["data"]["token"].is_string());
    assert!(reply["data"]["allMessages"].is_array());

    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_create_post_is_broadcast() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    send(&mut a, register("alice")).await;
    recv(&mut a).await;

    send(
        &mut a,
        json!({
            "action": "createPost",
            "createdBy": "alice",
            "title": "Hi",
            "content": "Hello",
            "categories": ["tech", "news"]
        }),
    )
    .await;

    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "createdPost");
    assert_eq!(reply["success"], true);

    let update = recv(&mut b).await;
    assert_eq!(update["type"], "updateAllPosts");
    assert_eq!(update["data"], reply["data"]);

    let posts = update["data"]["allPosts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    let mut categories: Vec<&str> = posts[0]["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    categories.sort();
    assert_eq!(categories, vec!["news", "tech"]);
}

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;

    a.send(Message::Text("not json".to_string())).await.unwrap();
    send(&mut a, json!({"action": "explode"})).await;
    a.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    assert_silent(&mut a).await;

    send(&mut a, json!({"action": "createPost", "createdBy": "alice"})).await;
    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["success"], false);

    send(&mut a, json!({"action": "homePage"})).await;
    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "allData");
    // homePage also goes out as a broadcast, including to the requester
    let update = recv(&mut a).await;
    assert_eq!(update["type"], "homePageUpdate");

    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let b = server.connect().await;
    assert_eq!(server.registry.len(), 2);

    drop(b);
    server.wait_for_connections(1).await;

    // Broadcasts keep reaching the remaining client
    send(&mut a, register("alice")).await;
    recv(&mut a).await;
    send(&mut a, json!({"action": "userLogout", "username": "alice"})).await;

    let reply = recv(&mut a).await;
    assert_eq!(reply["type"], "userLogout");
    let update = recv(&mut a).await;
    assert_eq!(update["type"], "updatAllUsersOnline");
    assert_eq!(update["data"]["usersOnline"], json!([]));

    a.close(None).await.unwrap();
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_health_reports_connections() {
    let server = TestServer::start().await;
    let _a = server.connect().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"connections\":1"));
}
