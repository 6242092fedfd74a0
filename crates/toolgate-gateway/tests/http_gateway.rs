//! Integration tests for HttpGateway
//!
//! A canned-response HTTP responder runs on a local TcpListener. Each scripted
//! route answers one request, in order, and every request is recorded so the
//! tests can check what the gateway actually sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use toolgate_core::{Identifier, UserName};
use toolgate_gateway::{
    AccessBackend, AccessDecision, GatewayConfig, GatewayError, HttpGateway, MaterialCatalog,
};

#[derive(Debug, Clone)]
struct Route {
    method: &'static str,
    path: String,
    status: u16,
    body: String,
}

impl Route {
    fn new(method: &'static str, path: &str, status: u16, body: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    body: String,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

/// Start the canned responder and return its base URL and request log.
async fn spawn_backend(routes: Vec<Route>) -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(Mutex::new(routes));
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let server_log = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let log = server_log.clone();
            tokio::spawn(async move {
                serve_one(stream, routes, log).await;
            });
        }
    });

    (format!("http://{addr}"), log)
}

async fn serve_one(mut stream: TcpStream, routes: Arc<Mutex<Vec<Route>>>, log: Log) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    // Headers
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    // Body
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    log.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        body,
    });

    let route = {
        let mut routes = routes.lock().unwrap();
        routes
            .iter()
            .position(|r| r.method == method && r.path == path)
            .map(|i| routes.remove(i))
    };
    let (status, body) = route.map_or((404, String::new()), |r| (r.status, r.body));

    let response = format!(
        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn gateway_for(base: &str) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
        login_url: format!("{base}/user/login"),
        username: "kiosk".to_string(),
        password: "secret".to_string(),
        api_url: format!("{base}/api/v0"),
        tool_id: "laser".to_string(),
        catalog_base_url: format!("{base}/api/v0"),
        material_base_url: format!("{base}/api/v0/material/"),
        timeout: Duration::from_millis(2000),
    })
    .unwrap()
}

fn logins(log: &Log) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|r| r.method == "POST" && r.path == "/user/login")
        .count()
}

const JANE_GRANTED: &str = r#"[{"access": "true", "first_name": "Jane", "last_name": "Doe"}]"#;

/// Email identifiers go to the email endpoint after a lazy login
#[tokio::test]
async fn test_email_identifier_granted() {
    let (base, log) = spawn_backend(vec![
        Route::new("POST", "/user/login", 200, ""),
        Route::new("GET", "/api/v0/email/user@example.com/laser", 200, JANE_GRANTED),
    ])
    .await;

    let mut gateway = gateway_for(&base);
    let decision = gateway
        .check_access(&Identifier::new("user@example.com").unwrap())
        .await
        .unwrap();

    assert_eq!(
        decision,
        AccessDecision::Granted {
            user: UserName::new(Some("Jane"), Some("Doe"))
        }
    );
    assert!(gateway.session().is_authenticated());

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "POST");
    assert!(requests[0].body.contains("name=kiosk"));
    assert!(requests[0].body.contains("pass=secret"));
    assert!(requests[0].body.contains("form_id=user_login"));
    assert!(requests[0].body.contains("op=Log+in"));
    assert_eq!(requests[1].path, "/api/v0/email/user@example.com/laser");
}

/// Serial identifiers go to the serial endpoint; the session is reused
#[tokio::test]
async fn test_serial_identifier_denied_and_session_reused() {
    let denied = r#"[{"access": "false", "first_name": "Sam", "last_name": "Roe"}]"#;
    let (base, log) = spawn_backend(vec![
        Route::new("POST", "/user/login", 200, ""),
        Route::new("GET", "/api/v0/serial/000111/laser", 200, denied),
        Route::new("GET", "/api/v0/serial/000111/laser", 200, denied),
    ])
    .await;

    let mut gateway = gateway_for(&base);
    let id = Identifier::new("000111").unwrap();

    for _ in 0..2 {
        let decision = gateway.check_permission(&id, "laser").await.unwrap();
        assert!(matches!(decision, AccessDecision::Denied { .. }));
    }

    assert_eq!(logins(&log), 1);
}

/// A 403 from the permission API denies and forces a fresh login next time
#[tokio::test]
async fn test_forbidden_drops_session() {
    let (base, log) = spawn_backend(vec![
        Route::new("POST", "/user/login", 200, ""),
        Route::new("GET", "/api/v0/serial/04ABCDEF/laser", 403, JANE_GRANTED),
        Route::new("POST", "/user/login", 200, ""),
        Route::new("GET", "/api/v0/serial/04ABCDEF/laser", 200, JANE_GRANTED),
    ])
    .await;

    let mut gateway = gateway_for(&base);
    let id = Identifier::new("04ABCDEF").unwrap();

    let first = gateway.check_access(&id).await.unwrap();
    assert!(!first.is_granted());
    assert!(!gateway.session().is_authenticated());

    let second = gateway.check_access(&id).await.unwrap();
    assert!(second.is_granted());
    assert_eq!(logins(&log), 2);
}

/// Rejected kiosk credentials surface as an auth error, not a denial
#[tokio::test]
async fn test_login_rejected() {
    let (base, log) = spawn_backend(vec![
        Route::new("POST", "/user/login", 403, ""),
        Route::new("POST", "/user/login", 403, ""),
    ])
    .await;

    let mut gateway = gateway_for(&base);
    let result = gateway
        .check_access(&Identifier::new("user@example.com").unwrap())
        .await;

    assert!(matches!(result, Err(GatewayError::Auth { status: 403 })));
    assert!(!gateway.authenticate().await);

    // No permission query is made without a session
    assert!(log.lock().unwrap().iter().all(|r| r.method == "POST"));
}

/// An unreachable backend is a transport error
#[tokio::test]
async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut gateway = gateway_for(&format!("http://{addr}"));
    assert!(!gateway.authenticate().await);

    let result = gateway
        .check_access(&Identifier::new("000111").unwrap())
        .await;
    assert!(matches!(result, Err(GatewayError::Transport { .. })));
}

/// Malformed permission bodies fail closed
#[tokio::test]
async fn test_malformed_body_denied() {
    let (base, _log) = spawn_backend(vec![
        Route::new("POST", "/user/login", 200, ""),
        Route::new("GET", "/api/v0/serial/000111/laser", 200, "<html>oops</html>"),
    ])
    .await;

    let mut gateway = gateway_for(&base);
    let decision = gateway
        .check_access(&Identifier::new("000111").unwrap())
        .await
        .unwrap();
    assert!(!decision.is_granted());
}

/// Equipment and single-material catalog lookups
#[tokio::test]
async fn test_catalog_lookups() {
    let equipment = r#"{"materials": [
        {"material": {"label": "Plywood", "unit": "sheet", "cost": "12.50", "purchase": "https://shop.example.org/p?id=7"}},
        {"material": {"label": "Broken"}}
    ]}"#;
    let filament = r#"{"materials": [
        {"material": {"label": "PLA", "unit": "gram", "cost": 0.05, "purchase": "https://shop.example.org/p?id=9"}}
    ]}"#;

    let (base, _log) = spawn_backend(vec![
        Route::new("GET", "/api/v0/equipment/424", 200, equipment),
        Route::new("GET", "/api/v0/material/1234", 200, filament),
        Route::new("GET", "/api/v0/material/5678", 200, r#"{"materials": []}"#),
    ])
    .await;

    let mut gateway = gateway_for(&base);

    let items = gateway.equipment_materials(424).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "Plywood");

    let pla = gateway.material("1234").await.unwrap().unwrap();
    assert_eq!(pla.cost, "0.05");
    assert_eq!(
        pla.purchase_link_with_quantity(6).unwrap().as_str(),
        "https://shop.example.org/p?id=9&quantity=6"
    );

    assert!(gateway.material("5678").await.unwrap().is_none());
    assert!(gateway.material("  ").await.unwrap().is_none());
}

/// A catalog error status is reported, not parsed
#[tokio::test]
async fn test_catalog_error_status() {
    let (base, _log) = spawn_backend(vec![Route::new(
        "GET",
        "/api/v0/equipment/424",
        500,
        "",
    )])
    .await;

    let mut gateway = gateway_for(&base);
    assert!(matches!(
        gateway.equipment_materials(424).await,
        Err(GatewayError::InvalidResponse { .. })
    ));
}
