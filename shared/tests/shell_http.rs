use admin_shared::model::{RecordDraft, RecordId};
use admin_shared::shell::{HttpExecutor, MemoryKvStore, ReqwestExecutor, Shell};
use admin_shared::{DashboardConfig, Event, ViewModel};
use crux_http::protocol::{HttpRequest, HttpResult};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    body: String,
}

type Log = Arc<Mutex<Vec<Seen>>>;

/// Minimal in-process stand-in for the posts API.
async fn spawn_api() -> (SocketAddr, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let log: Log = Arc::default();
    let seen = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let seen = seen.clone();
            tokio::spawn(async move { handle(stream, seen).await });
        }
    });
    (addr, log)
}

async fn handle(mut stream: TcpStream, seen: Log) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.expect("read request");
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
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.expect("read body");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let (status, payload) = match (method.as_str(), path.as_str()) {
        ("GET", "/posts") => (
            200,
            r#"[{"id":1,"title":"First post","body":"First body text","userId":1},
                {"id":2,"title":"Second post","body":"Second body text","userId":2}]"#
                .to_string(),
        ),
        ("POST", "/posts") => (201, r#"{"id":101}"#.to_string()),
        ("PUT", "/posts/2") => (200, body.clone()),
        ("PUT", _) => (404, "{}".to_string()),
        ("DELETE", _) => (200, "{}".to_string()),
        _ => (400, String::new()),
    };

    seen.lock().unwrap().push(Seen {
        method,
        path,
        body,
    });

    let response = format!(
        "HTTP/1.1 {status} X\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn shell_for(addr: SocketAddr) -> Shell<ReqwestExecutor, MemoryKvStore> {
    let config = DashboardConfig {
        base_url: format!("http://{addr}"),
        ..DashboardConfig::default()
    };
    let http = ReqwestExecutor::new(config.request_timeout).unwrap();
    Shell::new(&config, http, MemoryKvStore::new()).unwrap()
}

fn title_of(view: &ViewModel, id: RecordId) -> Option<&str> {
    view.table
        .rows
        .iter()
        .find(|row| row.id == id)
        .map(|row| row.title.as_str())
}

fn login() -> Event {
    Event::LoginRequested {
        email: "admin@example.com".into(),
        password: SecretString::new("password".to_string()),
    }
}

#[tokio::test]
async fn full_crud_round_trip_over_http() {
    let (addr, log) = spawn_api().await;
    let mut shell = shell_for(addr);

    let view = shell.dispatch(login()).await;
    assert!(!view.using_fallback_data);
    assert_eq!(view.table.total_count, 2);

    let view = shell
        .dispatch(Event::CreateRequested {
            draft: RecordDraft::new("Third post", "Third body text", 1),
        })
        .await;
    assert!(view.outcome.as_ref().unwrap().success);
    assert_eq!(title_of(&view, RecordId(3)), Some("Third post"));

    let view = shell
        .dispatch(Event::UpdateRequested {
            id: RecordId(2),
            draft: RecordDraft::new("Second, edited", "Second body text", 2),
        })
        .await;
    assert!(view.outcome.as_ref().unwrap().success);
    assert_eq!(title_of(&view, RecordId(2)), Some("Second, edited"));

    let view = shell
        .dispatch(Event::UpdateRequested {
            id: RecordId(1),
            draft: RecordDraft::new("Edited", "Body that is long", 1),
        })
        .await;
    assert_eq!(
        view.outcome.unwrap().message,
        "Failed to update post: post 1 not found"
    );

    let view = shell
        .dispatch(Event::DeleteRequested {
            id: RecordId(1),
            confirmed: true,
        })
        .await;
    assert_eq!(view.table.total_count, 2);

    let seen = log.lock().unwrap().clone();
    let calls: Vec<(&str, &str)> = seen
        .iter()
        .map(|s| (s.method.as_str(), s.path.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("GET", "/posts"),
            ("POST", "/posts"),
            ("PUT", "/posts/2"),
            ("PUT", "/posts/1"),
            ("DELETE", "/posts/1"),
        ]
    );
    let created: serde_json::Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(
        created,
        serde_json::json!({"title": "Third post", "body": "Third body text", "userId": 1})
    );
}

#[tokio::test]
async fn unreachable_api_falls_back_to_sample_posts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut shell = shell_for(addr);
    let view = shell.dispatch(login()).await;

    assert!(view.using_fallback_data);
    assert_eq!(view.table.total_count, 3);
}

#[tokio::test]
async fn executor_reports_refused_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = HttpRequest::get(format!("http://{addr}/posts")).build();
    let result = ReqwestExecutor::new(Duration::from_secs(5))
        .unwrap()
        .execute(&request)
        .await;
    assert!(matches!(result, HttpResult::Err(crux_http::Error::Io(_))));
}

#[tokio::test]
async fn executor_honours_request_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let request = HttpRequest::get(format!("http://{addr}/posts")).build();
    let result = ReqwestExecutor::new(Duration::from_millis(200))
        .unwrap()
        .execute(&request)
        .await;
    assert!(matches!(result, HttpResult::Err(crux_http::Error::Timeout)));
}
