use chaos_backend::{
    expand_targets, serve_all, BackendIdentity, ChaosBackend, Listener, ListenerSpec, RouteTable,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_backend(routes: RouteTable, identity: BackendIdentity) -> SocketAddr {
    let backend = Arc::new(ChaosBackend::new(Arc::new(routes), identity));
    let listener = Listener::bind(ListenerSpec::new("127.0.0.1", 0), backend)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());
    addr
}

/// Raw bytes the server wrote before closing. A reset counts as end of stream.
async fn fetch(addr: SocketAddr, target: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    response
}

/// Like [`fetch`], but waits for a listener that may still be binding.
async fn fetch_when_ready(addr: SocketAddr, target: &str) -> Vec<u8> {
    for _ in 0..200 {
        if TcpStream::connect(addr).await.is_ok() {
            return fetch(addr, target).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("listener {} never came up", addr);
}

fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response head");
    (
        String::from_utf8_lossy(&raw[..end]).into_owned(),
        raw[end + 4..].to_vec(),
    )
}

fn dechunk(mut body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let line_end = body.windows(2).position(|w| w == b"\r\n").unwrap();
        let size = usize::from_str_radix(std::str::from_utf8(&body[..line_end]).unwrap(), 16).unwrap();
        body = &body[line_end + 2..];
        if size == 0 {
            return out;
        }
        out.extend_from_slice(&body[..size]);
        body = &body[size + 2..];
    }
}

#[tokio::test]
async fn test_error_route_delays_and_sets_status() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;

    let started = Instant::now();
    let raw = fetch(addr, "/error?status=503&sleep=50").await;
    assert!(started.elapsed() >= Duration::from_millis(50));

    let (head, body) = split_response(&raw);
    assert!(head.starts_with("HTTP/1.1 503 Service Unavailable"));
    assert!(String::from_utf8(body).unwrap().contains("503"));
}

#[tokio::test]
async fn test_unified_status_at_full_probability() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    for _ in 0..10 {
        let raw = fetch(addr, "/new?status=404,100").await;
        let (head, _) = split_response(&raw);
        assert!(head.starts_with("HTTP/1.1 404"), "{}", head);
    }
}

#[tokio::test]
async fn test_reset_writes_no_bytes() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    assert!(fetch(addr, "/reset").await.is_empty());
    assert!(fetch(addr, "/new?reset=1&status=200").await.is_empty());
}

#[tokio::test]
async fn test_slow_route_streams_chunks() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    let raw = fetch(addr, "/slow?sleep=10&sleepBetweenBytes=1").await;

    let (head, body) = split_response(&raw);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Transfer-Encoding: chunked"));
    assert!(head.contains("Content-Type: text/event-stream"));

    let payload = String::from_utf8(dechunk(&body)).unwrap();
    assert_eq!(payload, "Example content delivered slowly. Connect:10ms Betweenbytes:1ms");
}

#[tokio::test]
async fn test_default_page_identifies_backend() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    let (head, body) = split_response(&fetch(addr, "/").await);
    assert!(head.contains("X-Backend: default"));
    assert!(String::from_utf8(body).unwrap().contains("This is the default page."));

    let id = "127.0.0.1:9001".to_string();
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Listener(id)).await;
    let (head, _) = split_response(&fetch(addr, "/").await);
    assert!(head.contains("X-Backends: 127.0.0.1:9001"));
}

#[tokio::test]
async fn test_serve_all_starts_every_listener() {
    // Reserve free ports, then release them for the backend to bind.
    let reserved: Vec<_> = (0..3)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    let ports: Vec<u16> = reserved
        .iter()
        .map(|socket| socket.local_addr().unwrap().port())
        .collect();
    drop(reserved);
    let port_list = ports.iter().map(u16::to_string).collect::<Vec<_>>().join(",");

    let specs = expand_targets("127.0.0.1", &port_list);
    assert_eq!(specs.len(), 3);

    let routes = Arc::new(RouteTable::full());
    let targets = specs
        .iter()
        .map(|spec| {
            let identity = BackendIdentity::Listener(spec.to_string());
            (spec.clone(), Arc::new(ChaosBackend::new(Arc::clone(&routes), identity)))
        })
        .collect();
    let fleet = tokio::spawn(serve_all(targets));

    for spec in &specs {
        let addr: SocketAddr = spec.to_string().parse().unwrap();
        let (head, _) = split_response(&fetch_when_ready(addr, "/").await);
        assert!(head.starts_with("HTTP/1.1 200 OK"), "{}", head);
        assert!(head.contains(&format!("X-Backends: {}", spec)), "{}", head);
    }

    assert!(!fleet.is_finished());
    fleet.abort();
}

#[tokio::test]
async fn test_failover_serves_page_for_fault_routes() {
    let addr = spawn_backend(RouteTable::failover(), BackendIdentity::Default).await;
    let (head, _) = split_response(&fetch(addr, "/error?status=503").await);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("X-Backend: default"));
}

#[tokio::test]
async fn test_malformed_parameters_never_crash() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    let (head, _) = split_response(&fetch(addr, "/new?status=abc&slow=x,y,z").await);
    assert!(head.starts_with("HTTP/1.1 200 OK"));

    let (head, _) = split_response(&fetch(addr, "/error?status=abc").await);
    assert!(head.starts_with("HTTP/1.1 500"));
}

#[tokio::test]
async fn test_bodiless_statuses_have_no_framing() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    for code in ["204", "304"] {
        let raw = fetch(addr, &format!("/error?status={}", code)).await;
        let (head, body) = split_response(&raw);
        assert!(head.starts_with(&format!("HTTP/1.1 {}", code)), "{}", head);
        assert!(!head.contains("Content-Length"), "{}", head);
        assert!(!head.contains("Transfer-Encoding"), "{}", head);
        assert!(body.is_empty());
    }

    let raw = fetch(addr, "/new?status=204&sleepBetweenBytes=1").await;
    let (head, body) = split_response(&raw);
    assert!(head.starts_with("HTTP/1.1 204"), "{}", head);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_informational_status_is_never_sent() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;

    let (head, _) = split_response(&fetch(addr, "/error?status=101").await);
    assert!(head.starts_with("HTTP/1.1 500"), "{}", head);

    let (head, _) = split_response(&fetch(addr, "/new?status=100").await);
    assert!(head.starts_with("HTTP/1.1 200"), "{}", head);
}

#[tokio::test]
async fn test_garbage_request_gets_400() {
    let addr = spawn_backend(RouteTable::full(), BackendIdentity::Default).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"garbage\r\n\r\n").await.unwrap();
    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw).await;
    assert!(String::from_utf8_lossy(&raw).starts_with("HTTP/1.1 400 Bad Request"));
}
