//! End-to-end integration tests

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::util::ServiceExt;

use super::fixtures::{segment_bytes, spawn_router, spawn_upstream};
use crate::config::{ServerConfig, UpstreamConfig};
use crate::http::create_router;
use crate::registry::ChannelRegistry;
use crate::state::AppState;

const HOST: &str = "proxy.local:8080";

struct Harness {
    upstream: SocketAddr,
    registry: Arc<ChannelRegistry>,
    app: Router,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    async fn with_config(config: ServerConfig) -> Self {
        let upstream = spawn_upstream().await;
        let registry = Arc::new(ChannelRegistry::new());
        registry.upsert("Demo", &format!("http://{}/live/x.m3u8", upstream), "");
        let state = Arc::new(AppState::new(config, registry.clone()).unwrap());
        Self {
            upstream,
            registry,
            app: create_router(state),
        }
    }

    fn add_channel(&self, name: &str, path: &str) {
        self.registry
            .upsert(name, &format!("http://{}{}", self.upstream, path), "");
    }

    async fn get(&self, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder()
            .uri(path)
            .header(header::HOST, HOST)
            .body(Body::empty())
            .unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, body.to_vec())
    }

    async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let (status, _, body) = self.get(path).await;
        (status, String::from_utf8(body).unwrap())
    }
}

#[tokio::test]
async fn test_demo_channel_round_trip() {
    let h = Harness::new().await;

    let (status, content_type, body) = h.get("/iptv/Demo.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/vnd.apple.mpegurl"));
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "#EXTM3U\nhttp://proxy.local:8080/iptv/Demo/seg1.ts\n"
    );

    let (status, content_type, body) = h.get("/iptv/Demo/seg1.ts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("video/MP2T"));
    assert_eq!(body, segment_bytes());
}

#[tokio::test]
async fn test_encoded_channel_name_kept_in_prefix() {
    let h = Harness::new().await;
    h.add_channel("LRT Plius HD", "/live/x.m3u8");

    let (status, body) = h.get_text("/iptv/LRT%20Plius%20HD.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "#EXTM3U\nhttp://proxy.local:8080/iptv/LRT%20Plius%20HD/seg1.ts\n"
    );

    let (status, _, body) = h.get("/iptv/LRT%20Plius%20HD/seg1.ts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, segment_bytes());
}

#[tokio::test]
async fn test_master_playlist_rewrite() {
    let h = Harness::new().await;
    h.add_channel("Master", "/live/master.m3u8");

    let (status, body) = h.get_text("/iptv/Master.m3u8").await;
    assert_eq!(status, StatusCode::OK);

    let prefix = "http://proxy.local:8080/iptv/Master/";
    let lines: Vec<&str> = body.split('\n').collect();
    assert_eq!(
        lines,
        vec![
            "#EXTM3U".to_string(),
            format!(
                "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"en\",URI=\"{}audio/en.m3u8\"",
                prefix
            ),
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"sub\",NAME=\"none\",URI=\"\"".to_string(),
            "#EXT-X-STREAM-INF:BANDWIDTH=1280000".to_string(),
            format!("{}hd/index.m3u8?token=abc", prefix),
            "".to_string(),
            "#EXT-X-STREAM-INF:BANDWIDTH=640000".to_string(),
            "https://mirror.example/sd/index.m3u8".to_string(),
            "".to_string(),
        ]
    );
    assert!(!body.contains('\r'));
}

#[tokio::test]
async fn test_nested_playlist_and_key() {
    let h = Harness::new().await;

    let (status, body) = h.get_text("/iptv/Demo/hd/index.m3u8?token=abc").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        "#EXT-X-KEY:METHOD=AES-128,URI=\"http://proxy.local:8080/iptv/Demo/keys/k1.key\"\n"
    ));
    assert!(body.contains("\nhttp://proxy.local:8080/iptv/Demo/chunk_0001.ts\n"));
    assert!(body.contains("#EXT-X-TARGETDURATION:6\n"));
}

#[tokio::test]
async fn test_segment_query_reaches_upstream() {
    let h = Harness::new().await;

    let (status, body) = h.get_text("/iptv/Demo/echo.ts?token=a%2Fb&exp=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "token=a%2Fb&exp=1");
}

#[tokio::test]
async fn test_upstream_status_forwarded() {
    let h = Harness::new().await;
    h.add_channel("Blocked", "/live/forbidden.m3u8");

    let (status, _) = h.get_text("/iptv/Blocked.m3u8").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h.get_text("/iptv/Demo/missing.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upstream_timeout() {
    let config = ServerConfig {
        upstream: UpstreamConfig {
            timeout_secs: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = Harness::with_config(config).await;
    h.add_channel("Slow", "/live/slow.m3u8");

    let started = std::time::Instant::now();
    let (status, body) = h.get_text("/iptv/Slow.m3u8").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("slow.m3u8"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_client_disconnect_cancels_upstream_fetch() {
    // Upstream that reads the request and never answers.
    let upstream = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (arrived_tx, arrived_rx) = tokio::sync::oneshot::channel();
    let upstream_task = tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        assert!(socket.read(&mut buf).await.unwrap() > 0);
        let _ = arrived_tx.send(());
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let registry = Arc::new(ChannelRegistry::new());
    registry.upsert("Hang", &format!("http://{}/live/hang.m3u8", upstream_addr), "");
    let state = Arc::new(AppState::new(ServerConfig::default(), registry).unwrap());
    let proxy = spawn_router(create_router(state)).await;

    let mut client = tokio::net::TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"GET /iptv/Hang.m3u8 HTTP/1.1\r\nHost: proxy.local\r\n\r\n")
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), arrived_rx)
        .await
        .unwrap()
        .unwrap();
    drop(client);

    // Well inside the 30s upstream timeout, so only cancellation closes it.
    tokio::time::timeout(Duration::from_secs(2), upstream_task)
        .await
        .expect("upstream connection left open after the client went away")
        .unwrap();
}

#[tokio::test]
async fn test_failures_do_not_affect_other_requests() {
    let h = Harness::new().await;

    let (status, _) = h.get_text("/iptv/Unknown.m3u8").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.get_text("/iptv/Bad%zz/seg1.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.get_text("/iptv/Demo.m3u8").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_requests_during_refresh() {
    let h = Harness::new().await;
    let upstream = h.upstream;
    let registry = h.registry.clone();

    let writer = tokio::spawn(async move {
        for i in 0..200 {
            // Alternate between two equivalent URLs for the same stream.
            let url = if i % 2 == 0 {
                format!("http://{}/live/x.m3u8", upstream)
            } else {
                format!("http://{}/live/./x.m3u8", upstream)
            };
            registry.upsert("Demo", &url, "");
            tokio::task::yield_now().await;
        }
    });

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let app = h.app.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri("/iptv/Demo.m3u8")
                .header(header::HOST, HOST)
                .body(Body::empty())
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }));
    }

    writer.await.unwrap();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_served_over_tcp() {
    let h = Harness::new().await;
    let proxy = spawn_router(h.app.clone()).await;

    let client = reqwest::Client::new();
    let body = client
        .get(format!("http://{}/iptv/Demo.m3u8", proxy))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, format!("#EXTM3U\nhttp://{}/iptv/Demo/seg1.ts\n", proxy));

    let segment = client
        .get(format!("http://{}/iptv/Demo/seg1.ts", proxy))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(segment.to_vec(), segment_bytes());
}
