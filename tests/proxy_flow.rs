//! End-to-end proxy behavior over real sockets.

use std::time::Duration;

mod common;

use common::{exchange, gateway_config, parse_replies, start_gateway, start_mock_upstream, start_programmable_upstream};

#[tokio::test]
async fn get_is_relayed_with_raw_headers() {
    let upstream = start_mock_upstream(200, "hello").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = exchange(
        addr,
        b"GET /items?id=1 HTTP/1.1\r\nHost: gateway\r\nX-Trace: AbC-9\r\n\r\n",
        true,
    )
    .await;

    let replies = parse_replies(&wire);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, 200);
    assert_eq!(replies[0].text(), "hello");

    let seen = upstream.requests();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/items?id=1");
    assert_eq!(seen[0].headers.get("x-trace").map(String::as_str), Some("AbC-9"));
}

#[tokio::test]
async fn post_body_is_forwarded() {
    let upstream = start_mock_upstream(200, "stored").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = exchange(
        addr,
        b"POST /notes HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world",
        true,
    )
    .await;

    assert_eq!(parse_replies(&wire)[0].status, 200);
    let seen = upstream.requests();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].body, b"hello world");
}

#[tokio::test]
async fn non_200_upstream_becomes_empty_502() {
    let upstream = start_mock_upstream(404, "not here").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = exchange(addr, b"GET /missing HTTP/1.1\r\n\r\n", true).await;

    let replies = parse_replies(&wire);
    assert_eq!(replies[0].status, 502);
    assert!(replies[0].body.is_empty());
    assert_eq!(replies[0].headers["content-length"], "0");
}

#[tokio::test]
async fn unreachable_upstream_becomes_502() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut config = gateway_config(&format!("http://{closed}"), dir.path());
    config.upstream.max_attempts = 2;
    let (addr, _shutdown) = start_gateway(config).await;

    let wire = exchange(addr, b"GET /x HTTP/1.1\r\n\r\n", true).await;
    assert_eq!(parse_replies(&wire)[0].status, 502);
}

#[tokio::test]
async fn pipelined_requests_are_answered_in_order() {
    let upstream = start_programmable_upstream(|req| (200, req.path.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = exchange(
        addr,
        b"GET /first HTTP/1.1\r\n\r\nPOST /second HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /third HTTP/1.1\r\n\r\n",
        true,
    )
    .await;

    let bodies: Vec<String> = parse_replies(&wire).iter().map(|r| r.text()).collect();
    assert_eq!(bodies, vec!["/first", "/second", "/third"]);
}

#[tokio::test]
async fn malformed_request_gets_400_then_close() {
    let upstream = start_mock_upstream(200, "ok").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    // No half-close: the gateway must close on its own.
    let wire = tokio::time::timeout(
        Duration::from_secs(5),
        exchange(addr, b"GET /ok HTTP/1.1\r\n\r\nBREW /pot HTTP/1.1\r\n\r\n", false),
    )
    .await
    .unwrap();

    let statuses: Vec<u16> = parse_replies(&wire).iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![200, 400]);
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn bare_lf_request_line_gets_400_then_close() {
    let upstream = start_mock_upstream(200, "ok").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, _shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = tokio::time::timeout(Duration::from_secs(5), exchange(addr, b"GET / HTTP/1.1\n", false))
        .await
        .unwrap();

    let statuses: Vec<u16> = parse_replies(&wire).iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![400]);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn idle_partial_request_gets_408_then_close() {
    let upstream = start_mock_upstream(200, "ok").await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = gateway_config(&upstream.base_url(), dir.path());
    config.timeouts.idle_secs = 1;
    let (addr, _shutdown) = start_gateway(config).await;

    let wire = tokio::time::timeout(
        Duration::from_secs(5),
        exchange(addr, b"GET /partial HT", false),
    )
    .await
    .unwrap();

    let replies = parse_replies(&wire);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, 408);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let upstream = start_mock_upstream(200, "ok").await;
    let dir = tempfile::tempdir().unwrap();
    let (addr, shutdown) = start_gateway(gateway_config(&upstream.base_url(), dir.path())).await;

    let wire = exchange(addr, b"GET /before HTTP/1.1\r\n\r\n", true).await;
    assert_eq!(parse_replies(&wire)[0].status, 200);

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
