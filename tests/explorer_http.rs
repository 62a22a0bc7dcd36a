#![allow(non_snake_case)]

use alloy::primitives::Address;
use coinflip_client::{
    abi::roll_topic,
    error::FeedError,
    explorer::{
        ExplorerClient,
        LogSource,
    },
};
use std::{
    net::SocketAddr,
    time::Duration,
};
use tokio::{
    io::{
        AsyncReadExt,
        AsyncWriteExt,
    },
    net::TcpListener,
    sync::oneshot,
};

/// Serves `body` once with `status` and hands back the raw request head.
async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
    });
    (addr, rx)
}

fn client(addr: SocketAddr, contract: Address) -> ExplorerClient {
    ExplorerClient::new(
        format!("http://{addr}/api"),
        Some("TESTKEY".to_string()),
        contract,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn fetch_logs__sends_etherscan_get_logs_query() {
    // given
    let contract = Address::repeat_byte(0x74);
    let (addr, request) = serve_once(
        "200 OK",
        r#"{"status":"1","message":"OK","result":[{"blockNumber":"0x66","transactionHash":"0x2","topics":[],"data":"0x"}]}"#,
    )
    .await;

    // when
    let logs = client(addr, contract).fetch_logs(103).await.unwrap();

    // then
    let request = request.await.unwrap();
    let request_line = request.lines().next().unwrap();
    assert!(request_line.starts_with("GET /api?"));
    for expected in [
        "module=logs".to_string(),
        "action=getLogs".to_string(),
        format!("address={contract}"),
        "fromBlock=103".to_string(),
        "toBlock=latest".to_string(),
        format!("topic0={}", roll_topic()),
        "apikey=TESTKEY".to_string(),
    ] {
        assert!(request_line.contains(&expected), "{expected} missing from {request_line}");
    }
    assert_eq!(1, logs.len());
    assert_eq!("0x66", logs[0].block_number);
}

#[tokio::test]
async fn fetch_logs__caught_up__returns_empty_batch() {
    let (addr, _request) =
        serve_once("200 OK", r#"{"status":"0","message":"No records found","result":[]}"#).await;

    let logs = client(addr, Address::ZERO).fetch_logs(0).await.unwrap();

    assert!(logs.is_empty());
}

#[tokio::test]
async fn fetch_logs__rejected_query__is_api_error() {
    let (addr, _request) = serve_once(
        "200 OK",
        r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
    )
    .await;

    let err = client(addr, Address::ZERO).fetch_logs(0).await.unwrap_err();

    assert_eq!("API error: NOTOK (Invalid API Key)", err.to_string());
}

#[tokio::test]
async fn fetch_logs__server_error_status__is_api_error() {
    let (addr, _request) = serve_once("502 Bad Gateway", "<html>bad gateway</html>").await;

    let err = client(addr, Address::ZERO).fetch_logs(0).await.unwrap_err();

    assert!(matches!(err, FeedError::Upstream { .. }));
}

#[tokio::test]
async fn fetch_logs__nobody_listening__is_network_error() {
    // given
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    // when
    let err = client(addr, Address::ZERO).fetch_logs(0).await.unwrap_err();

    // then
    assert!(matches!(err, FeedError::Network(_)));
    assert!(err.to_string().starts_with("Network error:"));
}
