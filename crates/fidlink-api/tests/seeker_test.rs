#![allow(clippy::unwrap_used)]
// Discovery tests against a loopback advertiser.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde_json::json;
use tokio::net::UdpSocket;

use fidlink_api::discovery::SERVICE_TYPE;
use fidlink_api::{SeekQuery, Seeker};

/// Bind a loopback advertiser that answers one query with each reply in turn.
async fn spawn_advertiser(replies: Vec<serde_json::Value>) -> (SocketAddr, tokio::task::JoinHandle<SeekQuery>) {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = socket.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();
        let query: SeekQuery = serde_json::from_slice(&buf[..len]).unwrap();
        for reply in replies {
            let bytes = serde_json::to_vec(&reply).unwrap();
            socket.send_to(&bytes, from).await.unwrap();
        }
        query
    });

    (addr, task)
}

#[tokio::test]
async fn test_seek_collects_announcements_in_arrival_order() {
    let (addr, advertiser) = spawn_advertiser(vec![
        json!({ "PC61": { "uid": "first", "node": "127.0.0.1", "port": 33951, "service": "PetalControl" } }),
        json!({ "PC61": { "uid": "second", "node": "127.0.0.2", "port": 33952, "service": "PetalControl" } }),
    ])
    .await;

    let seeker = Seeker::new("PetalControl")
        .with_target(addr)
        .with_listen_window(Duration::from_millis(400));
    let found = seeker.seek().await.unwrap();

    let query = advertiser.await.unwrap();
    assert_eq!(query.stype, SERVICE_TYPE);
    assert_eq!(query.service, "PetalControl");

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].advertisement.uid, "first");
    assert_eq!(found[1].advertisement.uid, "second");
    assert_eq!(found[0].source, addr);
}

#[tokio::test]
async fn test_seek_with_no_answers_returns_empty_batch() {
    let (addr, _advertiser) = spawn_advertiser(Vec::new()).await;

    let seeker = Seeker::new("PetalControl")
        .with_target(addr)
        .with_listen_window(Duration::from_millis(100));

    assert!(seeker.seek().await.unwrap().is_empty());
}
