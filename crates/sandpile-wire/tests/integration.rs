//! Integration tests for sandpile-wire
//!
//! Drives a real `WireClient` over loopback TCP against a tiny scripted
//! server, so framing, acknowledgement and repaint behaviour are exercised
//! end to end.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use sandpile_core::{Position, WeightedEdge};
use sandpile_wire::{WireClient, WireError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serve one connection: for each received line, answer with the next
/// scripted reply. Returns the lines received.
async fn scripted_server(replies: Vec<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();

        for reply in replies {
            let Some(line) = lines.next_line().await.unwrap() else {
                break;
            };
            received.push(line);
            write_half.write_all(reply.as_bytes()).await.unwrap();
            write_half.write_all(b"\n").await.unwrap();
        }
        received
    });

    (port, handle)
}

#[tokio::test]
async fn test_mutation_and_repaint_over_tcp() {
    let (port, server) = scripted_server(vec!["done", "done", "0,1,5 1,0,2"]).await;

    let mut client = WireClient::connect("127.0.0.1", port).await.unwrap();
    client
        .add_edges(&[WeightedEdge::new(0, 1, 5), WeightedEdge::new(1, 0, 2)])
        .await
        .unwrap();
    let edges = client.get_edges().await.unwrap();
    assert_eq!(
        edges,
        vec![WeightedEdge::new(0, 1, 5), WeightedEdge::new(1, 0, 2)]
    );
    client.close().await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(received, vec!["add_edges 0,1,5 1,0,2", "repaint", "get_edges"]);
}

#[tokio::test]
async fn test_empty_reply_is_empty_collection() {
    let (port, server) = scripted_server(vec!["", ""]).await;

    let mut client = WireClient::connect("127.0.0.1", port).await.unwrap();
    assert!(client.get_vertices().await.unwrap().is_empty());
    assert!(client.get_unstables().await.unwrap().is_empty());

    server.await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_verbatim() {
    let (port, server) = scripted_server(vec!["Error: vertex 9 does not exist"]).await;

    let mut client = WireClient::connect("127.0.0.1", port)
        .await
        .unwrap()
        .with_auto_repaint(false);
    let err = client.set_sand(9, 1).await.unwrap_err();
    assert_eq!(
        err,
        WireError::Command("Error: vertex 9 does not exist".to_string())
    );

    server.await.unwrap();
}

#[tokio::test]
async fn test_positions_over_tcp() {
    let (port, server) = scripted_server(vec!["done", "1.5,-2 0,0"]).await;

    let mut client = WireClient::connect("127.0.0.1", port)
        .await
        .unwrap()
        .with_auto_repaint(false);
    client
        .add_vertices(&[Position::new(1.5, -2.0), Position::new(0.0, 0.0)])
        .await
        .unwrap();
    let positions = client.get_vertices().await.unwrap();
    assert_eq!(positions[0], Position::new(1.5, -2.0));

    let received = server.await.unwrap();
    assert_eq!(received[0], "add_vertices 1.5,-2 0,0");
}

#[tokio::test]
async fn test_server_hangup_is_connection_error() {
    let (port, server) = scripted_server(vec![]).await;

    let mut client = WireClient::connect("127.0.0.1", port).await.unwrap();
    server.await.unwrap();

    let result = client.get_config().await;
    assert!(matches!(result, Err(WireError::Connection(_))));
}
