//! End-to-end session tests against the in-memory simulator

use std::time::Duration;

use sandpile_core::{DirectoryError, Position, WeightedEdge};
use sandpile_session::{
    Configuration, ConfigName, GraphSession, LabelledEdge, LabelledGraph, LabelledVertex, Layout,
    SessionError, WireError,
};
use sandpile_wire::{MockSandpileServer, MockServerHandle, WireClient};

const SINK: usize = usize::MAX;

fn s(label: &str) -> String {
    label.to_string()
}

fn string_session() -> (GraphSession<String, MockSandpileServer>, MockServerHandle) {
    sandpile_logging::init_testing();
    let server = MockSandpileServer::new();
    let handle = server.handle();
    let session = GraphSession::new(WireClient::new(server), s("sink"));
    (session, handle)
}

fn index_session() -> (GraphSession<usize, MockSandpileServer>, MockServerHandle) {
    sandpile_logging::init_testing();
    let server = MockSandpileServer::new();
    let handle = server.handle();
    let session = GraphSession::new(WireClient::new(server), SINK);
    (session, handle)
}

/// Two non-sink vertices feeding each other and a single sink
fn two_vertex_graph() -> LabelledGraph<String> {
    LabelledGraph::new()
        .with_vertex(s("a"), (0.0, 0.0))
        .with_vertex(s("b"), (1.0, 0.0))
        .with_vertex(s("sink"), (0.5, 1.0))
        .with_edge(s("a"), s("b"), 1)
        .with_edge(s("a"), s("sink"), 1)
        .with_edge(s("b"), s("a"), 1)
        .with_edge(s("b"), s("sink"), 1)
}

#[tokio::test]
async fn test_import_then_export_roundtrip() {
    let (mut session, _handle) = index_session();

    let graph = LabelledGraph::new()
        .with_vertex(0, (0.0, 0.0))
        .with_vertex(1, (2.0, 0.5))
        .with_vertex(2, (-1.0, 3.0))
        .with_vertex(SINK, (5.0, 5.0))
        .with_edge(0, 1, 1)
        .with_edge(0, SINK, 1)
        .with_edge(1, 0, 2)
        .with_edge(1, 2, 1)
        .with_edge(2, SINK, 3)
        .with_edge(SINK, 0, 5);
    session.import_graph(&graph).await.unwrap();

    let snapshot = session.export_graph().await.unwrap();
    assert_eq!(snapshot.sink, SINK);
    assert_eq!(
        snapshot.vertices,
        vec![
            LabelledVertex::new(0, (0.0, 0.0)),
            LabelledVertex::new(1, (2.0, 0.5)),
            LabelledVertex::new(2, (-1.0, 3.0)),
        ]
    );
    assert_eq!(snapshot.sinks, vec![Position::new(5.0, 5.0)]);
    assert_eq!(
        snapshot.edges,
        vec![
            LabelledEdge::new(0, 1, 1),
            LabelledEdge::new(0, SINK, 1),
            LabelledEdge::new(1, 0, 2),
            LabelledEdge::new(1, 2, 1),
            LabelledEdge::new(2, SINK, 3),
        ]
    );

    // The snapshot is itself importable and reproduces the same graph
    session.import_graph(&snapshot).await.unwrap();
    assert_eq!(session.export_graph().await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_import_wire_traffic() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    assert_eq!(
        handle.received(),
        vec![
            "delete_graph",
            "add_vertices 0,0 1,0 0.5,1",
            "add_edges 0,1,1 0,2,1 1,0,1 1,2,1",
            "repaint",
        ]
    );
    assert!(session.auto_repaint());
}

#[tokio::test]
async fn test_import_with_layout() {
    let (mut session, handle) = string_session();
    session
        .import_graph_with_layout(&two_vertex_graph(), Layout::new(10.0, 1.0, 0.0))
        .await
        .unwrap();
    assert_eq!(handle.received()[1], "add_vertices 1,0 11,0 6,10");
}

#[tokio::test]
async fn test_import_redirects_to_lowest_sink() {
    let (mut session, handle) = string_session();
    let graph = LabelledGraph::new()
        .with_vertex(s("sink"), (0.0, 0.0))
        .with_vertex(s("a"), (1.0, 0.0))
        .with_vertex(s("sink"), (2.0, 0.0))
        .with_edge(s("a"), s("sink"), 4);
    session.import_graph(&graph).await.unwrap();

    assert_eq!(handle.edges(), vec![WeightedEdge::new(1, 0, 4)]);
    assert_eq!(session.directory().sink_count(), 2);
}

#[tokio::test]
async fn test_import_rejects_duplicate_labels_before_sending() {
    let (mut session, handle) = string_session();
    let graph = LabelledGraph::new()
        .with_vertex(s("a"), (0.0, 0.0))
        .with_vertex(s("a"), (1.0, 0.0));

    let err = session.import_graph(&graph).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Directory(DirectoryError::DuplicateLabel(_))
    ));
    assert!(handle.received().is_empty());
}

#[tokio::test]
async fn test_import_rejects_non_finite_positions_before_sending() {
    let (mut session, handle) = string_session();
    let graph = LabelledGraph::new()
        .with_vertex(s("a"), (0.0, 0.0))
        .with_vertex(s("b"), (f64::NAN, 1.0));

    let err = session.import_graph(&graph).await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::InvalidArgument(_))));
    assert!(handle.received().is_empty());
}

#[tokio::test]
async fn test_failed_import_leaves_no_stale_labels() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    handle.reply_next("done");
    handle.fail_next("Error: out of memory");
    let err = session.import_graph(&two_vertex_graph()).await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::Command(ref m)) if m == "Error: out of memory"));

    // The server graph was deleted, so the directory must be empty too
    assert!(session.directory().is_empty());
    assert!(session.auto_repaint());
}

#[tokio::test]
async fn test_config_roundtrip_has_no_sink_entry() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let mut config = Configuration::new();
    config.insert(s("a"), 3);
    config.insert(s("b"), 4);
    session.set_config(&config).await.unwrap();

    assert_eq!(session.get_config().await.unwrap(), config);
}

#[tokio::test]
async fn test_partial_config_zero_fills() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    handle.clear_received();

    let mut config = Configuration::new();
    config.insert(s("b"), 2);
    session.add_config(&config).await.unwrap();
    assert_eq!(handle.received()[0], "add_config 0,2,0");
}

#[tokio::test]
async fn test_config_with_sink_rejected_before_sending() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    handle.clear_received();

    let mut config = Configuration::new();
    config.insert(s("sink"), 1);
    let err = session.set_config(&config).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Directory(DirectoryError::UnknownLabel(_))
    ));
    assert!(handle.received().is_empty());
}

#[tokio::test]
async fn test_sand_debt() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let a = s("a");
    session.add_sand(&a, 4).await.unwrap();
    session.add_sand(&a, -7).await.unwrap();
    assert_eq!(session.get_sand(&a).await.unwrap(), -3);

    session.set_sand(&a, 9).await.unwrap();
    assert_eq!(session.get_sand(&a).await.unwrap(), 9);
}

#[tokio::test]
async fn test_edge_accumulation_and_removal() {
    let (mut session, _handle) = string_session();
    session.add_vertex(s("a"), (0.0, 0.0)).await.unwrap();
    session.add_vertex(s("b"), (1.0, 0.0)).await.unwrap();

    session.add_edge(s("a"), s("b"), 5).await.unwrap();
    session.add_edge(s("b"), s("a"), 2).await.unwrap();
    session.add_edge(s("a"), s("b"), 3).await.unwrap();
    assert_eq!(
        session.get_edges().await.unwrap(),
        vec![
            LabelledEdge::new(s("a"), s("b"), 8),
            LabelledEdge::new(s("b"), s("a"), 2),
        ]
    );

    session.add_edge(s("b"), s("a"), -2).await.unwrap();
    assert_eq!(
        session.get_edges().await.unwrap(),
        vec![LabelledEdge::new(s("a"), s("b"), 8)]
    );
}

#[tokio::test]
async fn test_sink_sourced_edge_is_not_sent() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    handle.clear_received();

    session.add_edge(s("sink"), s("a"), 1).await.unwrap();
    assert!(handle.received().is_empty());

    session.add_edge(s("a"), s("sink"), 1).await.unwrap();
    assert_eq!(handle.received()[0], "add_edge 0 2 1");
}

#[tokio::test]
async fn test_rejected_add_vertex_leaves_directory_unchanged() {
    let (mut session, handle) = string_session();
    session.add_vertex(s("a"), (0.0, 0.0)).await.unwrap();

    handle.fail_next("Error: no room");
    let err = session.add_vertex(s("b"), (1.0, 1.0)).await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::Command(ref m)) if m == "Error: no room"));
    assert_eq!(session.directory().len(), 1);
    assert!(!session.directory().contains(&s("b")));

    // Adding an existing label never reaches the server
    handle.clear_received();
    assert!(session.add_vertex(s("a"), (2.0, 2.0)).await.is_err());
    assert!(handle.received().is_empty());
}

#[tokio::test]
async fn test_failed_repaint_still_tracks_applied_mutations() {
    let (mut session, handle) = string_session();
    handle.reject_command("repaint", "Error: repaint failed");

    let err = session.add_vertex(s("a"), (0.0, 0.0)).await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(ref e) if e.command_applied()));
    assert_eq!(session.directory().len(), 1);
    assert_eq!(session.directory().to_index(&s("a")).unwrap(), 0);

    // The next label lands on the next server index
    assert!(session.add_vertex(s("b"), (1.0, 0.0)).await.is_err());
    assert!(session.set_sand(&s("b"), 5).await.is_err());
    assert_eq!(handle.sand(), vec![0, 5]);

    assert!(session.delete_graph().await.is_err());
    assert!(session.directory().is_empty());
    assert_eq!(handle.vertex_count(), 0);

    handle.accept_command("repaint");
    session.add_vertex(s("c"), (0.0, 0.0)).await.unwrap();
    assert_eq!(session.directory().to_index(&s("c")).unwrap(), 0);
}

#[tokio::test]
async fn test_sink_label_is_not_addressable() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let err = session.get_sand(&s("sink")).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Directory(DirectoryError::UnknownLabel(_))
    ));
    assert!(session.is_sink(&s("a")).await.map(|sink| !sink).unwrap());
}

#[tokio::test]
async fn test_get_sinks_returns_sink_label_only() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    assert_eq!(session.get_sinks().await.unwrap(), vec![s("sink")]);

    let mut nonsinks = session.get_nonsinks().await.unwrap();
    nonsinks.sort();
    assert_eq!(nonsinks, vec![s("a"), s("b")]);

    // A graph where every vertex has an outgoing edge has no sinks
    let cycle = LabelledGraph::new()
        .with_vertex(s("a"), (0.0, 0.0))
        .with_vertex(s("b"), (1.0, 0.0))
        .with_edge(s("a"), s("b"), 1)
        .with_edge(s("b"), s("a"), 1);
    session.import_graph(&cycle).await.unwrap();
    assert!(session.get_sinks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unstables_and_selected_drop_sink() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    session.add_sand(&s("b"), 2).await.unwrap();
    assert_eq!(session.get_unstables().await.unwrap(), vec![s("b")]);
    assert_eq!(session.get_num_unstables().await.unwrap(), 1);

    handle.select(&[2, 0]);
    assert_eq!(session.get_selected().await.unwrap(), vec![s("a")]);

    session.update().await.unwrap();
    assert_eq!(session.get_sand(&s("a")).await.unwrap(), 1);
    assert!(session.get_unstables().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stabilize_and_special_configs() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    session.set_to_max_stable().await.unwrap();
    let max_stable = session.get_max_stable().await.unwrap();
    assert_eq!(session.get_config().await.unwrap(), max_stable);
    assert_eq!(max_stable[&s("a")], 1);
    assert!(!max_stable.contains_key(&s("sink")));

    session.add_max_stable().await.unwrap();
    session.stabilize().await.unwrap();
    assert_eq!(session.get_num_unstables().await.unwrap(), 0);

    for config in [
        session.get_identity().await.unwrap(),
        session.get_burning().await.unwrap(),
        session.get_dual().await.unwrap(),
    ] {
        assert_eq!(config.len(), 2);
    }
    session.set_to_identity().await.unwrap();
    session.add_identity().await.unwrap();
    session.set_to_burning().await.unwrap();
    session.add_burning().await.unwrap();
    session.set_to_dual().await.unwrap();
    session.add_dual().await.unwrap();
}

#[tokio::test]
async fn test_named_config() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    handle.store_config("saved", vec![7, 8, 9]);

    let name = ConfigName::new("saved").unwrap();
    let config = session.get_config_named(&name).await.unwrap();
    assert_eq!(config.len(), 2);
    assert_eq!(config[&s("a")], 7);
    assert_eq!(config[&s("b")], 8);

    let missing = ConfigName::new("nothing").unwrap();
    assert!(session.get_config_named(&missing).await.is_err());
}

#[tokio::test]
async fn test_export_with_naming_scheme() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let snapshot = session
        .export_graph_with(|index| format!("v{}", index))
        .await
        .unwrap();
    assert_eq!(snapshot.vertices[0].label, "v0");
    assert_eq!(snapshot.vertices[1].label, "v1");
    assert!(snapshot.edges.contains(&LabelledEdge::new(s("v0"), s("sink"), 1)));

    // Later operations use the new labels
    session.add_sand(&s("v1"), 1).await.unwrap();
    assert!(session.get_sand(&s("a")).await.is_err());
}

#[tokio::test]
async fn test_export_naming_cannot_reuse_sink_label() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let err = session
        .export_graph_with(|index| if index == 1 { s("sink") } else { format!("v{}", index) })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Directory(DirectoryError::ReservedLabel { index: 1 })
    ));

    // The previous labels stay in force
    assert_eq!(session.directory().to_index(&s("b")).unwrap(), 1);
}

#[tokio::test]
async fn test_vertex_queries() {
    let (mut session, _handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    let vertices = session.get_vertices().await.unwrap();
    assert_eq!(vertices.len(), 2);
    assert_eq!(
        session.get_vertex(&s("b")).await.unwrap(),
        Position::new(1.0, 0.0)
    );
}

#[tokio::test]
async fn test_delete_graph_resets_directory() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();
    session.delete_graph().await.unwrap();

    assert!(session.directory().is_empty());
    assert_eq!(handle.vertex_count(), 0);
    assert!(session.get_sand(&s("a")).await.is_err());
}

#[tokio::test]
async fn test_random_sand_and_clear() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    session.add_random_sand(5).await.unwrap();
    assert_eq!(handle.sand().iter().sum::<i64>(), 5);
    assert_eq!(handle.sand()[2], 0);

    session.add_random_sand(-5).await.unwrap();
    assert_eq!(handle.sand().iter().sum::<i64>(), 5);

    session.clear_sand().await.unwrap();
    assert!(handle.sand().iter().all(|&s| s == 0));
}

#[tokio::test]
async fn test_deadline_makes_session_unusable() {
    let (mut session, handle) = string_session();
    session.import_graph(&two_vertex_graph()).await.unwrap();

    session.set_deadline(Some(Duration::from_millis(20)));
    handle.hang_next();
    let err = session.stabilize().await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::Timeout)));

    let err = session.get_config().await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::Desynchronized)));
}

#[tokio::test]
async fn test_close_then_fail() {
    let (mut session, _handle) = string_session();
    session.close().await.unwrap();
    let err = session.update().await.unwrap_err();
    assert!(matches!(err, SessionError::Wire(WireError::NotConnected)));
}
