//! End-to-end ingestion tests
//!
//! A local WebSocket server plays the AIS feed; sessions persist into a
//! temporary SQLite database through the real connector and gateway.

#[cfg(test)]
mod ingestion_integration_tests {
    use aisflow::aggregator_core::AggregationEngine;
    use aisflow::persistence::{PersistenceGateway, SqliteGateway};
    use aisflow::streamer_core::{
        RetryPolicy, RetryingSessionRunner, RunnerError, SessionEnd, StreamSession,
        SubscriptionRequest, WebSocketConnector,
    };
    use futures_util::{SinkExt, StreamExt};
    use rusqlite::Connection;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    fn position(ship_id: i64, latitude: f64, longitude: f64) -> String {
        serde_json::json!({
            "MessageType": "PositionReport",
            "Message": {"PositionReport": {"UserID": ship_id, "Latitude": latitude, "Longitude": longitude}}
        })
        .to_string()
    }

    fn ship_static(ship_id: i64, ship_type: i64, destination: &str) -> String {
        serde_json::json!({
            "MessageType": "ShipStaticData",
            "Message": {"ShipStaticData": {
                "UserID": ship_id,
                "Type": ship_type,
                "Destination": destination,
                "Dimensions": {"A": 120, "B": 30, "C": 10, "D": 12}
            }}
        })
        .to_string()
    }

    /// Accept one client, capture its subscription, push `frames`, then
    /// either close or hold the socket open until the client leaves
    async fn serve_once(frames: Vec<String>, close_after: bool) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let subscription = match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                other => panic!("expected subscription text frame, got {:?}", other),
            };

            for frame in frames {
                ws.send(Message::Text(frame)).await.unwrap();
            }

            if close_after {
                let _ = ws.close(None).await;
            } else {
                while let Some(Ok(_)) = ws.next().await {}
            }

            subscription
        });

        (url, handle)
    }

    fn count_rows(db_path: &Path, table: &str) -> i64 {
        let conn = Connection::open(db_path).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    fn last_log_row(db_path: &Path) -> (i64, i64) {
        let conn = Connection::open(db_path).unwrap();
        conn.query_row(
            "SELECT records_received, errors_encountered FROM ingestion_log ORDER BY id DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
    }

    async fn open_gateway(db_path: &Path) -> Arc<SqliteGateway> {
        let gateway = Arc::new(SqliteGateway::open(db_path).unwrap());
        gateway.ensure_schema().await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_websocket_session_persists_to_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ais.db");
        let gateway = open_gateway(&db_path).await;

        let (url, server) = serve_once(
            vec![
                position(244_000_001, 51.9, 4.1),
                ship_static(244_000_001, 70, "ROTTERDAM"),
                position(244_000_002, 52.0, 4.2),
            ],
            false,
        )
        .await;

        let session = StreamSession::new(
            Arc::new(WebSocketConnector::new(url)),
            gateway.clone(),
            SubscriptionRequest::global("test-key"),
        );
        let summary = session.run(Duration::from_secs(2)).await.unwrap();

        assert_eq!(summary.end, SessionEnd::DeadlineReached);
        assert_eq!(summary.records_received, 3);
        assert_eq!(summary.errors_encountered, 0);

        let subscription: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(subscription["APIKey"], "test-key");
        assert_eq!(subscription["BoundingBoxes"], serde_json::json!([[[-90.0, -180.0], [90.0, 180.0]]]));

        assert_eq!(count_rows(&db_path, "ship_position"), 2);
        assert_eq!(count_rows(&db_path, "ship_static"), 1);
        assert_eq!(count_rows(&db_path, "ingestion_log"), 1);
        assert_eq!(last_log_row(&db_path), (3, 0));

        let statics = gateway.read_static_by_ship_ids(&[244_000_001]).await.unwrap();
        assert_eq!(statics[0].ship_type, "70");
        assert_eq!(statics[0].destination, "ROTTERDAM");
        assert_eq!(statics[0].dim_a, Some(120.0));

        // Aggregate over the span the session covered
        let start = summary.started_at;
        let end = summary.ended_at + chrono::Duration::seconds(1);
        assert_eq!(gateway.read_positions_in_window(start, end).await.unwrap().len(), 2);

        let aggregate = AggregationEngine::new(gateway.clone()).aggregate(start, end).await.unwrap();
        assert_eq!(aggregate.total, 2);
        assert_eq!(aggregate.cargo, 1);
        assert_eq!(aggregate.tanker, 0);
        assert_eq!(aggregate.passenger, 0);
        assert_eq!(count_rows(&db_path, "ship_count_agg"), 1);
    }

    #[tokio::test]
    async fn test_server_close_ends_session_early() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ais.db");
        let gateway = open_gateway(&db_path).await;

        let frames = (0..5).map(|i| position(100 + i, 10.0, 10.0)).collect();
        let (url, server) = serve_once(frames, true).await;

        let session = StreamSession::new(
            Arc::new(WebSocketConnector::new(url)),
            gateway.clone(),
            SubscriptionRequest::global("test-key"),
        );

        let started = std::time::Instant::now();
        let summary = session.run(Duration::from_secs(30)).await.unwrap();
        server.await.unwrap();

        assert_eq!(summary.end, SessionEnd::TransportClosed);
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(summary.records_received, 5);
        assert_eq!(summary.errors_encountered, 1);
        assert_eq!(count_rows(&db_path, "ship_position"), 5);
        assert_eq!(last_log_row(&db_path), (5, 1));
    }

    #[tokio::test]
    async fn test_runner_gives_up_on_unreachable_feed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ais.db");
        let gateway = open_gateway(&db_path).await;

        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = StreamSession::new(
            Arc::new(WebSocketConnector::new(url)),
            gateway.clone(),
            SubscriptionRequest::global("test-key"),
        );
        let runner = RetryingSessionRunner::new(RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(50),
            attempt_timeout: Duration::from_secs(10),
        });

        let result = runner.run(&session, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(RunnerError::Exhausted { attempts: 3, .. })));
        assert_eq!(count_rows(&db_path, "ingestion_log"), 3);
        assert_eq!(last_log_row(&db_path), (0, 1));
        assert_eq!(count_rows(&db_path, "ship_position"), 0);
    }
}
