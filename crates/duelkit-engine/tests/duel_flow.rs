//! Integration tests for the duel engine: a real connection manager over
//! the mock transport, with the test playing the server.

use std::sync::Arc;
use std::time::Duration;

use duelkit_connection::mock::{ClientFrame, MockConnector, MockServer};
use duelkit_connection::{
    ConnectionConfig, ConnectionManager, ConnectionStatus, Dispatcher, HeartbeatConfig,
};
use duelkit_engine::{
    DuelEngine, DuelHandle, DuelPhase, DuelState, DuelUser, EngineConfig, LEAVE_QUEUE_REASON,
};
use duelkit_protocol::{JoinQueuePayload, SubmitAnswerPayload, WebSocketMessage};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Rig {
    connector: MockConnector,
    servers: mpsc::UnboundedReceiver<MockServer>,
    duel: DuelHandle,
}

fn rig() -> Rig {
    let (connector, servers) = MockConnector::new();
    let (dispatcher, inbox) = Dispatcher::new();
    let config = ConnectionConfig::default()
        .with_heartbeat(HeartbeatConfig::with_interval(Duration::ZERO))
        .with_timeouts(
            Duration::from_secs(10),
            Duration::from_secs(3600),
            Duration::from_secs(10),
        );
    let (conn, _conn_task) = ConnectionManager::spawn(connector.clone(), "mock://duel", config, dispatcher);
    let (duel, _engine_task) = DuelEngine::spawn(EngineConfig::default(), conn, inbox);
    Rig {
        connector,
        servers,
        duel,
    }
}

fn ada() -> DuelUser {
    DuelUser::new("p1", "Ada")
}

impl Rig {
    async fn next_server(&mut self) -> MockServer {
        tokio::time::timeout(Duration::from_secs(600), self.servers.recv())
            .await
            .expect("client should connect")
            .expect("connector alive")
    }

    /// Waits for a snapshot satisfying `pred`.
    async fn wait_until(&self, pred: impl Fn(&DuelState) -> bool) -> Arc<DuelState> {
        let mut rx = self.duel.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| pred(s.as_ref())))
            .await
            .expect("state should be reached")
            .expect("engine alive");
        Arc::clone(&state)
    }

    /// Starts a duel as p1 and returns the server after it saw `join_queue`.
    async fn joined(&mut self) -> MockServer {
        self.duel.start_duel(ada()).unwrap();
        let mut server = self.next_server().await;
        let join = server.next_message().await;
        assert!(matches!(join, Some(WebSocketMessage::JoinQueue(_))));
        server
    }

    /// Joined, queued, and matched against p2.
    async fn matched(&mut self) -> MockServer {
        let server = self.joined().await;
        server.push(r#"{"action":"queued","data":{"position":1}}"#);
        server.push(
            r#"{"action":"match_found","data":{"match_id":"m1","player_id":"p1","opponent_id":"p2","opponent_name":"Bob"}}"#,
        );
        self.wait_until(|s| s.room.is_some()).await;
        server
    }
}

fn question(id: &str, round: u32) -> String {
    format!(
        r#"{{"action":"current_question","data":{{"question_id":"{id}","text":"Q{round}","round_number":{round}}}}}"#
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_end_to_end_queue_match_question_answer() {
    let mut rig = rig();
    rig.duel.start_duel(ada()).unwrap();
    let mut server = rig.next_server().await;

    assert_eq!(
        server.next_message().await,
        Some(WebSocketMessage::JoinQueue(JoinQueuePayload {
            player_id: "p1".into(),
            display_name: "Ada".into(),
            avatar_url: None,
        }))
    );

    server.push(r#"{"action":"queued","data":{"position":3}}"#);
    let s = rig.wait_until(|s| s.is_in_queue).await;
    assert_eq!(s.queue_position, Some(3));
    assert_eq!(s.phase, DuelPhase::Queued);

    server.push(
        r#"{"action":"match_found","data":{"match_id":"m1","player_id":"p1","opponent_id":"p2","opponent_name":"Bob"}}"#,
    );
    let s = rig.wait_until(|s| s.room.is_some()).await;
    let room = s.room.as_ref().unwrap();
    assert_eq!(room.id, "m1");
    assert_eq!(room.player2.as_ref().unwrap().display_name, "Bob");
    assert_eq!(s.score_of("p1"), 0);
    assert_eq!(s.score_of("p2"), 0);

    server.push(question("q1", 1));
    rig.wait_until(|s| s.question.is_some()).await;
    rig.duel.submit_answer("42").unwrap();

    let Some(ClientFrame::Text(frame)) = server.next_frame().await else {
        panic!("expected a text frame");
    };
    assert!(frame.contains(r#""question_id":"q1""#), "{frame}");
    assert!(frame.contains(r#""answer":"42""#), "{frame}");
    assert!(frame.contains(r#""match_id":"m1""#), "{frame}");

    let s = rig.wait_until(|s| s.has_answered).await;
    assert_eq!(s.selected_answer.as_deref(), Some("42"));
}

#[tokio::test(start_paused = true)]
async fn test_two_start_duel_calls_send_one_join() {
    let mut rig = rig();
    rig.duel.start_duel(ada()).unwrap();
    rig.duel.start_duel(ada()).unwrap();
    let mut server = rig.next_server().await;

    assert!(matches!(
        server.next_message().await,
        Some(WebSocketMessage::JoinQueue(_))
    ));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(server.drain_sent().is_empty());
    assert_eq!(rig.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_retry_inside_window_is_debounced() {
    let mut rig = rig();
    let mut server = rig.joined().await;

    // A failed join frees the user to retry, but not within 3s.
    server.push(r#"{"action":"error","data":{"message":"matchmaking paused"}}"#);
    rig.wait_until(|s| s.error.is_some()).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    rig.duel.start_duel(ada()).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(server.drain_sent().is_empty());
    assert!(!rig.duel.state().is_searching);

    tokio::time::sleep(Duration::from_secs(2)).await;
    rig.duel.start_duel(ada()).unwrap();
    assert!(matches!(
        server.next_message().await,
        Some(WebSocketMessage::JoinQueue(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_score_update_about_opponent_keeps_my_flag() {
    let mut rig = rig();
    let server = rig.matched().await;
    server.push(question("q1", 1));
    server.push(
        r#"{"action":"score_update","data":{"scores":{"p2":10},"round_number":1,"updated_player_id":"p2","correct":true}}"#,
    );

    let s = rig.wait_until(|s| s.score_of("p2") == 10).await;
    assert_eq!(s.last_answer_correct, None);
    assert_eq!(s.opponent_last_correct, Some(true));

    server.push(
        r#"{"action":"score_update","data":{"scores":{"p1":10},"round_number":1,"updated_player_id":"p1","correct":true}}"#,
    );
    let s = rig.wait_until(|s| s.score_of("p1") == 10).await;
    assert_eq!(s.last_answer_correct, Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_already_registered_error_means_queued() {
    let mut rig = rig();
    let server = rig.joined().await;
    server.push(r#"{"action":"error","data":{"message":"player already registered"}}"#);

    let s = rig.wait_until(|s| s.is_in_queue).await;
    assert_eq!(s.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_messages_apply_in_arrival_order() {
    let mut rig = rig();
    let server = rig.matched().await;
    for round in 1..=5 {
        server.push(question(&format!("q{round}"), round));
        server.push(format!(
            r#"{{"action":"score_update","data":{{"scores":{{"p1":{}}},"round_number":{round}}}}}"#,
            round * 10
        ));
    }

    let s = rig.wait_until(|s| s.score_of("p1") == 50).await;
    assert_eq!(s.current_round, 5);
    assert_eq!(s.question.as_ref().unwrap().id, "q5");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_action_leaves_state_unchanged() {
    let mut rig = rig();
    let server = rig.joined().await;
    server.push(r#"{"action":"queued","data":{"position":2}}"#);
    let before = rig.wait_until(|s| s.is_in_queue).await;

    server.push(r#"{"action":"tournament_started","data":{"id":9}}"#);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(Arc::ptr_eq(&before, &rig.duel.state()));
}

#[tokio::test(start_paused = true)]
async fn test_garbage_frame_surfaces_parse_error() {
    let mut rig = rig();
    let server = rig.joined().await;
    server.push("<html>502 Bad Gateway</html>");

    let s = rig.wait_until(|s| s.error.is_some()).await;
    assert_eq!(s.error.as_deref(), Some("Failed to parse message"));
}

#[tokio::test(start_paused = true)]
async fn test_round_timer_blocks_late_answer() {
    let mut rig = rig();
    let mut server = rig.matched().await;
    server.push(
        r#"{"action":"question","data":{"question_id":"q1","text":"fast","round_number":1,"time_limit":5}}"#,
    );
    rig.wait_until(|s| s.question.is_some()).await;

    let s = rig.wait_until(|s| s.round_timed_out).await;
    assert!(!s.can_answer());

    rig.duel.submit_answer("too late").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(server.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_answer_cancels_round_timer() {
    let mut rig = rig();
    let mut server = rig.matched().await;
    server.push(question("q1", 1));
    rig.wait_until(|s| s.question.is_some()).await;

    rig.duel.submit_answer("b").unwrap();
    assert!(matches!(
        server.next_message().await,
        Some(WebSocketMessage::SubmitAnswer(SubmitAnswerPayload { ref answer, .. })) if answer == "b"
    ));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!rig.duel.state().round_timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_game_over_then_new_duel() {
    let mut rig = rig();
    let mut server = rig.matched().await;
    server.push(
        r#"{"action":"game_over","data":{"winner_id":"p2","reason":"score","scores":{"p1":10,"p2":20}}}"#,
    );
    let s = rig.wait_until(|s| s.result.is_some()).await;
    assert_eq!(s.phase, DuelPhase::Complete);
    assert_eq!(
        s.result.as_ref().unwrap().outcome,
        duelkit_engine::DuelOutcome::Lost
    );

    rig.duel.start_duel(ada()).unwrap();
    assert!(matches!(
        server.next_message().await,
        Some(WebSocketMessage::JoinQueue(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_leave_queue_hard_resets_connection() {
    let mut rig = rig();
    let mut server = rig.joined().await;
    server.push(r#"{"action":"queued","data":{"position":1}}"#);
    rig.wait_until(|s| s.is_in_queue).await;

    rig.duel.leave_queue().unwrap();
    assert_eq!(
        server.next_frame().await,
        Some(ClientFrame::Closed {
            reason: LEAVE_QUEUE_REASON.into()
        })
    );

    let mut second = rig.next_server().await;
    let s = rig
        .wait_until(|s| s.connection == ConnectionStatus::Connected)
        .await;
    assert!(!s.is_in_queue);
    assert_eq!(s.phase, DuelPhase::Idle);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(second.drain_sent().is_empty(), "no automatic re-queue");
}

#[tokio::test(start_paused = true)]
async fn test_start_duel_right_after_leave_joins_on_new_connection() {
    let mut rig = rig();
    let mut server = rig.joined().await;
    server.push(r#"{"action":"queued","data":{"position":1}}"#);
    rig.wait_until(|s| s.is_in_queue).await;

    rig.duel.leave_queue().unwrap();
    rig.duel.start_duel(ada()).unwrap();
    assert_eq!(
        server.next_frame().await,
        Some(ClientFrame::Closed {
            reason: LEAVE_QUEUE_REASON.into()
        })
    );

    let mut second = rig.next_server().await;
    assert!(matches!(
        second.next_message().await,
        Some(WebSocketMessage::JoinQueue(p)) if p.player_id == "p1"
    ));
    let s = rig.wait_until(|s| s.connection == ConnectionStatus::Connected).await;
    assert_eq!(s.error, None);
    assert!(s.is_searching);
}

#[tokio::test(start_paused = true)]
async fn test_connection_drop_clears_queue_without_requeue() {
    let mut rig = rig();
    let server = rig.joined().await;
    server.push(r#"{"action":"queued","data":{"position":1}}"#);
    rig.wait_until(|s| s.is_in_queue).await;

    server.close();
    let s = rig.wait_until(|s| !s.is_in_queue).await;
    assert_ne!(s.connection, ConnectionStatus::Connected);

    let mut second = rig.next_server().await;
    rig.wait_until(|s| s.connection == ConnectionStatus::Connected)
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(second.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_is_reported() {
    let rig = rig();
    rig.connector.refuse_all(true);
    rig.duel.start_duel(ada()).unwrap();

    let s = rig.wait_until(|s| s.error.is_some()).await;
    assert_eq!(
        s.error.as_deref(),
        Some("Lost connection to duel server after 5 reconnect attempts")
    );
    assert_eq!(s.connection, ConnectionStatus::Error);
    assert!(!s.is_searching);
    assert_eq!(rig.connector.attempts(), 6);
}
