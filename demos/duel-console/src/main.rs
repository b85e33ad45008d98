//! Terminal duel client.
//!
//! ```text
//! DUELKIT_SERVER_URL=ws://localhost:8080/duel cargo run -p duel-console -- p1 Ada
//! ```
//!
//! Commands: `join`, `answer <text>` (or `a <text>`), `leave`, `quit`.

use duelkit::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(prev: Option<&DuelState>, state: &DuelState) {
    if prev.map(|p| p.connection) != Some(state.connection) {
        println!("[connection] {}", state.connection);
    }
    if prev.map(|p| p.phase) != Some(state.phase) {
        println!("[duel] {}", state.phase);
    }
    if state.is_in_queue && prev.map(|p| p.queue_position) != Some(state.queue_position) {
        if let Some(position) = state.queue_position {
            println!("  queue position: {position}");
        }
    }
    if let Some(room) = &state.room {
        if prev.and_then(|p| p.room.as_ref()).map(|r| &r.id) != Some(&room.id) {
            let opponent = room
                .player2
                .as_ref()
                .map_or("unknown", |p| p.display_name.as_str());
            println!("  matched against {opponent} (match {})", room.id);
        }
    }
    if let Some(q) = &state.question {
        if prev.and_then(|p| p.question.as_ref()).map(|p| &p.id) != Some(&q.id) {
            println!("  round {}: {}", q.round_number, q.text);
            for (i, option) in q.options.iter().flatten().enumerate() {
                println!("    {}) {option}", i + 1);
            }
        }
    }
    if state.last_answer_correct.is_some() && prev.map(|p| p.last_answer_correct) != Some(state.last_answer_correct) {
        let verdict = if state.last_answer_correct == Some(true) { "correct" } else { "wrong" };
        println!("  your answer was {verdict}");
    }
    if state.round_timed_out && !prev.is_some_and(|p| p.round_timed_out) {
        println!("  time is up");
    }
    if prev.map(|p| &p.scores) != Some(&state.scores) && !state.scores.is_empty() {
        let scores: Vec<String> = state.scores.iter().map(|(id, s)| format!("{id}={s}")).collect();
        println!("  scores: {}", scores.join(", "));
    }
    if let Some(result) = &state.result {
        if prev.and_then(|p| p.result.as_ref()) != Some(result) {
            println!("  duel over: {:?}", result.outcome);
        }
    }
    if let Some(error) = &state.error {
        if prev.and_then(|p| p.error.as_ref()) != Some(error) {
            println!("  error: {error}");
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    duelkit::init_tracing();

    let mut args = std::env::args().skip(1);
    let player_id = args.next().unwrap_or_else(|| "console-player".into());
    let display_name = args.next().unwrap_or_else(|| player_id.clone());
    let identity = StaticIdentity::new(player_id, display_name);

    let client = DuelClient::from_config(ClientConfig::from_env()?)?;
    client.connect()?;

    let mut states = client.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = client.state();
    render(None, &last);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                render(Some(last.as_ref()), &state);
                last = state;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line.split_once(' ').unwrap_or((line, "")) {
                    ("join", _) => client.start_duel_as(&identity).await?,
                    ("answer" | "a", answer) if !answer.trim().is_empty() => {
                        client.submit_answer(answer.trim())?;
                    }
                    ("leave", _) => client.leave_queue()?,
                    ("quit" | "exit", _) => break,
                    ("", _) => {}
                    _ => eprintln!("commands: join | answer <text> | leave | quit"),
                }
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}
