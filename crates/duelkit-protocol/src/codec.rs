//! The JSON codec: [`WebSocketMessage`] ⇄ bytes.
//!
//! Both directions are plain functions. The codec holds no state and does
//! no I/O, so it can be tested against literal wire samples.
//!
//! Decoding happens in two steps:
//!
//! 1. Parse the frame as `{ "action": String, "data": any }`.
//! 2. Look the action up and parse `data` as that action's payload.
//!
//! Splitting the steps is what lets an unknown action surface as
//! [`DecodeError::UnrecognizedAction`] instead of a generic parse error.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::actions;
use crate::{DecodeError, EncodeError, WebSocketMessage};

/// The outer shape of every frame, before the payload is interpreted.
#[derive(Deserialize)]
struct RawFrame {
    action: String,
    /// Absent for keep-alive frames; `Value::Null` then.
    #[serde(default)]
    data: Value,
}

/// Serializes a message into a UTF-8 JSON frame.
///
/// # Errors
/// Returns [`EncodeError`] if serde_json fails.
pub fn encode(message: &WebSocketMessage) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(message)?)
}

/// Same as [`encode`], returned as a `String` for text-frame transports.
///
/// # Errors
/// Returns [`EncodeError`] if serde_json fails.
pub fn encode_text(message: &WebSocketMessage) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(message)?)
}

/// Parses one frame into a [`WebSocketMessage`].
///
/// # Errors
/// - [`DecodeError::InvalidFrame`] — not JSON, or no string `action`
/// - [`DecodeError::UnrecognizedAction`] — `action` is not a known tag
/// - [`DecodeError::MalformedPayload`] — `data` does not fit the action
pub fn decode(bytes: &[u8]) -> Result<WebSocketMessage, DecodeError> {
    let RawFrame { action, data } =
        serde_json::from_slice(bytes).map_err(DecodeError::InvalidFrame)?;

    let message = match action.as_str() {
        actions::JOIN_QUEUE => WebSocketMessage::JoinQueue(payload(&action, data)?),
        actions::QUEUED => WebSocketMessage::Queued(payload(&action, data)?),
        actions::MATCH_FOUND => WebSocketMessage::MatchFound(payload(&action, data)?),
        actions::CURRENT_QUESTION => {
            WebSocketMessage::CurrentQuestion(payload(&action, data)?)
        }
        actions::QUESTION => WebSocketMessage::QuestionReceived(payload(&action, data)?),
        actions::SUBMIT_ANSWER => WebSocketMessage::SubmitAnswer(payload(&action, data)?),
        actions::SCORE_UPDATE => WebSocketMessage::ScoreUpdate(payload(&action, data)?),
        actions::OPPONENT_ANSWER => {
            WebSocketMessage::OpponentAnswer(payload(&action, data)?)
        }
        actions::GAME_OVER => WebSocketMessage::GameOver(payload(&action, data)?),
        actions::DUEL_COMPLETE => WebSocketMessage::DuelComplete(payload(&action, data)?),
        actions::OPPONENT_LEFT => WebSocketMessage::OpponentLeft(payload(&action, data)?),
        actions::ERROR => WebSocketMessage::Error(payload(&action, data)?),
        actions::PING => WebSocketMessage::Ping,
        actions::PONG => WebSocketMessage::Pong,
        _ => return Err(DecodeError::UnrecognizedAction(action)),
    };

    Ok(message)
}

/// Parses `data` as the payload type `T` for `action`.
///
/// A missing `data` is read as `{}` so payloads whose fields all have
/// defaults (e.g. `queued`) still decode from a bare `{"action": ...}`.
fn payload<T: DeserializeOwned>(action: &str, data: Value) -> Result<T, DecodeError> {
    let data = match data {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(data).map_err(|source| DecodeError::MalformedPayload {
        action: action.to_string(),
        source,
    })
}
