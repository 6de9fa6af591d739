//! Replies to client-sent frames.
//!
//! Clients only ever talk to the server, never to each other: the one
//! recognised message is `ping`. Anything else gets a status envelope back.

use kanban_core::{EnvelopeError, StatusEnvelope};
use serde::{Deserialize, Serialize};

/// Message name answered with a pong.
pub const PING: &str = "ping";

#[derive(Debug, Deserialize)]
struct Inbound {
    name: String,
}

#[derive(Serialize)]
struct Pong {
    name: &'static str,
    data: (),
}

/// Build the reply frame for one inbound text message.
pub fn handle_inbound(text: &str) -> Result<String, EnvelopeError> {
    match serde_json::from_str::<Inbound>(text) {
        Ok(msg) if msg.name == PING => pong_frame(),
        Ok(_) => StatusEnvelope::abort("unknown event").to_frame(),
        Err(e) => StatusEnvelope::error(format!("invalid message: {e}")).to_frame(),
    }
}

/// Reply for a binary frame that is not UTF-8.
pub fn invalid_encoding() -> Result<String, EnvelopeError> {
    StatusEnvelope::error("invalid message: expected UTF-8 JSON").to_frame()
}

fn pong_frame() -> Result<String, EnvelopeError> {
    Ok(serde_json::to_string(&Pong {
        name: "pong",
        data: (),
    })?)
}
