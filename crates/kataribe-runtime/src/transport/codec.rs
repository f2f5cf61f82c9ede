//! Decode-once codec for inbound frames.
//!
//! Text frames are JSON-decoded, structured frames converted in place; either
//! way the result is a full [`Envelope`] or a `BadRequest` error. Callers on
//! the dispatch path drop undecodable frames silently (with a debug log).

use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};
use kataribe_core::Envelope;

use super::Frame;

pub fn decode(frame: Frame) -> Result<Envelope> {
    match frame {
        Frame::Text(s) => serde_json::from_str(&s)
            .map_err(|e| KataribeError::BadRequest(format!("invalid envelope json: {e}"))),
        Frame::Value(v) => {
            if !v.is_object() {
                return Err(KataribeError::BadRequest("envelope must be an object".into()));
            }
            serde_json::from_value(v)
                .map_err(|e| KataribeError::BadRequest(format!("invalid envelope value: {e}")))
        }
    }
}

/// Encode an envelope into the structured frame handed to transports.
pub fn encode(envelope: &Envelope) -> Result<Frame> {
    let value: Value = serde_json::to_value(envelope)
        .map_err(|e| KataribeError::Internal(format!("envelope encode: {e}")))?;
    Ok(Frame::Value(value))
}
