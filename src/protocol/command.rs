//! Inbound remote command decoding
//!
//! Commands arrive as a two-element array-shaped event, `["event_name",
//! {"command": "...", "value": ...}]`, possibly wrapped in transport framing
//! noise before the first bracket.

use serde_json::Value;

use super::DecodeError;

/// A decoded remote command. Consumed immediately by the dispatcher and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub command: String,
    pub value: Option<u64>,
}

/// Extract a [`Command`] from raw event text.
///
/// The array is located by the outermost bracket pair, matching how the
/// transport frames named events. Fails with [`DecodeError::Malformed`] when
/// no bracket pair exists or the content does not parse as a two-element
/// array with an object second element, and [`DecodeError::MissingField`]
/// when the `command` field is absent. `value`, if present, must be an
/// integer ≥ 0.
pub fn decode_command(raw: &str) -> Result<Command, DecodeError> {
    let start = raw
        .find('[')
        .ok_or_else(|| DecodeError::Malformed("no event array found".to_string()))?;
    let end = raw
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| DecodeError::Malformed("unterminated event array".to_string()))?;

    let parsed: Value = serde_json::from_str(&raw[start..=end])
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let items = parsed
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| DecodeError::Malformed("expected two-element event array".to_string()))?;

    let fields = items[1]
        .as_object()
        .ok_or_else(|| DecodeError::Malformed("event data must be an object".to_string()))?;

    let command = match fields.get("command") {
        None => return Err(DecodeError::MissingField("command")),
        Some(value) => value
            .as_str()
            .ok_or_else(|| DecodeError::Malformed("command must be a string".to_string()))?
            .to_string(),
    };

    let value = match fields.get("value") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            DecodeError::Malformed("value must be a non-negative integer".to_string())
        })?),
    };

    Ok(Command { command, value })
}
