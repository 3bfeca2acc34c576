//! Wire framing for the event stream (§6): one JSON object per frame,
//! `{fromVersion, toVersion, kind, payload, timestamp}`. `TopologyEvent`'s
//! own `Serialize` impl already produces this shape, so framing is just
//! newline-delimited JSON encode/decode at the transport boundary.

use topology_types::TopologyEvent;

/// Error produced by framing.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The event could not be serialized to JSON.
    #[error("encoding event: {0}")]
    Encode(#[source] serde_json::Error),
    /// A received frame could not be parsed as a `TopologyEvent`.
    #[error("decoding frame: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a single event as one line of JSON, newline-terminated.
pub fn encode(event: &TopologyEvent) -> Result<String, FramingError> {
    let mut line = serde_json::to_string(event).map_err(FramingError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Decode a single JSON line (with or without trailing newline) back into
/// an event. Used by stream consumers, kept here so producer and consumer
/// agree on exactly one wire representation.
pub fn decode(line: &str) -> Result<TopologyEvent, FramingError> {
    serde_json::from_str(line.trim_end()).map_err(FramingError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::TopologyEvent;

    #[test]
    fn round_trips_a_heartbeat() {
        let event = TopologyEvent::heartbeat(7, 1_000);
        let frame = encode(&event).unwrap();
        assert!(frame.starts_with('{'));
        assert!(frame.ends_with('\n'));
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.to_version, 7);
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let event = TopologyEvent::heartbeat(1, 0);
        let frame = encode(&event).unwrap();
        assert!(frame.contains("\"fromVersion\""));
        assert!(frame.contains("\"toVersion\""));
        assert!(frame.contains("\"timestamp\""));
        assert!(frame.contains("\"HEARTBEAT\""));
    }
}
