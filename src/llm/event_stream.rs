//! AWS event-stream binary framing (spec §4.4), used by Bedrock's
//! `InvokeModelWithResponseStream`. Unlike SSE/NDJSON this is a binary,
//! length-prefixed format — getting the length fields wrong desyncs every
//! subsequent frame, which is why this parser always advances the buffer by
//! the frame's declared `total_length` even when a CRC check fails, rather
//! than trying to resynchronize on the payload bytes.
//!
//! Frame layout (big-endian):
//! `total_length:u32 | headers_length:u32 | prelude_crc:u32 | headers | payload | message_crc:u32`

use bytes::Buf;

use crate::llm::{AdapterError, AdapterResult};

const PRELUDE_LEN: usize = 8;
const PRELUDE_CRC_LEN: usize = 4;
const TRAILING_CRC_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct EventStreamMessage {
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl EventStreamMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed newly-received bytes and return every complete frame now
    /// available. A frame with a bad CRC is dropped rather than returned,
    /// but the buffer still advances past it — one corrupt frame never
    /// takes down the rest of the stream.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> AdapterResult<Vec<EventStreamMessage>> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        loop {
            if self.buffer.len() < PRELUDE_LEN + PRELUDE_CRC_LEN {
                break;
            }

            let total_length = u32::from_be_bytes(self.buffer[0..4].try_into().unwrap()) as usize;
            if total_length < PRELUDE_LEN + PRELUDE_CRC_LEN + TRAILING_CRC_LEN {
                return Err(AdapterError::Protocol(format!(
                    "event-stream frame declares impossible total_length {total_length}"
                )));
            }
            if self.buffer.len() < total_length {
                break;
            }

            let frame = self.buffer[..total_length].to_vec();
            // Always consume the declared length regardless of what
            // validation below finds, so a bad frame can't desync the rest
            // of the stream.
            self.buffer.drain(..total_length);

            match decode_frame(&frame) {
                Ok(message) => messages.push(message),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping corrupt bedrock event-stream frame");
                }
            }
        }

        Ok(messages)
    }
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_frame(frame: &[u8]) -> AdapterResult<EventStreamMessage> {
    let total_length = u32::from_be_bytes(frame[0..4].try_into().unwrap());
    let headers_length = u32::from_be_bytes(frame[4..8].try_into().unwrap()) as usize;
    let prelude_crc = u32::from_be_bytes(frame[8..12].try_into().unwrap());

    let computed_prelude_crc = crc32fast::hash(&frame[0..8]);
    if computed_prelude_crc != prelude_crc {
        return Err(AdapterError::Protocol("prelude CRC mismatch".into()));
    }

    let headers_start = PRELUDE_LEN + PRELUDE_CRC_LEN;
    let headers_end = headers_start + headers_length;
    let payload_end = frame.len() - TRAILING_CRC_LEN;
    if headers_end > payload_end {
        return Err(AdapterError::Protocol("headers_length exceeds frame bounds".into()));
    }

    let message_crc = u32::from_be_bytes(frame[payload_end..frame.len()].try_into().unwrap());
    let computed_message_crc = crc32fast::hash(&frame[..payload_end]);
    if computed_message_crc != message_crc {
        return Err(AdapterError::Protocol("message CRC mismatch".into()));
    }

    let headers = decode_headers(&frame[headers_start..headers_end])?;
    let payload = frame[headers_end..payload_end].to_vec();

    let _ = total_length;
    Ok(EventStreamMessage { headers, payload })
}

/// Header block: repeated `name_len:u8 | name | value_type:u8 (7=string) |
/// value_len:u16 | value` entries.
fn decode_headers(mut bytes: &[u8]) -> AdapterResult<Vec<(String, String)>> {
    let mut headers = Vec::new();
    while bytes.has_remaining() {
        if bytes.remaining() < 1 {
            return Err(AdapterError::Protocol("truncated header name length".into()));
        }
        let name_len = bytes.get_u8() as usize;
        if bytes.remaining() < name_len + 1 {
            return Err(AdapterError::Protocol("truncated header name/type".into()));
        }
        let name = String::from_utf8(bytes.copy_to_bytes(name_len).to_vec())
            .map_err(|e| AdapterError::Protocol(format!("invalid utf-8 header name: {e}")))?;
        let value_type = bytes.get_u8();
        if value_type != 7 {
            return Err(AdapterError::Protocol(format!("unsupported header value type {value_type}")));
        }
        if bytes.remaining() < 2 {
            return Err(AdapterError::Protocol("truncated header value length".into()));
        }
        let value_len = bytes.get_u16() as usize;
        if bytes.remaining() < value_len {
            return Err(AdapterError::Protocol("truncated header value".into()));
        }
        let value = String::from_utf8(bytes.copy_to_bytes(value_len).to_vec())
            .map_err(|e| AdapterError::Protocol(format!("invalid utf-8 header value: {e}")))?;
        headers.push((name, value));
    }
    Ok(headers)
}

/// Encodes one message frame; used by tests to build fixtures, mirroring
/// what a Bedrock response body actually contains on the wire.
#[cfg(test)]
pub fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(7u8);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total_length = (PRELUDE_LEN + PRELUDE_CRC_LEN + header_bytes.len() + payload.len() + TRAILING_CRC_LEN) as u32;
    let headers_length = header_bytes.len() as u32;

    let mut frame = Vec::new();
    frame.extend_from_slice(&total_length.to_be_bytes());
    frame.extend_from_slice(&headers_length.to_be_bytes());
    let prelude_crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&prelude_crc.to_be_bytes());
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(payload);
    let message_crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&message_crc.to_be_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let frame = encode_frame(&[(":event-type", "chunk")], b"{\"hello\":true}");
        let mut parser = EventStreamParser::new();
        let messages = parser.parse_chunk(&frame).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].header(":event-type"), Some("chunk"));
        assert_eq!(messages[0].payload, b"{\"hello\":true}");
    }

    #[test]
    fn buffers_a_frame_split_across_two_chunks() {
        let frame = encode_frame(&[(":event-type", "chunk")], b"payload-bytes");
        let mut parser = EventStreamParser::new();
        let (first, second) = frame.split_at(5);
        assert!(parser.parse_chunk(first).unwrap().is_empty());
        let messages = parser.parse_chunk(second).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn drops_a_frame_with_bad_crc_but_keeps_parsing_afterward() {
        let mut bad_frame = encode_frame(&[(":event-type", "chunk")], b"bad");
        let last = bad_frame.len() - 1;
        bad_frame[last] ^= 0xFF;
        let good_frame = encode_frame(&[(":event-type", "chunk")], b"good");

        let mut combined = bad_frame;
        combined.extend_from_slice(&good_frame);

        let mut parser = EventStreamParser::new();
        let messages = parser.parse_chunk(&combined).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, b"good");
    }

    #[test]
    fn parses_two_frames_delivered_in_one_chunk() {
        let mut combined = encode_frame(&[(":event-type", "chunk")], b"one");
        combined.extend_from_slice(&encode_frame(&[(":event-type", "chunk")], b"two"));
        let mut parser = EventStreamParser::new();
        let messages = parser.parse_chunk(&combined).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload, b"one");
        assert_eq!(messages[1].payload, b"two");
    }
}
