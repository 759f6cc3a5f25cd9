//! Newline-delimited JSON framing (spec §4.4), used by Ollama's streaming
//! API instead of SSE: one JSON object per line, no `data:`/blank-line
//! envelope.

use futures::{Stream, StreamExt};

use crate::llm::{AdapterError, AdapterResult};

pub struct NdjsonParser {
    buffer: String,
}

impl NdjsonParser {
    pub fn new() -> Self {
        Self { buffer: String::new() }
    }

    /// Returns complete lines found in `chunk`; an unterminated tail stays
    /// buffered for the next call.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> AdapterResult<Vec<String>> {
        let text = std::str::from_utf8(chunk).map_err(|e| AdapterError::Protocol(format!("invalid utf-8 in ndjson stream: {e}")))?;
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim().to_string();
            self.buffer.drain(..pos + 1);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}

impl Default for NdjsonParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_ndjson_stream<S, E>(byte_stream: S) -> impl Stream<Item = AdapterResult<String>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let mut parser = NdjsonParser::new();
    byte_stream
        .map(move |chunk| match chunk {
            Ok(bytes) => parser.parse_chunk(&bytes),
            Err(e) => Err(AdapterError::Transport(e.to_string())),
        })
        .flat_map(|result| {
            futures::stream::iter(match result {
                Ok(lines) => lines.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut parser = NdjsonParser::new();
        let lines = parser.parse_chunk(b"{\"a\":1}\n{\"a\":2}\n").unwrap();
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"a\":2}".to_string()]);
    }

    #[test]
    fn buffers_a_partial_line() {
        let mut parser = NdjsonParser::new();
        assert!(parser.parse_chunk(b"{\"a\":").unwrap().is_empty());
        let lines = parser.parse_chunk(b"1}\n").unwrap();
        assert_eq!(lines, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn skips_blank_lines() {
        let mut parser = NdjsonParser::new();
        let lines = parser.parse_chunk(b"\n{\"a\":1}\n\n").unwrap();
        assert_eq!(lines, vec!["{\"a\":1}".to_string()]);
    }
}
