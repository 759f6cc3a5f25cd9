//! Generic Server-Sent Events framing (spec §4.4): turns raw bytes into
//! `SSEEvent`s. Providers that speak SSE (OpenAI, Anthropic, Gemini,
//! Together, OpenRouter) layer their own payload parsing on top of this.

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::llm::{AdapterError, AdapterResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SSEEvent {
    pub event_type: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental SSE parser: feed it chunks as they arrive over the wire,
/// get back zero or more complete events per chunk. Events are delimited
/// by a blank line; a field without a colon is treated as a data line.
pub struct SSEParser {
    buffer: String,
}

impl SSEParser {
    pub fn new() -> Self {
        Self { buffer: String::new() }
    }

    pub fn parse_chunk(&mut self, chunk: &[u8]) -> AdapterResult<Vec<SSEEvent>> {
        let text = std::str::from_utf8(chunk).map_err(|e| AdapterError::Protocol(format!("invalid utf-8 in SSE stream: {e}")))?;
        self.buffer.push_str(text);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + 2);
            if let Some(event) = parse_event_block(&block) {
                events.push(event);
            }
        }
        debug!(parsed = events.len(), buffered = self.buffer.len(), "sse chunk parsed");
        Ok(events)
    }

    /// Flushes whatever is left in the buffer at end-of-stream. A well
    /// behaved server always terminates its last event with a blank line,
    /// but a connection that drops mid-response can leave one pending —
    /// without this it's silently dropped instead of delivered.
    pub fn finish(&mut self) -> Option<SSEEvent> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let block = std::mem::take(&mut self.buffer);
        parse_event_block(&block)
    }
}

impl Default for SSEParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_event_block(block: &str) -> Option<SSEEvent> {
    if block.trim().is_empty() {
        return None;
    }
    let mut event_type = None;
    let mut data_lines = Vec::new();
    let mut id = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.find(':') {
            Some(pos) => (&line[..pos], line[pos + 1..].trim_start()),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    Some(SSEEvent {
        event_type,
        data: data_lines.join("\n"),
        id,
    })
}

/// Adapts a raw byte stream (a `reqwest::Response::bytes_stream()`, say)
/// into a stream of parsed [`SSEEvent`]s.
pub fn parse_sse_stream<S, E>(byte_stream: S) -> impl Stream<Item = AdapterResult<SSEEvent>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    enum State<S> {
        Active(std::pin::Pin<Box<S>>, SSEParser, std::collections::VecDeque<AdapterResult<SSEEvent>>),
        Done,
    }

    futures::stream::unfold(
        State::Active(Box::pin(byte_stream), SSEParser::new(), std::collections::VecDeque::new()),
        |state| async move {
            let State::Active(mut stream, mut parser, mut queue) = state else {
                return None;
            };
            loop {
                if let Some(item) = queue.pop_front() {
                    return Some((item, State::Active(stream, parser, queue)));
                }
                match stream.next().await {
                    Some(Ok(bytes)) => match parser.parse_chunk(&bytes) {
                        Ok(events) => queue.extend(events.into_iter().map(Ok)),
                        Err(e) => queue.push_back(Err(e)),
                    },
                    Some(Err(e)) => queue.push_back(Err(AdapterError::Transport(e.to_string()))),
                    None => {
                        return parser.finish().map(|event| (Ok(event), State::Done));
                    }
                }
            }
        },
    )
}

/// `true` for the sentinel value OpenAI-family providers send as their
/// final `data:` line instead of a JSON payload.
pub fn is_done_sentinel(data: &str) -> bool {
    data.trim() == "[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_event() {
        let mut parser = SSEParser::new();
        let events = parser.parse_chunk(b"event: message\ndata: hello world\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("message"));
        assert_eq!(events[0].data, "hello world");
    }

    #[test]
    fn buffers_incomplete_events_across_chunks() {
        let mut parser = SSEParser::new();
        assert!(parser.parse_chunk(b"data: incomple").unwrap().is_empty());
        let events = parser.parse_chunk(b"te\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "incomplete");
    }

    #[test]
    fn joins_multiple_data_lines_with_newline() {
        let mut parser = SSEParser::new();
        let events = parser.parse_chunk(b"data: line one\ndata: line two\n\n").unwrap();
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn recognizes_done_sentinel() {
        assert!(is_done_sentinel("[DONE]"));
        assert!(is_done_sentinel("  [DONE]  "));
        assert!(!is_done_sentinel("{}"));
    }
}
