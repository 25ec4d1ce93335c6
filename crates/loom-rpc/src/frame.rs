//! `Content-Length` framing over byte streams.
//!
//! ```text
//! Content-Length: <byte length>\r\n
//! \r\n
//! <JSON body>
//! ```

use std::io::{self, BufRead, Read, Write};

use serde_json::Value;

use crate::error::FrameError;
use crate::message::Message;

const CONTENT_LENGTH: &str = "Content-Length";

/// Reads framed messages from a buffered stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
}

impl<R: BufRead> FrameReader<R> {
    /// Wraps `reader`.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next message.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between messages.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`FrameError`] when the header block is malformed or
    /// the stream fails or ends mid-message, and a non-fatal one when the
    /// body is not a valid message.
    pub fn read_message(&mut self) -> Result<Option<Message>, FrameError> {
        let Some(content_length) = self.read_headers()? else {
            return Ok(None);
        };
        let body = self.read_body(content_length)?;
        decode_body(&body).map(Some)
    }

    fn read_headers(&mut self) -> Result<Option<usize>, FrameError> {
        let mut content_length = None;
        let mut at_message_start = true;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                if at_message_start {
                    return Ok(None);
                }
                return Err(FrameError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a header block",
                )));
            }
            at_message_start = false;

            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':')
                && name == CONTENT_LENGTH
            {
                content_length = Some(parse_content_length(value.trim())?);
            }
        }

        content_length
            .map(Some)
            .ok_or(FrameError::MissingContentLength)
    }

    fn read_body(&mut self, content_length: usize) -> Result<Vec<u8>, FrameError> {
        let limit = u64::try_from(content_length).unwrap_or(u64::MAX);
        let mut body = Vec::new();
        (&mut self.reader).take(limit).read_to_end(&mut body)?;
        if body.len() < content_length {
            return Err(FrameError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "stream ended after {} of {content_length} body bytes",
                    body.len()
                ),
            )));
        }
        Ok(body)
    }
}

fn parse_content_length(value: &str) -> Result<usize, FrameError> {
    value
        .parse()
        .map_err(|_| FrameError::InvalidContentLength {
            value: String::from(value),
        })
}

fn decode_body(body: &[u8]) -> Result<Message, FrameError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|source| FrameError::Decode { source })?;
    Message::from_value(value).map_err(|rejection| FrameError::InvalidEnvelope {
        id: rejection.id,
        reason: rejection.reason,
    })
}

/// Writes framed messages to a stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps `writer`.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encodes, frames and flushes one message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Encode`] when the message cannot be serialised
    /// and [`FrameError::Io`] when the stream rejects the bytes.
    pub fn write_message(&mut self, message: &Message) -> Result<(), FrameError> {
        let body = serde_json::to_vec(message).map_err(|source| FrameError::Encode { source })?;
        write!(self.writer, "{CONTENT_LENGTH}: {}\r\n\r\n", body.len())?;
        self.writer.write_all(&body)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::message::{Notification, Request, RequestId, Response};

    fn reader(input: &[u8]) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(input.to_vec()))
    }

    fn written(message: &Message) -> String {
        let mut buffer = Vec::new();
        FrameWriter::new(&mut buffer)
            .write_message(message)
            .expect("write should succeed");
        String::from_utf8(buffer).expect("frame should be UTF-8")
    }

    #[rstest]
    fn reads_a_framed_request() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let input = format!("Content-Length: {}\r\n\r\n{body}", body.len());

        let message = reader(input.as_bytes())
            .read_message()
            .expect("read should succeed");

        assert_eq!(
            message,
            Some(Message::Request(Request::new(1, "initialize", None)))
        );
    }

    #[rstest]
    fn ignores_other_headers() {
        let body = r#"{"method":"exit"}"#;
        let input = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );

        let message = reader(input.as_bytes())
            .read_message()
            .expect("read should succeed");

        assert_eq!(
            message,
            Some(Message::Notification(Notification::new("exit", None)))
        );
    }

    #[rstest]
    fn reads_consecutive_messages_then_clean_eof() {
        let first = r#"{"method":"a"}"#;
        let second = r#"{"method":"b"}"#;
        let input = format!(
            "Content-Length: {}\r\n\r\n{first}Content-Length: {}\r\n\r\n{second}",
            first.len(),
            second.len()
        );
        let mut frames = reader(input.as_bytes());

        let methods: Vec<String> = std::iter::from_fn(|| {
            frames
                .read_message()
                .expect("read should succeed")
                .and_then(|message| message.method().map(String::from))
        })
        .collect();

        assert_eq!(methods, vec![String::from("a"), String::from("b")]);
    }

    #[rstest]
    fn empty_stream_is_clean_eof() {
        let message = reader(b"").read_message().expect("read should succeed");
        assert_eq!(message, None);
    }

    #[rstest]
    fn missing_content_length_is_fatal() {
        let error = reader(b"Content-Type: application/json\r\n\r\n{}")
            .read_message()
            .expect_err("read should fail");

        assert!(matches!(error, FrameError::MissingContentLength));
        assert!(error.is_fatal());
    }

    #[rstest]
    fn header_names_are_case_sensitive() {
        let error = reader(b"content-length: 2\r\n\r\n{}")
            .read_message()
            .expect_err("read should fail");

        assert!(matches!(error, FrameError::MissingContentLength));
    }

    #[rstest]
    fn non_numeric_content_length_is_fatal() {
        let error = reader(b"Content-Length: ten\r\n\r\n{}")
            .read_message()
            .expect_err("read should fail");

        assert!(
            matches!(error, FrameError::InvalidContentLength { ref value } if value == "ten")
        );
        assert!(error.is_fatal());
    }

    #[rstest]
    #[case::inside_headers(b"Content-Length: 10".as_slice())]
    #[case::short_body(b"Content-Length: 10\r\n\r\n{}".as_slice())]
    fn truncated_frames_are_unexpected_eof(#[case] input: &[u8]) {
        let error = reader(input).read_message().expect_err("read should fail");

        assert!(
            matches!(error, FrameError::Io(ref source) if source.kind() == io::ErrorKind::UnexpectedEof)
        );
    }

    #[rstest]
    fn invalid_json_is_not_fatal() {
        let error = reader(b"Content-Length: 5\r\n\r\n{oops")
            .read_message()
            .expect_err("read should fail");

        assert!(matches!(error, FrameError::Decode { .. }));
        assert!(!error.is_fatal());
    }

    #[rstest]
    fn reader_recovers_after_a_bad_body() {
        let good = r#"{"method":"exit"}"#;
        let input = format!("Content-Length: 2\r\n\r\n[]Content-Length: {}\r\n\r\n{good}", good.len());
        let mut frames = reader(input.as_bytes());

        let error = frames.read_message().expect_err("first body is invalid");
        assert!(matches!(error, FrameError::InvalidEnvelope { .. }));

        let message = frames.read_message().expect("second body is valid");
        assert_eq!(message.and_then(|m| m.method().map(String::from)), Some(String::from("exit")));
    }

    #[rstest]
    fn header_counts_bytes_not_characters() {
        let message = Message::from(Response::ok(RequestId::Number(1), json!("héllo 😀")));

        let frame = written(&message);
        let (header, body) = frame.split_once("\r\n\r\n").expect("frame has a header");

        assert_eq!(header, format!("Content-Length: {}", body.len()));
        assert!(body.len() > body.chars().count());
    }

    #[rstest]
    fn written_frames_read_back() {
        let message = Message::from(Notification::new("custom/ping", Some(json!({"n": 1}))));

        let frame = written(&message);
        let decoded = reader(frame.as_bytes())
            .read_message()
            .expect("read should succeed");

        assert_eq!(decoded, Some(message));
    }
}
