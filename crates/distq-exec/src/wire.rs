//! Line-oriented wire protocol between coordinator and workers.
//!
//! ```text
//! coordinator -> worker:  <plan text>\n
//! worker -> coordinator:  ROW <json array>\n      (zero or more)
//!                         END <row count>\n       (success)
//!                       | ERR <message>\n         (failure)
//! ```
//!
//! Exactly one terminator ends a response. A stream that ends without one,
//! or whose END count disagrees with the rows seen, is a protocol error.

use std::fmt;

use bytes::BytesMut;
use distq_core::prelude::Tuple;
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use crate::error::{ExecError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One result row, JSON-encoded.
    Row(String),
    End(u64),
    Err(String),
}

impl Frame {
    pub fn row(tuple: &Tuple) -> Self {
        Frame::Row(tuple.to_json_line())
    }

    /// Error frame; line breaks in `message` are flattened.
    pub fn error(message: impl fmt::Display) -> Self {
        let text = message.to_string().replace(['\r', '\n'], " ");
        Frame::Err(text)
    }

    pub fn parse(line: &str) -> Result<Self> {
        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
        match tag {
            "ROW" => Ok(Frame::Row(rest.to_string())),
            "END" => rest
                .trim()
                .parse::<u64>()
                .map(Frame::End)
                .map_err(|_| ExecError::Protocol(format!("malformed END frame '{line}'"))),
            "ERR" => Ok(Frame::Err(rest.to_string())),
            _ => {
                let shown: String = line.chars().take(40).collect();
                Err(ExecError::Protocol(format!("unknown frame '{shown}'")))
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Row(json) => write!(f, "ROW {json}"),
            Frame::End(n) => write!(f, "END {n}"),
            Frame::Err(msg) => write!(f, "ERR {msg}"),
        }
    }
}

/// Response codec: newline-delimited `Frame`s with a length cap.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    lines: LinesCodec,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_bytes),
            max_frame_bytes,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ExecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.lines.decode(src)? {
            Some(line) => Frame::parse(&line).map(Some),
            None => Ok(None),
        }
    }

    /// Every frame ends with a newline; leftover bytes at EOF mean the
    /// stream was cut mid-frame.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(ExecError::Protocol(format!(
                "stream ended inside a frame ({} bytes without a newline)",
                src.len()
            ))),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ExecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let line = frame.to_string();
        check_len(&line, self.max_frame_bytes)?;
        self.lines.encode(line, dst)?;
        Ok(())
    }
}

/// Request codec: one plan per line.
pub fn request_codec(max_frame_bytes: usize) -> LinesCodec {
    LinesCodec::new_with_max_length(max_frame_bytes)
}

pub(crate) fn check_len(line: &str, max_frame_bytes: usize) -> Result<()> {
    if line.len() > max_frame_bytes {
        return Err(ExecError::Protocol(format!(
            "frame of {} bytes exceeds the {max_frame_bytes} byte limit",
            line.len()
        )));
    }
    Ok(())
}
