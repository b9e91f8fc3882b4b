use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Cursor};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::Frame;

/// Default upper bound for a single buffered request, mirrors the 512MB string limit.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 512 * 1024 * 1024;

/// A single command as read from the wire: a lowercase name and its positional arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub name: String,
    pub args: Vec<Bytes>,
}

/// Errors that leave the connection in an unknown state. The caller must close the connection.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("failed to read from the connection: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error; invalid multibulk length {0:?}")]
    InvalidMultibulkLength(String),
    #[error("protocol error; expected '$', got {0:?}")]
    MissingLengthTag(String),
    #[error("protocol error; request exceeds the limit of {0} bytes")]
    RequestTooLarge(usize),
}

#[derive(Debug)]
enum ParseError {
    /// Not enough data is available to parse an entire request.
    Incomplete,
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ParseError {
    fn from(err: ProtocolError) -> Self {
        ParseError::Protocol(err)
    }
}

/// Decodes requests in either the inline or the multi-bulk encoding and encodes reply frames.
///
/// The encoding is chosen per request by the first byte of its first line: `*` starts a
/// multi-bulk request, anything else is an inline command.
#[derive(Debug)]
pub struct RequestCodec {
    max_request_size: usize,
}

impl RequestCodec {
    pub fn new(max_request_size: usize) -> Self {
        Self { max_request_size }
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_SIZE)
    }
}

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        let request = match parse_request(&mut cursor) {
            Ok(request) => request,
            Err(ParseError::Incomplete) if src.len() > self.max_request_size => {
                return Err(ProtocolError::RequestTooLarge(self.max_request_size));
            }
            Err(ParseError::Incomplete) => return Ok(None),
            Err(ParseError::Protocol(err)) => return Err(err),
        };

        // The cursor never moves past the end of the buffer.
        let position = cursor.position() as usize;
        src.advance(position);

        Ok(Some(request))
    }
}

impl Encoder<Frame> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&frame.serialize());
        Ok(())
    }
}

fn parse_request(src: &mut Cursor<&[u8]>) -> Result<Request, ParseError> {
    let line = read_line(src)?;

    match line.first() {
        Some(b'*') => parse_multibulk(&line[1..], src),
        _ => Ok(parse_inline(line)),
    }
}

// <name> <arg-1> ... <arg-n>\r\n
fn parse_inline(line: &[u8]) -> Request {
    let line = trim_whitespace(line);
    let mut parts = line.split(|b| *b == b' ');

    let name = parts.next().map(lowercase).unwrap_or_default();
    let args = parts.map(Bytes::copy_from_slice).collect();

    Request { name, args }
}

// *<count>\r\n followed by <count> pairs of $<length>\r\n<argument>\r\n
fn parse_multibulk(header: &[u8], src: &mut Cursor<&[u8]>) -> Result<Request, ParseError> {
    let count = std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|count| *count > 0)
        .ok_or_else(|| {
            ProtocolError::InvalidMultibulkLength(String::from_utf8_lossy(header).into_owned())
        })?;

    let mut parts = Vec::new();
    for _ in 0..count {
        let tag = read_line(src)?;
        if tag.first() != Some(&b'$') {
            return Err(
                ProtocolError::MissingLengthTag(String::from_utf8_lossy(tag).into_owned()).into(),
            );
        }

        let argument = read_line(src)?;
        parts.push(Bytes::copy_from_slice(argument));
    }

    let mut parts = parts.into_iter();
    let name = parts.next().map(|name| lowercase(&name)).unwrap_or_default();

    Ok(Request {
        name,
        args: parts.collect(),
    })
}

/// Reads up to the next `\n`, the returned line excludes the terminator and an optional `\r`.
fn read_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ParseError> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let newline = buf[start..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|index| start + index)
        .ok_or(ParseError::Incomplete)?;

    src.set_position((newline + 1) as u64);

    let line = &buf[start..newline];
    Ok(line.strip_suffix(b"\r").unwrap_or(line))
}

fn trim_whitespace(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if !first.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    while let [rest @ .., last] = line {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}

fn lowercase(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_lowercase()
}
