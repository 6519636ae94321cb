use std::{fmt, io::Cursor, num::TryFromIntError, string::FromUtf8Error};

use bytes::{Buf, Bytes};

use crate::Error;

/// A value in the RESP wire protocol.
///
/// Requests are always an `Array` of `Bulk` elements; replies may be any
/// variant. Nested arrays are permitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

#[derive(Debug)]
pub enum FrameError {
    /// Not enough buffered bytes to decode a full frame
    Incomplete,
    Other(Error),
}

impl Frame {
    /// Returns an empty array
    pub fn array() -> Frame {
        Frame::Array(vec![])
    }

    /// Push a `Bulk` frame into an array.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not an array
    pub fn push_bulk(&mut self, bytes: Bytes) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Bulk(bytes)),
            _ => panic!("not `Frame::Array`"),
        }
    }

    /// Push an `Integer` frame into an array.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not an array
    pub fn push_int(&mut self, value: i64) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Integer(value)),
            _ => panic!("not `Frame::Array`"),
        }
    }

    /// Parse one frame from the buffered bytes.
    ///
    /// Returns `FrameError::Incomplete` when the buffer ends before the
    /// frame does; the caller reads more bytes and retries from the start.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, FrameError> {
        match get_u8(src)? {
            b'+' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)?;
                Ok(Frame::Simple(string))
            }
            b'-' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)?;
                Ok(Frame::Error(string))
            }
            b':' => {
                let int = get_decimal(src)?;
                Ok(Frame::Integer(int))
            }
            b'$' => {
                if b'-' == peek_u8(src)? {
                    let line = get_line(src)?;
                    if line != b"-1" {
                        return Err("Bad bulk string length".into());
                    }
                    Ok(Frame::Null)
                } else {
                    let len: usize = get_decimal(src)?.try_into()?;
                    let n = len + 2;
                    if src.remaining() < n {
                        return Err(FrameError::Incomplete);
                    }
                    let data = Bytes::copy_from_slice(&src.chunk()[..len]);

                    // skip the payload plus the trailing CRLF
                    skip(src, n);

                    Ok(Frame::Bulk(data))
                }
            }
            b'*' => {
                if b'-' == peek_u8(src)? {
                    let line = get_line(src)?;
                    if line != b"-1" {
                        return Err("Bad array length".into());
                    }
                    // A null array decodes as a one-element array holding a
                    // null bulk string, matching the reference client.
                    Ok(Frame::Array(vec![Frame::Null]))
                } else {
                    let len: usize = get_decimal(src)?.try_into()?;
                    let mut out = Vec::with_capacity(len);
                    for _ in 0..len {
                        out.push(Frame::parse(src)?);
                    }
                    Ok(Frame::Array(out))
                }
            }
            _ => Err("Bad first byte".into()),
        }
    }

    /// Serialize the frame onto `dst` in wire format.
    pub fn write_to(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(string) => {
                dst.push(b'+');
                dst.extend_from_slice(string.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Error(error) => {
                dst.push(b'-');
                dst.extend_from_slice(error.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Integer(int) => {
                dst.push(b':');
                dst.extend_from_slice(int.to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.push(b'$');
                dst.extend_from_slice(data.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                dst.extend_from_slice(data);
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Null => {
                dst.extend_from_slice(b"$-1\r\n");
            }
            Frame::Array(items) => {
                dst.push(b'*');
                dst.extend_from_slice(items.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(dst);
                }
            }
        }
    }
}

fn get_line<'a>(src: &'a mut Cursor<&[u8]>) -> Result<&'a [u8], FrameError> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    if end > 0 {
        for i in start..end - 1 {
            if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
                src.set_position((i + 2) as u64);
                return Ok(&src.get_ref()[start..i]);
            }
        }
    }

    Err(FrameError::Incomplete)
}

fn peek_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.get_u8())
}

/// Length prefixes and integers are signed decimal ASCII.
fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, FrameError> {
    let line = get_line(src)?.to_vec();
    let string = String::from_utf8(line)?;
    string.parse().map_err(|_| "Bad decimal".into())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) {
    src.advance(n);
}

impl From<String> for FrameError {
    fn from(value: String) -> Self {
        FrameError::Other(Error::BadRequest(value))
    }
}

impl From<&str> for FrameError {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl From<FromUtf8Error> for FrameError {
    fn from(_value: FromUtf8Error) -> Self {
        "Bad frame format".into()
    }
}

impl From<TryFromIntError> for FrameError {
    fn from(_value: TryFromIntError) -> Self {
        "Bad frame format".into()
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameError::Incomplete => "stream ended early".fmt(fmt),
            FrameError::Other(err) => err.fmt(fmt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::new();
        frame.write_to(&mut buf);
        buf
    }

    fn decode(bytes: &[u8]) -> Frame {
        let mut cursor = Cursor::new(bytes);
        let frame = Frame::parse(&mut cursor).expect("complete frame");
        assert_eq!(cursor.position() as usize, bytes.len(), "trailing bytes");
        frame
    }

    #[test]
    fn encode_bulk() {
        assert_eq!(
            encode(&Frame::Bulk(Bytes::from_static(b"foobar"))),
            b"$6\r\nfoobar\r\n"
        );
        assert_eq!(encode(&Frame::Bulk(Bytes::new())), b"$0\r\n\r\n");
    }

    #[test]
    fn encode_integer() {
        assert_eq!(encode(&Frame::Integer(1134)), b":1134\r\n");
        assert_eq!(encode(&Frame::Integer(-7)), b":-7\r\n");
    }

    #[test]
    fn encode_null() {
        assert_eq!(encode(&Frame::Null), b"$-1\r\n");
    }

    #[test]
    fn encode_array() {
        let mut frame = Frame::array();
        frame.push_bulk(Bytes::from_static(b"foo"));
        frame.push_bulk(Bytes::from_static(b"bar"));
        assert_eq!(encode(&frame), b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn encode_array_with_null() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"foo")),
            Frame::Null,
            Frame::Bulk(Bytes::from_static(b"bar")),
        ]);
        assert_eq!(encode(&frame), b"*3\r\n$3\r\nfoo\r\n$-1\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn decode_null_array_as_single_null() {
        assert_eq!(decode(b"*-1\r\n"), Frame::Array(vec![Frame::Null]));
    }

    #[test]
    fn decode_simple_and_error() {
        assert_eq!(decode(b"+OK\r\n"), Frame::Simple("OK".into()));
        assert_eq!(decode(b"-Bad command\r\n"), Frame::Error("Bad command".into()));
    }

    #[test]
    fn round_trip() {
        let frames = vec![
            Frame::Simple("PONG".into()),
            Frame::Error("Wrong number of arguments for GET".into()),
            Frame::Integer(i64::MAX),
            Frame::Integer(i64::MIN),
            Frame::Bulk(Bytes::from_static(b"\x00\xffbinary")),
            Frame::Null,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"nested")),
                Frame::Array(vec![Frame::Integer(1), Frame::Null]),
            ]),
        ];
        for frame in frames {
            assert_eq!(decode(&encode(&frame)), frame);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from_static(b"k")), Frame::Integer(3)]);
        assert_eq!(encode(&frame), encode(&frame.clone()));
    }

    #[test]
    fn incomplete_frames_suspend() {
        for bytes in [&b"$6\r\nfoo"[..], b"*2\r\n$3\r\nfoo\r\n", b":12", b"+PON"] {
            let mut cursor = Cursor::new(bytes);
            assert!(matches!(Frame::parse(&mut cursor), Err(FrameError::Incomplete)));
        }
    }

    #[test]
    fn bad_first_byte_is_rejected() {
        let mut cursor = Cursor::new(&b"!oops\r\n"[..]);
        match Frame::parse(&mut cursor) {
            Err(FrameError::Other(Error::BadRequest(msg))) => assert_eq!(msg, "Bad first byte"),
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn negative_lengths_are_rejected() {
        for bytes in [&b"*-3\r\n"[..], b"$-2\r\n"] {
            let mut cursor = Cursor::new(bytes);
            assert!(matches!(
                Frame::parse(&mut cursor),
                Err(FrameError::Other(Error::BadRequest(_)))
            ));
        }
    }
}
