use bytes::Bytes;

use crate::frame::Frame;

use super::{wrong_args, FrameReader, FrameReaderError};

#[derive(Debug, Default)]
pub struct Ping {
    msg: Option<Bytes>,
}

impl Ping {
    pub fn new(msg: Option<Bytes>) -> Self {
        Ping { msg }
    }

    /// Construct a Ping command by consuming the request reader.
    ///
    /// The payload is optional; a bare PING answers PONG.
    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let msg = match reader.next_bytes() {
            Ok(msg) => Some(msg),
            Err(FrameReaderError::EndOfStream) => None,
            Err(_) => return Err(wrong_args("PING")),
        };
        reader.finish().map_err(|_| wrong_args("PING"))?;

        Ok(Ping { msg })
    }

    pub fn apply(self) -> crate::Result<Frame> {
        let reply = match self.msg {
            Some(msg) => msg,
            None => Bytes::from_static(b"PONG"),
        };

        Ok(Frame::Bulk(reply))
    }
}
