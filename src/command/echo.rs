use bytes::Bytes;

use crate::frame::Frame;

use super::{wrong_args, FrameReader};

/// Echo the single argument back to the caller. Exactly one argument is
/// required; an empty ECHO is a bad request.
#[derive(Debug)]
pub struct Echo {
    msg: Bytes,
}

impl Echo {
    pub fn new(msg: Bytes) -> Self {
        Echo { msg }
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let msg = reader.next_bytes().map_err(|_| wrong_args("ECHO"))?;
        reader.finish().map_err(|_| wrong_args("ECHO"))?;

        Ok(Echo { msg })
    }

    pub fn apply(self) -> crate::Result<Frame> {
        Ok(Frame::Bulk(self.msg))
    }
}
