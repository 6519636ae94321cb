use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader};

#[derive(Debug)]
pub struct Strlen {
    key: Bytes,
}

impl Strlen {
    pub fn new(key: Bytes) -> Self {
        Strlen { key }
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let key = reader.next_bytes().map_err(|_| wrong_args("STRLEN"))?;
        reader.finish().map_err(|_| wrong_args("STRLEN"))?;

        Ok(Strlen { key })
    }

    /// Byte length of the stored value; absent keys measure `0`
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let len = db.strlen(&self.key).unwrap_or(0);

        Ok(Frame::Integer(len as i64))
    }
}
