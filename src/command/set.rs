use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader};

#[derive(Debug)]
pub struct Set {
    key: Bytes,

    /// value to store, verbatim
    value: Bytes,
}

impl Set {
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Set { key, value }
    }

    /// Construct a Set command by consuming the request reader
    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let key = reader.next_bytes().map_err(|_| wrong_args("SET"))?;
        let value = reader.next_bytes().map_err(|_| wrong_args("SET"))?;
        reader.finish().map_err(|_| wrong_args("SET"))?;

        Ok(Set { key, value })
    }

    /// Store the value, unconditionally overwriting. Always replies `1`.
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        db.set(self.key.to_vec(), self.value);

        Ok(Frame::Integer(1))
    }
}
