use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader};

#[derive(Debug)]
pub struct Del {
    key: Bytes,
}

impl Del {
    pub fn new(key: Bytes) -> Self {
        Del { key }
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let key = reader.next_bytes().map_err(|_| wrong_args("DEL"))?;
        reader.finish().map_err(|_| wrong_args("DEL"))?;

        Ok(Del { key })
    }

    /// Remove the key, replying `1` when an entry existed and `0` otherwise
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let removed = db.del(&self.key);

        Ok(Frame::Integer(removed as i64))
    }
}
