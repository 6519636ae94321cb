use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader};

#[derive(Debug)]
pub struct Get {
    /// lookup key
    key: Bytes,
}

impl Get {
    pub fn new(key: Bytes) -> Self {
        Get { key }
    }

    /// Construct a Get command by consuming the request reader
    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let key = reader.next_bytes().map_err(|_| wrong_args("GET"))?;
        reader.finish().map_err(|_| wrong_args("GET"))?;

        Ok(Get { key })
    }

    /// Look the key up, replying null when it is absent
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let response = match db.get(&self.key) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        };

        Ok(response)
    }
}
