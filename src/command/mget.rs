use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader, FrameReaderError};

#[derive(Debug)]
pub struct Mget {
    keys: Vec<Bytes>,
}

impl Mget {
    pub fn new(keys: Vec<Bytes>) -> Self {
        Mget { keys }
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let mut keys = Vec::new();

        loop {
            match reader.next_bytes() {
                Ok(key) => keys.push(key),
                Err(FrameReaderError::EndOfStream) => break,
                Err(_) => return Err(wrong_args("MGET")),
            }
        }

        if keys.is_empty() {
            return Err(wrong_args("MGET"));
        }

        Ok(Mget { keys })
    }

    /// Look every key up, replying an array with a null at each position
    /// where the key is absent. Reply order matches request order.
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let values = self
            .keys
            .iter()
            .map(|key| match db.get(key) {
                Some(value) => Frame::Bulk(value),
                None => Frame::Null,
            })
            .collect();

        Ok(Frame::Array(values))
    }
}
