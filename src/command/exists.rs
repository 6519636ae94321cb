use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader, FrameReaderError};

#[derive(Debug)]
pub struct Exists {
    /// keys to probe; duplicates are counted every time they appear
    keys: Vec<Bytes>,
}

impl Exists {
    pub fn new(keys: Vec<Bytes>) -> Self {
        Exists { keys }
    }

    /// Construct an Exists command by draining the request reader.
    ///
    /// At least one key is required.
    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let mut keys = Vec::new();

        loop {
            match reader.next_bytes() {
                Ok(key) => keys.push(key),
                Err(FrameReaderError::EndOfStream) => break,
                Err(_) => return Err(wrong_args("EXISTS")),
            }
        }

        if keys.is_empty() {
            return Err(wrong_args("EXISTS"));
        }

        Ok(Exists { keys })
    }

    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let count = self.keys.iter().filter(|key| db.contains(key)).count();

        Ok(Frame::Integer(count as i64))
    }
}
