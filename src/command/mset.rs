use bytes::Bytes;

use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader, FrameReaderError};

/// Store several key/value pairs in one request.
///
/// The pair list is validated in full before the first write, so an odd
/// argument count leaves the store untouched.
#[derive(Debug)]
pub struct Mset {
    pairs: Vec<(Bytes, Bytes)>,
}

impl Mset {
    pub fn new(pairs: Vec<(Bytes, Bytes)>) -> Self {
        Mset { pairs }
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        let mut pairs = Vec::new();

        loop {
            let key = match reader.next_bytes() {
                Ok(key) => key,
                Err(FrameReaderError::EndOfStream) => break,
                Err(_) => return Err(wrong_args("MSET")),
            };
            // a key without a value is an odd argument count
            let value = reader.next_bytes().map_err(|_| wrong_args("MSET"))?;
            pairs.push((key, value));
        }

        if pairs.is_empty() {
            return Err(wrong_args("MSET"));
        }

        Ok(Mset { pairs })
    }

    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        for (key, value) in self.pairs {
            db.set(key.to_vec(), value);
        }

        Ok(Frame::Bulk(Bytes::from_static(b"OK")))
    }
}
