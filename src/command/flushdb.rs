use crate::{frame::Frame, Db};

use super::{wrong_args, FrameReader};

/// Drop every entry in the store.
#[derive(Debug, Default)]
pub struct FlushDb;

impl FlushDb {
    pub fn new() -> Self {
        FlushDb
    }

    pub fn parse(reader: &mut FrameReader) -> crate::Result<Self> {
        reader.finish().map_err(|_| wrong_args("FLUSHDB"))?;

        Ok(FlushDb)
    }

    /// Replies with the number of entries the store held before clearing
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        let size = db.flush();

        Ok(Frame::Integer(size as i64))
    }
}
