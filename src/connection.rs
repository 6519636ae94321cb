use std::io::Cursor;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufWriter},
    net::TcpStream,
    time,
};

use crate::frame::{Frame, FrameError};
use crate::Error;

/// How long to wait for the next byte of a frame before giving up on the
/// peer. Applies to every read while a frame is outstanding.
pub const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Read and write RESP frames on a TCP socket.
///
/// Reads are buffered: bytes accumulate in `buffer` until a full frame can
/// be parsed, so partial reads never surface above this type. Writes are
/// serialized into `write_buf` and flushed as one syscall.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,

    /// in-memory buffer holding raw bytes until a frame is complete
    buffer: BytesMut,

    write_buf: Vec<u8>,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4096),
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Read a single frame from the connection.
    ///
    /// Returns `None` when the peer closed the socket cleanly between
    /// frames. A close mid-frame or a silent peer is a connection error.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            let read = time::timeout(READ_TIMEOUT, self.stream.read_buf(&mut self.buffer))
                .await
                .map_err(|_| Error::Connection("Timeout error".into()))?;

            if read? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Connection("Connection was abruptly closed".into()));
            }
        }
    }

    /// Attempt to parse one frame out of the buffered bytes.
    ///
    /// `Ok(None)` means the buffer holds only a prefix of a frame.
    fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        let mut cursor = Cursor::new(&self.buffer[..]);

        match Frame::parse(&mut cursor) {
            Ok(frame) => {
                let consumed = cursor.position() as usize;
                self.buffer.advance(consumed);
                Ok(Some(frame))
            }
            Err(FrameError::Incomplete) => Ok(None),
            Err(FrameError::Other(err)) => {
                // The stream is no longer aligned on a frame boundary, so
                // whatever is buffered cannot be trusted.
                self.buffer.clear();
                Err(err)
            }
        }
    }

    /// Write a single frame to the connection and flush it.
    pub async fn write_frame(&mut self, frame: &Frame) -> crate::Result<()> {
        self.write_buf.clear();
        frame.write_to(&mut self.write_buf);

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        Ok(())
    }
}
