pub mod del;
pub mod echo;
pub mod exists;
pub mod flushdb;
pub mod get;
pub mod mget;
pub mod mset;
pub mod ping;
pub mod quit;
pub mod set;
pub mod strlen;
pub mod unknown;

use std::vec;

use bytes::Bytes;

pub use del::Del;
pub use echo::Echo;
pub use exists::Exists;
pub use flushdb::FlushDb;
pub use get::Get;
pub use mget::Mget;
pub use mset::Mset;
pub use ping::Ping;
pub use quit::Quit;
pub use set::Set;
pub use strlen::Strlen;
pub use unknown::Unknown;

use crate::{frame::Frame, Db, Error};

/// Enum of supported protocol commands
#[derive(Debug)]
pub enum Command {
    Get(Get),
    Set(Set),
    Del(Del),
    Exists(Exists),
    FlushDb(FlushDb),
    Echo(Echo),
    Ping(Ping),
    Quit(Quit),
    Mset(Mset),
    Mget(Mget),
    Strlen(Strlen),
    Unknown(Unknown),
}

impl Command {
    /// Create a Command from a request frame.
    ///
    /// The request must be an array of bulk strings; the first element names
    /// the command, matched case-insensitively. Arity violations surface as
    /// `Error::BadRequest` so the handler can answer without dropping the
    /// connection.
    pub fn from_frame(frame: Frame) -> crate::Result<Command> {
        let mut reader =
            FrameReader::new(frame).map_err(|_| Error::bad_request("Bad request format"))?;

        let command_name = reader
            .next_string()
            .map_err(|_| Error::bad_request("Bad command"))?
            .to_uppercase();

        let command = match command_name.as_str() {
            "GET" => Command::Get(Get::parse(&mut reader)?),
            "SET" => Command::Set(Set::parse(&mut reader)?),
            "DEL" => Command::Del(Del::parse(&mut reader)?),
            "EXISTS" => Command::Exists(Exists::parse(&mut reader)?),
            "FLUSHDB" => Command::FlushDb(FlushDb::parse(&mut reader)?),
            "ECHO" => Command::Echo(Echo::parse(&mut reader)?),
            "PING" => Command::Ping(Ping::parse(&mut reader)?),
            "QUIT" => Command::Quit(Quit::parse(&mut reader)?),
            "MSET" => Command::Mset(Mset::parse(&mut reader)?),
            "MGET" => Command::Mget(Mget::parse(&mut reader)?),
            "STRLEN" => Command::Strlen(Strlen::parse(&mut reader)?),
            _ => Command::Unknown(Unknown::new(command_name)),
        };

        Ok(command)
    }

    /// Apply the command against the store and return the reply frame.
    ///
    /// `QUIT` is special: the handler intercepts it before dispatch to close
    /// the connection; applying it directly reports a connection error, the
    /// signal the command exists to raise.
    pub fn apply(self, db: &Db) -> crate::Result<Frame> {
        use Command::*;

        match self {
            Get(cmd) => cmd.apply(db),
            Set(cmd) => cmd.apply(db),
            Del(cmd) => cmd.apply(db),
            Exists(cmd) => cmd.apply(db),
            FlushDb(cmd) => cmd.apply(db),
            Echo(cmd) => cmd.apply(),
            Ping(cmd) => cmd.apply(),
            Quit(_) => Err(Error::Connection("QUIT command".into())),
            Mset(cmd) => cmd.apply(db),
            Mget(cmd) => cmd.apply(db),
            Strlen(cmd) => cmd.apply(db),
            Unknown(cmd) => cmd.apply(),
        }
    }

    pub fn get_name(&self) -> &str {
        match self {
            Command::Get(_) => "GET",
            Command::Set(_) => "SET",
            Command::Del(_) => "DEL",
            Command::Exists(_) => "EXISTS",
            Command::FlushDb(_) => "FLUSHDB",
            Command::Echo(_) => "ECHO",
            Command::Ping(_) => "PING",
            Command::Quit(_) => "QUIT",
            Command::Mset(_) => "MSET",
            Command::Mget(_) => "MGET",
            Command::Strlen(_) => "STRLEN",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Iterates over the elements of a request frame.
///
/// Commands consume their arguments from it and call `finish` to reject
/// trailing garbage.
pub struct FrameReader {
    inner: vec::IntoIter<Frame>,
}

#[derive(Debug)]
pub enum FrameReaderError {
    EndOfStream,
    Other(String),
}

impl FrameReader {
    pub fn new(frame: Frame) -> Result<FrameReader, FrameReaderError> {
        let parts = match frame {
            Frame::Array(parts) => parts,
            frame => return Err(format!("Expected `Frame::Array` but got {:?}", frame).into()),
        };
        Ok(Self {
            inner: parts.into_iter(),
        })
    }

    pub fn next(&mut self) -> Result<Frame, FrameReaderError> {
        self.inner.next().ok_or(FrameReaderError::EndOfStream)
    }

    /// Return the next entry as a string.
    ///
    /// Only `Bulk` and `Simple` frames convert.
    pub fn next_string(&mut self) -> Result<String, FrameReaderError> {
        match self.next()? {
            Frame::Simple(string) => Ok(string),
            Frame::Bulk(data) => {
                String::from_utf8(data.to_vec()).map_err(|_| "Invalid string".into())
            }
            other => {
                Err(format!("Expected `Frame::Simple` or `Frame::Bulk` but got {:?}", other).into())
            }
        }
    }

    /// Return the next entry as raw bytes.
    ///
    /// Only `Bulk` and `Simple` frames convert.
    pub fn next_bytes(&mut self) -> Result<Bytes, FrameReaderError> {
        match self.next()? {
            Frame::Simple(string) => Ok(Bytes::from(string)),
            Frame::Bulk(data) => Ok(data),
            other => {
                Err(format!("Expected `Frame::Simple` or `Frame::Bulk` but got {:?}", other).into())
            }
        }
    }

    /// Check that the request has been exhausted.
    pub fn finish(&mut self) -> Result<(), FrameReaderError> {
        match self.inner.next() {
            Some(_) => Err("Expected end of request".into()),
            None => Ok(()),
        }
    }
}

impl std::error::Error for FrameReaderError {}

impl From<String> for FrameReaderError {
    fn from(value: String) -> Self {
        FrameReaderError::Other(value)
    }
}

impl From<&str> for FrameReaderError {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl std::fmt::Display for FrameReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameReaderError::EndOfStream => "end of request reached".fmt(f),
            FrameReaderError::Other(reason) => reason.fmt(f),
        }
    }
}

/// The arity error every command reports, named after the command.
pub(crate) fn wrong_args(name: &str) -> Error {
    Error::bad_request(format!("Wrong number of arguments for {}", name))
}
