use std::{io, sync::Weak, time::Duration};

use bytes::Bytes;
use tokio::{net::TcpStream, time::Instant};
use tracing::debug;

use crate::{connection::Connection, frame::Frame, pool::Shared, Error};

/// How long a connection may sit idle before it is recycled.
pub const DEFAULT_INACTIVE_TIME: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,

    /// idle deadline after which the socket is closed and reopened lazily
    pub inactive_time: Duration,

    /// retry a command once after a transient transport failure
    pub try_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: crate::DEFAULT_PORT,
            inactive_time: DEFAULT_INACTIVE_TIME,
            try_reconnect: true,
        }
    }
}

/// One client-side connection to the server.
///
/// Created unconnected; the socket opens on the first `execute` (or an
/// explicit `connect`) and closes again when the idle deadline passes or
/// `close` is called. A closed client reconnects transparently on its next
/// use, so instances are freely reusable and poolable.
#[derive(Debug)]
pub struct Client {
    host: String,
    port: u16,
    connection: Option<Connection>,

    /// back-reference used only to retire the pool on fatal errors
    pool: Option<Weak<Shared>>,

    pub(crate) acquired: bool,
    try_reconnect: bool,
    inactive_time: Duration,
    last_active: Instant,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Client {
        Client::with_config(ClientConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> Client {
        Client {
            host: config.host,
            port: config.port,
            connection: None,
            pool: None,
            acquired: false,
            try_reconnect: config.try_reconnect,
            inactive_time: config.inactive_time,
            last_active: Instant::now(),
        }
    }

    pub(crate) fn bind_pool(&mut self, pool: Weak<Shared>) {
        self.pool = Some(pool);
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the client is currently borrowed from its pool
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Open the socket if it is not already open.
    pub async fn connect(&mut self) -> crate::Result<()> {
        if self.connection.is_none() {
            let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            self.connection = Some(Connection::new(stream));
            self.last_active = Instant::now();
            debug!(host = %self.host, port = self.port, "connected");
        }
        Ok(())
    }

    /// Send one command and return the reply frame.
    ///
    /// `args` is the request verbatim: command name first, then its
    /// arguments, each encoded as a bulk string. `QUIT` is special-cased:
    /// the server hangs up without replying, so the writer is flushed, the
    /// socket dropped and `Null` returned.
    ///
    /// A transient transport failure is retried once (with a fresh socket)
    /// when `try_reconnect` is set. A frame-level connection failure
    /// retires the owning pool, on the grounds that every other connection
    /// to the same peer is about to fail too.
    pub async fn execute(&mut self, args: Vec<Bytes>) -> crate::Result<Frame> {
        if args.is_empty() {
            return Err(Error::client("Empty command"));
        }
        self.check_pool_open()?;

        let quit = args[0].eq_ignore_ascii_case(b"QUIT");
        let request = request_frame(&args);

        let mut reconnects = 0;
        loop {
            self.expire_idle().await;
            if let Err(err) = self.connect().await {
                self.poison_pool();
                return Err(Error::client(err.to_string()));
            }

            match self.exchange(&request, quit).await {
                Ok(reply) => {
                    self.last_active = Instant::now();
                    return Ok(reply);
                }
                Err(Error::Connection(msg)) => {
                    self.connection = None;
                    self.poison_pool();
                    return Err(Error::Client(msg));
                }
                Err(Error::Io(err)) => {
                    self.connection = None;
                    if self.try_reconnect && reconnects == 0 && is_transient(&err) {
                        reconnects += 1;
                        debug!(cause = %err, "reconnecting after transport error");
                        continue;
                    }
                    self.poison_pool();
                    return Err(Error::client(err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the connection, announcing the departure with QUIT when the
    /// socket is still open.
    pub async fn close(&mut self) -> crate::Result<()> {
        self.close_transport().await;
        Ok(())
    }

    async fn exchange(&mut self, request: &Frame, quit: bool) -> crate::Result<Frame> {
        {
            let connection = match self.connection.as_mut() {
                Some(connection) => connection,
                None => return Err(Error::client("Not connected")),
            };

            connection.write_frame(request).await?;

            if !quit {
                return match connection.read_frame().await? {
                    Some(reply) => Ok(reply),
                    None => Err(Error::Connection("Connection closed by peer".into())),
                };
            }
        }

        // QUIT: the server closes without replying
        self.connection = None;
        Ok(Frame::Null)
    }

    /// Recycle the connection when the idle deadline has passed; the next
    /// exchange reopens it.
    async fn expire_idle(&mut self) {
        if self.connection.is_some() && self.idle_expired() {
            debug!("idle deadline passed, recycling connection");
            self.close_transport().await;
        }
    }

    pub(crate) fn idle_expired(&self) -> bool {
        self.last_active.elapsed() >= self.inactive_time
    }

    /// Drop the socket without the QUIT courtesy; used by the pool reaper,
    /// which must not block on a peer that may already be gone.
    pub(crate) fn drop_transport(&mut self) {
        self.connection = None;
    }

    async fn close_transport(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let mut quit = Frame::array();
            quit.push_bulk(Bytes::from_static(b"QUIT"));
            if let Err(err) = connection.write_frame(&quit).await {
                debug!(cause = %err, "QUIT on close failed");
            }
        }
    }

    fn check_pool_open(&self) -> crate::Result<()> {
        if let Some(pool) = self.pool.as_ref().and_then(|pool| pool.upgrade()) {
            if pool.is_closed() {
                return Err(Error::client("Pool is closed"));
            }
        }
        Ok(())
    }

    fn poison_pool(&self) {
        if let Some(pool) = self.pool.as_ref().and_then(|pool| pool.upgrade()) {
            debug!("marking pool closed after connection failure");
            pool.mark_closed();
        }
    }
}

/// Typed command wrappers over `execute`.
impl Client {
    /// `GET key`, `None` when the key is absent
    pub async fn get(&mut self, key: &[u8]) -> crate::Result<Option<Bytes>> {
        let args = vec![Bytes::from_static(b"GET"), Bytes::copy_from_slice(key)];
        match self.execute(args).await? {
            Frame::Bulk(value) => Ok(Some(value)),
            Frame::Null => Ok(None),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `SET key value`, an unconditional overwrite
    pub async fn set(&mut self, key: &[u8], value: &[u8]) -> crate::Result<()> {
        let args = vec![
            Bytes::from_static(b"SET"),
            Bytes::copy_from_slice(key),
            Bytes::copy_from_slice(value),
        ];
        match self.execute(args).await? {
            Frame::Integer(_) => Ok(()),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `DEL key`, whether an entry was removed
    pub async fn del(&mut self, key: &[u8]) -> crate::Result<bool> {
        let args = vec![Bytes::from_static(b"DEL"), Bytes::copy_from_slice(key)];
        match self.execute(args).await? {
            Frame::Integer(removed) => Ok(removed == 1),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `EXISTS key...`, counting duplicate keys every time they appear
    pub async fn exists(&mut self, keys: &[&[u8]]) -> crate::Result<i64> {
        let mut args = Vec::with_capacity(1 + keys.len());
        args.push(Bytes::from_static(b"EXISTS"));
        for key in keys {
            args.push(Bytes::copy_from_slice(key));
        }
        match self.execute(args).await? {
            Frame::Integer(count) => Ok(count),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `FLUSHDB`, returning how many entries were dropped
    pub async fn flushdb(&mut self) -> crate::Result<i64> {
        match self.execute(vec![Bytes::from_static(b"FLUSHDB")]).await? {
            Frame::Integer(size) => Ok(size),
            frame => Err(unexpected_reply(frame)),
        }
    }

    pub async fn echo(&mut self, msg: &[u8]) -> crate::Result<Bytes> {
        let args = vec![Bytes::from_static(b"ECHO"), Bytes::copy_from_slice(msg)];
        match self.execute(args).await? {
            Frame::Bulk(data) => Ok(data),
            frame => Err(unexpected_reply(frame)),
        }
    }

    pub async fn ping(&mut self, msg: Option<&[u8]>) -> crate::Result<Bytes> {
        let mut args = vec![Bytes::from_static(b"PING")];
        if let Some(msg) = msg {
            args.push(Bytes::copy_from_slice(msg));
        }
        match self.execute(args).await? {
            Frame::Bulk(data) => Ok(data),
            Frame::Simple(text) => Ok(Bytes::from(text)),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `QUIT`: tell the server to hang up, then drop the socket
    pub async fn quit(&mut self) -> crate::Result<()> {
        self.execute(vec![Bytes::from_static(b"QUIT")]).await?;
        Ok(())
    }

    /// `MSET k v ...`; the pair list shape makes odd arities
    /// unrepresentable
    pub async fn mset(&mut self, pairs: &[(&[u8], &[u8])]) -> crate::Result<()> {
        if pairs.is_empty() {
            return Err(Error::client("Wrong number of arguments for MSET"));
        }
        let mut args = Vec::with_capacity(1 + pairs.len() * 2);
        args.push(Bytes::from_static(b"MSET"));
        for (key, value) in pairs {
            args.push(Bytes::copy_from_slice(key));
            args.push(Bytes::copy_from_slice(value));
        }
        match self.execute(args).await? {
            Frame::Bulk(_) | Frame::Simple(_) => Ok(()),
            frame => Err(unexpected_reply(frame)),
        }
    }

    /// `MGET key...`, values in key order with `None` holes
    pub async fn mget(&mut self, keys: &[&[u8]]) -> crate::Result<Vec<Option<Bytes>>> {
        let mut args = Vec::with_capacity(1 + keys.len());
        args.push(Bytes::from_static(b"MGET"));
        for key in keys {
            args.push(Bytes::copy_from_slice(key));
        }
        match self.execute(args).await? {
            Frame::Array(values) => values
                .into_iter()
                .map(|value| match value {
                    Frame::Bulk(data) => Ok(Some(data)),
                    Frame::Null => Ok(None),
                    frame => Err(unexpected_reply(frame)),
                })
                .collect(),
            frame => Err(unexpected_reply(frame)),
        }
    }

    pub async fn strlen(&mut self, key: &[u8]) -> crate::Result<i64> {
        let args = vec![Bytes::from_static(b"STRLEN"), Bytes::copy_from_slice(key)];
        match self.execute(args).await? {
            Frame::Integer(len) => Ok(len),
            frame => Err(unexpected_reply(frame)),
        }
    }
}

fn request_frame(args: &[Bytes]) -> Frame {
    let mut frame = Frame::array();
    for arg in args {
        frame.push_bulk(arg.clone());
    }
    frame
}

/// Server error frames surface as client errors from the typed wrappers;
/// anything else here is a reply-shape mismatch.
fn unexpected_reply(frame: Frame) -> Error {
    match frame {
        Frame::Error(msg) => Error::Client(msg),
        frame => Error::client(format!("Unexpected reply: {:?}", frame)),
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
