use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc},
    time,
};
use tracing::{debug, error, info};

use crate::{command::Command, connection::Connection, db::DbGuard, frame::Frame, Error};

/// Accepts inbound connections and spawns one `Handler` per socket.
#[derive(Debug)]
pub struct Listener {
    db: DbGuard,

    listener: TcpListener,

    /// per-connection idle timeout; handlers hang up on clients that stay
    /// silent this long between requests
    closing_delay: Option<Duration>,

    /// gauge of live handlers, for observability only
    active_connections: Arc<AtomicUsize>,

    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

/// Per-connection state: the read/dispatch/write loop over one accepted
/// socket.
pub struct Handler {
    db: crate::Db,

    /// The TCP connection instrumented with the frame codec
    connection: Connection,

    closing_delay: Option<Duration>,

    /// Resolves (with a value or a closed-channel error) once the listener
    /// starts draining; the handler hangs up either way.
    shutdown: broadcast::Receiver<()>,

    _shutdown_complete: mpsc::Sender<()>,
}

/// Run the server until `shutdown` completes.
///
/// Accepting stops as soon as the shutdown future resolves; live handlers
/// are notified and drained before this returns.
pub async fn run(
    listener: TcpListener,
    closing_delay: Option<Duration>,
    db: DbGuard,
    shutdown: impl Future,
) -> crate::Result<()> {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);

    let mut server = Listener {
        db,
        listener,
        closing_delay,
        active_connections: Arc::new(AtomicUsize::new(0)),
        notify_shutdown,
        shutdown_complete_tx,
    };

    tokio::select! {
        res = server.run() => {
            // accept-loop errors are terminal; per-connection faults never
            // surface here
            if let Err(err) = res {
                error!(cause = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    // Drop the broadcast sender so every handler's shutdown listener
    // resolves, then wait for the last `shutdown_complete_tx` clone to go
    // away.
    let Listener {
        notify_shutdown,
        shutdown_complete_tx,
        ..
    } = server;
    drop(notify_shutdown);
    drop(shutdown_complete_tx);

    let _ = shutdown_complete_rx.recv().await;

    Ok(())
}

impl Listener {
    pub async fn run(&mut self) -> crate::Result<()> {
        info!("listening on {:?}", self.listener.local_addr());

        loop {
            let stream = self.accept().await?;

            let mut handler = Handler {
                db: self.db.db(),
                connection: Connection::new(stream),
                closing_delay: self.closing_delay,
                shutdown: self.notify_shutdown.subscribe(),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };

            let active = Arc::clone(&self.active_connections);
            let count = active.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(active = count, "accepted connection");

            tokio::spawn(async move {
                if let Err(err) = handler.run().await {
                    error!(cause = %err, "connection error");
                }
                let count = active.fetch_sub(1, Ordering::Relaxed) - 1;
                debug!(active = count, "connection closed");
            });
        }
    }

    /// Accept a new connection, retrying transient failures with
    /// exponential backoff up to 32 seconds.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => return Ok(stream),
                Err(err) => {
                    if backoff > 32 {
                        return Err(err.into());
                    }
                }
            }
            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Process requests from one socket until the peer leaves.
    ///
    /// Bad requests are reported back as error frames and the loop
    /// continues; QUIT, peer close, an expired idle timer and transport
    /// errors all end the handler.
    pub async fn run(&mut self) -> crate::Result<()> {
        loop {
            let read = tokio::select! {
                res = self.connection.read_frame() => res,
                _ = idle_expired(self.closing_delay) => {
                    debug!("idle timeout, closing connection");
                    return Ok(());
                }
                _ = self.shutdown.recv() => {
                    debug!("server draining, closing connection");
                    return Ok(());
                }
            };

            let frame = match read {
                Ok(Some(frame)) => frame,
                // clean close between frames
                Ok(None) => return Ok(()),
                Err(Error::BadRequest(msg)) => {
                    self.connection.write_frame(&Frame::Error(msg)).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let reply = match Command::from_frame(frame) {
                Ok(Command::Quit(_)) => {
                    debug!("client quit");
                    return Ok(());
                }
                Ok(command) => {
                    debug!(command = command.get_name(), "dispatch");
                    match command.apply(&self.db) {
                        Ok(reply) => reply,
                        Err(Error::BadRequest(msg)) => Frame::Error(msg),
                        Err(err) => return Err(err),
                    }
                }
                Err(Error::BadRequest(msg)) => Frame::Error(msg),
                Err(err) => return Err(err),
            };

            self.connection.write_frame(&reply).await?;
        }
    }
}

/// Resolves once the idle timeout elapses; never resolves when no timeout
/// is configured.
async fn idle_expired(delay: Option<Duration>) {
    match delay {
        Some(delay) => time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
