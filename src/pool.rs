use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::join_all;
use tokio::{sync::Semaphore, time};
use tracing::{debug, warn};

use crate::{
    client::{Client, ClientConfig},
    Error,
};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,

    /// connections opened eagerly by `init`
    pub min_size: usize,

    /// total connections; also the bound on concurrent borrowers
    pub max_size: usize,

    pub inactive_time: Duration,
    pub try_reconnect: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            host: "127.0.0.1".to_string(),
            port: crate::DEFAULT_PORT,
            min_size: 10,
            max_size: 10,
            inactive_time: crate::client::DEFAULT_INACTIVE_TIME,
            try_reconnect: true,
        }
    }
}

/// A bounded LIFO pool of client connections to one server.
///
/// All `max_size` members exist from construction but none are connected;
/// `init` warms the top `min_size` and the rest open lazily on first use.
/// The most recently released connection is handed out first, keeping the
/// busiest sockets warm while idle ones age out and are reaped.
#[derive(Debug, Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<State>,

    /// counts the connections sitting in `available`; acquirers park here
    /// when every member is borrowed
    semaphore: Semaphore,

    min_size: usize,
    inactive_time: Duration,
}

#[derive(Debug)]
struct State {
    /// LIFO: the most recently released member sits at the end
    available: Vec<Client>,
    inited: bool,
    closed: bool,
}

impl Pool {
    /// Allocate the pool without opening any sockets.
    pub fn new(config: PoolConfig) -> Pool {
        let max_size = config.max_size.max(1);
        let min_size = config.min_size.min(max_size);

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                available: Vec::with_capacity(max_size),
                inited: false,
                closed: false,
            }),
            semaphore: Semaphore::new(max_size),
            min_size,
            inactive_time: config.inactive_time,
        });

        {
            let mut state = shared.state.lock().expect("pool mutex poisoned");
            for _ in 0..max_size {
                let mut client = Client::with_config(ClientConfig {
                    host: config.host.clone(),
                    port: config.port,
                    inactive_time: config.inactive_time,
                    try_reconnect: config.try_reconnect,
                });
                client.bind_pool(Arc::downgrade(&shared));
                state.available.push(client);
            }
        }

        Pool { shared }
    }

    /// Eagerly connect the top `min_size` members. Idempotent; fails once
    /// the pool has been closed.
    pub async fn init(&self) -> crate::Result<()> {
        let mut warm = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            if state.closed {
                return Err(Error::client("Pool is closed"));
            }
            if state.inited {
                return Ok(());
            }
            state.inited = true;

            // Take both the members and their permits out while the
            // sockets open, so a concurrent acquire cannot see a stack
            // that is short of its permit count.
            let permits = self
                .shared
                .semaphore
                .try_acquire_many(self.shared.min_size as u32)
                .map_err(|_| Error::client("Pool is closed"))?;
            permits.forget();

            let at = state.available.len() - self.shared.min_size;
            state.available.split_off(at)
        };

        let results = join_all(warm.iter_mut().map(|client| client.connect())).await;

        {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.available.append(&mut warm);
        }
        self.shared.semaphore.add_permits(self.shared.min_size);

        for result in results {
            result?;
        }

        self.spawn_reaper();

        Ok(())
    }

    /// Borrow a connection, blocking while every member is checked out.
    ///
    /// The guard returns the connection on drop.
    pub async fn acquire(&self) -> crate::Result<PoolGuard> {
        self.shared.check_ready()?;

        let permit = self
            .shared
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::client("Pool is closed"))?;
        permit.forget();

        let mut state = self.shared.state.lock().expect("pool mutex poisoned");
        if state.closed {
            return Err(Error::client("Pool is closed"));
        }
        let mut client = match state.available.pop() {
            Some(client) => client,
            None => return Err(Error::client("Pool is closed")),
        };
        client.acquired = true;

        Ok(PoolGuard {
            shared: Arc::clone(&self.shared),
            client: Some(client),
        })
    }

    /// Close every member and retire the pool.
    ///
    /// Safe to call while borrowers hold connections: they finish their
    /// in-flight exchange, observe a client error on the next one, and
    /// their guards drop the sockets instead of returning them.
    pub async fn close(&self) -> crate::Result<()> {
        let mut members = {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            if !state.inited {
                return Err(Error::client("Pool is not inited"));
            }
            state.closed = true;
            std::mem::take(&mut state.available)
        };
        self.shared.semaphore.close();

        let results = join_all(members.iter_mut().map(|client| client.close())).await;
        for result in results {
            if let Err(err) = result {
                warn!(cause = %err, "error closing pooled connection");
            }
        }

        Ok(())
    }

    /// Background task that drops the sockets of members left idle past
    /// the deadline. Reaped members reconnect lazily on next acquire.
    fn spawn_reaper(&self) {
        let shared = Arc::downgrade(&self.shared);
        let period = (self.shared.inactive_time / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            loop {
                time::sleep(period).await;
                let shared = match shared.upgrade() {
                    Some(shared) => shared,
                    None => return,
                };
                if shared.is_closed() {
                    return;
                }
                let reaped = shared.reap_idle();
                if reaped > 0 {
                    debug!(count = reaped, "reaped idle pooled connections");
                }
            }
        });
    }
}

impl Shared {
    fn check_ready(&self) -> crate::Result<()> {
        let state = self.state.lock().expect("pool mutex poisoned");
        if !state.inited {
            return Err(Error::client("Pool is not inited"));
        }
        if state.closed {
            return Err(Error::client("Pool is closed"));
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().expect("pool mutex poisoned").closed
    }

    /// Fleet-wide failure policy: one broken connection retires the whole
    /// pool, since every member talks to the same peer.
    pub(crate) fn mark_closed(&self) {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        state.closed = true;
        drop(state);
        self.semaphore.close();
    }

    fn release(&self, mut client: Client) {
        client.acquired = false;
        let mut state = self.state.lock().expect("pool mutex poisoned");
        if state.closed {
            // the socket closes with the dropped client
            return;
        }
        state.available.push(client);
        drop(state);
        self.semaphore.add_permits(1);
    }

    fn reap_idle(&self) -> usize {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        let mut reaped = 0;
        for client in state.available.iter_mut() {
            if client.is_connected() && client.idle_expired() {
                client.drop_transport();
                reaped += 1;
            }
        }
        reaped
    }
}

/// RAII borrow of a pooled connection; releases back to the pool on drop.
#[derive(Debug)]
pub struct PoolGuard {
    shared: Arc<Shared>,
    client: Option<Client>,
}

impl Deref for PoolGuard {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("pool guard holds a client until drop")
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("pool guard holds a client until drop")
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.shared.release(client);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::{net::TcpListener, sync::oneshot};

    use super::*;
    use crate::{db::DbGuard, server};

    async fn start_server() -> (SocketAddr, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = server::run(listener, None, DbGuard::new(), stop_rx).await;
        });
        (addr, stop_tx)
    }

    fn config(addr: SocketAddr, min_size: usize, max_size: usize) -> PoolConfig {
        PoolConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            min_size,
            max_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn acquire_before_init_fails() {
        let (addr, _stop) = start_server().await;
        let pool = Pool::new(config(addr, 1, 2));

        match pool.acquire().await {
            Err(Error::Client(msg)) => assert_eq!(msg, "Pool is not inited"),
            other => panic!("expected client error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn init_warms_min_size() {
        let (addr, _stop) = start_server().await;
        let pool = Pool::new(config(addr, 2, 4));
        pool.init().await.expect("init");
        pool.init().await.expect("init is idempotent");

        // the top of the stack was connected eagerly, deeper members not
        let first = pool.acquire().await.expect("acquire");
        let second = pool.acquire().await.expect("acquire");
        let third = pool.acquire().await.expect("acquire");
        assert!(first.is_connected());
        assert!(second.is_connected());
        assert!(!third.is_connected());
    }

    #[tokio::test]
    async fn released_connection_is_next_acquired() {
        let (addr, _stop) = start_server().await;
        let pool = Pool::new(config(addr, 0, 2));
        pool.init().await.expect("init");

        let mut guard = pool.acquire().await.expect("acquire");
        assert!(!guard.is_connected());
        guard.ping(None).await.expect("ping");
        assert!(guard.is_connected());
        drop(guard);

        // LIFO: the connection we just warmed comes straight back
        let guard = pool.acquire().await.expect("acquire");
        assert!(guard.is_connected());
    }

    #[tokio::test]
    async fn acquirers_block_at_capacity() {
        let (addr, _stop) = start_server().await;
        let pool = Pool::new(config(addr, 1, 1));
        pool.init().await.expect("init");

        let guard = pool.acquire().await.expect("acquire");

        let mut contended = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let guard = pool.acquire().await.expect("acquire after release");
                drop(guard);
            })
        };

        // the second acquirer must still be parked on the semaphore
        let waited = time::timeout(Duration::from_millis(100), &mut contended).await;
        assert!(waited.is_err());

        drop(guard);
        contended.await.expect("contended acquirer finished");
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire_and_init() {
        let (addr, _stop) = start_server().await;
        let pool = Pool::new(config(addr, 1, 2));
        pool.init().await.expect("init");
        pool.close().await.expect("close");

        match pool.acquire().await {
            Err(Error::Client(msg)) => assert_eq!(msg, "Pool is closed"),
            other => panic!("expected client error, got {:?}", other),
        }
        match pool.init().await {
            Err(Error::Client(msg)) => assert_eq!(msg, "Pool is closed"),
            other => panic!("expected client error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_failure_poisons_the_pool() {
        let (addr, stop) = start_server().await;
        let pool = Pool::new(config(addr, 1, 1));
        pool.init().await.expect("init");

        {
            let mut guard = pool.acquire().await.expect("acquire");
            guard.ping(None).await.expect("ping");

            // kill the server out from under the connection
            stop.send(()).expect("stop server");
            time::sleep(Duration::from_millis(50)).await;

            let err = guard.ping(None).await.expect_err("peer is gone");
            assert!(matches!(err, Error::Client(_)));
        }

        match pool.acquire().await {
            Err(Error::Client(msg)) => assert_eq!(msg, "Pool is closed"),
            other => panic!("expected poisoned pool, got {:?}", other),
        }
    }
}
