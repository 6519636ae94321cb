use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use bytes::Bytes;
use rudis::{server, Client, ClientConfig, DbGuard, Error, Frame, Pool, PoolConfig};

/// Boot a server on an ephemeral port and leave it running for the rest of
/// the test.
async fn start_server(closing_delay: Option<Duration>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server::run(
            listener,
            closing_delay,
            DbGuard::new(),
            std::future::pending::<()>(),
        )
        .await;
    });
    addr
}

fn client(addr: SocketAddr) -> Client {
    Client::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn set_get_del_cycle() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.set(b"key", b"val").await.expect("set");
    assert_eq!(con.get(b"key").await.expect("get"), Some(Bytes::from_static(b"val")));
    assert!(con.del(b"key").await.expect("del"));
    assert_eq!(con.get(b"key").await.expect("get after del"), None);
    assert!(!con.del(b"key").await.expect("second del"));
}

#[tokio::test]
async fn mset_then_mget_preserves_order() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.mset(&[(b"k1".as_slice(), b"v1".as_slice()), (b"k2", b"v2")])
        .await
        .expect("mset");
    let values = con
        .mget(&[b"k2".as_slice(), b"k1", b"nokey"])
        .await
        .expect("mget");
    assert_eq!(
        values,
        vec![
            Some(Bytes::from_static(b"v2")),
            Some(Bytes::from_static(b"v1")),
            None,
        ]
    );
}

#[tokio::test]
async fn exists_counts_every_occurrence() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.set(b"k", b"1").await.expect("set");
    assert_eq!(
        con.exists(&[b"k".as_slice(), b"key", b"k"]).await.expect("exists"),
        2
    );
}

#[tokio::test]
async fn ping_and_echo() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    assert_eq!(con.ping(None).await.expect("ping"), Bytes::from_static(b"PONG"));
    assert_eq!(
        con.ping(Some(b"hello?")).await.expect("ping with payload"),
        Bytes::from_static(b"hello?")
    );
    assert_eq!(con.echo(b"hi").await.expect("echo"), Bytes::from_static(b"hi"));
}

#[tokio::test]
async fn flushdb_reports_size_then_zero() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.set(b"a", b"1").await.expect("set");
    assert_eq!(con.flushdb().await.expect("flushdb"), 1);
    assert_eq!(con.flushdb().await.expect("second flushdb"), 0);
}

#[tokio::test]
async fn strlen_over_the_wire() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.set(b"k1", b"Hello, I am byte string").await.expect("set");
    assert_eq!(con.strlen(b"k1").await.expect("strlen"), 23);
    assert_eq!(con.strlen(b"absent").await.expect("strlen absent"), 0);
}

#[tokio::test]
async fn bad_command_leaves_connection_usable() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    let reply = con
        .execute(vec![Bytes::from_static(b"BAD")])
        .await
        .expect("error frames are ordinary replies to execute");
    assert_eq!(reply, Frame::Error("Bad command".into()));

    let reply = con
        .execute(vec![Bytes::from_static(b"GET"), Bytes::from_static(b"a"), Bytes::from_static(b"b")])
        .await
        .expect("arity errors are replies too");
    assert_eq!(reply, Frame::Error("Wrong number of arguments for GET".into()));

    assert_eq!(con.ping(None).await.expect("ping still works"), Bytes::from_static(b"PONG"));
}

#[tokio::test]
async fn mset_requires_at_least_one_pair() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    let err = con.mset(&[]).await.expect_err("empty mset");
    assert!(matches!(err, Error::Client(_)));
}

#[tokio::test]
async fn quit_closes_and_next_call_reconnects() {
    let addr = start_server(None).await;
    let mut con = client(addr);

    con.ping(None).await.expect("ping");
    assert!(con.is_connected());

    con.quit().await.expect("quit");
    assert!(!con.is_connected());

    // the next command dials a fresh socket
    assert_eq!(con.ping(None).await.expect("ping reconnects"), Bytes::from_static(b"PONG"));
    assert!(con.is_connected());
}

#[tokio::test]
async fn idle_client_recycles_its_socket() {
    let addr = start_server(None).await;
    let mut con = Client::with_config(ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        inactive_time: Duration::from_millis(100),
        ..Default::default()
    });

    con.ping(None).await.expect("ping");
    time::sleep(Duration::from_millis(150)).await;

    // the stale socket is replaced transparently
    assert_eq!(con.ping(None).await.expect("ping after idling"), Bytes::from_static(b"PONG"));
    assert!(con.is_connected());
}

#[tokio::test]
async fn server_hangs_up_on_idle_peers() {
    let addr = start_server(Some(Duration::from_millis(100))).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut buf = [0u8; 16];
    let read = time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server should close before the timeout")
        .expect("read");
    assert_eq!(read, 0, "expected EOF from the idle-closed server");
}

#[tokio::test]
async fn wire_level_byte_exchange() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    async fn exchange(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
        stream.write_all(request).await.expect("write");
        let mut reply = vec![0u8; expected.len()];
        stream.read_exact(&mut reply).await.expect("read");
        assert_eq!(reply, expected);
    }

    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"$4\r\nPONG\r\n").await;
    exchange(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n", b":1\r\n").await;
    exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n").await;
    exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$4\r\nnope\r\n", b"$-1\r\n").await;

    // a request that is not an array is reported, not fatal
    exchange(&mut stream, b"+PING\r\n", b"-Bad request format\r\n").await;
    exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"$4\r\nPONG\r\n").await;
}

#[tokio::test]
async fn pipelined_requests_answer_in_order() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    stream
        .write_all(b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n")
        .await
        .expect("write both requests");

    let expected = b"$4\r\nPONG\r\n$2\r\nhi\r\n";
    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).await.expect("read");
    assert_eq!(reply, expected);
}

#[tokio::test]
async fn pool_serves_concurrent_borrowers() {
    let addr = start_server(None).await;
    let pool = Pool::new(PoolConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        min_size: 2,
        max_size: 5,
        ..Default::default()
    });
    pool.init().await.expect("init");

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut con = pool.acquire().await.expect("acquire");
            let key = format!("key_{}", rand::random::<u32>());
            con.set(key.as_bytes(), b"my_val").await.expect("set");
            assert_eq!(
                con.get(key.as_bytes()).await.expect("get"),
                Some(Bytes::from_static(b"my_val"))
            );
            assert_eq!(con.ping(None).await.expect("ping"), Bytes::from_static(b"PONG"));
        }));
    }
    for task in tasks {
        task.await.expect("borrower finished");
    }

    pool.close().await.expect("close");
}

#[tokio::test]
async fn closing_the_pool_fails_borrowers_on_next_use() {
    let addr = start_server(None).await;
    let pool = Pool::new(PoolConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        min_size: 1,
        max_size: 2,
        ..Default::default()
    });
    pool.init().await.expect("init");

    let mut held = pool.acquire().await.expect("acquire");
    held.ping(None).await.expect("ping before close");

    pool.close().await.expect("close");

    let err = held.ping(None).await.expect_err("pool already closed");
    match err {
        Error::Client(msg) => assert_eq!(msg, "Pool is closed"),
        other => panic!("expected client error, got {:?}", other),
    }
}
