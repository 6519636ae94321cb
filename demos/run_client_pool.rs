//! Ten clients sharing one connection pool, each doing a short
//! set/get/ping round with a random key.

use std::time::Duration;

use bytes::Bytes;
use rudis::{Pool, PoolConfig};
use tracing_subscriber::EnvFilter;

const CLIENTS_COUNT: usize = 10;

async fn run_client(pool: Pool) -> rudis::Result<()> {
    let mut con = pool.acquire().await?;

    let key = format!("key_{}", rand::random::<u32>() % 100);
    con.set(key.as_bytes(), b"my_val").await?;
    assert_eq!(
        con.get(key.as_bytes()).await?,
        Some(Bytes::from_static(b"my_val"))
    );
    assert_eq!(con.ping(None).await?, Bytes::from_static(b"PONG"));

    tokio::time::sleep(Duration::from_millis(u64::from(rand::random::<u16>() % 500))).await;

    Ok(())
}

#[tokio::main]
async fn main() -> rudis::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let pool = Pool::new(PoolConfig {
        min_size: 3,
        max_size: 20,
        ..Default::default()
    });
    pool.init().await?;

    let tasks: Vec<_> = (0..CLIENTS_COUNT)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(run_client(pool))
        })
        .collect();

    for task in tasks {
        task.await.expect("client task panicked")?;
    }

    pool.close().await?;

    Ok(())
}
