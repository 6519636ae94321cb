pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod db;
pub mod frame;
pub mod pool;
pub mod server;

mod error;

pub use client::{Client, ClientConfig};
pub use command::Command;
pub use config::{parse_config, ServerConfig};
pub use db::{Db, DbGuard};
pub use error::{Error, Result};
pub use frame::Frame;
pub use pool::{Pool, PoolConfig, PoolGuard};

/// Port the server binds and clients dial when none is configured
pub const DEFAULT_PORT: u16 = 7272;
