use std::{env::Args, time::Duration};

use crate::Error;

/// Server settings parsed from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// optional per-connection idle timeout in seconds
    pub closing_delay: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: crate::DEFAULT_PORT,
            closing_delay: None,
        }
    }
}

/// Parse `--host`, `--port` and `--closing-delay` arguments.
pub fn parse_config(args: &mut Args) -> crate::Result<ServerConfig> {
    let mut config = ServerConfig::default();

    // skip the program name
    args.next();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" => {
                config.host = args
                    .next()
                    .ok_or_else(|| Error::bad_request("--host requires a value"))?;
            }
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| Error::bad_request("--port requires a value"))?;
                config.port = value
                    .parse()
                    .map_err(|_| Error::bad_request(format!("invalid port: {}", value)))?;
            }
            "--closing-delay" => {
                let value = args
                    .next()
                    .ok_or_else(|| Error::bad_request("--closing-delay requires a value"))?;
                let seconds: u64 = value
                    .parse()
                    .map_err(|_| Error::bad_request(format!("invalid closing delay: {}", value)))?;
                config.closing_delay = Some(Duration::from_secs(seconds));
            }
            arg => {
                return Err(Error::bad_request(format!("unknown argument: {}", arg)));
            }
        }
    }

    Ok(config)
}
