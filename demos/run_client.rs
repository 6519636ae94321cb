//! Several concurrent clients each running a scripted list of raw commands
//! against a server on the default port.

use bytes::Bytes;
use rudis::{Client, DEFAULT_PORT};

async fn run_script(commands: Vec<Vec<&'static [u8]>>) -> rudis::Result<()> {
    let mut con = Client::new("127.0.0.1", DEFAULT_PORT);

    for command in commands {
        let printable: Vec<_> = command
            .iter()
            .map(|part| String::from_utf8_lossy(part))
            .collect();
        println!("Send: {:?}", printable);

        let args: Vec<Bytes> = command.into_iter().map(Bytes::from_static).collect();
        let reply = con.execute(args).await?;
        println!("Received: {:?}", reply);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> rudis::Result<()> {
    let scripts: Vec<Vec<Vec<&'static [u8]>>> = vec![
        vec![
            vec![b"SET", b"key", b"val"],
            vec![b"GET", b"key"],
            vec![b"PING"],
            vec![b"EXISTS", b"key", b"key", b"nokey"],
            vec![b"EXISTS", b"key"],
            vec![b"MSET", b"key1", b"val1", b"key2", b"val2"],
            vec![b"EXISTS", b"key2"],
            vec![b"ECHO", b"Hello!"],
            vec![b"PING", b"Hello?"],
            vec![b"STRLEN", b"key1"],
            vec![b"FLUSHDB"],
            vec![b"QUIT"],
        ],
        vec![
            vec![b"SET", b"otherkey", b"val"],
            vec![b"GET", b"otherkey"],
            vec![b"DEL", b"otherkey"],
        ],
        vec![
            vec![b"PING"],
            vec![b"GET", b"something"],
            vec![b"DEL", b"some"],
            vec![b"FLUSHDB"],
            vec![b"QUIT"],
        ],
    ];

    let tasks: Vec<_> = scripts
        .into_iter()
        .map(|script| tokio::spawn(run_script(script)))
        .collect();

    for task in tasks {
        task.await.expect("client task panicked")?;
    }

    Ok(())
}
