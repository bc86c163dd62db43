//! Scripted ZooKeeper stand-in for tests.
//!
//! Listens on an ephemeral loopback port, records every command it
//! receives, and answers according to a fixed script.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::client::FourLetterWord;

/// How the fake server answers a command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write the text, then close.
    Text(String),
    /// Close without writing anything.
    Close,
    /// Write raw bytes, then close.
    Bytes(Vec<u8>),
    /// Keep the connection open and never answer.
    Hang,
    /// Write the text, then keep the connection open.
    PartialThenHang(String),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

pub struct FakeZookeeper {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeZookeeper {
    /// Start a server answering each scripted command. Unscripted
    /// commands are recorded and answered with [`Reply::Close`].
    pub async fn start(
        script: impl IntoIterator<Item = (FourLetterWord, Reply)>,
    ) -> io::Result<Self> {
        let script: Arc<HashMap<[u8; 4], Reply>> = Arc::new(
            script
                .into_iter()
                .map(|(cmd, reply)| (*cmd.as_bytes(), reply))
                .collect(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let commands = commands.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(answer(stream, script.clone(), commands.clone()));
                }
            })
        };

        Ok(Self {
            addr,
            commands,
            connections,
            task,
        })
    }

    /// `host:port` to hand to a client.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Commands received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }

    /// Number of accepted connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeZookeeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    mut stream: TcpStream,
    script: Arc<HashMap<[u8; 4], Reply>>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    let mut word = [0u8; 4];
    if stream.read_exact(&mut word).await.is_err() {
        return;
    }
    commands
        .lock()
        .expect("commands lock")
        .push(String::from_utf8_lossy(&word).into_owned());

    match script.get(&word).cloned().unwrap_or(Reply::Close) {
        Reply::Text(text) => {
            let _ = stream.write_all(text.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        Reply::Close => {
            let _ = stream.shutdown().await;
        }
        Reply::Bytes(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.shutdown().await;
        }
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Reply::PartialThenHang(text) => {
            let _ = stream.write_all(text.as_bytes()).await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

/// An address nothing is listening on.
pub async fn unreachable_addr() -> io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr.to_string())
}
