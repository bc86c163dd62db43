//! One-shot four-letter-word exchange.
//!
//! Each call to [`CommandClient::send`] opens a fresh TCP connection,
//! writes the command, and reads until the server closes the socket.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::error::CommandError;

/// Deadline for a full connect/write/read round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Administrative commands understood by a ZooKeeper server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourLetterWord {
    /// Dump of `key<TAB>value` server statistics.
    Mntr,
    /// Reset of the server's running statistics.
    Srst,
}

impl FourLetterWord {
    /// The exact bytes written on the wire.
    pub fn as_bytes(self) -> &'static [u8; 4] {
        match self {
            Self::Mntr => b"mntr",
            Self::Srst => b"srst",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mntr => "mntr",
            Self::Srst => "srst",
        }
    }
}

impl fmt::Display for FourLetterWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for a single ZooKeeper node.
///
/// Holds only the target address and deadline; it is cheap to clone and
/// safe to share between concurrent scrapes since no socket outlives a
/// call to [`send`](Self::send).
#[derive(Debug, Clone)]
pub struct CommandClient {
    addr: String,
    timeout: Duration,
}

impl CommandClient {
    /// Create a client for `host:port` with the default deadline.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the round-trip deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a command and return the full reply text.
    ///
    /// Every reply line is re-terminated with `\n`. Exceeding the
    /// deadline is an error even if some bytes already arrived.
    pub async fn send(&self, command: FourLetterWord) -> Result<String, CommandError> {
        debug!(addr = %self.addr, "connecting to zookeeper");

        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(Ok(reply)) => {
                debug!(%command, bytes = reply.len(), "successfully retrieved reply");
                Ok(reply)
            }
            Ok(Err(e)) => {
                error!(%command, error = %e, "four letter word exchange failed");
                Err(e)
            }
            Err(_) => {
                let e = CommandError::Timeout {
                    addr: self.addr.clone(),
                    timeout: self.timeout,
                };
                error!(%command, error = %e, "four letter word exchange timed out");
                Err(e)
            }
        }
    }

    async fn exchange(&self, command: FourLetterWord) -> Result<String, CommandError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| CommandError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        debug!(%command, "sending four letter word");
        stream
            .write_all(command.as_bytes())
            .await
            .map_err(|source| CommandError::Write {
                addr: self.addr.clone(),
                source,
            })?;

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|source| CommandError::Read {
                    addr: self.addr.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            let text = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let text = text.strip_suffix(b"\r").unwrap_or(text);
            reply.push_str(&String::from_utf8_lossy(text));
            reply.push('\n');
        }

        Ok(reply)
    }
}
