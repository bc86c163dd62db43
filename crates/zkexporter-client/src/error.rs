//! Error types for four-letter-word exchanges.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors that can end a four-letter-word exchange.
///
/// Any of these means the reply must be discarded; partial data is never
/// returned to the caller.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("error sending command to {addr}: {source}")]
    Write {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("error reading reply from {addr}: {source}")]
    Read {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("exchange with {addr} exceeded {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
}
