//! zkexporter-client — ZooKeeper four-letter-word client.
//!
//! ZooKeeper answers a small set of administrative commands ("four
//! letter words") on its client port. The protocol has no framing: the
//! client writes exactly four ASCII bytes and the server writes its reply
//! and closes the socket.
//!
//! # Architecture
//!
//! ```text
//! CommandClient::send(FourLetterWord)
//!   ├── TcpStream::connect(addr)
//!   ├── write 4 bytes
//!   ├── read lines until EOF
//!   └── socket dropped on every exit path
//! ```
//!
//! The whole exchange is bounded by a single deadline. No connection is
//! ever reused, so concurrent callers never interleave replies.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{CommandClient, DEFAULT_TIMEOUT, FourLetterWord};
pub use error::CommandError;
