// crates/gapool-rpc/src/lib.rs
//
// gapool-rpc: the dispatch engine of the Gapool mining server.
//
// Line-delimited JSON-RPC sessions over TCP, the shared job cache, the
// broadcaster that pushes new jobs to every connected miner, and the
// background poll loop that keeps the cache in step with the chain node.

pub mod broadcast;
pub mod cache;
pub mod framing;
pub mod handlers;
pub mod outbox;
pub mod poll;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shared;

#[cfg(test)]
mod testutil;

// Re-export the main types for ergonomic access.
pub use broadcast::{Broadcaster, SessionId};
pub use cache::JobCache;
pub use outbox::Outbox;
pub use poll::{poll_once, run_poll_loop, DEFAULT_POLL_INTERVAL};
pub use server::{DispatchServer, ServerConfig};
pub use shared::{DispatchState, DEFAULT_UPSTREAM_TIMEOUT};
