// crates/gapool-core/src/lib.rs
//
// gapool-core: job types, the chain client trait, and the error taxonomy
// shared by the Gapool dispatch server.
//
// This is the leaf crate of the workspace. It knows nothing about sessions,
// sockets, or the node's wire format.

pub mod error;
pub mod job;
pub mod traits;

pub use error::GapoolError;
pub use job::{Fingerprint, JobTemplate, JobWork, SolutionPayload, SubmitVerdict};
pub use traits::ChainClient;
