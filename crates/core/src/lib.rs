//! Domain vocabulary shared by the sync hub crates.
//!
//! Nothing in here performs I/O: it holds the error taxonomy, id and
//! timestamp aliases, sync item kinds, duplex frame names, device liveness
//! rules and the retry backoff policy.

pub mod backoff;
pub mod device;
pub mod error;
pub mod frames;
pub mod sync_item;
pub mod types;
