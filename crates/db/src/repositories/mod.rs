//! Per-table SQL repositories used by [`PgStore`](crate::pg::PgStore).
//!
//! Every query is parameterized and every user-owned lookup is compound on
//! `(id, user_id)`.

pub mod device_repo;
pub mod file_repo;
pub mod sync_item_repo;

pub use device_repo::DeviceRepo;
pub use file_repo::FileRepo;
pub use sync_item_repo::SyncItemRepo;
