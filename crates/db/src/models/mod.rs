pub mod device;
pub mod file;
pub mod sync_item;
