pub mod allow_list;
pub mod demo;
pub mod filesystem;
pub mod memory;
pub mod postgres;

pub use allow_list::AllowListIdentity;
pub use filesystem::{FileSessionStore, FsAttachmentStore};
pub use memory::{MemoryAttachmentStore, MemoryRecordStore, MemorySessionStore};
pub use postgres::PgRecordStore;
