pub mod error;
pub mod models;
pub mod record;

mod memory;
pub use memory::{MemoryStore, MemoryTx};

pub use error::{StoreError, StoreResult};
pub use models::{clamped_add, NewTip, NewUser, Tip, UnknownVoteKind, User, VoteKind};
pub use record::{RecordStore, Transaction};
