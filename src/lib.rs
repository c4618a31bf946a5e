//! rebranch library crate.
//!
//! Moves the commits unique to the current branch onto a new base, one
//! cherry-pick at a time, with a persisted record so a conflict can be
//! resolved across invocations and the whole operation can be rolled back
//! until `--done`. The `rebranch` binary lives in `crates/rebranch-cli`; this
//! crate holds the engine so it can be tested against in-memory doubles.

pub mod config;
pub mod editor;
pub mod error;
pub mod lock;
pub mod preflight;
pub mod range;
pub mod record;
pub mod selection;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workflow;

pub use config::Config;
pub use editor::{Editor, SystemEditor};
pub use error::RebranchError;
pub use lock::CommandLock;
pub use record::{FileStore, OperationRecord, RecordStore, Stage};
pub use workflow::Rebranch;
