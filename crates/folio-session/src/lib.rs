//! Folio Edit/Publish Engine
//!
//! An optimistic client-side layer over a document store: it tracks
//! unsaved edits across many interrelated documents, stages new
//! documents under virtual (negative) ids, and publishes everything in
//! one batched pass that swaps the virtual ids for store-assigned real
//! ids wherever other documents reference them.
//!
//! # Core Concepts
//!
//! - [`EditSession`]: the tracker; loads documents, layers sparse
//!   patches over base content, mints virtual ids for new drafts
//! - [`EditSession::publish_all`]: the batched protocol of at most one
//!   batch-create, one local reference rewrite, one batch-save
//! - [`PublishPhase`]: the fixed sequence a publish moves through
//! - [`EventSink`]: observer seam for UI and analytics notifications
//! - [`harness`]: an end-to-end scenario runner over the in-memory
//!   store, also driving the `folio demo` subcommand
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_document::FileId;
//! use folio_session::EditSession;
//! use folio_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let session = EditSession::new(store);
//!
//! let id = session.load(FileId::from_raw(1)).await?;
//! session.edit(id, serde_json::json!({ "description": "updated" }))?;
//! let receipt = session.publish_all().await?;
//! assert_eq!(receipt.saved, vec![id]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod events;
mod phase;
mod publish;
mod record;
mod session;

pub mod harness;

pub use config::SessionConfig;
pub use error::{EditError, PublishError, SessionError, SessionResult};
pub use events::{EventEnvelope, EventSink, NullSink, RecordingSink, SessionEvent, TracingSink};
pub use phase::{
    allowed_transitions, validate_transition, IllegalTransition, PhaseMachine, PublishPhase,
};
pub use publish::PublishReceipt;
pub use record::{DocumentRecord, PatchMap};
pub use session::{EditSession, LoadState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
