//! core::metadata
//!
//! Branch metadata schema and storage.
//!
//! # Modules
//!
//! - [`schema`] - `.pancake/stacks.json` schema (v1)
//! - [`store`] - Atomic file-backed storage, with notes mirroring
//!
//! # Architecture
//!
//! Metadata lives in one file, `.pancake/stacks.json`, replaced atomically
//! on every write (temp file + fsync + rename). `parent`/`anchor` for each
//! branch are additionally mirrored into `refs/notes/pancake`, giving the
//! Reconciler a recovery path if the metadata file is lost but the
//! repository's refs and notes survive.
//!
//! # Schema Design
//!
//! - Self-describing: every file carries a `version` field
//! - Forward compatible: unknown per-branch fields round-trip unchanged
//!   rather than being rejected

pub mod schema;
pub mod store;

pub use schema::{
    parse_stacks_file, BranchEntry, FreezeScope, FreezeState, MetadataError, PrBinding, PrStatus,
    StacksFile, SCHEMA_VERSION,
};
pub use store::{MetadataStore, StoreError, STACKS_FILENAME};
