//! State synchronization engine.
//!
//! Stage 1 reads each tree into a [`Snapshot`](crate::fs::Snapshot), stage 2
//! classifies the difference, stage 3 applies it to the remote side. The
//! manifest caches the remote snapshot between runs.

pub mod compare;
pub mod filter;
pub mod manifest;
pub mod pool;
pub mod reader;
pub mod resolver;

pub use compare::{compare, Action, DiffResult};
pub use filter::{Filter, IgnoreFilter};
pub use manifest::{load_manifest, save_manifest, Manifest, ManifestHashReader, ManifestLister};
pub use pool::{run_workers, DEFAULT_WORKERS};
pub use reader::read_tree;
pub use resolver::{resolve_diff, Resolver};
