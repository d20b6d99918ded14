//! Project lifecycle for ethbaas
//!
//! [`ProjectManager`] ties together manifest generation, the resource applier
//! and a [`ProjectStore`] so a project's files, record and cluster objects
//! move through init, start, stop and delete together.

#![deny(missing_docs)]

pub mod manager;
pub mod store;

pub use manager::{BatchOperation, BatchReport, DeleteMode, ProjectList, ProjectManager};
pub use store::{ProjectStore, SqliteProjectStore};
