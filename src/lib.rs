//! Repoatlas - Git repository inventory and churn analytics
//!
//! Scans a folder of Git repositories and produces one persisted JSON
//! report per named analysis set: line counts per file, commit recency
//! and contributors, co-change coupling pairs, and a staleness check
//! against each repository's remote.

pub mod analysis;
pub mod cli;
pub mod counter;
pub mod discovery;
pub mod error;
pub mod git;
pub mod models;
pub mod process;
pub mod storage;
pub mod tree;
