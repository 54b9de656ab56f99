//! Integration test suite for Commodore
//!
//! These tests reconcile real component checkouts against local upstream
//! repositories served over `file://`, so they need `git` but no network.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **checkout**: branch, tag and commit checkouts, idempotence, failures
//! - **remotes**: `origin` URL changes and push URLs
//! - **existing**: reopening checkouts already on disk
//! - **jsonnetfile**: rendering dependency manifests in synced components
//! - **batch**: syncing all components of a `commodore.toml`

#[path = "../common/mod.rs"]
mod common;

mod checkout;
mod existing;
mod jsonnetfile;
mod remotes;
