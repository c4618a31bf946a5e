//! Git abstraction layer for rebranch.
//!
//! This crate defines the [`GitRepo`] trait, the single interface through
//! which the rebranch engine interacts with git. The engine never imports gix
//! (or shells out to `git`) directly; it programs against the trait so the
//! workflow can be driven by a test double.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`],
//!   [`BranchName`], [`CommitInfo`], etc.).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;

// gix-backed implementation modules
mod gix_repo;
mod refs_impl;
mod objects_impl;
mod status_impl;
mod cli_impl;

pub use gix_repo::GixRepo;

// Re-export the main trait and commonly used types at the crate root for
// ergonomic imports: `use rebranch_git::{GitRepo, GitOid, GitError};`
pub use error::GitError;
pub use repo::GitRepo;
pub use types::{
    BranchName, BranchNameError, CherryPickOutcome, CommitInfo, GitOid, InProgressOperation,
    OidParseError, RefName, RefNameError,
};
