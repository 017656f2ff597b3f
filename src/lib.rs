//! repocache - local cache of Maven-style artifacts
//!
//! Populates a durable cache from remote repositories and rebuilds
//! standalone repositories from it without network access.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod repository;
pub mod ui;

pub use error::{RepoCacheError, RepoCacheResult};
