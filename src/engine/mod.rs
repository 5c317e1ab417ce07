//! # Engine Module
//!
//! Storage engine implementation.
//!
//! This module contains the building blocks of the store:
//! - Identifiers, type sets and archetype keys
//! - Schema and component traits
//! - Chunked column storage and archetypes
//! - Packed id lists and component indexes
//! - Event recording and filtering
//! - Query enumeration and parallel execution
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod config;
pub mod component;
pub mod storage;
pub mod entity;
pub mod archetype;
pub mod ids;
pub mod range;
pub mod index;
pub mod events;
pub mod pool;
pub mod query;
pub mod parallel;
pub mod store;
