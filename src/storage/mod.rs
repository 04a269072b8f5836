//! # Storage Module
//!
//! Durable session history.
//!
//! This module handles:
//! - Reading and writing the serialized history blob through a backend
//! - Recovering from a corrupt blob by starting over with an empty history
//! - Keeping the in-memory history and the persisted blob in step

pub mod backend;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, SessionBackend};
pub use store::SessionStore;
