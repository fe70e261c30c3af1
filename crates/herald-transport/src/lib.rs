//! Transport implementations for Herald.
//!
//! Real network transports plug in by implementing
//! [`herald_core::Transport`]. This crate ships the in-process
//! [`MemoryTransport`], used to drive the dispatcher from tests and demos.

pub mod memory;

pub use memory::{MemoryHandle, MemoryTransport, SentMessage};
