//! Core domain types
//!
//! These types describe work as the worker sees it, independent of the wire
//! format used to fetch and report it.

pub mod inference;
pub mod job;
