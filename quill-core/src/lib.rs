//! Quill Core
//!
//! Core types shared by the Quill worker and its job client.
//!
//! This crate contains:
//! - Domain types: jobs, job results and the inference output format
//! - DTOs: protobuf messages exchanged with the job server

pub mod domain;
pub mod dto;
