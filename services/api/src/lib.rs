//! services/api/src/lib.rs
//!
//! Library crate for the API service. The binaries in `src/bin` and the
//! integration tests build the application out of these modules.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
