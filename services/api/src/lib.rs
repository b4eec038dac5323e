//! services/api/src/lib.rs
//!
//! The Florescer backend: accounts, profiles, saved messages and the
//! message generation function, served over HTTP.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
