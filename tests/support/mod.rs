//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fake_portal;
pub mod fixtures;
pub mod socket_guard;
