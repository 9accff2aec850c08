//! Core types and trait definitions for the Portaria gatehouse register.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! console and HTTP shells drive a [`PresenceEngine`]; storage backends
//! implement [`RegistrationStore`](store::RegistrationStore).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod engine;
pub mod error;
pub mod identity;
pub mod record;
pub mod store;

pub use engine::PresenceEngine;
pub use error::{Error, Result};
pub use identity::{IdentityNumber, validate};
