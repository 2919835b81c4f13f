//! The join-pattern matching engine.
//!
//! Public surface is the builder API ([`Pattern`], [`Plan`]), the [`join`]
//! entry point, and the resulting [`JoinSource`]. Internal modules:
//! - [`notification`]: the buffered value/completed sentinel;
//! - [`observer`]: per-source FIFO buffer and plan registration;
//! - [`active`]: the live per-run form of a plan;
//! - [`core`]: the single-lock state machine (registry, matching, terminal
//!   delivery);
//! - [`manager`]: activation, the downstream subscription, `join()` itself.

mod active;
mod core;
mod manager;
mod notification;
mod observer;
mod pattern;

pub use manager::{join, JoinSource};
pub use pattern::{Pattern, Plan};
