//! Dispatch Engine Library
//!
//! Order aggregation and quantity allocation for a multi-stage bulk
//! commodity dispatch workflow. Flat pending-order records are normalized,
//! grouped per customer and base order, and approved through an
//! [`services::AllocationSession`] that enforces per-category budgets with
//! cross-category borrowing before lines are submitted to a
//! [`services::DispatchSink`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;

pub use errors::ServiceError;
