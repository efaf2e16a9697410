//! In-process middleware backend for the node core.
//!
//! This crate provides:
//! - An in-process domain implementing the middleware boundary
//!   (name registry with last-registrant-wins, endpoints, call journal)
//! - Failure injection for every middleware operation
//! - A counting allocator backend with Nth-allocation failure
//! - Test logging setup

pub mod allocator;
pub mod domain;
pub mod logging;

pub use allocator::CountingAllocator;
pub use domain::{Call, InProcNode, InProcessDomain, Operation};
