//! # sentflow-workflow
//!
//! Core workflow types for Sentient Flow. This crate provides the
//! fundamental data structures that mirror the graph-shaped workflow
//! payload: nodes, typed output ports, and the workflow container.

pub mod connection;
pub mod error;
pub mod node;
pub mod payload;

pub use connection::*;
pub use error::*;
pub use node::*;
pub use payload::*;
