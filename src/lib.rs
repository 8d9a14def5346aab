//! mpsync library
//!
//! One-way directory-tree synchronization between a local filesystem and a
//! MicroPython device reachable over a serial raw-REPL command channel.

pub mod channel;
pub mod diff;
pub mod error;
pub mod filter;
pub mod logger;
pub mod sync;
pub mod tree;
pub mod walk;
pub mod wire;
