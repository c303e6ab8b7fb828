//! Mock servers for integration testing
//!
//! These simulate the server side of the CLI protocol over real TCP
//! sockets, so the client can be tested end to end without hardware.

pub mod lms;

pub use lms::MockLmsServer;
