//! Squeeze Control - client for the Squeezebox / Lyrion Media Server CLI
//!
//! The server speaks a line-oriented text protocol on TCP port 9090. This
//! library keeps one connection open and turns the stream of command echoes
//! and notifications into a player model that observers can follow.
//!
//! This library provides:
//! - Token codec and five-tier line router for the CLI wire format
//! - Login and capability handshake
//! - Player state reconciliation with per-player status subscriptions
//! - Observer registries safe to change while deliveries run
//! - Paged list queries (albums, songs, plugin items, ..)
//! - An async client handle driving a single serial worker

pub mod callbacks;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod service;
pub mod transport;

pub use error::{ClientError, ClientResult};
pub use service::{ClientBuilder, Engine, EngineOptions, SqueezeClient};
