//! memories-core library.
//!
//! Storage, board CRUD, and the badge-award engine for the memories board.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at library seams (`StoreError`,
//!   `BadgeError`, `BoardError`); `anyhow::Result` for config and glue.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod badge;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod password;
