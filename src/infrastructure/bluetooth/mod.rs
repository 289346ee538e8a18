//! Bluetooth Module
//!
//! Talks to the Giiker cube through a platform GATT transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     DeviceSession                       │
//! │  (Main coordinator - public API for the application)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌────────────┐  ┌────────────┐  ┌────────────┐
//! │ Transport  │  │ Connection │  │  Protocol  │
//! │            │  │            │  │            │
//! │ - connect  │  │ - GATT     │  │ - UUIDs    │
//! │ - notify   │  │   lookup   │  │ - Commands │
//! │ - write    │  │ - baseline │  │ - Decoding │
//! └────────────┘  └────────────┘  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Cube protocol definitions, commands, and frame decoding
//! - [`transport`] - Contract the platform BLE stack has to fulfil
//! - [`connection`] - Service discovery and the baseline state read
//! - [`session`] - Main session coordinator
//! - [`replay`] - In-memory transport replaying recorded traffic

pub mod connection;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod transport;

// Re-export main session for convenience
pub use session::{Activity, DeviceSession, SessionError};
