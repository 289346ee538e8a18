//! Giiker smart cube client
//!
//! Decodes the cube's status frames into a queryable state, tracks moves,
//! and renders the state as a per-piece color listing or as the
//! 54-character face string used by cube solvers. The Bluetooth stack
//! itself is supplied by the host through the
//! [`Transport`](infrastructure::bluetooth::transport::Transport) trait.

pub mod domain;
pub mod infrastructure;

pub use domain::events::{EventBus, Handler, Publisher, Subscriber};
pub use domain::models::{
    BatteryReading, ChargingState, Color, CubeEvent, EventKind, Face, Move, RawState,
    SessionState, Turn,
};
pub use infrastructure::bluetooth::{Activity, DeviceSession, SessionError};
