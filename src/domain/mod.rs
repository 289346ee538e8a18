pub mod cube;
pub mod events;
pub mod models;
pub mod notation;
pub mod projection;
pub mod settings;
