//! Data models for the FTLL launcher core.
//!
//! - [`ServerRecord`]: a known game server, keyed by its query address
//! - [`ModEntry`]: a Workshop mod a server requires
//! - [`LatencyClass`]: presentation bucket for a measured ping
//! - [`LauncherConfig`]: settings loaded from `FTLL Settings.yaml`
//!
//! The ping sentinels [`PING_UNMEASURED`] and [`PING_OFFLINE`] live here so
//! every component agrees on them.

pub mod config;
pub mod server;

pub use config::{LauncherConfig, LauncherSettings};
pub use server::{LatencyClass, ModEntry, PING_OFFLINE, PING_UNMEASURED, ServerRecord};
