//! Shared formats and tables for the retrolaunch core host.
//!
//! Nothing in this crate touches a running core. It holds the pieces that both
//! the orchestration layer and the launcher binary agree on:
//!
//! - [`ini`] - the flat `key = "value"` configuration format cores read
//! - [`keys`] - keyboard codes for configured input bindings
//! - [`cores`] - display names of known cores
//! - [`layout`] - the fixed virtual filesystem layout

pub mod cores;
pub mod ini;
pub mod keys;
pub mod layout;

pub use cores::core_full_name;
pub use ini::{ConfigMap, ConfigValue};
