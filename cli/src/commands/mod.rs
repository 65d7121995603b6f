//! Command implementations

pub mod config;
pub mod install;
pub mod repair;
pub mod status;
pub mod uninstall;
pub mod upgrade;
pub mod version;
