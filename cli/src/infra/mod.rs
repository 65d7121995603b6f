//! Infrastructure layer - concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the artifact store, the
//! entry-point symlink, the workspace, the install lock, release sources and
//! signal handling.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod artifact_store;
pub mod config;
pub mod fs;
pub mod interrupt;
pub mod lock;
pub mod source;
pub mod symlink;
pub mod workspace;
