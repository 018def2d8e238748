//! Core types and trait definitions for the skirmish battle-log engine.
//!
//! This crate is deliberately free of IO and database dependencies. Every
//! other crate depends on it.

pub mod battle;
pub mod error;
pub mod ranking;
pub mod roster;
pub mod store;

pub use error::{Error, Result};
