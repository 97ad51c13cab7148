//! # skillet-cli
//!
//! Command-line interface for skillet.
//!
//! ## Commands
//!
//! - `skillet install`: install everything `skills.toml` declares
//! - `skillet update`: re-resolve skills past their lock pins
//! - `skillet sync`: detect and repair drift
//! - `skillet remove`: drop one skill
//! - `skillet list`: show declared and locked skills
//! - `skillet config`: show, validate or edit `skillet.toml`

pub mod commands;
mod output;

pub use commands::Cli;
