//! Domain types for a staking position.
//!
//! This module provides:
//! - The fixed-layout position record and its decoder
//! - Deterministic locator derivation and Anchor discriminators
//! - Lossless decimal amounts for the human-facing side
//! - The display snapshot rebuilt on every tick

pub mod decimal;
pub mod display;
pub mod locator;
pub mod position;

pub use decimal::Decimal;
pub use display::DisplayState;
pub use locator::{derive, Locator};
pub use position::{DecodeError, Position, RECORD_LEN};
