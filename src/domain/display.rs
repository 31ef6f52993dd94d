//! Values handed to the presentation layer.

use crate::domain::Decimal;
use serde::Serialize;

/// Snapshot of what the user should currently see.
///
/// Rebuilt from the held position on every tick; never cached across ticks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DisplayState {
    pub has_position: bool,
    /// Staked principal in whole SOL.
    pub staked_amount: Decimal,
    /// Claimable points in display units.
    pub claimable_points: u64,
    /// Claimable points before the display scale is applied.
    pub claimable_points_raw: u64,
    /// Whole-SOL equivalent of `claimable_points`.
    pub points_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_time: Option<u64>,
    pub is_synchronizing: bool,
    pub is_mutating: bool,
}
