//! Reward point accrual between ledger settlements.
//!
//! Integer arithmetic only, truncating at the division, so results agree with
//! the program's own settlement.

/// Lamports per whole SOL.
pub const UNITS_PER_WHOLE: u64 = 1_000_000_000;

/// Multiplier applied to raw accrual before it is comparable to `total_points`.
pub const POINTS_SCALE: u64 = 1_000_000;

/// Display points worth one whole SOL.
pub const POINTS_PER_WHOLE: u64 = 1_000;

/// Points earned by `staked_principal` lamports between `last_updated_time`
/// and `now` (both Unix seconds).
///
/// `now` earlier than `last_updated_time` counts as zero elapsed time.
/// Saturates at `u64::MAX`.
pub fn accrued(staked_principal: u64, last_updated_time: u64, now: i64) -> u64 {
    let elapsed = elapsed_seconds(last_updated_time, now);
    if staked_principal == 0 || elapsed == 0 {
        return 0;
    }

    let raw_units = staked_principal as u128 * elapsed as u128 / UNITS_PER_WHOLE as u128;
    let points = raw_units.saturating_mul(POINTS_SCALE as u128);
    u64::try_from(points).unwrap_or(u64::MAX)
}

/// `max(0, now - last_updated_time)`.
pub fn elapsed_seconds(last_updated_time: u64, now: i64) -> u64 {
    let elapsed = now as i128 - last_updated_time as i128;
    if elapsed <= 0 {
        0
    } else {
        u64::try_from(elapsed).unwrap_or(u64::MAX)
    }
}

/// Raw points converted to display points (truncated).
pub fn to_display_points(raw_points: u64) -> u64 {
    raw_points / POINTS_SCALE
}
