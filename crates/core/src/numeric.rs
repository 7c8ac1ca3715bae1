//! Rounding and percentage helpers shared by reports and aggregates.
//!
//! Halves round towards positive infinity (`-50.5 -> -50`, `2.5 -> 3`), which
//! is how the dashboards have always displayed growth figures.

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Round `value` to `decimals` fractional digits.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    round_half_up(value * factor) / factor
}

/// Month-over-month growth as a whole percentage.
///
/// With no previous value the growth is `100` if anything happened this
/// period and `0` otherwise.
pub fn percentage_change(current: f64, previous: f64) -> i64 {
    if previous == 0.0 {
        return if current > 0.0 { 100 } else { 0 };
    }
    round_half_up((current - previous) / previous * 100.0) as i64
}

/// `part` as a whole percentage of `whole`; `0` when `whole` is zero.
pub fn percent_of(part: f64, whole: f64) -> i64 {
    if whole == 0.0 {
        return 0;
    }
    round_half_up(part / whole * 100.0) as i64
}
