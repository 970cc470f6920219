//! Fixed-width day bucketing for the daily rollups

/// Width of one rollup bucket in seconds
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Truncate a Unix timestamp (seconds) to the start of its UTC day
///
/// Pure integer arithmetic: no calendar or timezone handling.
pub fn day_bucket(timestamp: u64) -> u64 {
    (timestamp / SECONDS_PER_DAY) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_day_boundaries() {
        assert_eq!(day_bucket(0), 0);
        assert_eq!(day_bucket(500), 0);
        assert_eq!(day_bucket(86_399), 0);
        assert_eq!(day_bucket(86_400), 86_400);
    }

    #[test]
    fn test_realistic_timestamp() {
        // 2023-11-14T22:13:20Z -> 2023-11-14T00:00:00Z
        assert_eq!(day_bucket(1_700_000_000), 1_699_920_000);
        assert_eq!(day_bucket(1_699_920_000), 1_699_920_000);
    }
}
