//! Time utilities

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in microseconds.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_enough() {
        let a = now();
        let b = now();
        assert!(b >= a);
        // Sometime after 2020 in microseconds.
        assert!(a > 1_577_836_800_000_000);
    }
}
