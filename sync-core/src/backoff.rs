//! Retry delays for failed long-polls.

use std::time::Duration;

/// Exponent cap; `base * 2^16` already exceeds any sensible `max`.
const MAX_EXPONENT: u32 = 16;

/// Calculate the retry delay for the `attempt`-th consecutive failure (1-based).
///
/// Formula: `min(max, base * 2^(attempt - 1)) + random(0..=delay / 10)`
///
/// Jitter spreads retries out when many clients lose the server at once.
/// Attempt `0` is treated as attempt `1`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    let delay = base.saturating_mul(1u32 << exponent).min(max);

    let jitter_cap = u64::try_from(delay.as_millis() / 10).unwrap_or(u64::MAX);
    delay.saturating_add(Duration::from_millis(random_below(jitter_cap.saturating_add(1))))
}

/// Random value in `0..bound`. Falls back to zero if the OS RNG is unavailable.
fn random_below(bound: u64) -> u64 {
    if bound <= 1 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes) % bound,
        Err(e) => {
            tracing::debug!("no randomness for backoff jitter: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(10);
    const MAX: Duration = Duration::from_secs(300);

    fn within(delay: Duration, expected: Duration) -> bool {
        delay >= expected && delay <= expected + expected / 10
    }

    #[test]
    fn first_attempt_waits_base() {
        let delay = calculate_backoff(1, BASE, MAX);
        assert!(within(delay, BASE), "got {:?}", delay);
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        assert!(within(calculate_backoff(0, BASE, MAX), BASE));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        assert!(within(calculate_backoff(2, BASE, MAX), Duration::from_secs(20)));
        assert!(within(calculate_backoff(3, BASE, MAX), Duration::from_secs(40)));
        assert!(within(calculate_backoff(4, BASE, MAX), Duration::from_secs(80)));
    }

    #[test]
    fn delay_capped_at_max_plus_jitter() {
        for attempt in [6, 10, 50, u32::MAX] {
            let delay = calculate_backoff(attempt, BASE, MAX);
            assert!(within(delay, MAX), "attempt {} gave {:?}", attempt, delay);
        }
    }

    #[test]
    fn zero_base_means_no_delay() {
        assert_eq!(calculate_backoff(3, Duration::ZERO, MAX), Duration::ZERO);
    }

    #[test]
    fn huge_durations_saturate() {
        let huge = Duration::from_secs(u64::MAX);
        let delay = calculate_backoff(1, huge, huge);
        assert!(delay >= huge);

        let delay = calculate_backoff(u32::MAX, huge, Duration::MAX);
        assert!(delay >= huge);
    }

    #[test]
    fn jitter_creates_variance() {
        let delays: Vec<Duration> = (0..20).map(|_| calculate_backoff(1, BASE, MAX)).collect();
        let min = delays.iter().min().unwrap();
        let max = delays.iter().max().unwrap();

        // 0..=1000ms of jitter over 20 samples
        assert!(max > min, "expected jitter variance, got {:?}", delays);
    }
}
