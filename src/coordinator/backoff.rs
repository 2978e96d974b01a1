use std::time::Duration;

/// Exponential backoff: `base * 2^attempt`. No jitter, no cap.
pub fn backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
}
