//! Periodic expired-session sweep.
//!
//! Only the leader proposes `CleanupExpired` — followers would just be
//! rejected with `NOT_LEADER`, which is harmless but noisy in the logs,
//! so they skip the attempt entirely.

use std::time::Duration;

use crate::facade::Service;

/// Run the sweep loop until `shutdown` resolves. `interval` should be
/// `min(5, lowest configured session timeout) / 3`, floored at one
/// second.
pub async fn run(service: Service, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                tracing::info!("expiration sweep task shutting down");
                break;
            }
        }

        if !service.is_leader() {
            continue;
        }
        if !service.has_expired_sessions() {
            continue;
        }

        match service.cleanup_expired().await {
            Ok(count) if count > 0 => {
                tracing::info!(count, "periodic sweep cleaned up expired sessions");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "periodic sweep's cleanup proposal failed");
            }
        }
    }
}

/// Compute the sweep interval so it stays ≤ min(timeout)/3 for every
/// legal session timeout: since `timeout` is bounded below by 5,
/// `min(requested, 5) / 3` is always a valid bound regardless of which
/// sessions are currently live, floored at one second.
pub fn interval_for(requested_min_timeout_secs: u32) -> Duration {
    let secs = (requested_min_timeout_secs.min(5) / 3).max(1);
    Duration::from_secs(secs as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_floored_at_one_second() {
        assert_eq!(interval_for(5), Duration::from_secs(1));
        assert_eq!(interval_for(3600), Duration::from_secs(1));
    }
}
