//! Jittered waits shared by retry backoff and inter-iteration delays.

use std::time::Duration;

use rand::Rng;

use crate::core::backoff::jittered;

/// Jitter amplitude and the global floor every wait is clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub min_delay: Duration,
    /// Offsets are drawn uniformly from `[-jitter, +jitter]`.
    pub jitter: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(400),
            jitter: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    /// `base` plus a random offset, never below `min_delay`.
    pub fn jittered(&self, base: Duration) -> Duration {
        let amplitude = self.jitter.as_secs_f64();
        let offset = if amplitude > 0.0 {
            rand::thread_rng().gen_range(-amplitude..=amplitude)
        } else {
            0.0
        };
        jittered(base, offset, self.min_delay)
    }

    /// Clamp a per-profile delay to the global floor.
    pub fn clamp_delay(&self, delay: Duration) -> Duration {
        delay.max(self.min_delay)
    }

    /// Cooperatively sleep for one jittered interval.
    pub async fn wait(&self, base: Duration) {
        let wait = self.jittered(base);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_amplitude() {
        let pacing = Pacing {
            min_delay: Duration::from_millis(100),
            jitter: Duration::from_millis(200),
        };
        for _ in 0..200 {
            let wait = pacing.jittered(Duration::from_secs(1));
            assert!(wait >= Duration::from_millis(799), "{wait:?}");
            assert!(wait <= Duration::from_millis(1201), "{wait:?}");
        }
    }

    #[test]
    fn zero_jitter_is_exact_above_floor() {
        let pacing = Pacing {
            min_delay: Duration::from_millis(400),
            jitter: Duration::ZERO,
        };
        assert_eq!(pacing.jittered(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(pacing.jittered(Duration::from_millis(10)), Duration::from_millis(400));
    }

    #[test]
    fn clamp_delay_applies_floor() {
        let pacing = Pacing::default();
        assert_eq!(pacing.clamp_delay(Duration::from_millis(50)), Duration::from_millis(400));
        assert_eq!(pacing.clamp_delay(Duration::from_secs(3)), Duration::from_secs(3));
    }
}
