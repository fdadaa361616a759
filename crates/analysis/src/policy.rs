//! Poll/retry policy for analysis runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a job run waits for the backend.
///
/// The timeout is not wall-clock based: a run times out after `max_attempts`
/// polls spaced `poll_interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPollPolicy")]
pub struct PollPolicy {
    /// Total number of polls before the run times out (minimum 1)
    pub max_attempts: u32,
    /// Delay before every poll
    pub poll_interval: Duration,
    /// Delay before the job is submitted (models "start analysis" latency)
    pub submission_delay: Duration,
}

/// Unchecked wire form of [`PollPolicy`].
#[derive(Deserialize)]
struct RawPollPolicy {
    max_attempts: u32,
    poll_interval: Duration,
    submission_delay: Duration,
}

impl TryFrom<RawPollPolicy> for PollPolicy {
    type Error = String;

    fn try_from(raw: RawPollPolicy) -> Result<Self, Self::Error> {
        if raw.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(Self {
            max_attempts: raw.max_attempts,
            poll_interval: raw.poll_interval,
            submission_delay: raw.submission_delay,
        })
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval: Duration::from_secs(1),
            submission_delay: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    /// Create a policy with a fixed spacing and no submission delay.
    pub fn fixed(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            poll_interval,
            submission_delay: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Clamp fields set directly through the public struct back into range.
    pub fn normalized(self) -> Self {
        self.with_max_attempts(self.max_attempts)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_submission_delay(mut self, submission_delay: Duration) -> Self {
        self.submission_delay = submission_delay;
        self
    }

    /// Whether another poll may follow the (0-indexed) `attempt` that just came back incomplete.
    pub fn allows_attempt_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }

    /// Upper bound on time spent waiting before a run settles.
    pub fn budget(&self) -> Duration {
        self.submission_delay + self.poll_interval * self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_placeholder_protocol() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn allows_attempt_after_respects_max_attempts() {
        let policy = PollPolicy::default().with_max_attempts(3);

        assert!(policy.allows_attempt_after(0));
        assert!(policy.allows_attempt_after(1));
        assert!(!policy.allows_attempt_after(2));
        assert!(!policy.allows_attempt_after(u32::MAX));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = PollPolicy::fixed(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.allows_attempt_after(0));
    }

    #[test]
    fn deserialization_rejects_zero_attempts() {
        let zero = concat!(
            r#"{"max_attempts":0,"poll_interval":{"secs":1,"nanos":0},"#,
            r#""submission_delay":{"secs":0,"nanos":0}}"#
        );
        let err = serde_json::from_str::<PollPolicy>(zero).unwrap_err();
        assert!(err.to_string().contains("max_attempts must be at least 1"));

        let two = zero.replace("\"max_attempts\":0", "\"max_attempts\":2");
        let policy: PollPolicy = serde_json::from_str(&two).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn normalized_clamps_struct_literal_policies() {
        let policy = PollPolicy {
            max_attempts: 0,
            ..PollPolicy::default()
        };
        assert_eq!(policy.normalized().max_attempts, 1);
        assert_eq!(PollPolicy::default().normalized(), PollPolicy::default());
    }

    #[test]
    fn budget_covers_every_poll() {
        let policy = PollPolicy::default();
        assert_eq!(policy.budget(), Duration::from_secs(6));
    }
}
