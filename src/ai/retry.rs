use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::text::truncate_chars;

const REASON_CHARS: usize = 50;

/// Longest provider-requested wait honoured before the next call.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// A provider delay in seconds, capped at [`MAX_RETRY_DELAY`]. Negative,
/// non-finite or unrepresentable values give `None`.
pub fn retry_delay_from_secs(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(secs)
            .map(|d| d.min(MAX_RETRY_DELAY))
            .unwrap_or(MAX_RETRY_DELAY),
    )
}

/// Outcome of one attempt, and of a whole retry run.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Success(T),
    Retryable {
        reason: String,
        /// Provider-requested delay before the next call.
        retry_after: Option<Duration>,
    },
    /// Retrying cannot help (rejected credentials).
    Fatal(String),
}

impl<T> Attempt<T> {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Attempt::Retryable {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Classifies a failed model call.
    pub fn from_error(err: &AppError) -> Self {
        let reason = err.to_string();
        if err.is_auth_failure() {
            return Attempt::Fatal(reason);
        }

        let header_hint = match err {
            AppError::ModelApi { retry_after, .. } => *retry_after,
            _ => None,
        };

        Attempt::Retryable {
            retry_after: header_hint.or_else(|| parse_retry_hint(&reason)),
            reason,
        }
    }
}

fn retry_ms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retry in\s+(\d+(?:\.\d+)?)\s*ms\b").expect("static regex"))
}

fn retry_secs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)retry in\s+(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b").expect("static regex")
    })
}

fn retry_delay_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)retry_?delay["']?\s*[:=]\s*["']?(\d+(?:\.\d+)?)s"#).expect("static regex")
    })
}

/// Extracts a rate-limit delay from a provider error message.
///
/// Understands `retry in 3s`, `retry in 250ms` and `retryDelay: "7s"`.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    let capture = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    if let Some(ms) = capture(retry_ms_re()) {
        return retry_delay_from_secs(ms / 1000.0);
    }
    capture(retry_secs_re())
        .or_else(|| capture(retry_delay_re()))
        .and_then(retry_delay_from_secs)
}

/// Minimum spacing between model calls.
///
/// The gate opens at a fixed interval after the previous call, or after the
/// provider's requested delay when the call was rate limited.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until the next call is allowed. The first call never waits.
    pub async fn wait(&self) {
        if let Some(at) = self.next_allowed {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Re-arms the gate after a call. Hints are capped at [`MAX_RETRY_DELAY`].
    pub fn arm(&mut self, hint: Option<Duration>) {
        let now = Instant::now();
        let delay = hint.map_or(self.interval, |h| h.min(MAX_RETRY_DELAY));
        self.next_allowed = now
            .checked_add(delay)
            .or_else(|| now.checked_add(self.interval))
            .or(Some(now));
    }
}

/// Bounded retries with pacing between every call. No exponential growth.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `op` until it succeeds, fails fatally or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number. After exhaustion the last
    /// retryable reason is returned, cut to 50 characters.
    pub async fn run<T, F, Fut>(&self, pacer: &mut Pacer, mut op: F) -> Attempt<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last_reason = String::new();
        let mut last_hint = None;

        for attempt in 1..=self.max_attempts.max(1) {
            pacer.wait().await;
            let outcome = op(attempt).await;

            match outcome {
                Attempt::Retryable {
                    reason,
                    retry_after,
                } => {
                    pacer.arm(retry_after);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}",
                        attempt,
                        self.max_attempts,
                        reason
                    );
                    last_reason = reason;
                    last_hint = retry_after;
                }
                done => {
                    pacer.arm(None);
                    return done;
                }
            }
        }

        Attempt::Retryable {
            reason: truncate_chars(&last_reason, REASON_CHARS).to_string(),
            retry_after: last_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, message: &str, retry_after: Option<Duration>) -> AppError {
        AppError::ModelApi {
            status,
            message: message.to_string(),
            retry_after,
        }
    }

    #[test]
    fn parses_retry_hints() {
        assert_eq!(
            parse_retry_hint("Rate limited. Please retry in 3s."),
            Some(Duration::from_secs(3))
        );
        assert_eq!(
            parse_retry_hint("please Retry in 250ms"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            parse_retry_hint(r#"{"retryDelay": "7s"}"#),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_hint("retry in 1.5 seconds"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_retry_hint("internal server error"), None);
    }

    #[test]
    fn auth_failures_are_fatal() {
        let attempt: Attempt<()> = Attempt::from_error(&api_error(401, "invalid x-api-key", None));
        assert!(matches!(attempt, Attempt::Fatal(_)));

        let attempt: Attempt<()> = Attempt::from_error(&api_error(403, "forbidden", None));
        assert!(matches!(attempt, Attempt::Fatal(_)));
    }

    #[test]
    fn header_hint_wins_over_message_hint() {
        let err = api_error(429, "retry in 9s", Some(Duration::from_secs(2)));
        let attempt: Attempt<()> = Attempt::from_error(&err);
        assert!(matches!(
            attempt,
            Attempt::Retryable { retry_after: Some(d), .. } if d == Duration::from_secs(2)
        ));

        let err = api_error(429, "retry in 9s", None);
        let attempt: Attempt<()> = Attempt::from_error(&err);
        assert!(matches!(
            attempt,
            Attempt::Retryable { retry_after: Some(d), .. } if d == Duration::from_secs(9)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_consecutive_calls() {
        let mut pacer = Pacer::new(Duration::from_millis(4500));
        let start = Instant::now();

        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        pacer.arm(None);

        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(4500));
        pacer.arm(Some(Duration::from_secs(10)));

        let before = Instant::now();
        pacer.wait().await;
        assert!(before.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_then_succeeds() {
        let policy = RetryPolicy::new(3);
        let mut pacer = Pacer::new(Duration::from_millis(10));

        let outcome = policy
            .run(&mut pacer, |attempt| async move {
                if attempt < 3 {
                    Attempt::retryable("overloaded")
                } else {
                    Attempt::Success(attempt)
                }
            })
            .await;

        assert_eq!(outcome, Attempt::Success(3));
    }

    #[tokio::test(start_paused = true)]
    async fn run_truncates_reason_after_exhaustion() {
        let policy = RetryPolicy::new(2);
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let mut calls = 0;

        let outcome: Attempt<()> = policy
            .run(&mut pacer, |_| {
                calls += 1;
                async { Attempt::retryable("x".repeat(120)) }
            })
            .await;

        assert_eq!(calls, 2);
        match outcome {
            Attempt::Retryable { reason, .. } => assert_eq!(reason.len(), 50),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_fatal() {
        let policy = RetryPolicy::new(5);
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let mut calls = 0;

        let outcome: Attempt<()> = policy
            .run(&mut pacer, |_| {
                calls += 1;
                async { Attempt::Fatal("invalid api key".into()) }
            })
            .await;

        assert_eq!(calls, 1);
        assert!(matches!(outcome, Attempt::Fatal(_)));
    }

    #[test]
    fn oversized_hints_are_capped() {
        assert_eq!(
            parse_retry_hint("Please retry in 99999999999999999999s."),
            Some(MAX_RETRY_DELAY)
        );
        assert_eq!(
            parse_retry_hint("retry in 99999999999999999999999ms"),
            Some(MAX_RETRY_DELAY)
        );
        assert_eq!(retry_delay_from_secs(1e30), Some(MAX_RETRY_DELAY));
        assert_eq!(retry_delay_from_secs(f64::INFINITY), None);
        assert_eq!(retry_delay_from_secs(-1.0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_hint_waits_at_most_the_cap() {
        let policy = RetryPolicy::new(2);
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let start = Instant::now();

        let outcome: Attempt<()> = policy
            .run(&mut pacer, |_| async {
                Attempt::Retryable {
                    reason: "rate limited".into(),
                    retry_after: Some(Duration::MAX),
                }
            })
            .await;

        assert!(matches!(outcome, Attempt::Retryable { .. }));
        assert!(start.elapsed() >= MAX_RETRY_DELAY);
        assert!(start.elapsed() < MAX_RETRY_DELAY + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_interval_does_not_panic() {
        let mut pacer = Pacer::new(Duration::MAX);
        pacer.arm(None);
        pacer.wait().await;
    }
}
