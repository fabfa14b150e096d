//! Per-request retry bookkeeping.

use conduit_common_config::RetryMode;
use conduit_common_http::{AttemptTimeout, FailureClass, TransportError};
use std::time::Duration;
use tokio::time::Instant;

use crate::backoff::compute_backoff;
use crate::settings::RetrySettings;

/// What a failed attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A response with a retryable status.
    Status(u16),
    /// A transport failure.
    Error { class: FailureClass, message: String },
}

impl From<&TransportError> for AttemptOutcome {
    fn from(error: &TransportError) -> Self {
        Self::Error {
            class: error.class(),
            message: error.to_string(),
        }
    }
}

impl AttemptOutcome {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Status(_) => FailureClass::RetryableStatus,
            Self::Error { class, .. } => *class,
        }
    }
}

/// One entry of the retry history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Time since the logical request started.
    pub elapsed: Duration,
}

/// Which per-attempt timeout is tightened by the absolute budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutClass {
    /// The previous attempt never reached the server.
    Connect,
    /// First attempt, or the previous attempt failed after sending.
    #[default]
    Response,
}

/// Mutable retry state owned by one logical request.
#[derive(Debug, Clone)]
pub struct RetryState {
    total: u32,
    connect: u32,
    read: u32,
    status: u32,
    backoff_factor: f64,
    backoff_max: Duration,
    mode: RetryMode,
    timeout_remaining: Option<Duration>,
    timeout_class: TimeoutClass,
    attempts: u32,
    history: Vec<RetryAttempt>,
    started: Instant,
}

impl RetryState {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            total: settings.total,
            connect: settings.connect,
            read: settings.read,
            status: settings.status,
            backoff_factor: settings.backoff_factor,
            backoff_max: settings.backoff_max,
            mode: settings.mode,
            timeout_remaining: settings.timeout,
            timeout_class: TimeoutClass::default(),
            attempts: 0,
            history: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Note that an attempt is about to be issued; returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt and charge it to the total and category
    /// budgets. Returns `false` when either budget was already spent.
    pub fn increment(&mut self, outcome: AttemptOutcome) -> bool {
        let category = match outcome.class() {
            FailureClass::Connection => &mut self.connect,
            FailureClass::Transport => &mut self.read,
            _ => &mut self.status,
        };
        let category_ok = take(category);
        let total_ok = take(&mut self.total);

        self.history.push(RetryAttempt {
            attempt: self.attempts,
            outcome,
            elapsed: self.started.elapsed(),
        });

        category_ok && total_ok
    }

    /// Number of failures recorded so far.
    pub fn retry_index(&self) -> u32 {
        self.history.len() as u32
    }

    /// Computed delay before the next attempt.
    pub fn backoff(&self) -> Duration {
        compute_backoff(
            self.backoff_factor,
            self.backoff_max,
            self.retry_index(),
            self.mode,
        )
    }

    /// Charge `elapsed` against the absolute budget. Returns `false` once an
    /// enforced budget is spent.
    pub fn consume_elapsed(&mut self, elapsed: Duration) -> bool {
        match self.timeout_remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(elapsed);
                !remaining.is_zero()
            }
            None => true,
        }
    }

    /// Whether an enforced absolute budget is spent.
    pub fn is_timeout_exhausted(&self) -> bool {
        self.timeout_remaining.is_some_and(|r| r.is_zero())
    }

    /// Remaining absolute budget, if one is enforced.
    pub fn timeout_remaining(&self) -> Option<Duration> {
        self.timeout_remaining
    }

    /// Clamp a sleep to the budget left once `spent` is charged. `None`
    /// when nothing is left to sleep in.
    pub fn clamp_delay(&self, delay: Duration, spent: Duration) -> Option<Duration> {
        match self.timeout_remaining {
            Some(remaining) => {
                let left = remaining.saturating_sub(spent);
                (!left.is_zero()).then(|| delay.min(left))
            }
            None => Some(delay),
        }
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        self.timeout_class
    }

    pub fn set_timeout_class(&mut self, class: TimeoutClass) {
        self.timeout_class = class;
    }

    /// Per-attempt timeouts, capped by the remaining absolute budget.
    ///
    /// The connect timeout is always capped. The read timeout is only capped
    /// while in the response class, so a request retried after a pre-send
    /// failure keeps its full read allowance.
    pub fn attempt_timeout(&self, connection: Duration, read: Duration) -> AttemptTimeout {
        let Some(remaining) = self.timeout_remaining else {
            return AttemptTimeout {
                connect: connection,
                read,
            };
        };

        AttemptTimeout {
            connect: connection.min(remaining),
            read: match self.timeout_class {
                TimeoutClass::Response => read.min(remaining),
                TimeoutClass::Connect => read,
            },
        }
    }

    /// Failed attempts, oldest first.
    pub fn history(&self) -> &[RetryAttempt] {
        &self.history
    }

    /// Remaining (total, connect, read, status) budgets.
    pub fn remaining(&self) -> (u32, u32, u32, u32) {
        (self.total, self.connect, self.read, self.status)
    }
}

fn take(counter: &mut u32) -> bool {
    match counter.checked_sub(1) {
        Some(left) => {
            *counter = left;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RetryOptions;

    fn state(options: RetryOptions) -> RetryState {
        RetryState::new(&RetrySettings::default().with_options(&options))
    }

    #[test]
    fn test_zero_total_allows_no_retry() {
        let mut state = state(RetryOptions::no_retries());
        state.begin_attempt();
        assert!(!state.increment(AttemptOutcome::Status(503)));
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_category_budget() {
        let mut state = state(RetryOptions::new().status(2));
        for _ in 0..2 {
            state.begin_attempt();
            assert!(state.increment(AttemptOutcome::Status(503)));
        }
        state.begin_attempt();
        assert!(!state.increment(AttemptOutcome::Status(503)));
        assert_eq!(state.remaining(), (7, 3, 3, 0));
    }

    #[test]
    fn test_total_takes_precedence() {
        let mut state = state(RetryOptions::new().total(1).connect(5));
        let refused = AttemptOutcome::from(&TransportError::connection("refused"));
        assert!(state.increment(refused.clone()));
        assert!(!state.increment(refused));
        assert_eq!(state.remaining().0, 0);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut state = state(RetryOptions::new().connect(1).read(1));
        assert!(state.increment(AttemptOutcome::from(&TransportError::connection("a"))));
        assert!(state.increment(AttemptOutcome::from(&TransportError::read("b"))));
        assert!(state.increment(AttemptOutcome::Status(503)));
        assert!(!state.increment(AttemptOutcome::from(&TransportError::read("c"))));
    }

    #[test]
    fn test_backoff_uses_history() {
        let mut state = state(RetryOptions::new());
        assert_eq!(state.backoff(), Duration::ZERO);

        state.begin_attempt();
        state.increment(AttemptOutcome::Status(503));
        assert_eq!(state.retry_index(), 1);
        assert!((state.backoff().as_secs_f64() - 0.8).abs() < 1e-6);

        state.begin_attempt();
        state.increment(AttemptOutcome::Status(503));
        assert!((state.backoff().as_secs_f64() - 1.6).abs() < 1e-6);
        assert_eq!(state.history()[1].attempt, 2);
    }

    #[test]
    fn test_no_budget_never_exhausts() {
        let mut state = state(RetryOptions::new());
        assert!(state.consume_elapsed(Duration::from_secs(1_000_000)));
        assert!(!state.is_timeout_exhausted());
        assert_eq!(
            state.clamp_delay(Duration::from_secs(60), Duration::from_secs(5)),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_budget_exhausts() {
        let mut state = state(RetryOptions::new().timeout(Duration::from_secs(1)));
        assert!(state.consume_elapsed(Duration::from_millis(600)));
        assert_eq!(state.timeout_remaining(), Some(Duration::from_millis(400)));
        assert_eq!(
            state.clamp_delay(Duration::from_secs(5), Duration::ZERO),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            state.clamp_delay(Duration::from_secs(5), Duration::from_millis(300)),
            Some(Duration::from_millis(100))
        );
        assert_eq!(state.clamp_delay(Duration::from_secs(5), Duration::from_millis(400)), None);
        assert!(!state.consume_elapsed(Duration::from_millis(600)));
        assert!(state.is_timeout_exhausted());
    }

    #[test]
    fn test_attempt_timeout_capped_by_budget() {
        let mut state = state(RetryOptions::new().timeout(Duration::from_secs(2)));
        let connection = Duration::from_secs(300);
        let read = Duration::from_secs(300);

        let timeout = state.attempt_timeout(connection, read);
        assert_eq!(timeout.connect, Duration::from_secs(2));
        assert_eq!(timeout.read, Duration::from_secs(2));

        state.set_timeout_class(TimeoutClass::Connect);
        let timeout = state.attempt_timeout(connection, read);
        assert_eq!(timeout.connect, Duration::from_secs(2));
        assert_eq!(timeout.read, read);

        let unbounded = RetryState::new(&RetrySettings::default());
        assert_eq!(
            unbounded.attempt_timeout(connection, read),
            AttemptTimeout {
                connect: connection,
                read
            }
        );
    }
}
