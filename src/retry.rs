//! Retry policy for remote rejections
//!
//! Remote sites sometimes answer automated traffic with a "confirm you're not a bot"
//! challenge. Those failures are worth retrying after a growing, randomized pause and
//! with a different browser identity; every other engine failure is final.
//!
//! The policy is a pure decision function. It never sleeps and never calls the engine;
//! the job task acts on the returned [`RetryDecision`].
//!
//! # Example
//!
//! ```no_run
//! use media_dl::config::RetryConfig;
//! use media_dl::error::Error;
//! use media_dl::retry::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let params = policy.initial_params();
//! let error = Error::Engine("Sign in to confirm you're not a bot".into());
//!
//! match policy.decide(error, 1, &params) {
//!     RetryDecision::RetryAfter { delay, params, .. } => {
//!         println!("retry in {delay:?} as {}", params.user_agent);
//!     }
//!     RetryDecision::Abort(e) => println!("giving up: {e}"),
//! }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Request shape handed to the engine for one attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Browser identity presented to the remote site
    pub user_agent: String,
    /// Minimum pause the engine inserts between requests
    pub sleep_interval: Duration,
    /// Maximum pause the engine inserts between requests
    pub max_sleep_interval: Duration,
}

/// Decides whether an engine error message is a transient anti-automation rejection
pub trait ErrorClassifier: Send + Sync {
    /// Returns true if the message indicates a bot challenge worth retrying
    fn is_bot_rejection(&self, message: &str) -> bool;
}

/// Classifier matching case-insensitive substrings of the error text
#[derive(Clone, Debug)]
pub struct SignatureClassifier {
    signatures: Vec<String>,
}

impl SignatureClassifier {
    /// Build a classifier from a list of signatures
    pub fn new<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl ErrorClassifier for SignatureClassifier {
    fn is_bot_rejection(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.signatures.iter().any(|sig| message.contains(sig))
    }
}

/// Outcome of consulting the policy after a failed attempt
#[derive(Debug)]
pub enum RetryDecision {
    /// Stop retrying and fail the job with this error
    Abort(Error),
    /// Wait `delay`, then run the next attempt with `params`
    RetryAfter {
        /// Pause before the next attempt
        delay: Duration,
        /// Mutated request shape for the next attempt
        params: RequestParams,
        /// Error text that triggered the retry
        reason: String,
    },
}

/// Centralized retry policy
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Policy using a [`SignatureClassifier`] built from `config.transient_signatures`
    pub fn new(config: RetryConfig) -> Self {
        let classifier = SignatureClassifier::new(&config.transient_signatures);
        Self::with_classifier(config, Arc::new(classifier))
    }

    /// Policy with a custom classifier
    pub fn with_classifier(config: RetryConfig, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Maximum number of attempts per job, including the first
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Request shape for the first attempt
    pub fn initial_params(&self) -> RequestParams {
        RequestParams {
            user_agent: self.config.user_agents.first().cloned().unwrap_or_default(),
            sleep_interval: self.config.min_sleep_interval,
            max_sleep_interval: self.config.max_sleep_interval,
        }
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed with `error`
    pub fn decide(&self, error: Error, attempt: u32, current: &RequestParams) -> RetryDecision {
        self.decide_with_rng(error, attempt, current, &mut rand::thread_rng())
    }

    /// [`decide`](Self::decide) with an explicit random source
    pub fn decide_with_rng<R: Rng + ?Sized>(
        &self,
        error: Error,
        attempt: u32,
        current: &RequestParams,
        rng: &mut R,
    ) -> RetryDecision {
        let message = match error {
            Error::Engine(message) => message,
            other => return RetryDecision::Abort(other),
        };

        if !self.classifier.is_bot_rejection(&message) {
            return RetryDecision::Abort(Error::FatalRemoteError(message));
        }

        if attempt >= self.config.max_attempts {
            return RetryDecision::Abort(Error::TransientRemoteRejection {
                message,
                attempts: attempt,
            });
        }

        RetryDecision::RetryAfter {
            delay: self.backoff(attempt, rng),
            params: self.mutate(current, rng),
            reason: message,
        }
    }

    fn backoff<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let unit = random_between(self.config.backoff_min, self.config.backoff_max, rng);
        unit.saturating_mul(attempt.max(1))
    }

    fn mutate<R: Rng + ?Sized>(&self, current: &RequestParams, rng: &mut R) -> RequestParams {
        let candidates: Vec<&String> = self
            .config
            .user_agents
            .iter()
            .filter(|ua| **ua != current.user_agent)
            .collect();
        let user_agent = candidates
            .choose(rng)
            .map(|ua| (*ua).clone())
            .unwrap_or_else(|| current.user_agent.clone());

        let sleep_interval = random_between(
            self.config.min_sleep_interval,
            self.config.max_sleep_interval,
            rng,
        );
        let max_sleep_interval =
            random_between(sleep_interval, self.config.max_sleep_interval, rng);

        RequestParams {
            user_agent,
            sleep_interval,
            max_sleep_interval,
        }
    }
}

// Uniform duration in [low, high] at millisecond resolution
fn random_between<R: Rng + ?Sized>(low: Duration, high: Duration, rng: &mut R) -> Duration {
    let low_ms = low.as_millis() as u64;
    let high_ms = high.as_millis() as u64;
    if high_ms <= low_ms {
        return low;
    }
    Duration::from_millis(rng.gen_range(low_ms..=high_ms))
}
