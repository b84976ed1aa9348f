/*!
 * Failure classification and retry backoff.
 *
 * Every failed batch attempt is classified into a category that decides
 * whether the attempt may be retried and how long to wait before doing so.
 * Rate limits back off twice as aggressively and honor a server-supplied
 * Retry-After hint; malformed responses retry on a short fixed-growth delay
 * since waiting longer does not make the model better behaved.
 */

use rand::Rng;
use std::time::Duration;

use crate::errors::{ProviderError, TranslationError};

/// Category of a failed translation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// HTTP 429
    RateLimit,
    /// HTTP 408/409/425
    TransientHttp,
    /// HTTP 5xx
    ServerError,
    /// Any other 4xx
    ClientError,
    /// Request deadline exceeded
    Timeout,
    /// Transport-level failure
    Network,
    /// Unparseable or misaligned model reply
    ResponseShape,
    /// Everything else
    Unknown,
}

impl RetryCategory {
    /// Classify a translation failure.
    pub fn classify(error: &TranslationError) -> Self {
        match error {
            TranslationError::Provider(provider_error) => Self::classify_provider(provider_error),
            TranslationError::CountMismatch { .. } | TranslationError::ParseFailure(_) => {
                Self::ResponseShape
            }
            _ => Self::Unknown,
        }
    }

    fn classify_provider(error: &ProviderError) -> Self {
        match error {
            ProviderError::Api { status_code, .. } => match *status_code {
                429 => Self::RateLimit,
                408 | 409 | 425 => Self::TransientHttp,
                500..=599 => Self::ServerError,
                400..=499 => Self::ClientError,
                _ => Self::Unknown,
            },
            ProviderError::Timeout { .. } => Self::Timeout,
            ProviderError::RequestFailed(message) => {
                let lowered = message.to_lowercase();
                if lowered.contains("timeout") || lowered.contains("timed out") {
                    Self::Timeout
                } else {
                    Self::Network
                }
            }
            ProviderError::EmptyResponse | ProviderError::ParseError(_) => Self::ResponseShape,
        }
    }

    /// Whether another attempt is allowed for this category.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::ClientError)
    }

    /// Stable name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::TransientHttp => "transient_http",
            Self::ServerError => "server_error",
            Self::ClientError => "client_error",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::ResponseShape => "response_shape",
            Self::Unknown => "unknown",
        }
    }
}

/// A server-supplied Retry-After hint, if the failure carried one.
pub fn retry_after_hint(error: &TranslationError) -> Option<u64> {
    match error {
        TranslationError::Provider(ProviderError::Api { retry_after_ms, .. }) => *retry_after_ms,
        _ => None,
    }
}

/// Exponential backoff policy with jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Delay ceiling in milliseconds
    pub max_delay_ms: u64,
}

impl BackoffPolicy {
    /// Floor for response-shape retries.
    const SHAPE_FLOOR_MS: u64 = 100;
    /// Base for response-shape retries; independent of the configured base.
    const SHAPE_BASE_MS: u64 = 200;

    /// Compute the delay before the next attempt.
    ///
    /// `attempt` counts completed attempts, starting at 1. A Retry-After
    /// hint, when present, wins over the rate-limit formula.
    pub fn delay_for(
        &self,
        category: RetryCategory,
        attempt: u32,
        retry_after_ms: Option<u64>,
    ) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let jitter: u64 = rand::rng().random_range(0..=100);

        let millis = match category {
            RetryCategory::RateLimit => match retry_after_ms {
                Some(hint) => hint.min(self.max_delay_ms),
                None => ((2 * self.base_delay_ms) << exponent)
                    .saturating_add(jitter)
                    .min(self.max_delay_ms),
            },
            RetryCategory::ResponseShape => (Self::SHAPE_BASE_MS << exponent)
                .saturating_add(jitter)
                .max(Self::SHAPE_FLOOR_MS)
                .min(self.max_delay_ms),
            _ => (self.base_delay_ms << exponent)
                .saturating_add(jitter)
                .min(self.max_delay_ms),
        };

        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status_code: u16) -> TranslationError {
        TranslationError::Provider(ProviderError::Api {
            status_code,
            message: "test".to_string(),
            retry_after_ms: None,
        })
    }

    #[test]
    fn test_classify_rateLimit_shouldBeRetryable() {
        let category = RetryCategory::classify(&api_error(429));
        assert_eq!(category, RetryCategory::RateLimit);
        assert!(category.is_retryable());
    }

    #[test]
    fn test_classify_clientError_shouldNotBeRetryable() {
        let category = RetryCategory::classify(&api_error(404));
        assert_eq!(category, RetryCategory::ClientError);
        assert!(!category.is_retryable());
    }

    #[test]
    fn test_classify_transientStatuses_shouldMapCorrectly() {
        assert_eq!(RetryCategory::classify(&api_error(408)), RetryCategory::TransientHttp);
        assert_eq!(RetryCategory::classify(&api_error(409)), RetryCategory::TransientHttp);
        assert_eq!(RetryCategory::classify(&api_error(425)), RetryCategory::TransientHttp);
        assert_eq!(RetryCategory::classify(&api_error(500)), RetryCategory::ServerError);
        assert_eq!(RetryCategory::classify(&api_error(503)), RetryCategory::ServerError);
    }

    #[test]
    fn test_classify_timeoutAndNetwork_shouldMapFromTransportErrors() {
        let timeout = TranslationError::Provider(ProviderError::Timeout { timeout_ms: 1000 });
        assert_eq!(RetryCategory::classify(&timeout), RetryCategory::Timeout);

        let timeout_text = TranslationError::Provider(ProviderError::RequestFailed(
            "operation timed out".to_string(),
        ));
        assert_eq!(RetryCategory::classify(&timeout_text), RetryCategory::Timeout);

        let network = TranslationError::Provider(ProviderError::RequestFailed(
            "connection refused".to_string(),
        ));
        assert_eq!(RetryCategory::classify(&network), RetryCategory::Network);
    }

    #[test]
    fn test_classify_shapeErrors_shouldMapToResponseShape() {
        let mismatch = TranslationError::CountMismatch {
            expected: 3,
            actual: 2,
            missing_ids: vec![7],
        };
        assert_eq!(RetryCategory::classify(&mismatch), RetryCategory::ResponseShape);

        let parse = TranslationError::ParseFailure("bad json".to_string());
        assert_eq!(RetryCategory::classify(&parse), RetryCategory::ResponseShape);
    }

    #[test]
    fn test_delayFor_exponential_shouldGrowAndCap() {
        let policy = BackoffPolicy {
            base_delay_ms: 500,
            max_delay_ms: 8000,
        };
        let first = policy.delay_for(RetryCategory::ServerError, 1, None);
        let second = policy.delay_for(RetryCategory::ServerError, 2, None);
        assert!(first.as_millis() >= 500 && first.as_millis() <= 600);
        assert!(second.as_millis() >= 1000 && second.as_millis() <= 1100);

        let capped = policy.delay_for(RetryCategory::ServerError, 10, None);
        assert_eq!(capped.as_millis(), 8000);
    }

    #[test]
    fn test_delayFor_rateLimit_shouldDoubleBaseAndHonorHint() {
        let policy = BackoffPolicy {
            base_delay_ms: 500,
            max_delay_ms: 8000,
        };
        let first = policy.delay_for(RetryCategory::RateLimit, 1, None);
        assert!(first.as_millis() >= 1000 && first.as_millis() <= 1100);

        let hinted = policy.delay_for(RetryCategory::RateLimit, 1, Some(2500));
        assert_eq!(hinted.as_millis(), 2500);
    }

    #[test]
    fn test_delayFor_responseShape_shouldUseShortDelays() {
        let policy = BackoffPolicy {
            base_delay_ms: 500,
            max_delay_ms: 8000,
        };
        let first = policy.delay_for(RetryCategory::ResponseShape, 1, None);
        assert!(first.as_millis() >= 100 && first.as_millis() <= 300);
        let second = policy.delay_for(RetryCategory::ResponseShape, 2, None);
        assert!(second.as_millis() >= 400 && second.as_millis() <= 500);
    }
}
