//! 지수 백오프 재시도.
//!
//! 시도 횟수와 대기 시간은 [`RetryConfig`]로 제한됩니다.
//! n번째 재시도 전 대기 시간은 `backoff_factor * 2^(n-1)`입니다 (1, 2, 4, 8, ...).
//! 취소 토큰은 매 시도 전과 백오프 대기 중에 확인합니다.
//!
//! ```rust,ignore
//! let (body, stats) = with_retry(&RetryConfig::default(), &cancel, |attempt| async move {
//!     client.get_once(url).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use kline_core::RetrySettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ExchangeError;

/// 재시도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 요청 포함)
    pub max_attempts: u32,
    /// 백오프 기본 단위
    pub backoff_factor: Duration,
    /// 재시도 대상 HTTP 상태 코드
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: Duration::from_secs(1),
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// 설정 파일의 `[retry]` 섹션에서 생성합니다.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let mut retry_statuses = settings.retry_statuses.clone();
        retry_statuses.extend(settings.extra_retry_statuses.iter().copied());
        retry_statuses.sort_unstable();
        retry_statuses.dedup();

        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_factor: Duration::from_millis(settings.backoff_factor_ms),
            retry_statuses,
        }
    }

    /// 백오프 단위를 변경합니다.
    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// 최대 시도 횟수를 변경합니다.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// `retry_number`번째 재시도(1부터) 전 대기 시간.
    pub fn backoff_delay(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(1u32 << exponent)
    }

    /// 이 상태 코드를 재시도해야 하는지 확인.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// 에러가 이 정책에서 재시도 대상인지 판정합니다.
    pub fn is_retryable(&self, err: &ExchangeError) -> bool {
        match err {
            ExchangeError::HttpStatus { status, .. } => self.should_retry_status(*status),
            other => other.is_retryable(),
        }
    }
}

/// 재시도 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// 실제 시도 횟수
    pub attempts: u32,
    /// 백오프로 대기한 총 시간
    pub total_delay: Duration,
}

/// `ExchangeError::is_retryable` 기준으로 재시도합니다.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    op: F,
) -> Result<(T, RetryStats), ExchangeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    with_retry_if(config, cancel, op, ExchangeError::is_retryable).await
}

/// 주어진 판정 함수로 재시도 여부를 결정합니다.
///
/// 재시도 불가 에러는 즉시 그대로 반환하고, 시도 횟수를 모두 쓰면
/// [`ExchangeError::ExhaustedRetries`]를 반환합니다. 취소되면 다음 요청을 보내지 않고
/// [`ExchangeError::Cancelled`]를 반환합니다.
pub async fn with_retry_if<T, F, Fut, P>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
    retryable: P,
) -> Result<(T, RetryStats), ExchangeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
    P: Fn(&ExchangeError) -> bool,
{
    let mut stats = RetryStats::default();
    let max_attempts = config.max_attempts.max(1);

    loop {
        if cancel.is_cancelled() {
            debug!(attempts = stats.attempts, "취소됨, 요청 중단");
            return Err(ExchangeError::Cancelled);
        }

        stats.attempts += 1;
        let attempt = stats.attempts;

        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, total_delay = ?stats.total_delay, "재시도 후 성공");
                }
                return Ok((value, stats));
            }
            Err(err) if !retryable(&err) => return Err(err),
            Err(err) if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %err, "재시도 횟수 소진");
                return Err(ExchangeError::ExhaustedRetries {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            Err(err) => {
                let delay = config.backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "일시적 오류, 백오프 후 재시도"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(attempts = attempt, "백오프 중 취소됨");
                        return Err(ExchangeError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                stats.total_delay += delay;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig::default().with_backoff_factor(Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_from_settings_merges_extra_statuses() {
        let settings = RetrySettings {
            max_attempts: 3,
            backoff_factor_ms: 250,
            retry_statuses: vec![500, 502, 503, 504],
            extra_retry_statuses: vec![429, 503],
        };
        let config = RetryConfig::from_settings(&settings);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_factor, Duration::from_millis(250));
        assert_eq!(config.retry_statuses, vec![429, 500, 502, 503, 504]);
        assert!(config.is_retryable(&ExchangeError::HttpStatus {
            status: 429,
            body: String::new()
        }));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let (value, stats) = with_retry(&fast_config(), &CancellationToken::new(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExchangeError::NetworkError("connection reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.total_delay, Duration::from_millis(3));
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), RetryStats), _> = with_retry(&fast_config(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExchangeError::Timeout("stalled".into())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(ExchangeError::ExhaustedRetries { attempts: 5, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<((), RetryStats), _> = with_retry(&fast_config(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ExchangeError::HttpStatus {
                    status: 400,
                    body: "bad symbol".into(),
                })
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(ExchangeError::HttpStatus { status: 400, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt_sends_nothing() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<((), RetryStats), _> = with_retry(&fast_config(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retries() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        // 백오프 1시간: 취소되지 않으면 테스트가 끝나지 않음
        let config = RetryConfig::default().with_backoff_factor(Duration::from_secs(3600));

        let result: Result<((), RetryStats), _> = with_retry(&config, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async { Err(ExchangeError::HttpStatus { status: 503, body: String::new() }) }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
