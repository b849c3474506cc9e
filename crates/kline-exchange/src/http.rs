//! 재시도/타임아웃이 적용된 HTTP GET 클라이언트.

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::retry::{with_retry_if, RetryConfig};
use crate::{ExchangeError, ExchangeResult};

/// 일시적 실패(5xx, 연결 오류, 타임아웃)를 지수 백오프로 재시도하는 GET 클라이언트.
///
/// 공유 상태를 변경하지 않으므로 여러 워커가 `Arc`로 함께 사용할 수 있습니다.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    client: Client,
    retry: RetryConfig,
}

impl RetryingHttpClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(timeout: Duration, retry: RetryConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { client, retry })
    }

    /// 재시도 정책 반환.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// GET 요청 후 응답 본문을 반환합니다.
    ///
    /// 재시도 불가 상태(4xx 등)는 즉시 `HttpStatus`로, 재시도를 모두 소진하면
    /// `ExhaustedRetries`로 반환됩니다. `cancel`이 취소되면 진행 중인 요청을 버리고
    /// `Cancelled`를 반환합니다.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> ExchangeResult<String> {
        let (body, stats) = with_retry_if(
            &self.retry,
            cancel,
            |attempt| async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
                    result = self.get_once(url, params, attempt) => result,
                }
            },
            |err| self.retry.is_retryable(err),
        )
        .await?;

        debug!(
            url,
            attempts = stats.attempts,
            total_delay_ms = stats.total_delay.as_millis() as u64,
            bytes = body.len(),
            "GET 완료"
        );
        Ok(body)
    }

    async fn get_once(
        &self,
        url: &str,
        params: &[(&str, String)],
        attempt: u32,
    ) -> ExchangeResult<String> {
        debug!(url, attempt, "GET");

        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ExchangeError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}
