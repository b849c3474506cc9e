//! 캔들 데이터 소스 추상화.

use async_trait::async_trait;
use kline_core::{Candle, FetchWindow};
use tokio_util::sync::CancellationToken;

use crate::ExchangeResult;

/// 한 윈도우 단위로 캔들을 가져오는 데이터 소스.
///
/// 구현체는 윈도우 안의 캔들을 `open_time` 오름차순으로 반환해야 하며,
/// `limit`개를 넘기지 않아야 합니다. `cancel`이 취소되면 새 요청을 보내지 않고
/// [`crate::ExchangeError::Cancelled`]를 반환합니다.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// 로그용 소스 이름.
    fn name(&self) -> &str;

    /// 윈도우 `[start, end]`의 캔들을 조회합니다.
    async fn fetch_window(
        &self,
        window: &FetchWindow,
        limit: u32,
        cancel: &CancellationToken,
    ) -> ExchangeResult<Vec<Candle>>;
}
