//! 캔들 가격/거래량을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 거래량 타입 (기준 자산 단위).
pub type Quantity = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 퍼센트 문자열로 변환합니다 (예: 0.9525 → "95.25%").
    fn to_percentage_string(&self) -> String;
}

impl DecimalExt for Decimal {
    fn to_percentage_string(&self) -> String {
        let pct = (*self * Decimal::from(100))
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        format!("{:.2}%", pct)
    }
}

/// 원시 문자열을 Decimal로 변환합니다.
///
/// 거래소는 가격을 문자열("42000.01000000")로, 일부 프록시는 숫자로 내려주므로
/// 두 형식 모두 허용합니다. 숫자가 아니면 `None`.
pub fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    trimmed
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok())
}
