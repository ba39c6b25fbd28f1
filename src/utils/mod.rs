//! 시간 관련 유틸리티
//!
//! 드라이버 대기 시간 변환 함수 제공

pub mod logging;

use std::time::Duration;

/// 초 단위 실수를 대기 시간으로 변환 (음수/NaN 은 0, 표현 범위를 넘으면 `Duration::MAX`)
pub fn secs_to_duration(secs: f64) -> Duration {
  if secs.is_nan() || secs <= 0.0 {
    return Duration::ZERO;
  }
  Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_secs_to_duration() {
    assert_eq!(secs_to_duration(30.0), Duration::from_secs(30));
    assert_eq!(secs_to_duration(0.5), Duration::from_millis(500));
    assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
    assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
  }

  #[test]
  fn test_secs_to_duration_saturates() {
    assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
    assert_eq!(secs_to_duration(6.0e19 * 60.0), Duration::MAX);
  }
}
