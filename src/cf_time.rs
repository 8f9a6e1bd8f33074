//! CF 규약 시간 좌표 해석
//!
//! `"hours since 1970-01-01 00:00:00"` 형태의 units 속성을 해석하여
//! 숫자 좌표를 날짜/시간 문자열로 바꿉니다. 달력은 표준(그레고리력)만 지원합니다.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// 출력 날짜/시간 형식
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 해석된 시간 단위
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    /// 단위 하나당 밀리초
    step_millis: f64,
    epoch: NaiveDateTime,
}

impl TimeUnits {
    /// units 문자열 해석 (시간 좌표가 아니면 None)
    pub fn parse(units: &str) -> Option<Self> {
        let (unit, epoch) = units.trim().split_once(" since ")?;
        let step_millis = match unit.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => 86_400_000.0,
            "hours" | "hour" | "hr" | "hrs" | "h" => 3_600_000.0,
            "minutes" | "minute" | "min" | "mins" => 60_000.0,
            "seconds" | "second" | "sec" | "secs" | "s" => 1_000.0,
            "milliseconds" | "millisecond" | "msec" | "ms" => 1.0,
            _ => return None,
        };

        Some(Self {
            step_millis,
            epoch: parse_epoch(epoch.trim())?,
        })
    }

    /// 숫자 좌표 값을 시각으로 변환
    pub fn decode(&self, value: f64) -> Option<NaiveDateTime> {
        if !value.is_finite() {
            return None;
        }
        let millis = (value * self.step_millis).round();
        if millis.abs() > i64::MAX as f64 {
            return None;
        }
        self.epoch
            .checked_add_signed(Duration::try_milliseconds(millis as i64)?)
    }

    /// 숫자 좌표 값을 [`DATETIME_FORMAT`] 문자열로 변환
    pub fn format(&self, value: f64) -> Option<String> {
        self.decode(value)
            .map(|t| t.format(DATETIME_FORMAT).to_string())
    }
}

fn parse_epoch(text: &str) -> Option<NaiveDateTime> {
    // "1970-01-01T00:00:00Z", "1970-01-01 00:00:00 UTC", "1970-1-1"
    let cleaned = text
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .replace('T', " ");
    let cleaned = cleaned.trim();

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(t);
        }
    }

    // 날짜 뒤에 붙은 시간대 오프셋 등은 무시하고 날짜만 사용
    let date_part = cleaned.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_since() {
        let units = TimeUnits::parse("hours since 2025-04-28 00:00:00").unwrap();
        assert_eq!(units.format(3.0).unwrap(), "2025-04-28 03:00:00");
        assert_eq!(units.format(25.5).unwrap(), "2025-04-29 01:30:00");
    }

    #[test]
    fn test_days_since_date_only() {
        let units = TimeUnits::parse("days since 1970-01-01").unwrap();
        assert_eq!(units.format(1.0).unwrap(), "1970-01-02 00:00:00");
        assert_eq!(units.format(-1.0).unwrap(), "1969-12-31 00:00:00");
    }

    #[test]
    fn test_iso_epoch() {
        let units = TimeUnits::parse("seconds since 2000-01-01T12:00:00Z").unwrap();
        assert_eq!(units.format(90.0).unwrap(), "2000-01-01 12:01:30");
    }

    #[test]
    fn test_non_time_units() {
        assert!(TimeUnits::parse("degrees_north").is_none());
        assert!(TimeUnits::parse("furlongs since 2000-01-01").is_none());
        assert!(TimeUnits::parse("days since yesterday").is_none());
    }

    #[test]
    fn test_non_finite_value() {
        let units = TimeUnits::parse("days since 1970-01-01").unwrap();
        assert!(units.format(f64::NAN).is_none());
    }
}
