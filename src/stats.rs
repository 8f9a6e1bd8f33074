//! 통계 및 요약 출력 모듈
//!
//! 배치별 처리 통계 수집, 요약 출력, 보고서 CSV 작성을 담당합니다.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{GridCsvError, Result};

/// 직접 지정된 파일 묶음의 라벨
pub const SPECIFIC_FILES: &str = "Specific Files";

/// 배치 하나(폴더 또는 지정 파일 묶음)의 통계
///
/// `total`은 기록된 결과 수로만 늘어나므로 `successful + failed == total`이 항상 성립합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    /// 폴더 경로 또는 [`SPECIFIC_FILES`]
    pub label: String,
    total: usize,
    successful: usize,
    failed: usize,
    /// 처리 시간
    pub elapsed: Duration,
}

impl BatchStats {
    /// 빈 통계 생성
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// 파일 하나의 결과 기록
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// 성공률 (%) - 파일이 없으면 None
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.successful as f64 / self.total as f64 * 100.0)
        }
    }

    /// 다른 통계를 합산
    pub fn merge(&mut self, other: &BatchStats) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
    }

    /// 배치 요약 출력
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(50).bright_blue());
        println!(
            "{}",
            format!(" 📊 변환 요약: {}", self.label).bright_white().bold()
        );
        println!("{}", "═".repeat(50).bright_blue());
        self.print_counts();
        println!("{}", "═".repeat(50).bright_blue());
    }

    fn print_counts(&self) {
        println!("  {} 전체 파일:    {}", "📁".bright_cyan(), self.total);
        println!(
            "  {} 성공:         {}",
            "✅".bright_green(),
            self.successful.to_string().green()
        );

        if self.failed > 0 {
            println!(
                "  {} 실패:         {}",
                "❌".bright_red(),
                self.failed.to_string().red()
            );
        } else {
            println!("  {} 실패:         {}", "✅".bright_green(), "0".green());
        }

        if let Some(rate) = self.success_rate() {
            println!("  {} 성공률:       {:.1}%", "📈".bright_white(), rate);
        }

        println!(
            "  {} 처리 시간:    {}",
            "⏱️".bright_cyan(),
            format_duration(self.elapsed)
        );
    }
}

/// 보고서 CSV 한 행
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    directory: &'a str,
    total: usize,
    successful: usize,
    failed: usize,
    time: f64,
    success_rate: Option<f64>,
}

/// 전체 실행 결과
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 폴더별 + 지정 파일 묶음 통계 (처리 순서)
    pub rows: Vec<BatchStats>,
    /// 처리한 폴더 수
    pub directories: usize,
    /// 직접 지정된 파일 수
    pub specific_files: usize,
    /// 누락되어 건너뛴 경로 수
    pub skipped_paths: usize,
    /// 전체 처리 시간
    pub elapsed: Duration,
}

impl BatchReport {
    /// 모든 행의 합계
    pub fn overall(&self) -> BatchStats {
        let mut total = BatchStats::new("Overall");
        for row in &self.rows {
            total.merge(row);
        }
        total.elapsed = self.elapsed;
        total
    }

    /// 전체 요약 출력
    pub fn print_summary(&self) {
        let overall = self.overall();

        println!("\n{}", "═".repeat(60).bright_blue());
        println!("{}", " 🧾 전체 변환 요약".bright_white().bold());
        println!("{}", "═".repeat(60).bright_blue());

        if self.directories > 0 {
            println!("  {} 처리한 폴더:  {}", "📂".bright_cyan(), self.directories);
        }
        if self.specific_files > 0 {
            println!(
                "  {} 지정 파일:    {}",
                "📄".bright_cyan(),
                self.specific_files
            );
        }
        if self.skipped_paths > 0 {
            println!(
                "  {} 건너뛴 경로:  {}",
                "⚠️".bright_yellow(),
                self.skipped_paths.to_string().yellow()
            );
        }
        overall.print_counts();

        if !self.rows.is_empty() {
            println!("{}", "─".repeat(60).bright_blue());
            println!(
                "  {:<36} {:>5} {:>5} {:>5} {:>6}",
                "directory", "total", "ok", "fail", "rate"
            );
            for row in &self.rows {
                let rate = row
                    .success_rate()
                    .map(|r| format!("{:.1}%", r))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<36} {:>5} {:>5} {:>5} {:>6}",
                    truncate_left(&row.label, 36),
                    row.total,
                    row.successful,
                    row.failed,
                    rate
                );
            }
        }

        println!("{}", "═".repeat(60).bright_blue());
    }

    /// 통계 표를 CSV로 저장
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let to_error = |reason: String| GridCsvError::WriteError {
            file: path.to_path_buf(),
            reason,
        };

        let mut writer = csv::Writer::from_path(path).map_err(|e| to_error(e.to_string()))?;
        for row in &self.rows {
            writer
                .serialize(ReportRow {
                    directory: &row.label,
                    total: row.total,
                    successful: row.successful,
                    failed: row.failed,
                    time: row.elapsed.as_secs_f64(),
                    success_rate: row.success_rate(),
                })
                .map_err(|e| to_error(e.to_string()))?;
        }
        writer.flush().map_err(|e| to_error(e.to_string()))?;
        Ok(())
    }
}

/// 긴 경로는 앞부분을 잘라 끝부분만 표시
fn truncate_left(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        text.to_string()
    } else {
        let tail: String = text.chars().skip(count - (width - 1)).collect();
        format!("…{}", tail)
    }
}

/// 경과 시간을 읽기 쉬운 형식으로 변환
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}시간 {}분", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}분 {}초", mins, remaining_secs)
    } else if secs > 0 {
        format!("{}.{:03}초", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000초");
        assert_eq!(format_duration(Duration::from_secs(65)), "1분 5초");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1시간 1분");
    }

    #[test]
    fn test_record_keeps_totals_consistent() {
        let mut stats = BatchStats::new("/data/ncin1");
        stats.record(true);
        stats.record(false);
        stats.record(true);

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.successful(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.successful() + stats.failed(), stats.total());
    }

    #[test]
    fn test_success_rate_undefined_when_empty() {
        let stats = BatchStats::new("empty");
        assert_eq!(stats.success_rate(), None);

        let mut half = BatchStats::new("half");
        half.record(true);
        half.record(false);
        assert_eq!(half.success_rate(), Some(50.0));
    }

    #[test]
    fn test_overall_sums_rows() {
        let mut a = BatchStats::new("a");
        a.record(true);
        let mut b = BatchStats::new(SPECIFIC_FILES);
        b.record(false);
        b.record(true);

        let report = BatchReport {
            rows: vec![a, b],
            directories: 1,
            specific_files: 2,
            ..Default::default()
        };

        let overall = report.overall();
        assert_eq!(overall.total(), 3);
        assert_eq!(overall.successful(), 2);
        assert_eq!(overall.failed(), 1);
    }

    #[test]
    fn test_truncate_left() {
        assert_eq!(truncate_left("short", 10), "short");
        assert_eq!(truncate_left("/very/long/path", 6), "…/path");
    }

    #[test]
    fn test_report_csv() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("report.csv");

        let mut row = BatchStats::new("/data/ncin1");
        row.record(true);
        let report = BatchReport {
            rows: vec![row, BatchStats::new("/data/empty")],
            ..Default::default()
        };
        report.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "directory,total,successful,failed,time,success_rate"
        );
        assert!(lines[1].starts_with("/data/ncin1,1,1,0,"));
        assert!(lines[1].ends_with(",100.0"));
        assert!(lines[2].starts_with("/data/empty,0,0,0,"));
        assert!(lines[2].ends_with(','));
    }
}
