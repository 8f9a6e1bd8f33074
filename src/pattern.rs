//! 패턴 매칭 모듈
//!
//! glob 패턴 집합을 사용한 파일 이름 필터링을 담당합니다.

use glob::{MatchOptions, Pattern};

use crate::error::{GridCsvError, Result};

/// 기본 NetCDF 파일 패턴
pub const DEFAULT_PATTERNS: &[&str] = &["*.nc", "*.netcdf", "*.NC"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// 컴파일된 패턴 집합
///
/// 파일 이름이 집합 내 패턴 중 하나라도 일치하면 매칭됩니다.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// 새 패턴 집합 생성
    ///
    /// # Arguments
    /// * `patterns` - 글로브 패턴 문자열 목록 (비어 있으면 기본 NetCDF 패턴 사용)
    ///
    /// # Examples
    /// ```
    /// use gridcsv::pattern::PatternSet;
    ///
    /// let set = PatternSet::new(&["*.nc", "*.grib2"]).unwrap();
    /// assert!(set.matches("ocean.nc"));
    /// assert!(set.matches("gfs.grib2"));
    /// assert!(!set.matches("notes.txt"));
    /// ```
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let sources: Vec<&str> = if patterns.is_empty() {
            DEFAULT_PATTERNS.to_vec()
        } else {
            patterns.iter().map(|p| p.as_ref()).collect()
        };

        let compiled = sources
            .into_iter()
            .map(|p| {
                Pattern::new(p).map_err(|_| GridCsvError::InvalidPattern {
                    pattern: p.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns: compiled })
    }

    /// 쉼표로 구분된 패턴 문자열에서 생성 (예: "*.nc, *.NC")
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(&crate::cli::split_list(list))
    }

    /// 파일 이름이 패턴 중 하나와 일치하는지 확인
    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(file_name, MATCH_OPTIONS))
    }

    /// 원본 패턴 문자열 목록
    pub fn as_strings(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }
}

impl std::fmt::Display for PatternSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_strings().join(", "))
    }
}
