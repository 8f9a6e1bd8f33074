//! 단일 파일 변환 모듈
//!
//! 소스 파일 하나를 열어 필드별 CSV와 통합 CSV를 씁니다.
//! 어떤 실패도 호출자에게 전파하지 않고 [`FileOutcome`]으로 돌려줍니다.

use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::backend::NETCDF;
use crate::dataset::{BackendRegistry, Field};
use crate::error::{GridCsvError, Result};
use crate::table::{field_rows, write_csv, CombinedLayout};

/// 통합 CSV 파일 이름 접미사
pub const COMBINED_SUFFIX: &str = "all_variables";

/// 파일 변환 결과
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// 처리된 소스 파일 경로
    pub path: PathBuf,
    /// 소스를 여는 데 성공했는지 여부
    pub success: bool,
    /// 실제로 파일을 연 백엔드
    pub backend: Option<String>,
    /// 작성된 CSV 파일
    pub written: Vec<PathBuf>,
    /// 필드별 실패 (필드 이름, 사유)
    pub field_errors: Vec<(String, String)>,
    /// 통합 표 실패 사유
    pub combined_error: Option<String>,
    /// 파일 자체 실패 사유 (열기 실패 등)
    pub error: Option<String>,
    /// 처리 시간
    pub elapsed: Duration,
}

impl FileOutcome {
    /// 실패 결과 생성
    pub fn failure(path: PathBuf, error: String, elapsed: Duration) -> Self {
        Self {
            path,
            success: false,
            backend: None,
            written: Vec::new(),
            field_errors: Vec::new(),
            combined_error: None,
            error: Some(error),
            elapsed,
        }
    }
}

/// 변환 옵션
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// 먼저 시도할 백엔드 이름
    pub engine: String,
    /// 통합 표 최대 행 수
    pub max_combined_rows: usize,
    /// 통합 표 작성 여부
    pub write_combined: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            engine: NETCDF.to_string(),
            max_combined_rows: 5_000_000,
            write_combined: true,
        }
    }
}

impl ConvertOptions {
    /// 기본 옵션 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 우선 백엔드 설정
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// 통합 표 행 수 한도 설정
    pub fn with_max_combined_rows(mut self, rows: usize) -> Self {
        self.max_combined_rows = rows;
        self
    }

    /// 통합 표 작성 여부 설정
    pub fn with_combined(mut self, write_combined: bool) -> Self {
        self.write_combined = write_combined;
        self
    }
}

/// 파일 이름에 쓸 수 없는 문자를 `_`로 치환
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// 출력 이름의 기준: 파일 stem (+ 데이터셋 라벨)
pub fn output_base(source: &Path, label: Option<&str>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    match label {
        Some(label) => format!("{}_{}", stem, sanitize_name(label)),
        None => stem,
    }
}

/// 단일 소스 파일 변환
///
/// # Arguments
/// * `source` - 변환할 파일 경로
/// * `dest_dir` - CSV를 쓸 폴더 (없으면 생성)
/// * `backends` - 시도할 백엔드 목록
/// * `options` - 변환 옵션
///
/// # Returns
/// 소스를 열었으면 `success = true` (필드/통합 표 실패와 무관)
pub fn convert_file(
    source: &Path,
    dest_dir: &Path,
    backends: &BackendRegistry,
    options: &ConvertOptions,
) -> FileOutcome {
    let started = Instant::now();

    match convert_file_internal(source, dest_dir, backends, options) {
        Ok(mut outcome) => {
            outcome.elapsed = started.elapsed();
            outcome
        }
        Err(e) => {
            error!("변환 실패 ({}): {}", source.display(), e);
            FileOutcome::failure(source.to_path_buf(), e.to_string(), started.elapsed())
        }
    }
}

/// 내부 변환 로직
fn convert_file_internal(
    source: &Path,
    dest_dir: &Path,
    backends: &BackendRegistry,
    options: &ConvertOptions,
) -> Result<FileOutcome> {
    fs::create_dir_all(dest_dir).map_err(|e| GridCsvError::CreateDirError {
        path: dest_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let (backend, dataset) = backends.open(source, &options.engine)?;
    debug!("{} 백엔드로 열었습니다: {}", backend, source.display());

    let base = output_base(source, dataset.label().as_deref());
    let infos = dataset.fields();

    let mut outcome = FileOutcome {
        path: source.to_path_buf(),
        success: true,
        backend: Some(backend.clone()),
        written: Vec::new(),
        field_errors: Vec::new(),
        combined_error: None,
        error: None,
        elapsed: Duration::ZERO,
    };

    let mut fields: Vec<Field> = Vec::with_capacity(infos.len());
    for info in &infos {
        let csv_path = dest_dir.join(format!("{}_{}.csv", base, sanitize_name(&info.name)));

        let field = match dataset.read_field(&info.name) {
            Ok(field) => field,
            Err(e) => {
                warn!(
                    "필드 처리 실패 ({}, 백엔드 {}, 필드 {}): {}",
                    source.display(),
                    backend,
                    info.name,
                    e
                );
                outcome.field_errors.push((info.name.clone(), e.to_string()));
                continue;
            }
        };

        let (header, rows) = field_rows(&field);
        match write_csv(&csv_path, &header, rows) {
            Ok(count) => {
                debug!("저장: {} ({}행)", csv_path.display(), count);
                outcome.written.push(csv_path);
            }
            Err(e) => {
                warn!(
                    "필드 저장 실패 ({}, 백엔드 {}, 필드 {}): {}",
                    source.display(),
                    backend,
                    info.name,
                    e
                );
                outcome.field_errors.push((info.name.clone(), e.to_string()));
            }
        }
        fields.push(field);
    }

    if options.write_combined {
        let combined_path = dest_dir.join(format!("{}_{}.csv", base, COMBINED_SUFFIX));
        match write_combined(&combined_path, &infos, &fields, options.max_combined_rows) {
            Ok(count) => {
                debug!("통합 표 저장: {} ({}행)", combined_path.display(), count);
                outcome.written.push(combined_path);
            }
            Err(e) => {
                warn!("통합 표를 만들 수 없습니다 ({}): {}", source.display(), e);
                outcome.combined_error = Some(e.to_string());
            }
        }
    }

    // 다음 파일 전에 핸들을 닫음
    drop(dataset);

    Ok(outcome)
}

/// 모든 필드를 공통 축 위에 합친 CSV 작성
fn write_combined(
    path: &Path,
    infos: &[crate::dataset::FieldInfo],
    fields: &[Field],
    max_rows: usize,
) -> Result<u64> {
    if let Some(missing) = infos
        .iter()
        .find(|info| !fields.iter().any(|f| f.name == info.name))
    {
        return Err(GridCsvError::CombinedTable {
            reason: format!("필드 '{}'를 읽지 못했습니다", missing.name),
        });
    }

    let layout = CombinedLayout::new(fields, max_rows)?;
    write_csv(path, &layout.header(), layout.rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("2 metre temperature"), "2_metre_temperature");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("salinity"), "salinity");
    }

    #[test]
    fn test_output_base() {
        assert_eq!(output_base(Path::new("/data/a.nc"), None), "a");
        assert_eq!(
            output_base(Path::new("/data/USM_NGOFS2.t054.nc"), None),
            "USM_NGOFS2.t054"
        );
        assert_eq!(output_base(Path::new("gfs.grib2"), Some("mean")), "gfs_mean");
    }

    #[test]
    fn test_options_builder() {
        let options = ConvertOptions::new()
            .with_engine("grib")
            .with_max_combined_rows(10)
            .with_combined(false);

        assert_eq!(options.engine, "grib");
        assert_eq!(options.max_combined_rows, 10);
        assert!(!options.write_combined);
    }

    #[test]
    fn test_missing_source_fails_without_panicking() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let outcome = convert_file(
            &temp_dir.path().join("nope.nc"),
            &temp_dir.path().join("out"),
            &BackendRegistry::new(),
            &ConvertOptions::new(),
        );

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(outcome.written.is_empty());
    }
}
