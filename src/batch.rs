//! 배치 변환 모듈
//!
//! 여러 폴더와 개별 파일을 순서대로 변환하고 배치별 통계를 모읍니다.
//! 모든 처리는 단일 스레드에서 동기적으로 진행됩니다.

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::dataset::BackendRegistry;
use crate::discovery::{classify_paths, discover_files, DiscoveryScope, PathClassification};
use crate::pattern::PatternSet;
use crate::processor::{convert_file, ConvertOptions, FileOutcome};
use crate::stats::{BatchReport, BatchStats, SPECIFIC_FILES};

/// 출력 루트가 없을 때 폴더 안에 만드는 출력 폴더 이름
pub const DEFAULT_OUTPUT_DIR: &str = "csv_output";

/// 변환 요청
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// 입력 경로 (폴더/파일 혼합, 상대 경로는 `base_dir` 기준)
    pub inputs: Vec<String>,
    /// 상대 경로 기준 폴더
    pub base_dir: PathBuf,
    /// 파일 이름 패턴
    pub patterns: PatternSet,
    /// 탐색 범위
    pub scope: DiscoveryScope,
    /// 출력 루트 (없으면 입력 옆에 생성)
    pub output_root: Option<PathBuf>,
    /// 입력 폴더 구조를 출력에 유지할지 여부
    pub preserve_structure: bool,
}

impl BatchRequest {
    /// 기본 설정 요청 생성 (기본 패턴, 재귀 탐색, 구조 유지)
    pub fn new(inputs: Vec<String>, base_dir: PathBuf) -> Self {
        Self {
            inputs,
            base_dir,
            patterns: PatternSet::default(),
            scope: DiscoveryScope::recursive(None),
            output_root: None,
            preserve_structure: true,
        }
    }

    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_scope(mut self, scope: DiscoveryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_output_root(mut self, output_root: Option<PathBuf>) -> Self {
        self.output_root = output_root;
        self
    }

    pub fn with_preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }
}

/// 배치 진행 이벤트
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// 폴더 또는 지정 파일 묶음 처리 시작 (라벨, 파일 수)
    Started { label: &'a str, files: usize },
    /// 파일 하나 처리 완료
    FileDone {
        index: usize,
        total: usize,
        outcome: &'a FileOutcome,
    },
    /// 배치 하나 종료
    Finished { stats: &'a BatchStats },
}

/// 배치 실행기
pub struct BatchRunner<'a> {
    backends: &'a BackendRegistry,
    options: ConvertOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(backends: &'a BackendRegistry, options: ConvertOptions) -> Self {
        Self { backends, options }
    }

    /// 요청 전체 실행
    ///
    /// `on_event`는 진행 표시용 콜백입니다.
    pub fn run<F>(&self, request: &BatchRequest, mut on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent<'_>),
    {
        let started = Instant::now();
        let classified: PathClassification = classify_paths(&request.inputs, &request.base_dir);

        let mut report = BatchReport {
            directories: classified.directories.len(),
            specific_files: classified.files.len(),
            skipped_paths: classified.missing.len(),
            ..Default::default()
        };

        for dir in &classified.directories {
            let stats = self.run_directory(dir, request, &mut on_event);
            report.rows.push(stats);
        }

        if !classified.files.is_empty() {
            let stats = self.run_specific_files(&classified.files, request, &mut on_event);
            report.rows.push(stats);
        }

        report.elapsed = started.elapsed();
        report
    }

    /// 폴더 하나 처리
    pub fn run_directory<F>(&self, dir: &Path, request: &BatchRequest, on_event: &mut F) -> BatchStats
    where
        F: FnMut(BatchEvent<'_>),
    {
        let label = dir.display().to_string();
        let mut stats = BatchStats::new(label.clone());
        let started = Instant::now();

        let files = discover_files(dir, &request.patterns, request.scope);
        if files.is_empty() {
            warn!(
                "{}에서 패턴({})에 맞는 파일이 없습니다",
                dir.display(),
                request.patterns
            );
        } else {
            info!("{}에서 {}개 파일 발견", dir.display(), files.len());
        }

        let output_dir = directory_output_dir(dir, request.output_root.as_deref());
        on_event(BatchEvent::Started {
            label: &label,
            files: files.len(),
        });

        for (i, file) in files.iter().enumerate() {
            let dest = file_output_dir_in_directory(file, dir, &output_dir, request.preserve_structure);
            let outcome = convert_file(file, &dest, self.backends, &self.options);
            stats.record(outcome.success);
            on_event(BatchEvent::FileDone {
                index: i + 1,
                total: files.len(),
                outcome: &outcome,
            });
        }

        stats.elapsed = started.elapsed();
        on_event(BatchEvent::Finished { stats: &stats });
        stats
    }

    /// 직접 지정된 파일 묶음 처리
    pub fn run_specific_files<F>(
        &self,
        files: &[PathBuf],
        request: &BatchRequest,
        on_event: &mut F,
    ) -> BatchStats
    where
        F: FnMut(BatchEvent<'_>),
    {
        let mut stats = BatchStats::new(SPECIFIC_FILES);
        let started = Instant::now();

        on_event(BatchEvent::Started {
            label: SPECIFIC_FILES,
            files: files.len(),
        });

        for (i, file) in files.iter().enumerate() {
            let dest = specific_file_output_dir(
                file,
                request.output_root.as_deref(),
                request.preserve_structure,
            );
            let outcome = convert_file(file, &dest, self.backends, &self.options);
            stats.record(outcome.success);
            on_event(BatchEvent::FileDone {
                index: i + 1,
                total: files.len(),
                outcome: &outcome,
            });
        }

        stats.elapsed = started.elapsed();
        on_event(BatchEvent::Finished { stats: &stats });
        stats
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 폴더 요청의 출력 폴더: `<root>/<폴더 이름>` 또는 `<폴더>/csv_output`
pub fn directory_output_dir(dir: &Path, output_root: Option<&Path>) -> PathBuf {
    match output_root {
        Some(root) => match dir.file_name() {
            Some(name) => root.join(name),
            None => root.to_path_buf(),
        },
        None => dir.join(DEFAULT_OUTPUT_DIR),
    }
}

/// 폴더 안에서 발견된 파일의 출력 폴더
///
/// 구조 유지 시 `<출력>/<상대 상위 경로>/<stem>`, 아니면 `<출력>/<stem>`
pub fn file_output_dir_in_directory(
    file: &Path,
    input_dir: &Path,
    output_dir: &Path,
    preserve_structure: bool,
) -> PathBuf {
    let stem = file_stem(file);
    if preserve_structure {
        let relative_parent = file
            .parent()
            .and_then(|parent| parent.strip_prefix(input_dir).ok())
            .unwrap_or_else(|| Path::new(""));
        output_dir.join(relative_parent).join(stem)
    } else {
        output_dir.join(stem)
    }
}

/// 직접 지정된 파일의 출력 폴더
///
/// 출력 루트가 있으면 `<root>/<상위 폴더 이름>/<stem>` (구조 유지) 또는 `<root>/<stem>`,
/// 없으면 파일 옆 `<stem>_csv`
pub fn specific_file_output_dir(
    file: &Path,
    output_root: Option<&Path>,
    preserve_structure: bool,
) -> PathBuf {
    let stem = file_stem(file);
    match output_root {
        Some(root) if preserve_structure => {
            let parent_name = file
                .parent()
                .and_then(|p| p.file_name())
                .map(PathBuf::from)
                .unwrap_or_default();
            root.join(parent_name).join(stem)
        }
        Some(root) => root.join(stem),
        None => {
            let parent = file.parent().unwrap_or_else(|| Path::new(""));
            parent.join(format!("{}_csv", stem))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_output_dir() {
        assert_eq!(
            directory_output_dir(Path::new("/in/ncin1"), Some(Path::new("/out"))),
            PathBuf::from("/out/ncin1")
        );
        assert_eq!(
            directory_output_dir(Path::new("/in/ncin1"), None),
            PathBuf::from("/in/ncin1/csv_output")
        );
    }

    #[test]
    fn test_file_output_dir_preserves_relative_parent() {
        let file = Path::new("/in/ncin1/2025/04/a.nc");
        assert_eq!(
            file_output_dir_in_directory(file, Path::new("/in/ncin1"), Path::new("/out/ncin1"), true),
            PathBuf::from("/out/ncin1/2025/04/a")
        );
        assert_eq!(
            file_output_dir_in_directory(file, Path::new("/in/ncin1"), Path::new("/out/ncin1"), false),
            PathBuf::from("/out/ncin1/a")
        );
    }

    #[test]
    fn test_file_at_root_has_no_relative_parent() {
        let file = Path::new("/in/ncin1/a.nc");
        assert_eq!(
            file_output_dir_in_directory(file, Path::new("/in/ncin1"), Path::new("/out"), true),
            PathBuf::from("/out/a")
        );
    }

    #[test]
    fn test_specific_file_output_dir() {
        let file = Path::new("/in/ncin3/USM_SALINITY_t054.nc");
        assert_eq!(
            specific_file_output_dir(file, Some(Path::new("/out")), true),
            PathBuf::from("/out/ncin3/USM_SALINITY_t054")
        );
        assert_eq!(
            specific_file_output_dir(file, Some(Path::new("/out")), false),
            PathBuf::from("/out/USM_SALINITY_t054")
        );
        assert_eq!(
            specific_file_output_dir(file, None, true),
            PathBuf::from("/in/ncin3/USM_SALINITY_t054_csv")
        );
    }
}
