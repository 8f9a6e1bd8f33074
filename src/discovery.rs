//! 입력 경로 분류 및 파일 탐색 모듈
//!
//! 사용자가 넘긴 경로 목록을 폴더/파일로 나누고,
//! 폴더 안에서 패턴에 맞는 파일을 찾습니다.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::pattern::PatternSet;

/// 입력 경로 분류 결과
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathClassification {
    /// 탐색할 폴더 (입력 순서 유지)
    pub directories: Vec<PathBuf>,
    /// 직접 지정된 파일
    pub files: Vec<PathBuf>,
    /// 존재하지 않거나 접근할 수 없는 경로
    pub missing: Vec<PathBuf>,
}

impl PathClassification {
    /// 처리할 입력이 하나도 없는지 확인
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// 경로 목록을 폴더/파일/누락으로 분류
///
/// 상대 경로는 `base` 기준으로 절대 경로가 됩니다.
/// 누락된 경로는 경고만 남기고 제외됩니다.
pub fn classify_paths<S: AsRef<str>>(inputs: &[S], base: &Path) -> PathClassification {
    let mut result = PathClassification::default();

    for raw in inputs {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }

        let path = base.join(trimmed);
        if path.is_dir() {
            result.directories.push(path);
        } else if path.is_file() {
            result.files.push(path);
        } else {
            warn!("경로를 찾을 수 없거나 접근할 수 없습니다: {}", path.display());
            result.missing.push(path);
        }
    }

    result
}

/// 탐색 범위 설정
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiscoveryScope {
    /// 하위 폴더 탐색 여부
    pub recursive: bool,
    /// 최대 깊이 (루트 바로 아래 파일이 깊이 0)
    pub max_depth: Option<usize>,
}

impl DiscoveryScope {
    /// 루트 폴더만 탐색
    pub fn flat() -> Self {
        Self {
            recursive: false,
            max_depth: None,
        }
    }

    /// 하위 폴더 탐색 (깊이 제한 선택)
    pub fn recursive(max_depth: Option<usize>) -> Self {
        Self {
            recursive: true,
            max_depth,
        }
    }

    /// walkdir 기준 최대 깊이 (루트 자체가 0)
    fn walk_depth(&self) -> usize {
        match (self.recursive, self.max_depth) {
            (false, _) => 1,
            (true, Some(depth)) => depth.saturating_add(1),
            (true, None) => usize::MAX,
        }
    }
}

/// 폴더에서 패턴에 맞는 파일 탐색
///
/// 여러 패턴에 동시에 일치하는 파일도 한 번만 포함됩니다.
/// 결과는 폴더 순회 순서(이름순)를 따릅니다.
pub fn discover_files(root: &Path, patterns: &PatternSet, scope: DiscoveryScope) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(scope.walk_depth())
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("폴더 항목을 읽을 수 없습니다 ({}): {}", root.display(), e);
                continue;
            }
        };

        // 심볼릭 링크는 대상을 따라가서 판단
        if !entry.path().is_file() {
            continue;
        }

        let matched = entry
            .file_name()
            .to_str()
            .map(|name| patterns.matches(name))
            .unwrap_or(false);

        if matched {
            debug!("발견: {}", entry.path().display());
            files.push(entry.into_path());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_classify_paths() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("ncin1")).unwrap();
        touch(temp_dir.path(), "single.nc");

        let result = classify_paths(
            &["ncin1", " single.nc ", "", "missing.nc"],
            temp_dir.path(),
        );

        assert_eq!(result.directories, vec![temp_dir.path().join("ncin1")]);
        assert_eq!(result.files, vec![temp_dir.path().join("single.nc")]);
        assert_eq!(result.missing, vec![temp_dir.path().join("missing.nc")]);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_classify_absolute_path_ignores_base() {
        let temp_dir = TempDir::new().unwrap();
        let file = touch(temp_dir.path(), "abs.nc");
        let other = TempDir::new().unwrap();

        let result = classify_paths(&[file.to_string_lossy()], other.path());
        assert_eq!(result.files, vec![file]);
    }

    #[test]
    fn test_flat_scope_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(temp_dir.path(), "top.nc");
        touch(&sub, "nested.nc");

        let files = discover_files(
            temp_dir.path(),
            &PatternSet::default(),
            DiscoveryScope::flat(),
        );
        assert_eq!(names(&files), vec!["top.nc"]);
    }

    #[test]
    fn test_depth_limit_counts_from_root() {
        let temp_dir = TempDir::new().unwrap();
        let l1 = temp_dir.path().join("l1");
        let l2 = l1.join("l2");
        let l3 = l2.join("l3");
        fs::create_dir_all(&l3).unwrap();
        touch(temp_dir.path(), "d0.nc");
        touch(&l1, "d1.nc");
        touch(&l2, "d2.nc");
        touch(&l3, "d3.nc");

        let limited = discover_files(
            temp_dir.path(),
            &PatternSet::default(),
            DiscoveryScope::recursive(Some(2)),
        );
        let mut got = names(&limited);
        got.sort();
        assert_eq!(got, vec!["d0.nc", "d1.nc", "d2.nc"]);

        let unlimited = discover_files(
            temp_dir.path(),
            &PatternSet::default(),
            DiscoveryScope::recursive(None),
        );
        assert_eq!(unlimited.len(), 4);
    }

    #[test]
    fn test_overlapping_patterns_yield_single_entry() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "ocean.nc");
        touch(temp_dir.path(), "notes.txt");

        let patterns = PatternSet::new(&["*.nc", "ocean*", "*"]).unwrap();
        let files = discover_files(temp_dir.path(), &patterns, DiscoveryScope::flat());

        assert_eq!(names(&files), vec!["notes.txt", "ocean.nc"]);
    }

    #[test]
    fn test_no_matches_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "readme.md");

        let files = discover_files(
            temp_dir.path(),
            &PatternSet::default(),
            DiscoveryScope::recursive(None),
        );
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_discovered() {
        let temp_dir = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        touch(temp_dir.path(), "plain.nc");
        let real = touch(store.path(), "real.nc");
        std::os::unix::fs::symlink(&real, temp_dir.path().join("linked.nc")).unwrap();
        std::os::unix::fs::symlink(
            store.path().join("gone.nc"),
            temp_dir.path().join("dangling.nc"),
        )
        .unwrap();

        let files = discover_files(
            temp_dir.path(),
            &PatternSet::default(),
            DiscoveryScope::flat(),
        );
        assert_eq!(names(&files), vec!["linked.nc", "plain.nc"]);
    }
}
