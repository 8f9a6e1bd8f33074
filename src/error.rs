//! 에러 타입 정의 모듈
//!
//! gridcsv에서 발생할 수 있는 모든 에러 타입을 정의합니다.

use std::path::PathBuf;
use thiserror::Error;

/// gridcsv에서 발생할 수 있는 에러 타입
#[derive(Error, Debug)]
pub enum GridCsvError {
    /// 유효하지 않은 패턴
    #[error("유효하지 않은 패턴: {pattern}")]
    InvalidPattern { pattern: String },

    /// 소스 파일 열기 실패 (특정 백엔드)
    #[error("파일을 열 수 없습니다 ({file}, 백엔드 {backend}): {reason}")]
    OpenError {
        file: PathBuf,
        backend: String,
        reason: String,
    },

    /// 모든 백엔드로 열기 실패
    #[error("사용 가능한 어떤 백엔드로도 파일을 열 수 없습니다 ({file}): {reasons}")]
    AllBackendsFailed { file: PathBuf, reasons: String },

    /// 요청한 백엔드가 빌드에 포함되지 않음
    #[error("백엔드를 사용할 수 없습니다: {backend}")]
    BackendUnavailable { backend: String },

    /// 필드가 데이터셋에 없음
    #[error("필드를 찾을 수 없습니다: {field}")]
    FieldNotFound { field: String },

    /// 필드 값 읽기 실패
    #[error("필드 읽기 실패 ({field}): {reason}")]
    FieldReadError { field: String, reason: String },

    /// 필드 축 길이와 값 개수 불일치
    #[error("필드 형상 불일치 ({field}): 축 곱 {expected}, 값 {actual}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// 통합 표 생성 실패
    #[error("통합 표를 만들 수 없습니다: {reason}")]
    CombinedTable { reason: String },

    /// CSV 쓰기 실패
    #[error("CSV 쓰기 실패 ({file}): {reason}")]
    WriteError { file: PathBuf, reason: String },

    /// 디렉토리 생성 실패
    #[error("디렉토리를 만들 수 없습니다 ({path}): {reason}")]
    CreateDirError { path: PathBuf, reason: String },

    /// 레지스트리 응답 에러
    #[error("레지스트리 요청 실패 ({endpoint}): {reason}")]
    Registry { endpoint: String, reason: String },

    /// 지원하지 않는 아티팩트 저장소
    #[error("지원하지 않는 아티팩트 저장소: {uri}")]
    UnsupportedArtifactStore { uri: String },

    /// HTTP 전송 에러
    #[error("HTTP 요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON 직렬화 실패
    #[error("JSON 직렬화 실패: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// gridcsv 결과 타입 별칭
pub type Result<T> = std::result::Result<T, GridCsvError>;
