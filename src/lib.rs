//! gridcsv - GRIDDED DATA TO CSV CONVERTER
//!
//! 여러 폴더와 파일에 흩어진 NetCDF/GRIB 격자 데이터를 변수별 CSV로 변환하는 CLI 도구입니다.
//!
//! # 주요 기능
//!
//! - 📂 **일괄 변환**: 폴더/파일 혼합 입력, 재귀 탐색과 glob 패턴 필터
//! - 🔁 **디코더 재시도**: 요청한 디코더가 실패하면 등록된 다른 디코더로 재시도
//! - 🧮 **통합 표**: 모든 변수를 공통 좌표 축 위에 합친 CSV
//! - 📊 **통계**: 폴더별 성공/실패 수와 성공률, CSV 보고서
//! - 🏷️ **모델 레지스트리**: MLflow 추적 서버의 모델 조회/등록
//!
//! # 예제
//!
//! ```bash
//! # 폴더 두 개와 파일 하나 변환
//! gridcsv convert -i ./ncin1,./ncin2,./ncin3/sample.nc -o ./csv_out
//!
//! # GRIB 파일을 특정 좌표의 시계열로
//! gridcsv convert -i ./gfs -p "*.grib2" --engine grib --lat 37.5 --lon 127.0
//! ```

pub mod backend;
pub mod batch;
pub mod cf_time;
pub mod cli;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod pattern;
pub mod processor;
pub mod registry;
pub mod stats;
pub mod table;

// Re-exports for convenient access
pub use batch::{BatchEvent, BatchRequest, BatchRunner};
pub use cli::{Args, Command};
pub use dataset::{Backend, BackendRegistry, Dataset, Field, FieldInfo};
pub use discovery::DiscoveryScope;
pub use error::{GridCsvError, Result};
pub use pattern::PatternSet;
pub use processor::{convert_file, ConvertOptions, FileOutcome};
pub use stats::{format_duration, BatchReport, BatchStats};
