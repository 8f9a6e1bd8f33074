//! CLI 인자 파싱 모듈
//!
//! clap을 사용한 명령줄 인자 정의 및 파싱을 담당합니다.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::backend::{GribOptions, GridAggregation, GRIB, NETCDF};
use crate::batch::BatchRequest;
use crate::discovery::DiscoveryScope;
use crate::error::Result;
use crate::pattern::PatternSet;
use crate::processor::ConvertOptions;
use crate::registry::{RegisterRequest, DEFAULT_TRACKING_URI};

/// 쉼표로 구분된 목록을 잘라 공백을 제거하고 빈 항목은 버림
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 먼저 시도할 디코더
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum EngineKind {
    /// NetCDF (classic / NetCDF-4)
    #[default]
    Netcdf,
    /// GRIB2
    Grib,
}

impl EngineKind {
    /// 백엔드 레지스트리에 등록된 이름
    pub fn backend_name(&self) -> &'static str {
        match self {
            EngineKind::Netcdf => NETCDF,
            EngineKind::Grib => GRIB,
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.backend_name())
    }
}

/// gridcsv CLI 인자 구조체
#[derive(Parser, Debug)]
#[command(
    name = "gridcsv",
    version,
    about = "GRIDDED DATA TO CSV CONVERTER - NetCDF/GRIB 파일을 변수별 CSV로 변환하는 CLI 도구",
    long_about = r#"
GRIDDED DATA TO CSV CONVERTER
=============================

여러 폴더와 파일에서 NetCDF/GRIB 파일을 찾아
변수마다 하나의 CSV와 모든 변수를 합친 CSV를 만듭니다.

특징:
  • 폴더 재귀 탐색과 glob 패턴 필터
  • 디코더 실패 시 다른 디코더로 재시도
  • 폴더별 성공/실패 통계와 CSV 보고서
  • MLflow 모델 레지스트리 조회/등록

예제:
  gridcsv convert -i ./ncin1,./ncin2 -o ./csv_out
  gridcsv convert -i ./gfs --engine grib --lat 37.5 --lon 127.0
  gridcsv convert                       # 대화형 입력
  gridcsv inspect ./ncin1/sample.nc
  gridcsv registry list
"#
)]
pub struct Args {
    /// 상세 출력 모드 (debug 로그)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 폴더/파일을 CSV로 변환
    Convert(ConvertArgs),
    /// 파일의 변수와 차원 출력
    Inspect(InspectArgs),
    /// MLflow 모델 레지스트리
    Registry(RegistryArgs),
}

/// `convert` 인자
#[derive(ClapArgs, Debug, Clone)]
pub struct ConvertArgs {
    /// 입력 폴더/파일 (쉼표로 구분). 없으면 대화형으로 입력받음
    #[arg(short, long)]
    pub input: Option<String>,

    /// 출력 루트 폴더 (없으면 각 입력 옆에 생성)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 파일 이름 패턴 (glob, 쉼표로 구분, 기본값: "*.nc,*.netcdf,*.NC")
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// 먼저 시도할 디코더
    #[arg(long, value_enum, default_value_t = EngineKind::Netcdf)]
    pub engine: EngineKind,

    /// 하위 폴더를 탐색하지 않음
    #[arg(long)]
    pub no_recursive: bool,

    /// 최대 폴더 탐색 깊이 (입력 폴더 바로 아래 파일이 깊이 0)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// 입력 폴더 구조를 출력에 유지하지 않음
    #[arg(long)]
    pub flatten: bool,

    /// GRIB 최근접 격자점 위도
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// GRIB 최근접 격자점 경도
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// 통합 CSV 최대 행 수
    #[arg(long, default_value_t = 5_000_000)]
    pub max_combined_rows: usize,

    /// 폴더별 통계를 저장할 CSV 경로
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ConvertArgs {
    /// 입력 목록 (지정되지 않았으면 None)
    pub fn inputs(&self) -> Option<Vec<String>> {
        self.input.as_deref().map(split_list)
    }

    /// 파일 이름 패턴
    pub fn patterns(&self) -> Result<PatternSet> {
        match &self.pattern {
            Some(list) => PatternSet::parse(list),
            None => Ok(PatternSet::default()),
        }
    }

    pub fn scope(&self) -> DiscoveryScope {
        if self.no_recursive {
            DiscoveryScope::flat()
        } else {
            DiscoveryScope::recursive(self.max_depth)
        }
    }

    pub fn grib_options(&self) -> GribOptions {
        GribOptions {
            aggregation: GridAggregation::from_point(self.lat, self.lon),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::new()
            .with_engine(self.engine.backend_name())
            .with_max_combined_rows(self.max_combined_rows)
    }

    /// 배치 요청 생성
    ///
    /// `output_root`는 `-o` 또는 대화형으로 받은 출력 폴더입니다.
    pub fn to_batch_request(
        &self,
        inputs: Vec<String>,
        base_dir: PathBuf,
        output_root: Option<PathBuf>,
    ) -> Result<BatchRequest> {
        Ok(BatchRequest::new(inputs, base_dir)
            .with_patterns(self.patterns()?)
            .with_scope(self.scope())
            .with_output_root(output_root)
            .with_preserve_structure(!self.flatten))
    }
}

/// `inspect` 인자
#[derive(ClapArgs, Debug, Clone)]
pub struct InspectArgs {
    /// 확인할 파일
    pub file: PathBuf,

    /// 먼저 시도할 디코더
    #[arg(long, value_enum, default_value_t = EngineKind::Netcdf)]
    pub engine: EngineKind,
}

/// `registry` 인자
#[derive(ClapArgs, Debug, Clone)]
pub struct RegistryArgs {
    /// MLflow 추적 서버 주소
    #[arg(long, env = "MLFLOW_TRACKING_URI", default_value = DEFAULT_TRACKING_URI)]
    pub tracking_uri: String,

    #[command(subcommand)]
    pub action: RegistryAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RegistryAction {
    /// 등록된 모델과 최신 버전 목록
    List,
    /// 예제 분류기를 학습해 모델로 등록
    Register(RegisterArgs),
}

/// `registry register` 인자
#[derive(ClapArgs, Debug, Clone)]
pub struct RegisterArgs {
    /// 등록할 모델 이름
    #[arg(long, default_value = "NearestCentroidModel")]
    pub name: String,

    /// 실행을 기록할 실험 ID
    #[arg(long, default_value = "0")]
    pub experiment_id: String,

    /// 실행 이름
    #[arg(long, default_value = "NearestCentroid_Experiment")]
    pub run_name: String,

    /// 합성 데이터 표본 수
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// 합성 데이터 특성 수
    #[arg(long, default_value_t = 4)]
    pub features: usize,
}

impl RegisterArgs {
    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            model_name: self.name.clone(),
            experiment_id: self.experiment_id.clone(),
            run_name: self.run_name.clone(),
            n_samples: self.samples,
            n_features: self.features,
        }
    }
}
