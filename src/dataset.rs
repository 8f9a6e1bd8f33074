//! 데이터셋 추상화 모듈
//!
//! 디코더(백엔드)가 돌려주는 격자 데이터를 공통 형태로 표현하고,
//! 백엔드 대체(fallback) 순서를 관리합니다.

use std::fmt;
use std::path::Path;

use crate::error::{GridCsvError, Result};

/// 표의 셀 값
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    /// 결측값 (CSV에서 빈 칸)
    Missing,
}

impl Cell {
    /// NaN은 결측으로 변환
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            Cell::Missing
        } else {
            Cell::Float(value)
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(v) => write!(f, "{}", v),
            Cell::Missing => Ok(()),
        }
    }
}

/// 이름이 있는 차원과 각 인덱스의 라벨
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub labels: Vec<Cell>,
}

impl Axis {
    /// 좌표 변수가 없을 때 쓰는 정수 인덱스 축
    pub fn indexed(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            labels: (0..len as i64).map(Cell::Int).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 축에 딸린 보조 좌표 (예: 비정형 격자의 `node`별 `lat`/`lon`)
///
/// 값은 `dims` 순서의 행 우선 배열입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxCoord {
    pub name: String,
    pub dims: Vec<String>,
    pub values: Vec<Cell>,
}

/// 디코딩된 데이터 필드 (행 우선 배열)
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub axes: Vec<Axis>,
    pub values: Vec<Cell>,
    /// 보조 좌표 열 (축 열 뒤, 값 열 앞에 출력)
    pub coords: Vec<AuxCoord>,
}

impl Field {
    /// 숫자 필드 생성 (NaN = 결측)
    pub fn new(name: impl Into<String>, axes: Vec<Axis>, values: Vec<f64>) -> Result<Self> {
        Self::from_cells(name, axes, values.into_iter().map(Cell::from_f64).collect())
    }

    /// 문자열 필드 생성
    pub fn text(name: impl Into<String>, axes: Vec<Axis>, values: Vec<String>) -> Result<Self> {
        Self::from_cells(name, axes, values.into_iter().map(Cell::Text).collect())
    }

    /// 축 곱과 값 개수가 맞는지 검사하며 생성
    pub fn from_cells(
        name: impl Into<String>,
        axes: Vec<Axis>,
        values: Vec<Cell>,
    ) -> Result<Self> {
        let name = name.into();
        let expected: usize = axes.iter().map(Axis::len).product();
        if expected != values.len() {
            return Err(GridCsvError::ShapeMismatch {
                field: name,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name,
            axes,
            values,
            coords: Vec::new(),
        })
    }

    /// 보조 좌표 추가
    ///
    /// 좌표 차원은 모두 필드 축이어야 하고 값 개수는 그 축 길이의 곱이어야 합니다.
    pub fn with_coord(mut self, coord: AuxCoord) -> Result<Self> {
        let mut expected = 1usize;
        for dim in &coord.dims {
            match self.axes.iter().find(|a| &a.name == dim) {
                Some(axis) => expected *= axis.len(),
                None => {
                    return Err(GridCsvError::FieldReadError {
                        field: self.name.clone(),
                        reason: format!(
                            "좌표 '{}'의 차원 '{}'이 필드에 없습니다",
                            coord.name, dim
                        ),
                    });
                }
            }
        }
        if expected != coord.values.len() {
            return Err(GridCsvError::ShapeMismatch {
                field: coord.name,
                expected,
                actual: coord.values.len(),
            });
        }
        self.coords.push(coord);
        Ok(self)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }
}

/// 값을 읽지 않고 얻을 수 있는 필드 정보
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    /// (차원 이름, 길이)
    pub dims: Vec<(String, usize)>,
}

/// 열린 소스 파일
///
/// 핸들은 drop 시점에 닫힙니다.
pub trait Dataset {
    /// 데이터 필드 목록 (파일 내 순서)
    fn fields(&self) -> Vec<FieldInfo>;

    /// 필드 하나를 읽음
    fn read_field(&self, name: &str) -> Result<Field>;

    /// 출력 파일 이름에 덧붙일 라벨 (예: GRIB 집계 방식)
    fn label(&self) -> Option<String> {
        None
    }
}

/// 소스 파일 디코더
pub trait Backend {
    /// 백엔드 이름 (CLI `--engine` 값)
    fn name(&self) -> &str;

    /// 파일을 열어 데이터셋 반환
    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>>;
}

/// 고정된 순서의 백엔드 목록
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    /// 빈 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌드에 포함된 기본 백엔드 (NetCDF → GRIB 순)
    #[allow(unused_variables, unused_mut)]
    pub fn builtin(grib_options: &crate::backend::GribOptions) -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "netcdf")]
        {
            registry = registry.with(crate::backend::netcdf::NetcdfBackend);
        }
        #[cfg(feature = "grib")]
        {
            registry = registry.with(crate::backend::grib::GribBackend::new(*grib_options));
        }
        registry
    }

    /// 백엔드를 목록 끝에 추가
    pub fn with<B: Backend + 'static>(mut self, backend: B) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// 시도 순서: 요청한 백엔드 먼저, 이후 등록 순서대로 나머지
    pub fn candidates(&self, requested: &str) -> Vec<&dyn Backend> {
        let mut ordered: Vec<&dyn Backend> = self
            .backends
            .iter()
            .filter(|b| b.name() == requested)
            .map(|b| b.as_ref())
            .collect();

        if ordered.is_empty() {
            log::warn!(
                "요청한 백엔드 '{}'가 없습니다. 등록된 순서로 시도합니다: {}",
                requested,
                self.names().join(", ")
            );
        }

        ordered.extend(
            self.backends
                .iter()
                .filter(|b| b.name() != requested)
                .map(|b| b.as_ref()),
        );
        ordered
    }

    /// 순서대로 열기를 시도하여 처음 성공한 백엔드와 데이터셋 반환
    pub fn open(&self, path: &Path, requested: &str) -> Result<(String, Box<dyn Dataset>)> {
        let mut reasons = Vec::new();

        for backend in self.candidates(requested) {
            match backend.open(path) {
                Ok(dataset) => return Ok((backend.name().to_string(), dataset)),
                Err(e) => {
                    log::warn!(
                        "{} 백엔드로 열기 실패 ({}): {}",
                        backend.name(),
                        path.display(),
                        e
                    );
                    reasons.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        if reasons.is_empty() {
            return Err(GridCsvError::BackendUnavailable {
                backend: requested.to_string(),
            });
        }

        Err(GridCsvError::AllBackendsFailed {
            file: path.to_path_buf(),
            reasons: reasons.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, bool);

    struct Empty;

    impl Dataset for Empty {
        fn fields(&self) -> Vec<FieldInfo> {
            Vec::new()
        }

        fn read_field(&self, name: &str) -> Result<Field> {
            Err(GridCsvError::FieldNotFound {
                field: name.to_string(),
            })
        }
    }

    impl Backend for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn open(&self, path: &Path) -> Result<Box<dyn Dataset>> {
            if self.1 {
                Ok(Box::new(Empty))
            } else {
                Err(GridCsvError::OpenError {
                    file: path.to_path_buf(),
                    backend: self.0.to_string(),
                    reason: "unsupported".to_string(),
                })
            }
        }
    }

    #[test]
    fn test_candidates_put_requested_first() {
        let registry = BackendRegistry::new()
            .with(Named("netcdf", true))
            .with(Named("grib", true))
            .with(Named("alt", true));

        let order: Vec<&str> = registry.candidates("grib").iter().map(|b| b.name()).collect();
        assert_eq!(order, vec!["grib", "netcdf", "alt"]);
    }

    #[test]
    fn test_unknown_request_keeps_registration_order() {
        let registry = BackendRegistry::new()
            .with(Named("netcdf", true))
            .with(Named("grib", true));

        let order: Vec<&str> = registry.candidates("h5").iter().map(|b| b.name()).collect();
        assert_eq!(order, vec!["netcdf", "grib"]);
    }

    #[test]
    fn test_open_falls_back_in_order() {
        let registry = BackendRegistry::new()
            .with(Named("first", false))
            .with(Named("second", false))
            .with(Named("third", true));

        let (used, _) = registry.open(Path::new("x.nc"), "first").unwrap();
        assert_eq!(used, "third");
    }

    #[test]
    fn test_open_reports_every_reason() {
        let registry = BackendRegistry::new()
            .with(Named("first", false))
            .with(Named("second", false));

        match registry.open(Path::new("x.nc"), "first") {
            Err(GridCsvError::AllBackendsFailed { reasons, .. }) => {
                assert!(reasons.contains("first"));
                assert!(reasons.contains("second"));
            }
            other => panic!("unexpected: {:?}", other.map(|(n, _)| n)),
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = BackendRegistry::new();
        assert!(matches!(
            registry.open(Path::new("x.nc"), "netcdf"),
            Err(GridCsvError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_field_shape_check() {
        let ok = Field::new("temp", vec![Axis::indexed("time", 2)], vec![1.0, 2.0]);
        assert_eq!(ok.unwrap().shape(), vec![2]);

        let bad = Field::new("temp", vec![Axis::indexed("time", 3)], vec![1.0]);
        assert!(matches!(
            bad,
            Err(GridCsvError::ShapeMismatch { expected: 3, actual: 1, .. })
        ));
    }

    #[test]
    fn test_aux_coord_must_fit_field_axes() {
        let axes = vec![Axis::indexed("time", 2), Axis::indexed("node", 3)];
        let field = Field::new("salinity", axes, vec![0.0; 6]).unwrap();

        let lat = AuxCoord {
            name: "lat".to_string(),
            dims: vec!["node".to_string()],
            values: vec![Cell::Float(29.1), Cell::Float(29.2), Cell::Float(29.3)],
        };
        let field = field.with_coord(lat).unwrap();
        assert_eq!(field.coords.len(), 1);

        let wrong_dim = AuxCoord {
            name: "h".to_string(),
            dims: vec!["nele".to_string()],
            values: vec![Cell::Float(1.0)],
        };
        assert!(field.clone().with_coord(wrong_dim).is_err());

        let wrong_len = AuxCoord {
            name: "lon".to_string(),
            dims: vec!["node".to_string()],
            values: vec![Cell::Float(-89.0)],
        };
        assert!(matches!(
            field.with_coord(wrong_len),
            Err(GridCsvError::ShapeMismatch { expected: 3, actual: 1, .. })
        ));
    }

    #[test]
    fn test_text_field() {
        let values = vec!["a".to_string(), "b".to_string()];
        let field = Field::text("Times", vec![Axis::indexed("time", 2)], values).unwrap();
        assert_eq!(field.values[1], Cell::Text("b".into()));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::from_f64(f64::NAN).to_string(), "");
        assert_eq!(Cell::from_f64(1.5).to_string(), "1.5");
        assert_eq!(Cell::Int(7).to_string(), "7");
        assert_eq!(Cell::Text("2025-04-28 03:00:00".into()).to_string(), "2025-04-28 03:00:00");
    }
}
