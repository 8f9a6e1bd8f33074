//! 백엔드(디코더) 구현 모듈
//!
//! - `netcdf`: libnetcdf 기반 NetCDF 리더 (`netcdf` 기능)
//! - `grib`: 순수 Rust GRIB2 리더 (`grib` 기능)

#[cfg(feature = "grib")]
pub mod grib;
#[cfg(feature = "netcdf")]
pub mod netcdf;

/// NetCDF 백엔드 이름
pub const NETCDF: &str = "netcdf";
/// GRIB 백엔드 이름
pub const GRIB: &str = "grib";

/// GRIB 격자 값을 시점별 한 값으로 줄이는 방법
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GridAggregation {
    /// 결측이 아닌 격자 값의 평균
    #[default]
    Mean,
    /// 지정 좌표에 가장 가까운 격자점 값
    Nearest { lat: f64, lon: f64 },
}

impl GridAggregation {
    /// 위도/경도가 모두 있으면 최근접, 아니면 평균
    pub fn from_point(lat: Option<f64>, lon: Option<f64>) -> Self {
        match (lat, lon) {
            (Some(lat), Some(lon)) => GridAggregation::Nearest { lat, lon },
            _ => GridAggregation::Mean,
        }
    }

    /// 출력 파일 이름 라벨
    pub fn label(&self) -> &'static str {
        match self {
            GridAggregation::Mean => "mean",
            GridAggregation::Nearest { .. } => "nearest",
        }
    }

    /// 격자 값 한 장을 집계
    ///
    /// `latlons`는 값과 같은 순서의 (위도, 경도)이며 최근접 방식에서만 쓰입니다.
    pub fn reduce(&self, values: &[f64], latlons: &[(f64, f64)]) -> f64 {
        match *self {
            GridAggregation::Mean => mean_of_valid(values),
            GridAggregation::Nearest { lat, lon } => nearest_index(latlons, lat, lon)
                .and_then(|i| values.get(i).copied())
                .unwrap_or(f64::NAN),
        }
    }
}

/// GRIB 백엔드 설정
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GribOptions {
    pub aggregation: GridAggregation,
}

/// NaN을 제외한 평균 (유효 값이 없으면 NaN)
pub fn mean_of_valid(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// 목표 좌표에 가장 가까운 격자점 인덱스 (경도 차는 ±180°로 감쌈)
pub fn nearest_index(latlons: &[(f64, f64)], lat: f64, lon: f64) -> Option<usize> {
    latlons
        .iter()
        .enumerate()
        .map(|(i, &(plat, plon))| {
            let dlat = plat - lat;
            let dlon = (plon - lon + 540.0).rem_euclid(360.0) - 180.0;
            (i, dlat * dlat + dlon * dlon)
        })
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
