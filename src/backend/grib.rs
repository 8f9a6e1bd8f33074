//! GRIB2 백엔드
//!
//! 서브메시지마다 격자 값을 하나로 집계해 유효 시각별 시계열 필드를 만듭니다.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use grib::codetables::grib2::Table4_4;
use grib::codetables::{CodeTable4_2, Lookup};
use grib::{Code, ForecastTime, Grib2SubmessageDecoder};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{GribOptions, GridAggregation, GRIB};
use crate::cf_time::DATETIME_FORMAT;
use crate::dataset::{Axis, Backend, Cell, Dataset, Field, FieldInfo};
use crate::error::{GridCsvError, Result};

/// 지표면 고정면 종류 (GRIB2 Code Table 4.5)
const GROUND_OR_WATER_SURFACE: u8 = 1;

/// 유효 시각 축 이름
pub const VALID_TIME: &str = "valid_time";

/// GRIB2 백엔드
#[derive(Debug, Clone, Copy, Default)]
pub struct GribBackend {
    options: GribOptions,
}

impl GribBackend {
    pub fn new(options: GribOptions) -> Self {
        Self { options }
    }
}

impl Backend for GribBackend {
    fn name(&self) -> &str {
        GRIB
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>> {
        let open_error = |reason: String| GridCsvError::OpenError {
            file: path.to_path_buf(),
            backend: GRIB.to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let grib2 = grib::from_reader(BufReader::new(file)).map_err(|e| open_error(e.to_string()))?;

        let mut series = SeriesBuilder::default();
        for (_index, submessage) in grib2.iter() {
            let discipline = submessage.indicator().discipline;
            let prod_def = submessage.prod_def();

            let name = match (prod_def.parameter_category(), prod_def.parameter_number()) {
                (Some(category), Some(number)) => CodeTable4_2::new(discipline, category)
                    .lookup(usize::from(number))
                    .to_string(),
                _ => "unknown".to_string(),
            };
            let surface = prod_def
                .fixed_surfaces()
                .map(|(first, _)| (first.surface_type, first.value()));
            let var_id = variable_id(name, surface);

            let ref_time = submessage.identification().ref_time_unchecked();
            let reference = NaiveDate::from_ymd_opt(
                i32::from(ref_time.year),
                u32::from(ref_time.month),
                u32::from(ref_time.day),
            )
            .and_then(|d| {
                d.and_hms_opt(
                    u32::from(ref_time.hour),
                    u32::from(ref_time.minute),
                    u32::from(ref_time.second),
                )
            });
            let offset = match prod_def.forecast_time() {
                Some(ft) => forecast_offset(&ft),
                None => Some(Duration::zero()),
            };
            let valid_time = match (reference, offset) {
                (Some(reference), Some(offset)) => match reference.checked_add_signed(offset) {
                    Some(t) => t,
                    None => {
                        log::warn!("유효 시각이 표현 범위를 벗어난 메시지를 건너뜁니다: {}", var_id);
                        continue;
                    }
                },
                _ => {
                    log::warn!("유효 시각을 계산할 수 없는 메시지를 건너뜁니다: {}", var_id);
                    continue;
                }
            };

            let latlons: std::result::Result<Vec<(f64, f64)>, String> =
                match self.options.aggregation {
                    GridAggregation::Mean => Ok(Vec::new()),
                    GridAggregation::Nearest { .. } => submessage
                        .latlons()
                        .map(|points| {
                            points
                                .map(|(lat, lon)| (f64::from(lat), f64::from(lon)))
                                .collect()
                        })
                        .map_err(|e| format!("격자 좌표 계산 실패: {}", e)),
                };

            let value = latlons.and_then(|latlons| {
                let decoder = Grib2SubmessageDecoder::from(submessage)
                    .map_err(|e| format!("디코딩 실패: {}", e))?;
                let values: Vec<f64> = decoder
                    .dispatch()
                    .map_err(|e| format!("디코딩 실패: {}", e))?
                    .map(f64::from)
                    .collect();
                Ok(self.options.aggregation.reduce(&values, &latlons))
            });

            match value {
                Ok(value) => series.push(var_id, valid_time, value),
                Err(reason) => {
                    log::warn!("{} 메시지를 읽을 수 없어 이 변수를 제외합니다: {}", var_id, reason);
                    series.fail(var_id, reason);
                }
            }
        }

        if series.is_empty() {
            return Err(open_error("GRIB2 메시지가 없습니다".to_string()));
        }

        Ok(Box::new(series.build(self.options.aggregation.label())))
    }
}

/// 변수 이름: 지표면이거나 레벨 0이면 파라미터 이름, 아니면 `이름_레벨_고정면종류`
fn variable_id(name: String, surface: Option<(u8, f64)>) -> String {
    match surface {
        Some((surface_type, level))
            if surface_type != GROUND_OR_WATER_SURFACE && level != 0.0 && !level.is_nan() =>
        {
            format!("{}_{}_{}", name, level, surface_type)
        }
        _ => name,
    }
}

fn forecast_offset(ft: &ForecastTime) -> Option<Duration> {
    let value = i64::from(ft.value);
    let seconds = match ft.unit {
        Code::Name(Table4_4::Second) => 1,
        Code::Name(Table4_4::Minute) => 60,
        Code::Name(Table4_4::Hour) => 3_600,
        Code::Name(Table4_4::ThreeHours) => 3 * 3_600,
        Code::Name(Table4_4::SixHours) => 6 * 3_600,
        Code::Name(Table4_4::TwelveHours) => 12 * 3_600,
        Code::Name(Table4_4::Day) => 86_400,
        _ => return None,
    };
    Duration::try_seconds(value * seconds)
}

/// 변수별 (유효 시각 → 값) 누적
///
/// 한 메시지라도 디코딩에 실패한 변수는 값을 버리고 실패 사유만 남깁니다.
#[derive(Default)]
struct SeriesBuilder {
    order: Vec<String>,
    values: BTreeMap<String, BTreeMap<NaiveDateTime, f64>>,
    failed: BTreeMap<String, String>,
}

impl SeriesBuilder {
    fn remember(&mut self, var_id: &str) {
        if !self.order.iter().any(|name| name == var_id) {
            self.order.push(var_id.to_string());
        }
    }

    fn push(&mut self, var_id: String, time: NaiveDateTime, value: f64) {
        self.remember(&var_id);
        if self.failed.contains_key(&var_id) {
            return;
        }
        self.values.entry(var_id).or_default().insert(time, value);
    }

    fn fail(&mut self, var_id: String, reason: String) {
        self.remember(&var_id);
        self.values.remove(&var_id);
        self.failed.entry(var_id).or_insert(reason);
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 모든 변수가 같은 시각 축을 공유하도록 정렬된 합집합 축 사용
    fn build(self, label: &str) -> GribDataset {
        let times: Vec<NaiveDateTime> = self
            .values
            .values()
            .flat_map(|series| series.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let axis = Axis {
            name: VALID_TIME.to_string(),
            labels: times
                .iter()
                .map(|t| Cell::Text(t.format(DATETIME_FORMAT).to_string()))
                .collect(),
        };

        let entries = self
            .order
            .into_iter()
            .map(|name| {
                if let Some(reason) = self.failed.get(&name) {
                    return (name, Err(reason.clone()));
                }
                let series = self.values.get(&name);
                let values: Vec<Cell> = times
                    .iter()
                    .map(|t| {
                        series
                            .and_then(|s| s.get(t))
                            .map(|&v| Cell::from_f64(v))
                            .unwrap_or(Cell::Missing)
                    })
                    .collect();
                let field = Field::from_cells(name.clone(), vec![axis.clone()], values)
                    .map_err(|e| e.to_string());
                (name, field)
            })
            .collect();

        GribDataset {
            axis_len: axis.len(),
            entries,
            label: label.to_string(),
        }
    }
}

/// 메모리에 올린 GRIB 시계열
pub struct GribDataset {
    axis_len: usize,
    entries: Vec<(String, std::result::Result<Field, String>)>,
    label: String,
}

impl Dataset for GribDataset {
    fn fields(&self) -> Vec<FieldInfo> {
        self.entries
            .iter()
            .map(|(name, field)| FieldInfo {
                name: name.clone(),
                dims: match field {
                    Ok(f) => f.axes.iter().map(|a| (a.name.clone(), a.len())).collect(),
                    Err(_) => vec![(VALID_TIME.to_string(), self.axis_len)],
                },
            })
            .collect()
    }

    fn read_field(&self, name: &str) -> Result<Field> {
        match self.entries.iter().find(|(n, _)| n == name) {
            Some((_, Ok(field))) => Ok(field.clone()),
            Some((_, Err(reason))) => Err(GridCsvError::FieldReadError {
                field: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(GridCsvError::FieldNotFound {
                field: name.to_string(),
            }),
        }
    }

    fn label(&self) -> Option<String> {
        Some(self.label.clone())
    }
}
