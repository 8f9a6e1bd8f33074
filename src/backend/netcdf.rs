//! NetCDF 백엔드
//!
//! libnetcdf(`netcdf` 크레이트)로 클래식/NetCDF-4 파일을 엽니다.

use netcdf::types::{NcTypeDescriptor, NcVariableType};
use netcdf::{AttributeValue, Dimension, Variable};
use std::collections::HashSet;
use std::path::Path;

use super::NETCDF;
use crate::cf_time::TimeUnits;
use crate::dataset::{AuxCoord, Axis, Backend, Cell, Dataset, Field, FieldInfo};
use crate::error::{GridCsvError, Result};
use crate::table::GridIndex;

/// libnetcdf 기반 백엔드
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfBackend;

impl Backend for NetcdfBackend {
    fn name(&self) -> &str {
        NETCDF
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>> {
        let file = netcdf::open(path).map_err(|e| GridCsvError::OpenError {
            file: path.to_path_buf(),
            backend: NETCDF.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(NetcdfDataset { file }))
    }
}

/// NC_CHAR 원소
#[repr(transparent)]
#[derive(Debug, Clone, Copy)]
struct NcChar(u8);

unsafe impl NcTypeDescriptor for NcChar {
    fn type_descriptor() -> NcVariableType {
        NcVariableType::Char
    }
}

/// 열린 NetCDF 파일
pub struct NetcdfDataset {
    file: netcdf::File,
}

impl NetcdfDataset {
    /// 좌표로 쓰이는 변수 이름
    ///
    /// 자기 차원과 이름이 같은 1차원 변수와, 어떤 변수의 `coordinates` 속성에
    /// 나열된 변수가 해당합니다.
    fn coordinate_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();

        for var in self.file.variables() {
            if is_dimension_coordinate(&var) {
                names.insert(var.name());
            }
            if let Some(list) = text_attribute(&var, "coordinates") {
                names.extend(list.split_whitespace().map(str::to_string));
            }
        }

        names
    }

    /// 차원의 축 라벨 (좌표 변수가 없거나 읽을 수 없으면 정수 인덱스)
    fn axis(&self, dim: &Dimension) -> Axis {
        let name = dim.name();
        let len = dim.len();

        let coord = match self.file.variable(&name) {
            Some(var) if value_dims(&var).len() == 1 => var,
            _ => return Axis::indexed(name, len),
        };

        match read_cells(&coord) {
            Ok(labels) if labels.len() == len => Axis { name, labels },
            Ok(_) | Err(_) => {
                log::debug!("좌표 변수 '{}'를 읽을 수 없어 인덱스를 사용합니다", name);
                Axis::indexed(name, len)
            }
        }
    }

    /// 필드 차원 안에 들어가는 보조 좌표 (`lat(node)` 같은 `coordinates` 속성 변수)
    fn aux_coords(&self, field: &Field) -> Vec<AuxCoord> {
        let coordinates = self.coordinate_names();
        let field_dims: HashSet<&str> = field.axes.iter().map(|a| a.name.as_str()).collect();

        let mut coords = Vec::new();
        for var in self.file.variables() {
            let name = var.name();
            if name == field.name || !coordinates.contains(&name) || is_dimension_coordinate(&var) {
                continue;
            }
            if !is_supported(&var.vartype()) {
                continue;
            }

            let dims: Vec<String> = value_dims(&var).iter().map(|d| d.name()).collect();
            if dims.is_empty() || !dims.iter().all(|d| field_dims.contains(d.as_str())) {
                continue;
            }

            match read_cells(&var) {
                Ok(values) => coords.push(AuxCoord { name, dims, values }),
                Err(e) => log::debug!("보조 좌표 '{}' 읽기 실패: {}", name, e),
            }
        }

        coords
    }
}

impl Dataset for NetcdfDataset {
    fn fields(&self) -> Vec<FieldInfo> {
        let coordinates = self.coordinate_names();

        self.file
            .variables()
            .filter(|var| !coordinates.contains(&var.name()))
            .filter(|var| {
                let supported = is_supported(&var.vartype());
                if !supported {
                    log::debug!("지원하지 않는 자료형이라 '{}'를 건너뜁니다", var.name());
                }
                supported
            })
            .map(|var| FieldInfo {
                name: var.name(),
                dims: value_dims(&var)
                    .iter()
                    .map(|d| (d.name(), d.len()))
                    .collect(),
            })
            .collect()
    }

    fn read_field(&self, name: &str) -> Result<Field> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| GridCsvError::FieldNotFound {
                field: name.to_string(),
            })?;

        let values = read_cells(&var).map_err(|e| GridCsvError::FieldReadError {
            field: name.to_string(),
            reason: e.to_string(),
        })?;
        let axes = value_dims(&var).iter().map(|d| self.axis(d)).collect();

        let field = Field::from_cells(name, axes, values)?;
        self.aux_coords(&field)
            .into_iter()
            .try_fold(field, |field, coord| field.with_coord(coord))
    }
}

fn is_dimension_coordinate(var: &Variable) -> bool {
    let dims = var.dimensions();
    dims.len() == 1 && dims[0].name() == var.name()
}

fn is_supported(vartype: &NcVariableType) -> bool {
    matches!(
        vartype,
        NcVariableType::Int(_)
            | NcVariableType::Float(_)
            | NcVariableType::Char
            | NcVariableType::String
    )
}

/// 값이 놓이는 차원. 문자 배열은 마지막 차원이 문자열 길이라 빠집니다.
fn value_dims<'a>(var: &'a Variable<'_>) -> &'a [Dimension<'a>] {
    let dims = var.dimensions();
    match (var.vartype(), dims.split_last()) {
        (NcVariableType::Char, Some((_, rest))) => rest,
        _ => dims,
    }
}

/// 변수 전체를 셀로 읽음
///
/// 숫자는 패킹을 풀고 CF 시간 단위가 있으면 날짜 문자열로 바꿉니다.
/// 문자 배열은 마지막 차원 단위로 묶어 끝의 NUL과 공백을 지운 문자열이 됩니다.
fn read_cells(var: &Variable) -> netcdf::Result<Vec<Cell>> {
    match var.vartype() {
        NcVariableType::Char => {
            let width = var.dimensions().last().map(|d| d.len()).unwrap_or(1);
            let count: usize = value_dims(var).iter().map(|d| d.len()).product();
            if width == 0 {
                return Ok(vec![Cell::Text(String::new()); count]);
            }

            let raw = var.get_values::<NcChar, _>(..)?;
            Ok(raw
                .chunks(width)
                .map(|chunk| {
                    let bytes: Vec<u8> = chunk.iter().map(|c| c.0).collect();
                    let text = String::from_utf8_lossy(&bytes);
                    Cell::Text(text.trim_end_matches(['\0', ' ']).to_string())
                })
                .collect())
        }
        NcVariableType::String => {
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
            GridIndex::new(shape)
                .map(|index| var.get_string(&index[..]).map(Cell::Text))
                .collect()
        }
        _ => {
            let raw = var.get_values::<f64, _>(..)?;
            let values = Packing::of(var).apply(raw);
            Ok(match text_attribute(var, "units").and_then(|u| TimeUnits::parse(&u)) {
                Some(units) => values
                    .iter()
                    .map(|&v| units.format(v).map(Cell::Text).unwrap_or(Cell::Missing))
                    .collect(),
                None => values.into_iter().map(Cell::from_f64).collect(),
            })
        }
    }
}

/// 결측 표시와 패킹(scale/offset) 속성
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            fill_value: None,
            missing_value: None,
            scale_factor: 1.0,
            add_offset: 0.0,
        }
    }
}

impl Packing {
    fn of(var: &Variable) -> Self {
        Self {
            fill_value: numeric_attribute(var, "_FillValue"),
            missing_value: numeric_attribute(var, "missing_value"),
            scale_factor: numeric_attribute(var, "scale_factor").unwrap_or(1.0),
            add_offset: numeric_attribute(var, "add_offset").unwrap_or(0.0),
        }
    }

    /// 결측은 NaN으로, 나머지는 `v * scale + offset`
    fn apply(&self, raw: Vec<f64>) -> Vec<f64> {
        raw.into_iter()
            .map(|v| {
                if Some(v) == self.fill_value || Some(v) == self.missing_value {
                    f64::NAN
                } else {
                    v * self.scale_factor + self.add_offset
                }
            })
            .collect()
    }
}

fn numeric_attribute(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Uint(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Ulonglong(v) => Some(v as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
        _ => None,
    }
}

fn text_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_masks_and_scales() {
        let packing = Packing {
            fill_value: Some(-9999.0),
            missing_value: Some(-1.0),
            scale_factor: 0.5,
            add_offset: 10.0,
        };

        let values = packing.apply(vec![2.0, -9999.0, -1.0, 0.0]);
        assert_eq!(values[0], 11.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert_eq!(values[3], 10.0);
    }

    #[test]
    fn test_default_packing_is_identity() {
        assert_eq!(Packing::default().apply(vec![1.5, -3.0]), vec![1.5, -3.0]);
    }

    #[test]
    fn test_open_non_netcdf_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.nc");
        std::fs::write(&path, b"not a netcdf file").unwrap();

        let result = NetcdfBackend.open(&path);
        assert!(matches!(result, Err(GridCsvError::OpenError { .. })));
    }

    #[test]
    fn test_read_written_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("ocean.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("time", 2).unwrap();
            file.add_dimension("depth", 3).unwrap();

            {
                let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
                time.put_attribute("units", "hours since 2025-04-28 00:00:00")
                    .unwrap();
                time.put_values(&[0.0, 3.0], ..).unwrap();
            }
            {
                let mut temp = file
                    .add_variable::<f32>("temp", &["time", "depth"])
                    .unwrap();
                temp.put_attribute("_FillValue", -999.0f32).unwrap();
                temp.put_values(&[1.0f32, 2.0, 3.0, 4.0, -999.0, 6.0], ..)
                    .unwrap();
            }
        }

        let dataset = NetcdfBackend.open(&path).unwrap();
        let names: Vec<String> = dataset.fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["temp"]);

        let field = dataset.read_field("temp").unwrap();
        assert_eq!(field.shape(), vec![2, 3]);
        assert_eq!(field.axes[0].labels[1], Cell::Text("2025-04-28 03:00:00".into()));
        assert_eq!(field.axes[1].labels[2], Cell::Int(2));
        assert_eq!(field.values[4], Cell::Missing);
        assert_eq!(field.values[5], Cell::Float(6.0));
        assert!(field.coords.is_empty());
    }

    #[test]
    fn test_aux_coordinates_become_columns() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("fvcom.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("time", 2).unwrap();
            file.add_dimension("node", 3).unwrap();

            {
                let mut lat = file.add_variable::<f32>("lat", &["node"]).unwrap();
                lat.put_values(&[34.5f32, 35.0, 35.5], ..).unwrap();
            }
            {
                let mut lon = file.add_variable::<f32>("lon", &["node"]).unwrap();
                lon.put_values(&[126.0f32, 126.5, 127.0], ..).unwrap();
            }
            {
                let mut salinity = file
                    .add_variable::<f32>("salinity", &["time", "node"])
                    .unwrap();
                salinity.put_attribute("coordinates", "lat lon").unwrap();
                salinity
                    .put_values(&[30.0f32, 30.5, 31.0, 31.5, 32.0, 32.5], ..)
                    .unwrap();
            }
        }

        let dataset = NetcdfBackend.open(&path).unwrap();
        let names: Vec<String> = dataset.fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["salinity"]);

        let field = dataset.read_field("salinity").unwrap();
        let coord_names: Vec<&str> = field.coords.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(coord_names, vec!["lat", "lon"]);

        let (header, rows) = crate::table::field_rows(&field);
        assert_eq!(header, vec!["time", "node", "lat", "lon", "salinity"]);

        let rows: Vec<Vec<String>> = rows
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        assert_eq!(rows[4], vec!["1", "1", "35", "126.5", "32"]);
    }

    #[test]
    fn test_char_variable_is_read_as_text() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("times.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("time", 2).unwrap();
            file.add_dimension("DateStrLen", 12).unwrap();

            {
                let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
                time.put_values(&[0.0, 1.0], ..).unwrap();
            }
            {
                let mut times = file
                    .add_variable_with_type("Times", &["time", "DateStrLen"], &NcVariableType::Char)
                    .unwrap();
                let chars: Vec<NcChar> = b"2025-04-28\0\02025-04-29  "
                    .iter()
                    .map(|&b| NcChar(b))
                    .collect();
                times.put_values(&chars, ..).unwrap();
            }
            {
                let mut zeta = file.add_variable::<f64>("zeta", &["time"]).unwrap();
                zeta.put_values(&[0.25, -0.5], ..).unwrap();
            }
        }

        let dataset = NetcdfBackend.open(&path).unwrap();
        let infos = dataset.fields();
        let times_info = infos.iter().find(|f| f.name == "Times").unwrap();
        assert_eq!(times_info.dims, vec![("time".to_string(), 2)]);

        let fields: Vec<Field> = infos
            .iter()
            .map(|info| dataset.read_field(&info.name).unwrap())
            .collect();
        let times = fields.iter().find(|f| f.name == "Times").unwrap();
        assert_eq!(times.shape(), vec![2]);
        assert_eq!(
            times.values,
            vec![Cell::Text("2025-04-28".into()), Cell::Text("2025-04-29".into())]
        );

        let layout = crate::table::CombinedLayout::new(&fields, 100).unwrap();
        assert_eq!(layout.rows().count(), 2);
    }
}
