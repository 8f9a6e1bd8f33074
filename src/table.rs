//! 표 변환 및 CSV 출력 모듈
//!
//! 필드를 인덱스 없는(de-indexed) 행으로 펼치고 CSV로 씁니다.

use std::path::Path;

use crate::dataset::{AuxCoord, Axis, Cell, Field};
use crate::error::{GridCsvError, Result};

/// 행 우선 순서로 다차원 인덱스를 순회
///
/// 차원이 없으면 빈 인덱스 한 번, 길이 0인 차원이 있으면 한 번도 나오지 않습니다.
pub struct GridIndex {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndex {
    pub fn new(shape: Vec<usize>) -> Self {
        let done = shape.iter().any(|&len| len == 0);
        Self {
            current: vec![0; shape.len()],
            shape,
            done,
        }
    }
}

impl Iterator for GridIndex {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.current.clone();

        // 마지막 축부터 올림
        let mut axis = self.shape.len();
        loop {
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
            self.current[axis] += 1;
            if self.current[axis] < self.shape[axis] {
                break;
            }
            self.current[axis] = 0;
        }

        Some(item)
    }
}

/// 행 우선 배열의 stride 계산
fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn flat_index(index: &[usize], positions: &[usize], strides: &[usize]) -> usize {
    positions
        .iter()
        .zip(strides.iter())
        .map(|(&p, &s)| index[p] * s)
        .sum()
}

/// 축 목록 위에 배치한 보조 좌표
struct PlacedCoord<'a> {
    coord: &'a AuxCoord,
    positions: Vec<usize>,
    strides: Vec<usize>,
}

impl<'a> PlacedCoord<'a> {
    fn new(coord: &'a AuxCoord, axes: &[&Axis]) -> Self {
        let (positions, shape): (Vec<usize>, Vec<usize>) = coord
            .dims
            .iter()
            .filter_map(|dim| {
                axes.iter()
                    .position(|a| &a.name == dim)
                    .map(|p| (p, axes[p].len()))
            })
            .unzip();

        Self {
            coord,
            positions,
            strides: strides(&shape),
        }
    }

    fn cell(&self, index: &[usize]) -> Cell {
        let flat = flat_index(index, &self.positions, &self.strides);
        self.coord.values.get(flat).cloned().unwrap_or(Cell::Missing)
    }
}

/// 필드 하나를 표로 펼침: 축 라벨 열 + 보조 좌표 열 + 필드 값 열
pub fn field_rows(field: &Field) -> (Vec<String>, impl Iterator<Item = Vec<Cell>> + '_) {
    let mut header: Vec<String> = field.axes.iter().map(|a| a.name.clone()).collect();
    header.extend(field.coords.iter().map(|c| c.name.clone()));
    header.push(field.name.clone());

    let axes: Vec<&Axis> = field.axes.iter().collect();
    let coords: Vec<PlacedCoord<'_>> = field
        .coords
        .iter()
        .map(|c| PlacedCoord::new(c, &axes))
        .collect();

    let rows = GridIndex::new(field.shape())
        .zip(field.values.iter())
        .map(move |(index, value)| {
            let mut row: Vec<Cell> = index
                .iter()
                .zip(field.axes.iter())
                .map(|(&i, axis)| axis.labels[i].clone())
                .collect();
            row.extend(coords.iter().map(|c| c.cell(&index)));
            row.push(value.clone());
            row
        });

    (header, rows)
}

/// 여러 필드를 공통 축 위에 합친 통합 표 배치
pub struct CombinedLayout<'a> {
    axes: Vec<&'a Axis>,
    coords: Vec<PlacedCoord<'a>>,
    fields: Vec<(&'a Field, Vec<usize>, Vec<usize>)>,
}

impl<'a> CombinedLayout<'a> {
    /// 축과 보조 좌표의 합집합(처음 등장 순서)을 만들고 크기를 검사
    ///
    /// 같은 이름의 축 길이가 다르거나, 같은 이름의 좌표 차원이 다르거나,
    /// 행 수가 `max_rows`를 넘으면 실패합니다.
    pub fn new(fields: &'a [Field], max_rows: usize) -> Result<Self> {
        if fields.is_empty() {
            return Err(GridCsvError::CombinedTable {
                reason: "합칠 필드가 없습니다".to_string(),
            });
        }

        let mut axes: Vec<&Axis> = Vec::new();
        let mut aux: Vec<&AuxCoord> = Vec::new();
        for field in fields {
            for axis in &field.axes {
                let existing = axes.iter().find(|a| a.name == axis.name).map(|a| a.len());
                match existing {
                    Some(len) if len != axis.len() => {
                        return Err(GridCsvError::CombinedTable {
                            reason: format!(
                                "차원 '{}' 길이 불일치 ({} vs {}, 필드 {})",
                                axis.name,
                                len,
                                axis.len(),
                                field.name
                            ),
                        });
                    }
                    Some(_) => {}
                    None => axes.push(axis),
                }
            }

            for coord in &field.coords {
                match aux.iter().find(|c| c.name == coord.name) {
                    Some(existing) if existing.dims != coord.dims => {
                        return Err(GridCsvError::CombinedTable {
                            reason: format!(
                                "좌표 '{}' 차원 불일치 (필드 {})",
                                coord.name, field.name
                            ),
                        });
                    }
                    Some(_) => {}
                    None => aux.push(coord),
                }
            }
        }

        let rows = axes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.len()));
        match rows {
            Some(rows) if rows <= max_rows => {}
            _ => {
                return Err(GridCsvError::CombinedTable {
                    reason: format!("행 수가 한도({})를 넘습니다", max_rows),
                });
            }
        }

        let coords = aux.into_iter().map(|c| PlacedCoord::new(c, &axes)).collect();

        let placed = fields
            .iter()
            .map(|field| {
                let positions: Vec<usize> = field
                    .axes
                    .iter()
                    .filter_map(|axis| axes.iter().position(|a| a.name == axis.name))
                    .collect();
                (field, positions, strides(&field.shape()))
            })
            .collect();

        Ok(Self {
            axes,
            coords,
            fields: placed,
        })
    }

    pub fn header(&self) -> Vec<String> {
        self.axes
            .iter()
            .map(|a| a.name.clone())
            .chain(self.coords.iter().map(|c| c.coord.name.clone()))
            .chain(self.fields.iter().map(|(f, _, _)| f.name.clone()))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        let shape: Vec<usize> = self.axes.iter().map(|a| a.len()).collect();
        GridIndex::new(shape).map(move |index| {
            let mut row: Vec<Cell> = index
                .iter()
                .zip(self.axes.iter())
                .map(|(&i, axis)| axis.labels[i].clone())
                .collect();

            row.extend(self.coords.iter().map(|c| c.cell(&index)));

            for (field, positions, strides) in &self.fields {
                let flat = flat_index(&index, positions, strides);
                row.push(field.values[flat].clone());
            }
            row
        })
    }
}

/// 헤더와 행을 CSV 파일로 쓰고 쓴 행 수를 반환
pub fn write_csv<I>(path: &Path, header: &[String], rows: I) -> Result<u64>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let to_error = |reason: String| GridCsvError::WriteError {
        file: path.to_path_buf(),
        reason,
    };

    let mut writer = csv::Writer::from_path(path).map_err(|e| to_error(e.to_string()))?;
    writer
        .write_record(header)
        .map_err(|e| to_error(e.to_string()))?;

    let mut count = 0u64;
    for row in rows {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| to_error(e.to_string()))?;
        count += 1;
    }

    writer.flush().map_err(|e| to_error(e.to_string()))?;
    Ok(count)
}
