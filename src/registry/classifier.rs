//! 등록용 예제 모델: 합성 분류 데이터와 최근접 중심 분류기

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 데이터 생성 고정 시드
pub const SEED: u64 = 42;

/// 분류기 이름 (run 파라미터로 기록)
pub const CLASSIFIER_NAME: &str = "NearestCentroid";

/// 합성 데이터셋
#[derive(Debug, Clone)]
pub struct Samples {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 표준 정규 분포 표본 (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// 두 클래스 합성 분류 데이터 생성
///
/// 클래스 0의 중심은 모든 축에서 -1, 클래스 1은 +1이며
/// 각 특성에 표준 정규 잡음을 더합니다. 같은 인자는 항상 같은 데이터를 만듭니다.
pub fn make_classification(n_samples: usize, n_features: usize) -> Samples {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);

    for i in 0..n_samples {
        let label = i % 2;
        let center = if label == 0 { -1.0 } else { 1.0 };
        let row: Vec<f64> = (0..n_features)
            .map(|_| center + standard_normal(&mut rng))
            .collect();
        features.push(row);
        labels.push(label);
    }

    Samples { features, labels }
}

/// 최근접 중심 분류기
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearestCentroid {
    pub classes: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    /// 클래스별 평균 벡터 계산
    pub fn fit(samples: &Samples) -> Self {
        let n_features = samples.features.first().map(Vec::len).unwrap_or(0);
        let mut classes: Vec<usize> = samples.labels.clone();
        classes.sort_unstable();
        classes.dedup();

        let centroids: Vec<Vec<f64>> = classes
            .iter()
            .map(|&class| {
                let mut sum = vec![0.0; n_features];
                let mut count = 0usize;
                for (row, _) in samples
                    .features
                    .iter()
                    .zip(&samples.labels)
                    .filter(|&(_, &label)| label == class)
                {
                    for (acc, value) in sum.iter_mut().zip(row) {
                        *acc += value;
                    }
                    count += 1;
                }
                sum.into_iter().map(|v| v / count as f64).collect::<Vec<f64>>()
            })
            .collect();

        Self { classes, centroids }
    }

    /// 가장 가까운 중심의 클래스
    pub fn predict(&self, row: &[f64]) -> Option<usize> {
        self.centroids
            .iter()
            .zip(&self.classes)
            .map(|(centroid, &class)| {
                let distance: f64 = centroid
                    .iter()
                    .zip(row)
                    .map(|(c, x)| (c - x) * (c - x))
                    .sum();
                (distance, class)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, class)| class)
    }

    /// 정확도 (0.0 ~ 1.0)
    pub fn score(&self, samples: &Samples) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .features
            .iter()
            .zip(&samples.labels)
            .filter(|&(row, &label)| self.predict(row) == Some(label))
            .count();
        correct as f64 / samples.len() as f64
    }
}
