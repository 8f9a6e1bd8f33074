//! 모델 레지스트리(MLflow 추적 서버) 클라이언트
//!
//! REST API(`/api/2.0/mlflow/...`) 중 모델 조회/등록에 필요한 호출만 감쌉니다.

pub mod classifier;

use chrono::Utc;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::{GridCsvError, Result};

/// 기본 추적 서버 주소
pub const DEFAULT_TRACKING_URI: &str = "http://127.0.0.1:5000";

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACT_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

/// 등록된 모델의 버전
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "v{} (stage: {}, run: {})",
            self.version,
            self.current_stage.as_deref().unwrap_or("None"),
            self.run_id.as_deref().unwrap_or("-")
        )
    }
}

/// 등록된 모델
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RegisteredModel {
    pub name: String,
    #[serde(default)]
    pub latest_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
struct SearchRegisteredModelsResponse {
    #[serde(default)]
    registered_models: Vec<RegisteredModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// 실행(run) 정보
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    pub artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: RunBody,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct ModelVersionEnvelope {
    model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// 실행 아티팩트를 가리키는 URI: `runs:/<run_id>/<path>`
pub fn run_uri(run_id: &str, artifact_path: &str) -> String {
    format!("runs:/{}/{}", run_id, artifact_path.trim_matches('/'))
}

/// `runs:/<run_id>/<path>` 해석
pub fn parse_run_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("runs:/")?;
    let (run_id, path) = rest.trim_start_matches('/').split_once('/')?;
    if run_id.is_empty() || path.is_empty() {
        return None;
    }
    Some((run_id, path))
}

/// 아티팩트 업로드 대상
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactTarget {
    /// 추적 서버가 프록시하는 저장소 (`mlflow-artifacts:/...`), 서버 기준 경로
    Proxied(String),
    /// 로컬 파일 시스템 (`file://...` 또는 절대 경로)
    Local(PathBuf),
}

impl ArtifactTarget {
    /// 실행의 artifact_uri 해석
    pub fn parse(artifact_uri: &str) -> Result<Self> {
        if let Some(rest) = artifact_uri.strip_prefix("mlflow-artifacts:") {
            // "mlflow-artifacts:/0/<run>/artifacts" 또는 "mlflow-artifacts://host:port/0/..."
            let path = match rest.strip_prefix("//") {
                Some(with_host) => with_host.split_once('/').map(|(_, p)| p).unwrap_or(""),
                None => rest,
            };
            return Ok(ArtifactTarget::Proxied(path.trim_matches('/').to_string()));
        }
        if let Some(path) = artifact_uri.strip_prefix("file://") {
            return Ok(ArtifactTarget::Local(PathBuf::from(path)));
        }
        if artifact_uri.starts_with('/') {
            return Ok(ArtifactTarget::Local(PathBuf::from(artifact_uri)));
        }
        Err(GridCsvError::UnsupportedArtifactStore {
            uri: artifact_uri.to_string(),
        })
    }
}

/// 추적 서버 REST 클라이언트
pub struct RegistryClient {
    base_url: String,
    http: Client,
}

impl RegistryClient {
    /// 새 클라이언트 생성
    pub fn new(tracking_uri: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self::with_http(tracking_uri, http))
    }

    /// 미리 구성한 HTTP 클라이언트로 생성
    pub fn with_http(tracking_uri: &str, http: Client) -> Self {
        Self {
            base_url: tracking_uri.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn tracking_uri(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, endpoint)
    }

    /// 응답 상태 확인 후 JSON 해석
    fn read_response<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::blocking::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text()?;
        debug!("{} -> {} {}", endpoint, status, body);

        if !status.is_success() {
            let reason = match serde_json::from_str::<ApiError>(&body) {
                Ok(api) if !api.error_code.is_empty() => format!("{}: {}", api.error_code, api.message),
                _ => format!("HTTP {}: {}", status, body),
            };
            return Err(GridCsvError::Registry {
                endpoint: endpoint.to_string(),
                reason,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.http.get(self.api_url(endpoint)).query(query).send()?;
        Self::read_response(endpoint, response)
    }

    fn post<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        let response = self.http.post(self.api_url(endpoint)).json(body).send()?;
        Self::read_response(endpoint, response)
    }

    /// 등록된 모델 전체 조회 (페이지 순회)
    pub fn search_registered_models(&self) -> Result<Vec<RegisteredModel>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("max_results", "100".to_string())];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let page: SearchRegisteredModelsResponse =
                self.get("registered-models/search", &query)?;
            models.extend(page.registered_models);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(models)
    }

    /// 실행 생성
    pub fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo> {
        let body = json!({
            "experiment_id": experiment_id,
            "run_name": run_name,
            "start_time": Utc::now().timestamp_millis(),
        });
        let envelope: RunEnvelope = self.post("runs/create", &body)?;
        info!("실행 생성: {}", envelope.run.info.run_id);
        Ok(envelope.run.info)
    }

    /// 실행 조회
    pub fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let envelope: RunEnvelope = self.get("runs/get", &[("run_id", run_id.to_string())])?;
        Ok(envelope.run.info)
    }

    /// 파라미터 기록
    pub fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let body = json!({ "run_id": run_id, "key": key, "value": value });
        let _: Value = self.post("runs/log-parameter", &body)?;
        Ok(())
    }

    /// 지표 기록
    pub fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        let body = json!({
            "run_id": run_id,
            "key": key,
            "value": value,
            "timestamp": Utc::now().timestamp_millis(),
            "step": 0,
        });
        let _: Value = self.post("runs/log-metric", &body)?;
        Ok(())
    }

    /// 아티팩트 파일 업로드 (`<artifact_uri>/<artifact_path>/<file_name>`)
    pub fn log_artifact(
        &self,
        run: &RunInfo,
        artifact_path: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<()> {
        let relative = format!("{}/{}", artifact_path.trim_matches('/'), file_name);

        match ArtifactTarget::parse(&run.artifact_uri)? {
            ArtifactTarget::Proxied(root) => {
                let url = format!("{}/{}/{}/{}", self.base_url, ARTIFACT_PREFIX, root, relative);
                let response = self.http.put(&url).body(contents).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(GridCsvError::Registry {
                        endpoint: "mlflow-artifacts".to_string(),
                        reason: format!("HTTP {}: {}", status, response.text().unwrap_or_default()),
                    });
                }
            }
            ArtifactTarget::Local(root) => {
                let path = root.join(&relative);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, contents)?;
            }
        }

        info!("아티팩트 업로드: {}", relative);
        Ok(())
    }

    /// 실행 종료 표시
    pub fn finish_run(&self, run_id: &str) -> Result<()> {
        let body = json!({
            "run_id": run_id,
            "status": "FINISHED",
            "end_time": Utc::now().timestamp_millis(),
        });
        let _: Value = self.post("runs/update", &body)?;
        Ok(())
    }

    /// 모델 이름 등록 (이미 있으면 그대로 사용)
    fn ensure_registered_model(&self, name: &str) -> Result<()> {
        match self.post::<Value>("registered-models/create", &json!({ "name": name })) {
            Ok(_) => {
                info!("새 모델 등록: {}", name);
                Ok(())
            }
            Err(GridCsvError::Registry { reason, .. }) if reason.starts_with(ALREADY_EXISTS) => {
                debug!("이미 등록된 모델: {}", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// `runs:/<run_id>/<path>` 아티팩트를 이름으로 등록하고 새 버전 반환
    pub fn register_model(&self, model_uri: &str, name: &str) -> Result<ModelVersion> {
        let (run_id, path) = parse_run_uri(model_uri).ok_or_else(|| GridCsvError::Registry {
            endpoint: "model-versions/create".to_string(),
            reason: format!("runs:/ URI가 아닙니다: {}", model_uri),
        })?;

        self.ensure_registered_model(name)?;

        let run = self.get_run(run_id)?;
        let source = format!("{}/{}", run.artifact_uri.trim_end_matches('/'), path);

        let body = json!({ "name": name, "source": source, "run_id": run_id });
        let envelope: ModelVersionEnvelope = self.post("model-versions/create", &body)?;
        Ok(envelope.model_version)
    }
}

/// 모델 학습/등록 요청
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub model_name: String,
    pub experiment_id: String,
    pub run_name: String,
    pub n_samples: usize,
    pub n_features: usize,
}

impl Default for RegisterRequest {
    fn default() -> Self {
        Self {
            model_name: "NearestCentroidModel".to_string(),
            experiment_id: "0".to_string(),
            run_name: "NearestCentroid_Experiment".to_string(),
            n_samples: 1000,
            n_features: 4,
        }
    }
}

/// 학습/등록 결과
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRun {
    pub run_id: String,
    pub model_uri: String,
    pub accuracy: f64,
}

/// 모델 아티팩트 경로
pub const MODEL_ARTIFACT_PATH: &str = "model";

/// 합성 데이터로 분류기를 학습해 실행에 기록하고 레지스트리에 등록
pub fn train_and_register(
    client: &RegistryClient,
    request: &RegisterRequest,
) -> Result<(TrainingRun, ModelVersion)> {
    let samples = classifier::make_classification(request.n_samples, request.n_features);
    let model = classifier::NearestCentroid::fit(&samples);
    let accuracy = model.score(&samples);
    info!("학습 완료: 정확도 {:.4}", accuracy);

    let run = client.create_run(&request.experiment_id, &request.run_name)?;
    client.log_param(&run.run_id, "n_samples", &request.n_samples.to_string())?;
    client.log_param(&run.run_id, "n_features", &request.n_features.to_string())?;
    client.log_param(&run.run_id, "classifier", classifier::CLASSIFIER_NAME)?;
    client.log_metric(&run.run_id, "accuracy", accuracy)?;

    let payload = serde_json::to_vec_pretty(&model)?;
    client.log_artifact(&run, MODEL_ARTIFACT_PATH, "model.json", payload)?;
    client.finish_run(&run.run_id)?;

    let model_uri = run_uri(&run.run_id, MODEL_ARTIFACT_PATH);
    let version = client.register_model(&model_uri, &request.model_name)?;
    info!("모델 등록: {} v{}", version.name, version.version);

    Ok((
        TrainingRun {
            run_id: run.run_id,
            model_uri,
            accuracy,
        },
        version,
    ))
}
