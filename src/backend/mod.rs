//! REST client for the career backend.
//!
//! The backend owns the schema; this module mirrors just enough of it to
//! create and read back skills, career paths and predictions. Every
//! response is wrapped in the same envelope:
//!
//! ```json
//! { "success": true, "data": { "id": 12, … }, "message": null }
//! ```
//!
//! | Operation | Method & path |
//! |-----------|---------------|
//! | create skill | `POST /api/v1/Skills` |
//! | read skill | `GET /api/v1/Skills/{id}` |
//! | create career path | `POST /api/v1/CareerPaths` |
//! | read career path | `GET /api/v1/CareerPaths/{id}` |
//! | generate prediction | `POST /api/v1/CareerPredictions/generate` |
//! | read prediction | `GET /api/v1/CareerPredictions/{id}` |

pub mod locator;

use crate::analysis::{CareerMeta, CareerType};
use crate::config::BackendConfig;
use crate::error::{BackendError, Cv2CareerError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub use locator::{BackendLocator, FixedLocator, HealthProbeLocator};

const SKILLS: &str = "/api/v1/Skills";
const CAREER_PATHS: &str = "/api/v1/CareerPaths";
const PREDICTIONS: &str = "/api/v1/CareerPredictions";

/// Longest response body kept in a [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 500;

// ── Wire types ───────────────────────────────────────────────────────────

/// The backend's response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/v1/Skills`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSkill {
    pub name: String,
    pub description: String,
    pub category: i32,
    pub level: i32,
    pub in_demand: bool,
    pub future_proof: bool,
}

impl NewSkill {
    /// A skill found in a résumé, with the configured category and level.
    pub fn extracted(name: &str, config: &BackendConfig) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Skill extracted: {name}"),
            category: config.skill_category,
            level: config.skill_level,
            in_demand: true,
            future_proof: true,
        }
    }
}

/// Body of `POST /api/v1/CareerPaths`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCareerPath {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub career_type: CareerType,
    pub estimated_years: u32,
    pub average_salary: f64,
    pub job_growth: u8,
    pub future_career: bool,
}

impl NewCareerPath {
    /// The career recommended by the model.
    pub fn recommended(career: &str, meta: &CareerMeta) -> Self {
        Self {
            title: career.to_string(),
            description: format!("Career recommended by the model: {career}"),
            career_type: meta.career_type,
            estimated_years: meta.estimated_years,
            average_salary: meta.average_salary,
            job_growth: meta.job_growth,
            future_career: meta.future_career,
        }
    }
}

/// Body of `POST /api/v1/CareerPredictions/generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub user_id: i64,
    pub career_path_id: i64,
    #[serde(rename = "type")]
    pub prediction_type: i32,
}

/// A stored skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecord {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<i32>,
    #[serde(default)]
    pub level: Option<i32>,
}

/// A stored career path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerPathRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub career_type: Option<i32>,
    #[serde(default)]
    pub estimated_years: Option<i64>,
    #[serde(default)]
    pub average_salary: Option<f64>,
    #[serde(default)]
    pub job_growth: Option<i64>,
    #[serde(default)]
    pub future_career: Option<bool>,
}

/// A generated career prediction.
///
/// The text fields are produced by the backend's own model and their shape
/// varies, so they are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: i64,
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub recommendations: Option<Value>,
    #[serde(default)]
    pub skills_to_develop: Option<Value>,
    #[serde(default)]
    pub compatibility_score: Option<f64>,
    #[serde(default)]
    pub predicted_at: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client bound to one backend base address.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, Cv2CareerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Cv2CareerError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create_skill(&self, skill: &NewSkill) -> Result<SkillRecord, BackendError> {
        self.post(SKILLS, skill).await
    }

    pub async fn get_skill(&self, id: i64) -> Result<SkillRecord, BackendError> {
        self.get(&format!("{SKILLS}/{id}")).await
    }

    pub async fn create_career_path(
        &self,
        career: &NewCareerPath,
    ) -> Result<CareerPathRecord, BackendError> {
        self.post(CAREER_PATHS, career).await
    }

    pub async fn get_career_path(&self, id: i64) -> Result<CareerPathRecord, BackendError> {
        self.get(&format!("{CAREER_PATHS}/{id}")).await
    }

    pub async fn generate_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionRecord, BackendError> {
        self.post(&format!("{PREDICTIONS}/generate"), request).await
    }

    pub async fn get_prediction(&self, id: i64) -> Result<PredictionRecord, BackendError> {
        self.get(&format!("{PREDICTIONS}/{id}")).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        info!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                url: url.clone(),
                source,
            })?;
        read_envelope(url, response, &[200, 201]).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                url: url.clone(),
                source,
            })?;
        read_envelope(url, response, &[200]).await
    }
}

/// Check the status, then unwrap `data` from the envelope.
async fn read_envelope<T: DeserializeOwned>(
    url: String,
    response: reqwest::Response,
    accepted: &[u16],
) -> Result<T, BackendError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|source| BackendError::Http {
        url: url.clone(),
        source,
    })?;
    debug!("{} → HTTP {}: {}", url, status, body);

    if !accepted.contains(&status) {
        return Err(BackendError::Status {
            url,
            status,
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    let envelope: ApiEnvelope<T> =
        serde_json::from_str(&body).map_err(|e| BackendError::Decode {
            url: url.clone(),
            detail: e.to_string(),
        })?;

    match envelope.data {
        Some(data) if envelope.success => Ok(data),
        Some(_) => Err(BackendError::Rejected {
            url,
            message: envelope
                .message
                .unwrap_or_else(|| "success=false".to_string()),
        }),
        None => Err(BackendError::Rejected {
            url,
            message: envelope
                .message
                .unwrap_or_else(|| "response carried no data".to_string()),
        }),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    async fn client_for(server: &mockito::ServerGuard) -> BackendClient {
        BackendClient::new(server.url(), 5).unwrap()
    }

    #[test]
    fn new_skill_payload_shape() {
        let skill = NewSkill::extracted("SQL", &BackendConfig::default());
        let v = serde_json::to_value(&skill).unwrap();
        assert_eq!(
            v,
            json!({
                "name": "SQL",
                "description": "Skill extracted: SQL",
                "category": 1,
                "level": 1,
                "inDemand": true,
                "futureProof": true
            })
        );
    }

    #[test]
    fn new_career_payload_shape() {
        let meta = CareerMeta {
            career_type: CareerType::Tech,
            estimated_years: 1,
            average_salary: 60000.0,
            job_growth: 40,
            future_career: true,
        };
        let v = serde_json::to_value(NewCareerPath::recommended("Data Analyst", &meta)).unwrap();
        assert_eq!(v["title"], json!("Data Analyst"));
        assert_eq!(v["type"], json!(0));
        assert_eq!(v["jobGrowth"], json!(40));
        assert_eq!(v["estimatedYears"], json!(1));
        assert_eq!(v["futureCareer"], json!(true));
    }

    #[test]
    fn prediction_request_shape() {
        let v = serde_json::to_value(PredictionRequest {
            user_id: 1,
            career_path_id: 9,
            prediction_type: 1,
        })
        .unwrap();
        assert_eq!(v, json!({"userId": 1, "careerPathId": 9, "type": 1}));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("résumé", 3), "rés…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn create_skill_returns_record() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/Skills")
            .match_body(Matcher::PartialJson(json!({"name": "Python", "inDemand": true})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "data": {"id": 12, "name": "Python"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let rec = client
            .create_skill(&NewSkill::extracted("Python", &BackendConfig::default()))
            .await
            .unwrap();
        assert_eq!(rec.id, 12);
        assert_eq!(rec.name.as_deref(), Some("Python"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn create_skill_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/Skills")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_skill(&NewSkill::extracted("Python", &BackendConfig::default()))
            .await
            .unwrap_err();
        match err {
            BackendError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn success_false_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/CareerPaths")
            .with_status(200)
            .with_body(r#"{"success": false, "data": {"id": 1}, "message": "duplicate title"}"#)
            .create_async()
            .await;

        let meta = CareerMeta {
            career_type: CareerType::Business,
            estimated_years: 2,
            average_salary: 5000.0,
            job_growth: 10,
            future_career: false,
        };
        let client = client_for(&server).await;
        let err = client
            .create_career_path(&NewCareerPath::recommended("Sales", &meta))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate title"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_data_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/Skills/3")
            .with_status(200)
            .with_body(r#"{"success": true, "data": null}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.get_skill(3).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
    }

    #[tokio::test]
    async fn non_envelope_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/CareerPaths/4")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.get_career_path(4).await.unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }

    #[tokio::test]
    async fn prediction_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let _gen = server
            .mock("POST", "/api/v1/CareerPredictions/generate")
            .match_body(Matcher::Json(json!({"userId": 7, "careerPathId": 3, "type": 1})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"id": 99}}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v1/CareerPredictions/99")
            .with_status(200)
            .with_body(
                r#"{"success": true, "data": {
                    "id": 99,
                    "analysis": "Strong analytical profile",
                    "recommendations": ["Learn Power BI"],
                    "skillsToDevelop": "Statistics",
                    "compatibilityScore": 0.82,
                    "predictedAt": "2025-01-01T10:00:00Z"
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server).await;
        let created = client
            .generate_prediction(&PredictionRequest {
                user_id: 7,
                career_path_id: 3,
                prediction_type: 1,
            })
            .await
            .unwrap();
        assert_eq!(created.id, 99);

        let full = client.get_prediction(99).await.unwrap();
        assert_eq!(full.compatibility_score, Some(0.82));
        assert_eq!(full.recommendations, Some(json!(["Learn Power BI"])));
        assert_eq!(full.predicted_at.as_deref(), Some("2025-01-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_stripped() {
        let client = BackendClient::new("http://localhost:5000/", 5).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
