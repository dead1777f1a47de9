//! Typed view of the model's career analysis.
//!
//! [`crate::pipeline::extract::extract_json`] only guarantees *some* JSON
//! value. This module layers the expected shape on top of it:
//!
//! ```json
//! {
//!   "skills": ["Python", "SQL"],
//!   "career": "Data Analyst",
//!   "recommendation": "…",
//!   "career_meta": {
//!     "type": 0, "estimatedYears": 1, "averageSalary": 60000,
//!     "jobGrowth": 40, "futureCareer": true
//!   }
//! }
//! ```
//!
//! Missing `skills`, `career` and `recommendation` fall back to empty values;
//! a missing or invalid `career_meta` means no career path can be saved, but
//! the rest of the analysis is kept. Ill-typed top-level fields are rejected.

use crate::error::Cv2CareerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Broad career family, sent to the backend as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CareerType {
    Tech,
    Business,
    Health,
    Creative,
    Operational,
}

impl TryFrom<u8> for CareerType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(CareerType::Tech),
            1 => Ok(CareerType::Business),
            2 => Ok(CareerType::Health),
            3 => Ok(CareerType::Creative),
            4 => Ok(CareerType::Operational),
            other => Err(format!("unknown career type {other} (expected 0–4)")),
        }
    }
}

impl From<CareerType> for u8 {
    fn from(t: CareerType) -> u8 {
        match t {
            CareerType::Tech => 0,
            CareerType::Business => 1,
            CareerType::Health => 2,
            CareerType::Creative => 3,
            CareerType::Operational => 4,
        }
    }
}

impl fmt::Display for CareerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CareerType::Tech => "Tech",
            CareerType::Business => "Business",
            CareerType::Health => "Health",
            CareerType::Creative => "Creative",
            CareerType::Operational => "Operational",
        };
        f.write_str(name)
    }
}

/// Market facts about the recommended career.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerMeta {
    #[serde(rename = "type")]
    pub career_type: CareerType,
    /// Years needed to get started in the career.
    pub estimated_years: u32,
    /// Average salary in the market named by the prompt.
    pub average_salary: f64,
    /// Growth outlook, 0–100.
    pub job_growth: u8,
    pub future_career: bool,
}

/// The structured answer recovered from the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CareerAnalysis {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub career: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub career_meta: Option<CareerMeta>,
    /// Why a present `career_meta` was discarded, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_meta_error: Option<String>,
}

/// Top-level shape before `career_meta` is checked on its own.
#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    career: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    career_meta: Option<Value>,
}

/// Numbers arrive as floats often enough (`1.5` years, `85.0` growth) that
/// they are read as `f64` and checked afterwards.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    #[serde(rename = "type")]
    career_type: f64,
    estimated_years: f64,
    average_salary: f64,
    job_growth: f64,
    future_career: bool,
}

impl CareerMeta {
    /// Validate a `career_meta` value. Fractional years and growth are
    /// rounded; out-of-range values are rejected.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let raw: RawMeta = serde_json::from_value(value).map_err(|e| e.to_string())?;

        if raw.career_type.fract() != 0.0 || !(0.0..=255.0).contains(&raw.career_type) {
            return Err(format!("unknown career type {} (expected 0–4)", raw.career_type));
        }
        let career_type = CareerType::try_from(raw.career_type as u8)?;

        if !raw.estimated_years.is_finite() || raw.estimated_years < 0.0 {
            return Err(format!(
                "estimatedYears must be ≥ 0, got {}",
                raw.estimated_years
            ));
        }
        if !raw.job_growth.is_finite() || !(0.0..=100.0).contains(&raw.job_growth) {
            return Err(format!("jobGrowth must be 0–100, got {}", raw.job_growth));
        }
        if !raw.average_salary.is_finite() || raw.average_salary < 0.0 {
            return Err(format!(
                "averageSalary must be ≥ 0, got {}",
                raw.average_salary
            ));
        }

        Ok(CareerMeta {
            career_type,
            estimated_years: raw.estimated_years.round().min(u32::MAX as f64) as u32,
            average_salary: raw.average_salary,
            job_growth: raw.job_growth.round() as u8,
            future_career: raw.future_career,
        })
    }
}

impl CareerAnalysis {
    /// Validate an extracted JSON value against the analysis shape.
    ///
    /// Skill names are trimmed; blanks and case-insensitive duplicates are
    /// dropped, keeping the first spelling. An invalid `career_meta` does not
    /// fail the analysis: it is dropped and the reason kept in
    /// `career_meta_error`, so the skills can still be saved.
    pub fn from_value(value: Value) -> Result<Self, Cv2CareerError> {
        if !value.is_object() {
            return Err(Cv2CareerError::InvalidAnalysis {
                detail: format!("expected a JSON object, got {}", json_kind(&value)),
            });
        }

        let raw: RawAnalysis =
            serde_json::from_value(value).map_err(|e| Cv2CareerError::InvalidAnalysis {
                detail: e.to_string(),
            })?;

        let (career_meta, career_meta_error) = match raw.career_meta {
            None | Some(Value::Null) => (None, None),
            Some(v) => match CareerMeta::from_value(v) {
                Ok(meta) => (Some(meta), None),
                Err(e) => {
                    warn!("Discarding career_meta: {}", e);
                    (None, Some(e))
                }
            },
        };

        Ok(CareerAnalysis {
            skills: normalise_skills(raw.skills),
            career: raw.career.trim().to_string(),
            recommendation: raw.recommendation,
            career_meta,
            career_meta_error,
        })
    }

    /// True when both a career title and its metadata are present.
    pub fn has_career(&self) -> bool {
        !self.career.is_empty() && self.career_meta.is_some()
    }
}

fn normalise_skills(skills: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
