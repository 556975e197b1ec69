use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::domain::status::MissionStatus;
use crate::domain::survey::SurveyQuestion;

/// Admin payload for a new mission.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MissionDraft {
    #[validate(length(min = 1, max = 255, message = "title is required (max 255 characters)"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "description is required (max 5000 characters)"))]
    pub description: String,
    #[validate(custom = "validate_deadline")]
    pub deadline: String,
    #[validate(range(min = 0.0, message = "reward must be zero or positive"))]
    pub reward: f64,
    #[validate(length(min = 1, max = 255, message = "location is required (max 255 characters)"))]
    pub location: String,
    #[validate(length(min = 1, max = 100, message = "category is required (max 100 characters)"))]
    pub category: String,
    #[validate(length(min = 1, max = 255, message = "businessName is required (max 255 characters)"))]
    pub business_name: String,
    #[serde(default)]
    pub survey_questions: Vec<SurveyQuestion>,
}

impl MissionDraft {
    /// Trims text fields so whitespace-only input fails the length checks.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.deadline,
            &mut self.location,
            &mut self.category,
            &mut self.business_name,
        ] {
            *field = field.trim().to_string();
        }
        self
    }
}

/// Admin partial edit; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MissionPatch {
    #[validate(length(min = 1, max = 255, message = "title cannot be blank (max 255 characters)"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "description cannot be blank (max 5000 characters)"))]
    pub description: Option<String>,
    #[validate(custom = "validate_deadline")]
    pub deadline: Option<String>,
    #[validate(range(min = 0.0, message = "reward must be zero or positive"))]
    pub reward: Option<f64>,
    #[validate(length(min = 1, max = 255, message = "location cannot be blank (max 255 characters)"))]
    pub location: Option<String>,
    #[validate(length(min = 1, max = 100, message = "category cannot be blank (max 100 characters)"))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 255, message = "businessName cannot be blank (max 255 characters)"))]
    pub business_name: Option<String>,
    pub status: Option<MissionStatus>,
}

impl MissionPatch {
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.deadline,
            &mut self.location,
            &mut self.category,
            &mut self.business_name,
        ] {
            if let Some(value) = field.as_mut() {
                *value = value.trim().to_string();
            }
        }
        self
    }
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM` and bare dates
/// (a bare date means the end of that day, UTC).
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
}

fn validate_deadline(raw: &str) -> Result<(), ValidationError> {
    if parse_deadline(raw).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("deadline");
    err.message = Some("deadline must be a valid date".into());
    Err(err)
}
