use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

pub const MAX_QUESTIONS: usize = 100;
pub const MAX_RATING: u8 = 10;
pub const MAX_IMAGES: u8 = 10;
pub const MAX_AUDIO_SECONDS: u32 = 600;

/// One survey question as stored in `missions.survey_questions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    MultipleChoice {
        options: Vec<String>,
    },
    Checkboxes {
        options: Vec<String>,
    },
    Rating {
        #[serde(rename = "maxRating", default = "default_max_rating")]
        max_rating: u8,
    },
    ImageUpload {
        #[serde(rename = "maxImages", default = "default_max_images")]
        max_images: u8,
    },
    GpsCapture,
    AudioRecording {
        #[serde(rename = "maxDurationSeconds", default = "default_max_duration")]
        max_duration_seconds: u32,
    },
    SectionHeader,
    InfoText,
}

fn default_max_rating() -> u8 { 5 }
fn default_max_images() -> u8 { 1 }
fn default_max_duration() -> u32 { 120 }

impl SurveyQuestion {
    /// Headers and info blocks carry no answer.
    pub fn is_answerable(&self) -> bool {
        !matches!(self.kind, QuestionKind::SectionHeader | QuestionKind::InfoText)
    }
}

/// Validates a full question list, keyed like `questions[2].options`.
pub fn validate_questions(questions: &[SurveyQuestion]) -> Result<(), BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();

    if questions.len() > MAX_QUESTIONS {
        errors.insert(
            "questions".to_string(),
            format!("a survey holds at most {MAX_QUESTIONS} questions"),
        );
    }

    let mut seen = HashSet::new();
    for (i, q) in questions.iter().enumerate() {
        let key = |field: &str| format!("questions[{i}].{field}");

        if q.id.trim().is_empty() {
            errors.insert(key("id"), "question id is required".into());
        } else if !seen.insert(q.id.as_str()) {
            errors.insert(key("id"), format!("duplicate question id '{}'", q.id));
        }

        if q.text.trim().is_empty() {
            errors.insert(key("text"), "question text is required".into());
        }

        match &q.kind {
            QuestionKind::MultipleChoice { options } | QuestionKind::Checkboxes { options } => {
                if options.len() < 2 {
                    errors.insert(key("options"), "at least two options are required".into());
                } else if options.iter().any(|o| o.trim().is_empty()) {
                    errors.insert(key("options"), "options cannot be blank".into());
                }
            }
            QuestionKind::Rating { max_rating } => {
                if !(2..=MAX_RATING).contains(max_rating) {
                    errors.insert(
                        key("maxRating"),
                        format!("maxRating must be between 2 and {MAX_RATING}"),
                    );
                }
            }
            QuestionKind::ImageUpload { max_images } => {
                if !(1..=MAX_IMAGES).contains(max_images) {
                    errors.insert(
                        key("maxImages"),
                        format!("maxImages must be between 1 and {MAX_IMAGES}"),
                    );
                }
            }
            QuestionKind::AudioRecording { max_duration_seconds } => {
                if !(1..=MAX_AUDIO_SECONDS).contains(max_duration_seconds) {
                    errors.insert(
                        key("maxDurationSeconds"),
                        format!("maxDurationSeconds must be between 1 and {MAX_AUDIO_SECONDS}"),
                    );
                }
            }
            QuestionKind::Text
            | QuestionKind::GpsCapture
            | QuestionKind::SectionHeader
            | QuestionKind::InfoText => {}
        }

        if q.is_required && !q.is_answerable() {
            errors.insert(key("isRequired"), "headers and info text cannot be required".into());
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Decodes a stored survey document; a malformed document reads as empty.
pub fn decode_questions(value: &serde_json::Value) -> Vec<SurveyQuestion> {
    if value.is_null() {
        return Vec::new();
    }
    match serde_json::from_value(value.clone()) {
        Ok(questions) => questions,
        Err(e) => {
            tracing::warn!(error = %e, "stored survey questions are malformed, treating as empty");
            Vec::new()
        }
    }
}

pub fn encode_questions(questions: &[SurveyQuestion]) -> serde_json::Value {
    serde_json::to_value(questions).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Vec<SurveyQuestion> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_every_question_kind() {
        let questions = parse(json!([
            {"id": "h1", "type": "section_header", "text": "Entrance"},
            {"id": "q1", "type": "text", "text": "Describe the greeting", "isRequired": true},
            {"id": "q2", "type": "multiple_choice", "text": "Was it clean?", "options": ["Yes", "No"]},
            {"id": "q3", "type": "checkboxes", "text": "Staff present", "options": ["Cashier", "Manager"]},
            {"id": "q4", "type": "rating", "text": "Overall", "maxRating": 10},
            {"id": "q5", "type": "image_upload", "text": "Shelf photo", "maxImages": 3},
            {"id": "q6", "type": "gps_capture", "text": "Check in"},
            {"id": "q7", "type": "audio_recording", "text": "Pitch", "maxDurationSeconds": 90},
            {"id": "i1", "type": "info_text", "text": "Thanks!"}
        ]));

        assert_eq!(questions.len(), 9);
        assert_eq!(questions[4].kind, QuestionKind::Rating { max_rating: 10 });
        assert_eq!(questions[5].kind, QuestionKind::ImageUpload { max_images: 3 });
        assert!(questions[1].is_required);
        assert!(!questions[0].is_answerable());
        assert!(validate_questions(&questions).is_ok());
    }

    #[test]
    fn serializes_with_type_tag_and_camel_case() {
        let q = SurveyQuestion {
            id: "q1".into(),
            text: "Rate it".into(),
            is_required: true,
            kind: QuestionKind::Rating { max_rating: 5 },
        };
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "rating");
        assert_eq!(value["maxRating"], 5);
        assert_eq!(value["isRequired"], true);
    }

    #[test]
    fn reports_per_question_errors() {
        let questions = parse(json!([
            {"id": "q1", "type": "multiple_choice", "text": "Pick", "options": ["only one"]},
            {"id": "q1", "type": "rating", "text": "Rate", "maxRating": 50},
            {"id": "q3", "type": "text", "text": "  "},
            {"id": "q4", "type": "info_text", "text": "Note", "isRequired": true}
        ]));

        let errors = validate_questions(&questions).unwrap_err();
        assert!(errors.contains_key("questions[0].options"));
        assert!(errors.contains_key("questions[1].id"));
        assert!(errors.contains_key("questions[1].maxRating"));
        assert!(errors.contains_key("questions[2].text"));
        assert!(errors.contains_key("questions[3].isRequired"));
    }

    #[test]
    fn unknown_kind_is_rejected_on_write() {
        let result: Result<Vec<SurveyQuestion>, _> =
            serde_json::from_value(json!([{"id": "x", "type": "video", "text": "?"}]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_stored_document_reads_as_empty() {
        assert!(decode_questions(&json!({"not": "a list"})).is_empty());
        assert!(decode_questions(&serde_json::Value::Null).is_empty());
        assert_eq!(
            decode_questions(&json!([{"id": "q", "type": "text", "text": "Hi"}])).len(),
            1
        );
    }
}
