use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::survey::SurveyQuestion;

/// One answered question inside `reports.answers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    /// Free-form: text, chosen option(s), rating, media URLs or coordinates.
    #[serde(default)]
    pub response: serde_json::Value,
}

impl ReportAnswer {
    pub fn has_response(&self) -> bool {
        match &self.response {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => true,
        }
    }
}

/// Checks answers against the mission's survey before they are stored.
pub fn validate_answers(
    answers: &[ReportAnswer],
    survey: &[SurveyQuestion],
) -> Result<(), BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();

    if answers.is_empty() {
        errors.insert("answers".to_string(), "at least one answer is required".to_string());
        return Err(errors);
    }

    for (i, answer) in answers.iter().enumerate() {
        if answer.question_id.trim().is_empty() {
            errors.insert(
                format!("answers[{i}].questionId"),
                "questionId is required".to_string(),
            );
        }
    }

    let by_id: HashMap<&str, &ReportAnswer> = answers
        .iter()
        .map(|a| (a.question_id.as_str(), a))
        .collect();

    for question in survey.iter().filter(|q| q.is_required && q.is_answerable()) {
        let answered = by_id
            .get(question.id.as_str())
            .is_some_and(|a| a.has_response());
        if !answered {
            errors.insert(
                format!("answers.{}", question.id),
                format!("'{}' requires an answer", question.text),
            );
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Decodes stored answers; a malformed document reads as empty.
pub fn decode_answers(value: &serde_json::Value) -> Vec<ReportAnswer> {
    if value.is_null() {
        return Vec::new();
    }
    match serde_json::from_value(value.clone()) {
        Ok(answers) => answers,
        Err(e) => {
            tracing::warn!(error = %e, "stored report answers are malformed, treating as empty");
            Vec::new()
        }
    }
}

pub fn encode_answers(answers: &[ReportAnswer]) -> serde_json::Value {
    serde_json::to_value(answers).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}
