//! Field-by-field sanitisation of configuration updates.
//!
//! An update is an untrusted JSON object. Each recognised field is checked on
//! its own; a field that is missing keeps the prior value and a field that is
//! present but unusable falls back to the prior value and is reported as a
//! [`Correction`]. Only an update that is not an object at all is rejected.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    Questions, SqdQuestion, SurveyConfig, INITIAL_VERSION, MAX_ACTIVE_YEAR, MAX_VERSION_JUMP,
    MIN_ACTIVE_YEAR,
};
use crate::error::{Error, Result};

/// A field of an update that was replaced by its last-known-good value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// Dotted path of the field, e.g. `ui.title`.
    pub field: String,
    /// Why the submitted value was not used.
    pub reason: &'static str,
}

/// Result of sanitising an update against the prior configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    /// The merged configuration. Its `version` is still the prior version.
    pub config: SurveyConfig,
    /// Version explicitly requested by the caller, if a usable one was given.
    pub requested_version: Option<i64>,
    /// Fields that fell back to their prior value.
    pub corrections: Vec<Correction>,
}

/// Merge `update` over `prior`, validating every field independently.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `update` is not a JSON object.
pub fn sanitize_update(prior: &SurveyConfig, update: &Value) -> Result<Sanitized> {
    let Some(fields) = update.as_object() else {
        return Err(Error::invalid_argument("configuration update must be an object"));
    };

    let mut config = prior.clone();
    let mut corrections = Vec::new();
    let mut requested_version = None;

    for (key, value) in fields {
        match key.as_str() {
            "activeYear" => match parse_year(value) {
                Some(year) => config.active_year = year,
                None => corrections.push(correction("activeYear", "not a year between 2015 and 2040")),
            },
            "ui" => match value.as_object() {
                Some(ui) => {
                    merge_text(&mut config.ui.title, ui.get("title"), "ui.title", &mut corrections);
                    merge_text(&mut config.ui.intro, ui.get("intro"), "ui.intro", &mut corrections);
                }
                None => corrections.push(correction("ui", "not an object")),
            },
            "stepLabels" => match value.as_array() {
                Some(labels) => merge_step_labels(&mut config.step_labels, labels, &mut corrections),
                None => corrections.push(correction("stepLabels", "not a list")),
            },
            "questions" => match value {
                Value::Null => config.questions = None,
                Value::Object(questions) => {
                    let base = prior.questions.clone().unwrap_or_default();
                    config.questions = Some(merge_questions(&base, questions, &mut corrections)?);
                }
                _ => corrections.push(correction("questions", "not an object or null")),
            },
            "version" => match value.as_i64().filter(|v| *v >= INITIAL_VERSION) {
                Some(version) if version > prior.version.saturating_add(MAX_VERSION_JUMP) => {
                    corrections.push(correction("version", "too far ahead of the stored version"));
                }
                Some(version) => requested_version = Some(version),
                None => corrections.push(correction("version", "not a positive integer")),
            },
            other => debug!(field = other, "Ignoring unknown configuration field"),
        }
    }

    for c in &corrections {
        warn!(field = %c.field, reason = c.reason, "Configuration field fell back to prior value");
    }

    Ok(Sanitized {
        config,
        requested_version,
        corrections,
    })
}

fn correction(field: impl Into<String>, reason: &'static str) -> Correction {
    Correction {
        field: field.into(),
        reason,
    }
}

/// Accepts integers and numeric strings (form inputs send both).
fn parse_year(value: &Value) -> Option<i32> {
    let year = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let year = i32::try_from(year).ok()?;
    (MIN_ACTIVE_YEAR..=MAX_ACTIVE_YEAR)
        .contains(&year)
        .then_some(year)
}

fn non_empty_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn merge_text(
    target: &mut String,
    value: Option<&Value>,
    field: &str,
    corrections: &mut Vec<Correction>,
) {
    let Some(value) = value else {
        return;
    };
    match non_empty_text(value) {
        Some(text) => *target = text,
        None => corrections.push(correction(field, "empty or not text")),
    }
}

/// Labels are positional; a blank entry keeps the prior label at that step.
fn merge_step_labels(target: &mut [String], labels: &[Value], corrections: &mut Vec<Correction>) {
    for (i, value) in labels.iter().enumerate() {
        let Some(slot) = target.get_mut(i) else {
            corrections.push(correction("stepLabels", "more labels than steps"));
            break;
        };
        match non_empty_text(value) {
            Some(text) => *slot = text,
            None => corrections.push(correction(format!("stepLabels[{i}]"), "empty or not text")),
        }
    }
}

fn merge_questions(
    base: &Questions,
    update: &Map<String, Value>,
    corrections: &mut Vec<Correction>,
) -> Result<Questions> {
    let mut merged = base.clone();

    if let Some(section) = update.get("step0") {
        merged.step0 = merge_section(&base.step0, section, "questions.step0", corrections)?;
    }
    if let Some(section) = update.get("step1") {
        merged.step1 = merge_section(&base.step1, section, "questions.step1", corrections)?;
    }
    if let Some(section) = update.get("step3") {
        merged.step3 = merge_section(&base.step3, section, "questions.step3", corrections)?;
    }
    if let Some(sqd) = update.get("sqd") {
        match sqd.as_array() {
            Some(items) if items.len() == base.sqd.len() => {
                merged.sqd = merge_sqd(&base.sqd, items, corrections);
            }
            _ => corrections.push(correction("questions.sqd", "must list every SQD statement")),
        }
    }

    Ok(merged)
}

/// Overlay the text keys of `update` onto a flat section of question text.
fn merge_section<T>(
    base: &T,
    update: &Value,
    path: &str,
    corrections: &mut Vec<Correction>,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let Some(update) = update.as_object() else {
        corrections.push(correction(path, "not an object"));
        return clone_via_json(base);
    };

    let mut section = match serde_json::to_value(base)? {
        Value::Object(map) => map,
        _ => return Err(Error::internal(format!("{path} is not a flat section"))),
    };
    for (key, value) in update {
        let Some(slot) = section.get_mut(key) else {
            debug!(field = %format!("{path}.{key}"), "Ignoring unknown question key");
            continue;
        };
        match non_empty_text(value) {
            Some(text) => *slot = Value::String(text),
            None => corrections.push(correction(format!("{path}.{key}"), "empty or not text")),
        }
    }
    Ok(serde_json::from_value(Value::Object(section))?)
}

fn clone_via_json<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

/// Ids are fixed by position; only labels are taken from the update.
fn merge_sqd(base: &[SqdQuestion], items: &[Value], corrections: &mut Vec<Correction>) -> Vec<SqdQuestion> {
    base.iter()
        .zip(items)
        .enumerate()
        .map(|(i, (prior, item))| {
            let label = item.get("label").and_then(non_empty_text);
            if label.is_none() {
                corrections.push(correction(format!("questions.sqd[{i}].label"), "empty or not text"));
            }
            SqdQuestion {
                id: prior.id.clone(),
                label: label.unwrap_or_else(|| prior.label.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{UiText, STEP_LABELS};
    use serde_json::json;

    fn prior() -> SurveyConfig {
        let mut config = SurveyConfig::default();
        config.version = 3;
        config.active_year = 2024;
        config.ui.title = "Prior Title".to_string();
        config
    }

    #[test]
    fn test_rejects_non_object() {
        let err = sanitize_update(&prior(), &json!(["title"])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_empty_update_keeps_everything() {
        let sanitized = sanitize_update(&prior(), &json!({})).unwrap();
        assert_eq!(sanitized.config, prior());
        assert!(sanitized.corrections.is_empty());
        assert!(sanitized.requested_version.is_none());
    }

    #[test]
    fn test_valid_title() {
        let sanitized = sanitize_update(&prior(), &json!({ "ui": { "title": "  New Title " } })).unwrap();
        assert_eq!(sanitized.config.ui.title, "New Title");
        assert_eq!(sanitized.config.ui.intro, UiText::default().intro);
        assert!(sanitized.corrections.is_empty());
    }

    #[test]
    fn test_empty_title_falls_back_to_prior() {
        let sanitized = sanitize_update(&prior(), &json!({ "ui": { "title": "" } })).unwrap();
        assert_eq!(sanitized.config.ui.title, "Prior Title");
        assert_eq!(sanitized.corrections.len(), 1);
        assert_eq!(sanitized.corrections[0].field, "ui.title");
    }

    #[test]
    fn test_bad_field_does_not_block_good_field() {
        let update = json!({ "activeYear": "next year", "ui": { "intro": "Tell us how we did." } });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        assert_eq!(sanitized.config.active_year, 2024);
        assert_eq!(sanitized.config.ui.intro, "Tell us how we did.");
        assert_eq!(sanitized.corrections.len(), 1);
        assert_eq!(sanitized.corrections[0].field, "activeYear");
    }

    #[test]
    fn test_active_year_accepts_numeric_string() {
        let sanitized = sanitize_update(&prior(), &json!({ "activeYear": "2026" })).unwrap();
        assert_eq!(sanitized.config.active_year, 2026);
    }

    #[test]
    fn test_active_year_out_of_range() {
        let sanitized = sanitize_update(&prior(), &json!({ "activeYear": 1999 })).unwrap();
        assert_eq!(sanitized.config.active_year, 2024);
        assert_eq!(sanitized.corrections.len(), 1);
    }

    #[test]
    fn test_step_labels_positional_merge() {
        let update = json!({ "stepLabels": ["About you", "", 7] });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        let labels = &sanitized.config.step_labels;
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "About you");
        assert_eq!(labels[1], STEP_LABELS[1]);
        assert_eq!(labels[2], STEP_LABELS[2]);
        assert_eq!(sanitized.corrections.len(), 2);
    }

    #[test]
    fn test_step_labels_extra_entries_ignored() {
        let update = json!({ "stepLabels": ["a", "b", "c", "d", "e", "f"] });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        assert_eq!(sanitized.config.step_labels, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(sanitized.corrections.len(), 1);
    }

    #[test]
    fn test_questions_null_resets_to_builtin() {
        let mut base = prior();
        base.questions = Some(Questions::default());
        let sanitized = sanitize_update(&base, &json!({ "questions": null })).unwrap();
        assert!(sanitized.config.questions.is_none());
    }

    #[test]
    fn test_questions_section_merge() {
        let update = json!({
            "questions": {
                "step0": { "region": "Barangay", "date": "  ", "unknown": "x" },
                "step3": { "emailLabel": "E-mail (optional)" }
            }
        });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        let questions = sanitized.config.questions.unwrap();
        assert_eq!(questions.step0.region, "Barangay");
        assert_eq!(questions.step0.date, "Date");
        assert_eq!(questions.step3.email_label, "E-mail (optional)");
        assert_eq!(questions.step1, Questions::default().step1);
        assert_eq!(sanitized.corrections.len(), 1);
        assert_eq!(sanitized.corrections[0].field, "questions.step0.date");
    }

    #[test]
    fn test_sqd_requires_full_list() {
        let update = json!({ "questions": { "sqd": [{ "label": "only one" }] } });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        assert_eq!(sanitized.config.questions.unwrap().sqd, Questions::default().sqd);
        assert_eq!(sanitized.corrections[0].field, "questions.sqd");
    }

    #[test]
    fn test_sqd_ids_are_fixed() {
        let mut items: Vec<Value> = (0..9).map(|_| json!({ "label": "" })).collect();
        items[4] = json!({ "id": "hijacked", "label": "SQD4. Website was useful." });
        let update = json!({ "questions": { "sqd": items } });
        let sanitized = sanitize_update(&prior(), &update).unwrap();
        let sqd = sanitized.config.questions.unwrap().sqd;
        assert_eq!(sqd[4].id, "sqd4");
        assert_eq!(sqd[4].label, "SQD4. Website was useful.");
        assert_eq!(sqd[0].label, Questions::default().sqd[0].label);
        assert_eq!(sanitized.corrections.len(), 8);
    }

    #[test]
    fn test_requested_version() {
        let sanitized = sanitize_update(&prior(), &json!({ "version": 10 })).unwrap();
        assert_eq!(sanitized.requested_version, Some(10));
        assert_eq!(sanitized.config.version, 3);

        let sanitized = sanitize_update(&prior(), &json!({ "version": -2 })).unwrap();
        assert!(sanitized.requested_version.is_none());
        assert_eq!(sanitized.corrections[0].field, "version");
    }

    #[test]
    fn test_requested_version_too_far_ahead() {
        let sanitized = sanitize_update(&prior(), &json!({ "version": i64::MAX })).unwrap();
        assert!(sanitized.requested_version.is_none());
        assert_eq!(sanitized.corrections[0].field, "version");

        let limit = 3 + MAX_VERSION_JUMP;
        let sanitized = sanitize_update(&prior(), &json!({ "version": limit })).unwrap();
        assert_eq!(sanitized.requested_version, Some(limit));
    }
}
