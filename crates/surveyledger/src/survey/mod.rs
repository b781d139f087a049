//! The survey configuration document.
//!
//! There is exactly one live [`SurveyConfig`] at a time. It carries the
//! presentation text of the ARTA client-satisfaction form together with the
//! `activeYear` and a monotonically increasing `version`, both of which are
//! stamped onto every committed submission.

mod sanitize;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use sanitize::{sanitize_update, Correction, Sanitized};

/// First year the admin panel offers.
pub const MIN_ACTIVE_YEAR: i32 = 2015;

/// Last year the admin panel offers.
pub const MAX_ACTIVE_YEAR: i32 = 2040;

/// Version of a configuration that has never been written.
pub const INITIAL_VERSION: i64 = 1;

/// Furthest an explicitly requested version may jump ahead of the stored one.
pub const MAX_VERSION_JUMP: i64 = 1_000_000;

/// The five ARTA form steps.
pub const STEP_LABELS: [&str; 5] = [
    "Client information",
    "Citizen\u{2019}s Charter",
    "Service Quality (SQD)",
    "Suggestions",
    "Review",
];

/// Service Quality Dimension questions, in form order.
pub const SQD_QUESTIONS: [(&str, &str); 9] = [
    ("sqd0", "SQD0. I am satisfied with the service that I availed."),
    ("sqd1", "SQD1. I spent a reasonable amount of time for my transaction."),
    (
        "sqd2",
        "SQD2. The office followed the transaction\u{2019}s requirements and steps based on the information provided.",
    ),
    (
        "sqd3",
        "SQD3. The steps (including payment) I needed to do for my transaction were easy and simple.",
    ),
    (
        "sqd4",
        "SQD4. I easily found information about my transaction from the office\u{2019}s website.",
    ),
    (
        "sqd5",
        "SQD5. I paid a reasonable amount of fees for my transaction. (If service was free, mark the \u{2018}N/A\u{2019} column)",
    ),
    ("sqd6", "SQD6. I am confident my online transaction was secure."),
    (
        "sqd7",
        "SQD7. The office\u{2019}s online support was available, and (if asked questions) online support was quick to respond.",
    ),
    (
        "sqd8",
        "SQD8. I got what I needed from the government office, or (if denied) denial of request was sufficiently explained to me.",
    ),
];

const DEFAULT_TITLE: &str = "Client Satisfaction Form";

const DEFAULT_INTRO: &str = "This Client Satisfaction Measurement (CSM) tracks the customer \
experience of government offices. Your feedback on your recently concluded transaction will help \
this office provide a better service. Personal information shared will be kept confidential and \
you always have the option not to answer this form.";

/// The live survey configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyConfig {
    /// Incremented on every accepted update. Starts at 1.
    pub version: i64,
    /// Reporting year the office is collecting for.
    pub active_year: i32,
    /// Title and introduction shown on the landing page.
    pub ui: UiText,
    /// One label per form step.
    pub step_labels: Vec<String>,
    /// Custom question text. `None` means the built-in ARTA wording.
    pub questions: Option<Questions>,
}

/// Landing page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiText {
    /// Form title.
    pub title: String,
    /// Introductory paragraph.
    pub intro: String,
}

/// Per-step question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questions {
    /// Client information step.
    pub step0: ClientInfoQuestions,
    /// Citizen's Charter step.
    pub step1: CharterQuestions,
    /// Service Quality Dimension statements.
    pub sqd: Vec<SqdQuestion>,
    /// Suggestions step.
    pub step3: SuggestionQuestions,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfoQuestions {
    pub client_type: String,
    pub date: String,
    pub sex: String,
    pub age: String,
    pub region: String,
    pub service_availed: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharterQuestions {
    pub cc1_label: String,
    pub cc1_help: String,
    pub cc2_label: String,
    pub cc2_help: String,
    pub cc3_label: String,
    pub cc3_help: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionQuestions {
    pub suggestions_label: String,
    pub email_label: String,
}

/// A single SQD statement. The `id` is fixed; only the label is editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqdQuestion {
    /// Stable answer key (`sqd0` .. `sqd8`).
    pub id: String,
    /// Statement shown to the client.
    pub label: String,
}

/// The configuration values a submission is stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStamp {
    /// `activeYear` at commit time.
    pub active_year: i32,
    /// `version` at commit time.
    pub config_version: i64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            version: INITIAL_VERSION,
            active_year: current_year(),
            ui: UiText::default(),
            step_labels: STEP_LABELS.iter().map(ToString::to_string).collect(),
            questions: None,
        }
    }
}

impl Default for UiText {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            intro: DEFAULT_INTRO.to_string(),
        }
    }
}

impl Default for Questions {
    fn default() -> Self {
        Self {
            step0: ClientInfoQuestions::default(),
            step1: CharterQuestions::default(),
            sqd: SQD_QUESTIONS
                .iter()
                .map(|(id, label)| SqdQuestion {
                    id: (*id).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
            step3: SuggestionQuestions::default(),
        }
    }
}

impl Default for ClientInfoQuestions {
    fn default() -> Self {
        Self {
            client_type: "Client type".to_string(),
            date: "Date".to_string(),
            sex: "Sex".to_string(),
            age: "Age".to_string(),
            region: "Region of residence".to_string(),
            service_availed: "Service availed".to_string(),
        }
    }
}

impl Default for CharterQuestions {
    fn default() -> Self {
        Self {
            cc1_label: "CC1: Awareness of the Citizen's Charter (CC)".to_string(),
            cc1_help: "Which of the following best describes your awareness of a CC?".to_string(),
            cc2_label: "CC2: Visibility of this office's CC".to_string(),
            cc2_help: "If aware of CC (answered 1\u{2013}3 in CC1), would you say that the CC of this office was\u{2026}?".to_string(),
            cc3_label: "CC3: Helpfulness of the CC".to_string(),
            cc3_help: "If aware of CC (answered 1\u{2013}3 in CC1), how much did the CC help you in your transaction?".to_string(),
        }
    }
}

impl Default for SuggestionQuestions {
    fn default() -> Self {
        Self {
            suggestions_label: "Suggestions on how we can further improve our services"
                .to_string(),
            email_label: "Email address".to_string(),
        }
    }
}

impl SurveyConfig {
    /// The values a submission committed against this config is stamped with.
    #[must_use]
    pub fn stamp(&self) -> ConfigStamp {
        ConfigStamp {
            active_year: self.active_year,
            config_version: self.version,
        }
    }

    /// Question text to render, falling back to the built-in wording.
    #[must_use]
    pub fn effective_questions(&self) -> Questions {
        self.questions.clone().unwrap_or_default()
    }

    /// Rebuild a configuration from a stored document.
    ///
    /// Documents written by older releases may be partial or carry fields of
    /// the pre-ARTA survey. Every field is merged over the defaults the same
    /// way an admin update is, and the stored `version` is kept as-is.
    #[must_use]
    pub fn recover(document: &serde_json::Value) -> Self {
        let legacy = is_legacy_document(document);
        if let Ok(mut config) = serde_json::from_value::<Self>(document.clone()) {
            if config.step_labels.len() == STEP_LABELS.len() {
                if legacy {
                    config.ui = UiText::default();
                }
                return config;
            }
        }

        let base = Self::default();
        let mut config = match sanitize_update(&base, document) {
            Ok(sanitized) => sanitized.config,
            Err(_) => return base,
        };
        config.version = document
            .get("version")
            .and_then(serde_json::Value::as_i64)
            .filter(|v| *v >= INITIAL_VERSION)
            .unwrap_or(INITIAL_VERSION);

        if legacy {
            config.ui = UiText::default();
        }
        config
    }
}

/// Documents from the pre-ARTA survey carried experience/topic pickers.
fn is_legacy_document(document: &serde_json::Value) -> bool {
    document.get("experienceChoices").is_some_and(serde_json::Value::is_array)
        || document.get("topics").is_some_and(serde_json::Value::is_array)
        || document.get("feedback").is_some_and(serde_json::Value::is_object)
}

/// The version an accepted update is written under.
///
/// An explicitly requested version is honoured only when it moves the counter
/// forward; otherwise the prior version is incremented.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the counter cannot move forward
/// without overflowing.
pub fn next_version(prior: i64, requested: Option<i64>) -> Result<i64> {
    match requested {
        Some(requested) if requested > prior => Ok(requested),
        _ => prior
            .checked_add(1)
            .ok_or_else(|| Error::invalid_argument("configuration version is exhausted")),
    }
}

/// The current calendar year, clamped to the range the admin panel offers.
#[must_use]
pub fn current_year() -> i32 {
    Utc::now().year().clamp(MIN_ACTIVE_YEAR, MAX_ACTIVE_YEAR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_version() {
        assert_eq!(next_version(1, None).unwrap(), 2);
        assert_eq!(next_version(3, Some(10)).unwrap(), 10);
        assert_eq!(next_version(10, Some(4)).unwrap(), 11);
        assert_eq!(next_version(10, Some(10)).unwrap(), 11);
    }

    #[test]
    fn test_next_version_overflow() {
        let err = next_version(i64::MAX, None).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
        assert!(next_version(i64::MAX, Some(5)).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SurveyConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.step_labels.len(), 5);
        assert_eq!(config.ui.title, "Client Satisfaction Form");
        assert!(config.questions.is_none());
        assert!((MIN_ACTIVE_YEAR..=MAX_ACTIVE_YEAR).contains(&config.active_year));
    }

    #[test]
    fn test_default_questions_cover_all_sqd() {
        let questions = Questions::default();
        assert_eq!(questions.sqd.len(), 9);
        assert_eq!(questions.sqd[0].id, "sqd0");
        assert_eq!(questions.sqd[8].id, "sqd8");
    }

    #[test]
    fn test_stamp() {
        let mut config = SurveyConfig::default();
        config.version = 4;
        config.active_year = 2024;
        let stamp = config.stamp();
        assert_eq!(stamp.config_version, 4);
        assert_eq!(stamp.active_year, 2024);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let value = serde_json::to_value(SurveyConfig::default()).unwrap();
        assert!(value.get("activeYear").is_some());
        assert!(value.get("stepLabels").is_some());
        assert!(value.get("questions").unwrap().is_null());

        let questions = serde_json::to_value(Questions::default()).unwrap();
        assert!(questions["step0"].get("serviceAvailed").is_some());
        assert!(questions["step1"].get("cc1Label").is_some());
        assert!(questions["step3"].get("emailLabel").is_some());
    }

    #[test]
    fn test_effective_questions_defaults() {
        let config = SurveyConfig::default();
        assert_eq!(config.effective_questions(), Questions::default());
    }

    #[test]
    fn test_recover_round_trips_valid_document() {
        let mut config = SurveyConfig::default();
        config.version = 7;
        config.ui.title = "Water District CSM".to_string();
        let document = serde_json::to_value(&config).unwrap();
        assert_eq!(SurveyConfig::recover(&document), config);
    }

    #[test]
    fn test_recover_partial_document() {
        let document = json!({ "version": 3, "ui": { "title": "Kept" } });
        let config = SurveyConfig::recover(&document);
        assert_eq!(config.version, 3);
        assert_eq!(config.ui.title, "Kept");
        assert_eq!(config.ui.intro, UiText::default().intro);
        assert_eq!(config.step_labels.len(), 5);
    }

    #[test]
    fn test_recover_short_step_labels() {
        let document = json!({
            "version": 2,
            "activeYear": 2023,
            "ui": { "title": "T", "intro": "I" },
            "stepLabels": ["Only one"],
            "questions": null
        });
        let config = SurveyConfig::recover(&document);
        assert_eq!(config.step_labels.len(), 5);
        assert_eq!(config.step_labels[0], "Only one");
        assert_eq!(config.step_labels[1], STEP_LABELS[1]);
        assert_eq!(config.active_year, 2023);
    }

    #[test]
    fn test_recover_legacy_document_resets_ui() {
        let document = json!({
            "ui": { "title": "Old water survey" },
            "experienceChoices": ["good", "bad"]
        });
        let config = SurveyConfig::recover(&document);
        assert_eq!(config.ui, UiText::default());
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_recover_complete_legacy_document_resets_ui() {
        let mut config = SurveyConfig::default();
        config.version = 5;
        config.ui.title = "Old water survey".to_string();
        let mut document = serde_json::to_value(&config).unwrap();
        document["topics"] = json!(["billing", "repairs"]);

        let recovered = SurveyConfig::recover(&document);
        assert_eq!(recovered.ui, UiText::default());
        assert_eq!(recovered.version, 5);
        assert_eq!(recovered.step_labels, config.step_labels);
    }

    #[test]
    fn test_recover_garbage_falls_back_to_default() {
        let config = SurveyConfig::recover(&json!("not an object"));
        assert_eq!(config.version, 1);
        assert_eq!(config.ui, UiText::default());
    }
}
