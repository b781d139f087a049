//! The ARTA client-satisfaction form as filled in by a client.
//!
//! [`FormState`] is what the survey front end hands to the coordinator. It is
//! turned into the canonical [`Answers`] set of a submission, with the SQD
//! ratings flattened to `sqd0` .. `sqd8`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::submission::{AnswerValue, Answers};
use crate::survey::SQD_QUESTIONS;

/// CC1 choice meaning "I do not know what a CC is and did not see one".
pub const CC1_UNAWARE: &str = "4";

/// CC2 choice for N/A.
pub const CC2_NOT_APPLICABLE: &str = "5";

/// CC3 choice for N/A.
pub const CC3_NOT_APPLICABLE: &str = "4";

/// One client's answers to the form.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormState {
    /// Generated once per form session; identifies the submitter when no
    /// account number is given.
    pub submission_id: String,
    /// Utility account number, when the client provides one.
    pub account_number: String,
    pub client_type: String,
    pub date: String,
    pub sex: String,
    pub age: String,
    pub region: String,
    pub service_availed: String,
    pub cc1: String,
    pub cc2: String,
    pub cc3: String,
    /// SQD rating per question id (`"1"` strongly disagree .. `"5"`, `"6"` N/A).
    pub sqd: BTreeMap<String, String>,
    pub suggestions: String,
    pub email: String,
}

impl FormState {
    /// Start a new form session with a fresh submission id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            submission_id: format!("sub_{}", Uuid::new_v4()),
            ..Self::default()
        }
    }

    /// The identifying value a fingerprint is derived from.
    ///
    /// Prefers the account number so the same client cannot be counted twice;
    /// falls back to the per-session submission id.
    #[must_use]
    pub fn identity(&self) -> &str {
        let account = self.account_number.trim();
        if account.is_empty() {
            self.submission_id.trim()
        } else {
            account
        }
    }

    /// Apply the Citizen's Charter rule: a client unaware of the CC answers
    /// N/A to both CC2 and CC3.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.cc1 == CC1_UNAWARE {
            self.cc2 = CC2_NOT_APPLICABLE.to_string();
            self.cc3 = CC3_NOT_APPLICABLE.to_string();
        }
        self
    }

    /// Canonical answer set. Blank answers are omitted.
    #[must_use]
    pub fn to_answers(&self) -> Answers {
        let mut answers = Answers::new();
        let mut put = |key: &str, value: &str| {
            let value = value.trim();
            if !value.is_empty() {
                answers.insert(key, value);
            }
        };

        put("accountNumber", &self.account_number);
        put("clientType", &self.client_type);
        put("date", &self.date);
        put("sex", &self.sex);
        put("region", &self.region);
        put("serviceAvailed", &self.service_availed);
        put("cc1", &self.cc1);
        put("cc2", &self.cc2);
        put("cc3", &self.cc3);
        put("suggestions", &self.suggestions);
        put("email", &self.email);
        for (id, _) in SQD_QUESTIONS {
            if let Some(rating) = self.sqd.get(id) {
                put(id, rating);
            }
        }

        match self.age.trim().parse::<i64>() {
            Ok(age) => answers.insert("age", AnswerValue::Integer(age)),
            Err(_) if !self.age.trim().is_empty() => answers.insert("age", self.age.trim()),
            Err(_) => {}
        }
        answers
    }
}
