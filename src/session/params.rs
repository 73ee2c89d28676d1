use serde::{Deserialize, Serialize};

use crate::dialogue::DialogueMode;
use crate::error::{InterviewError, Result};

pub const DEFAULT_TOPIC: &str = "general";
pub const DEFAULT_ROLE: &str = "generic";
pub const DEFAULT_LEVEL: &str = "entry";
pub const DEFAULT_USER_NAME: &str = "there";

/// Longest accepted value for any free-text parameter
const MAX_FIELD_LEN: usize = 200;

/// Session-start request as sent by the client (query string or JSON)
///
/// Absent and empty values both mean "use the default".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub topic: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub company: Option<String>,
    #[serde(alias = "user_name")]
    pub user_name: Option<String>,
    pub mode: Option<DialogueMode>,
    #[serde(alias = "question_count")]
    pub question_count: Option<usize>,
}

/// Validated interview parameters for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewParams {
    pub topic: String,
    pub role: String,
    pub level: String,
    pub company: Option<String>,
    pub user_name: String,
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

impl StartRequest {
    /// Apply defaults and validate
    pub fn into_params(self) -> Result<InterviewParams> {
        let params = InterviewParams {
            topic: or_default(self.topic, DEFAULT_TOPIC),
            role: or_default(self.role, DEFAULT_ROLE),
            level: or_default(self.level, DEFAULT_LEVEL),
            company: self
                .company
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            user_name: or_default(self.user_name, DEFAULT_USER_NAME),
        };
        params.validate()?;
        Ok(params)
    }
}

impl InterviewParams {
    pub fn new(topic: &str, role: &str, level: &str) -> Self {
        Self {
            topic: topic.to_string(),
            role: role.to_string(),
            level: level.to_string(),
            company: None,
            user_name: DEFAULT_USER_NAME.to_string(),
        }
    }

    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("topic", &self.topic),
            ("role", &self.role),
            ("level", &self.level),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(InterviewError::Validation(format!("{} is required", name)));
            }
        }

        let all = required
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .chain(self.company.as_deref().map(|c| ("company", c)))
            .chain(std::iter::once(("userName", self.user_name.as_str())));
        for (name, value) in all {
            if value.chars().count() > MAX_FIELD_LEN {
                return Err(InterviewError::Validation(format!(
                    "{} exceeds {} characters",
                    name, MAX_FIELD_LEN
                )));
            }
        }

        Ok(())
    }
}
