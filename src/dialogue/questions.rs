use std::sync::Arc;
use tracing::{info, warn};

use super::prompt;
use crate::error::{InterviewError, ProviderKind, Result};
use crate::providers::LanguageModel;
use crate::session::InterviewParams;

/// Produces the pre-generated question list for scripted mode
#[async_trait::async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(&self, params: &InterviewParams, count: usize) -> Result<Vec<String>>;
}

/// Question source backed by a single language-model call
pub struct LlmQuestionGenerator {
    model: Arc<dyn LanguageModel>,
}

impl LlmQuestionGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl QuestionSource for LlmQuestionGenerator {
    async fn generate(&self, params: &InterviewParams, count: usize) -> Result<Vec<String>> {
        let messages = prompt::question_set_messages(params, count);
        let raw = self.model.generate(&messages).await?;

        let mut questions = parse_questions(&raw);
        if questions.is_empty() {
            warn!("Question generation returned no usable questions");
            return Err(InterviewError::provider(
                ProviderKind::Generation,
                "no questions in response",
            ));
        }

        questions.truncate(count);
        info!("Generated {} interview questions", questions.len());
        Ok(questions)
    }
}

/// Extract questions from a model reply: a JSON array, or one per line
pub fn parse_questions(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    let json_slice = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    if let Some(slice) = json_slice {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(slice) {
            return list
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();
        }
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    // Once the reply is a list, anything unmarked is preamble or commentary
    let listed: Vec<String> = lines
        .iter()
        .filter_map(|line| strip_list_marker(line))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    lines.into_iter().map(str::to_string).collect()
}

/// Text after a list marker (`1.`, `2)`, `-`, `*`, `•`), if the line has one
fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return Some(rest.trim());
    }

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(|c: char| c == '.' || c == ')')?;
    // "3.5 million users" is text, not a marker
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array_inside_prose() {
        let raw = "Here you go:\n[\"What is a load balancer?\", \"  \", \"How do you shard?\"]";
        assert_eq!(
            parse_questions(raw),
            vec!["What is a load balancer?", "How do you shard?"]
        );
    }

    #[test]
    fn test_parse_numbered_lines() {
        let raw = "1. Tell me about yourself.\n2) Why this role?\n\n- What is CAP?";
        assert_eq!(
            parse_questions(raw),
            vec!["Tell me about yourself.", "Why this role?", "What is CAP?"]
        );
    }

    #[test]
    fn test_parse_skips_preamble_around_list() {
        let raw = "Here are 3 questions:\n1. What is a load balancer?\n2. How do you shard?\n3. Explain CAP.\nGood luck!";
        assert_eq!(
            parse_questions(raw),
            vec!["What is a load balancer?", "How do you shard?", "Explain CAP."]
        );
    }

    #[test]
    fn test_parse_keeps_leading_numbers_in_question_text() {
        let raw = "1. 2024 saw a big outage; what would you change?\n2. 3.5 million users hit one endpoint. Now what?";
        assert_eq!(
            parse_questions(raw),
            vec![
                "2024 saw a big outage; what would you change?",
                "3.5 million users hit one endpoint. Now what?"
            ]
        );

        let plain = "2024 was a busy year. What did you ship?\nWhy this team?";
        assert_eq!(
            parse_questions(plain),
            vec!["2024 was a busy year. What did you ship?", "Why this team?"]
        );
    }
}
