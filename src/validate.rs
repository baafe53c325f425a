//! Validation of generated questions and answers.
//!
//! The orchestrator only sees a `Validate` capability, so the substring
//! denylist below can be swapped for stricter checks (schema validation,
//! length limits) without touching the fan-out logic.

/// Pluggable validity predicate over generated text.
pub trait Validate: Send + Sync {
    fn is_valid(&self, text: &str) -> bool;
}

/// Rejects boilerplate-refusal responses by lower-cased substring match.
#[derive(Debug, Clone)]
pub struct DenylistValidator {
    denylist: Vec<&'static str>,
}

impl DenylistValidator {
    /// Denylist for generated questions.
    pub fn for_questions() -> Self {
        Self {
            denylist: vec![
                "generate a question",
                "what is the title",
                "what is the section",
                "please provide me",
            ],
        }
    }

    /// Denylist for generated answers.
    pub fn for_answers() -> Self {
        Self {
            denylist: vec![
                "not included in the text",
                "i couldn't find the answer",
                "the answer is not present",
                "please provide the section",
                "i need the content",
                "please provide me",
            ],
        }
    }
}

impl Validate for DenylistValidator {
    fn is_valid(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        !self.denylist.iter().any(|phrase| lowered.contains(phrase))
    }
}

/// Apply a validator to an optional response; `None` is always invalid.
pub fn validate_opt(validator: &dyn Validate, text: Option<&str>) -> bool {
    match text {
        Some(t) => validator.is_valid(t),
        None => false,
    }
}
