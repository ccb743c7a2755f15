use log::warn;
use serde::{Deserialize, Serialize};

/// Most chat platforms cap poll options at 10.
pub const MAX_OPTIONS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl Question {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct]
    }
}

/// Loosely-shaped record as it appears in the question file. Validation
/// happens in [`QuestionSet::load`], so a single bad record never rejects
/// the whole file.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct: usize,
}

impl RawQuestion {
    fn validate(self) -> Option<Question> {
        let question = self.question?.trim().to_string();
        if question.is_empty() {
            return None;
        }
        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if options.len() < 2 || options.len() > MAX_OPTIONS {
            return None;
        }
        // The correct option must exist and be non-empty; other options may
        // be blank (the question editor saves unused slots as empty strings).
        if options.get(self.correct).is_none_or(|o| o.is_empty()) {
            return None;
        }
        Some(Question {
            question,
            options,
            correct: self.correct,
        })
    }
}

/// Ordered, validated question list. Read-only while a quiz is running;
/// swapped wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Parse a JSON array of question records, dropping invalid entries.
    /// A file that is not a JSON array at all yields an empty set.
    pub fn from_json_str(raw: &str) -> Self {
        let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
            Ok(values) => values,
            Err(e) => {
                warn!("Question file is not a JSON array, starting with no questions: {e}");
                return Self::default();
            }
        };
        Self::load(values)
    }

    /// Validate a batch of raw records, keeping only well-formed questions.
    pub fn load(records: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let mut questions = Vec::new();
        for (i, value) in records.into_iter().enumerate() {
            let parsed = serde_json::from_value::<RawQuestion>(value)
                .ok()
                .and_then(RawQuestion::validate);
            match parsed {
                Some(q) => questions.push(q),
                None => warn!("Dropping invalid question record at index {i}"),
            }
        }
        Self { questions }
    }

    pub fn at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_keeps_only_valid_records() {
        let set = QuestionSet::load([
            json!({"question": "Capital of France?", "options": ["Paris", "Lyon"], "correct": 0}),
            json!({"question": "", "options": ["a", "b"], "correct": 0}),
            json!({"question": "Only one option", "options": ["a"], "correct": 0}),
            json!({"question": "Correct out of range", "options": ["a", "b"], "correct": 5}),
            json!({"options": ["a", "b"], "correct": 0}),
            json!({"question": "2 + 2?", "options": ["3", "4", "5"], "correct": 1}),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.at(0).unwrap().question, "Capital of France?");
        assert_eq!(set.at(1).unwrap().correct_option(), "4");
    }

    #[test]
    fn load_skips_records_with_wrong_shape() {
        let set = QuestionSet::load([
            json!("not an object"),
            json!({"question": "ok?", "options": ["yes", "no"], "correct": 1}),
            json!({"question": "bad options", "options": "oops", "correct": 0}),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.at(0).unwrap().question, "ok?");
    }

    #[test]
    fn empty_correct_option_is_rejected() {
        let set = QuestionSet::load([
            json!({"question": "q", "options": ["a", "", "c"], "correct": 1}),
            json!({"question": "q", "options": ["a", "", "c"], "correct": 2}),
        ]);
        // Blank non-correct options are tolerated, a blank correct one is not.
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn malformed_file_yields_empty_set() {
        assert!(QuestionSet::from_json_str("{ not json").is_empty());
        assert!(QuestionSet::from_json_str("{\"a\": 1}").is_empty());
        assert_eq!(QuestionSet::from_json_str("[]").len(), 0);
    }

    #[test]
    fn too_many_options_is_rejected() {
        let options: Vec<String> = (0..11).map(|i| format!("o{i}")).collect();
        let set = QuestionSet::load([json!({"question": "q", "options": options, "correct": 0})]);
        assert!(set.is_empty());
    }
}
