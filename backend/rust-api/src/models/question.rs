use serde::{Deserialize, Serialize};

use super::Band;

/// A generated multiple-choice question. `correct_answer` always equals one
/// of `options` verbatim once it has passed boundary validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Band>,
}

impl TestQuestion {
    pub fn offers(&self, answer: &str) -> bool {
        self.options.iter().any(|option| option == answer)
    }

    pub fn answer(self, student_answer: Option<String>) -> AnsweredQuestion {
        let is_correct = student_answer.as_deref() == Some(self.correct_answer.as_str());
        AnsweredQuestion {
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            level: self.level,
            student_answer,
            is_correct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Band>,
    pub student_answer: Option<String>,
    pub is_correct: bool,
}

/// Question as shown to the student while a test is in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub index: usize,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Band>,
}

impl QuestionView {
    pub fn from_question(index: usize, question: &TestQuestion) -> Self {
        Self {
            index,
            question: question.question.clone(),
            options: question.options.clone(),
            level: question.level,
        }
    }
}
