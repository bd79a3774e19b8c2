//! Prompt builders for the two logical calls every provider supports.

use crate::config::Prompts;
use crate::domain::{GeneratedQuestion, QuestionRequest, ScoreScale};
use crate::util::fill_template;

/// A system + user message pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatPrompt {
  pub system: String,
  pub user: String,
}

impl ChatPrompt {
  pub fn total_len(&self) -> usize {
    self.system.len() + self.user.len()
  }
}

pub fn question_prompt(prompts: &Prompts, req: &QuestionRequest) -> ChatPrompt {
  let count = req.count.to_string();
  let topics_line = match req.topics.as_deref().map(str::trim) {
    Some(t) if !t.is_empty() => format!("- Specific topics to focus on: {t}"),
    _ => String::new(),
  };
  let pairs = [
    ("count", count.as_str()),
    ("specialty", req.specialty.as_str()),
    ("difficulty", req.difficulty.as_str()),
    ("target_year", req.difficulty.target_year().describe()),
    ("topics_line", topics_line.as_str()),
    ("focus", req.difficulty.focus()),
  ];
  ChatPrompt {
    system: fill_template(&prompts.question_system, &pairs),
    user: fill_template(&prompts.question_user_template, &pairs),
  }
}

pub fn evaluation_prompt(
  prompts: &Prompts,
  question: &GeneratedQuestion,
  answer: &str,
  scale: ScoreScale,
) -> ChatPrompt {
  let model_answer = if question.model_answer.trim().is_empty() {
    "Not provided"
  } else {
    question.model_answer.as_str()
  };
  let pairs = [
    ("question", question.question.as_str()),
    ("scenario", question.scenario.as_str()),
    ("answer", answer),
    ("model_answer", model_answer),
    ("score_guidance", scale.guidance()),
    ("score_placeholder", scale.placeholder()),
  ];
  ChatPrompt {
    system: fill_template(&prompts.evaluation_system, &pairs),
    user: fill_template(&prompts.evaluation_user_template, &pairs),
  }
}
