//! Domain models shared by the gateway, the store and the HTTP layer:
//! difficulty bands, score scales, generated questions and answer evaluations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Difficulty bands offered to students. Labels outside the four known bands are kept
/// verbatim in `Other` and pitched at the early-clinical year.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
  Foundation,
  Intermediate,
  Advanced,
  Ukmla,
  Other(String),
}

impl Difficulty {
  pub fn as_str(&self) -> &str {
    match self {
      Difficulty::Foundation => "Foundation",
      Difficulty::Intermediate => "Intermediate",
      Difficulty::Advanced => "Advanced",
      Difficulty::Ukmla => "UKMLA",
      Difficulty::Other(label) => label,
    }
  }

  /// What the generated cases should concentrate on at this level.
  pub fn focus(&self) -> &'static str {
    match self {
      Difficulty::Foundation => "basic pathophysiology and mechanisms",
      Difficulty::Intermediate => "common presentations and typical management",
      _ => "complex scenarios and nuanced decision-making",
    }
  }

  pub fn target_year(&self) -> TargetYear {
    match self {
      Difficulty::Foundation => TargetYear::PreClinical,
      Difficulty::Intermediate | Difficulty::Other(_) => TargetYear::EarlyClinical,
      Difficulty::Advanced | Difficulty::Ukmla => TargetYear::FinalYear,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Difficulty is required")]
pub struct MissingDifficulty;

impl FromStr for Difficulty {
  type Err = MissingDifficulty;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let label = s.trim();
    match label.to_ascii_lowercase().as_str() {
      "" => Err(MissingDifficulty),
      "foundation" => Ok(Difficulty::Foundation),
      "intermediate" => Ok(Difficulty::Intermediate),
      "advanced" => Ok(Difficulty::Advanced),
      "ukmla" => Ok(Difficulty::Ukmla),
      _ => Ok(Difficulty::Other(label.to_string())),
    }
  }
}

impl Serialize for Difficulty {
  fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for Difficulty {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(de)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

/// Year band a question is pitched at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetYear {
  PreClinical,
  EarlyClinical,
  FinalYear,
}

impl TargetYear {
  pub fn describe(&self) -> &'static str {
    match self {
      TargetYear::PreClinical => "Pre-clinical (Year 1-2)",
      TargetYear::EarlyClinical => "Early Clinical (Year 3-4)",
      TargetYear::FinalYear => "Final Year (Year 5-6)",
    }
  }
}

/// Scale a provider scores answers on. The gateway never converts between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
  /// 1 to 10, 10 being a perfect answer.
  OneToTen,
  /// 0 to 100.
  Percent,
}

impl Default for ScoreScale {
  fn default() -> Self { ScoreScale::OneToTen }
}

impl ScoreScale {
  pub fn max(&self) -> f64 {
    match self {
      ScoreScale::OneToTen => 10.0,
      ScoreScale::Percent => 100.0,
    }
  }

  /// Text used in evaluation prompts.
  pub fn guidance(&self) -> &'static str {
    match self {
      ScoreScale::OneToTen => "Score on a scale of 1-10 (with 10 being perfect)",
      ScoreScale::Percent => "Score as a percentage from 0-100 (with 100 being perfect)",
    }
  }

  pub fn placeholder(&self) -> &'static str {
    match self {
      ScoreScale::OneToTen => "<number between 1-10>",
      ScoreScale::Percent => "<number between 0-100>",
    }
  }

  /// Score as a percentage of this scale, clamped to 0..=100.
  pub fn to_percent(&self, score: f64) -> f64 {
    (score * 100.0 / self.max()).clamp(0.0, 100.0)
  }
}

/// A related reading item: either a bare reference or a titled link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedResource {
  Link {
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
  },
  Plain(String),
}

/// Parameters of one question-generation call.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestionRequest {
  pub specialty: String,
  pub difficulty: Difficulty,
  pub count: u32,
  /// Free-text topics to focus on.
  pub topics: Option<String>,
}

/// A clinical-scenario question bundle, as produced by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
  pub specialty: String,
  pub difficulty: Difficulty,
  pub scenario: String,
  pub question: String,
  #[serde(default)] pub model_answer: String,
  #[serde(default)] pub strengths: Vec<String>,
  #[serde(default)] pub areas_for_improvement: Vec<String>,
  #[serde(default)] pub learning_points: Vec<String>,
  #[serde(default)] pub related_resources: Vec<RelatedResource>,
}

impl GeneratedQuestion {
  /// Name of the first broken invariant, if any.
  pub fn violation(&self) -> Option<&'static str> {
    if self.scenario.trim().is_empty() { return Some("scenario is empty"); }
    if self.question.trim().is_empty() { return Some("question is empty"); }
    if self.strengths.is_empty() { return Some("strengths list is empty"); }
    if self.areas_for_improvement.is_empty() { return Some("areasForImprovement list is empty"); }
    if self.learning_points.is_empty() { return Some("learningPoints list is empty"); }
    None
  }
}

/// Feedback and score for one free-text answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvaluation {
  #[serde(deserialize_with = "lenient_score")]
  pub score: f64,
  #[serde(default)]
  pub score_scale: ScoreScale,
  #[serde(default)] pub model_answer: String,
  #[serde(default)] pub strengths: Vec<String>,
  #[serde(default)] pub areas_for_improvement: Vec<String>,
  #[serde(default)] pub learning_points: Vec<String>,
  #[serde(default)] pub related_resources: Vec<RelatedResource>,
}

impl AnswerEvaluation {
  pub fn percent(&self) -> f64 {
    self.score_scale.to_percent(self.score)
  }
}

/// Accept `7`, `7.5`, `"85"` and `"85%"`; models are inconsistent about quoting scores.
pub fn lenient_score<'de, D>(de: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  use serde::de::Error;

  let v = serde_json::Value::deserialize(de)?;
  match &v {
    serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| D::Error::custom("score is not a finite number")),
    serde_json::Value::String(s) => s
      .trim()
      .trim_end_matches('%')
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|v| v.is_finite())
      .ok_or_else(|| D::Error::custom(format!("score '{}' is not numeric", s))),
    other => Err(D::Error::custom(format!("score has unexpected type: {}", other))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn target_year_mapping_is_total() {
    assert_eq!(Difficulty::Foundation.target_year(), TargetYear::PreClinical);
    assert_eq!(Difficulty::Intermediate.target_year(), TargetYear::EarlyClinical);
    assert_eq!(Difficulty::Advanced.target_year(), TargetYear::FinalYear);
    assert_eq!(Difficulty::Ukmla.target_year(), TargetYear::FinalYear);
    for d in [Difficulty::Foundation, Difficulty::Intermediate, Difficulty::Advanced, Difficulty::Ukmla] {
      assert_eq!(d.as_str().to_lowercase().parse::<Difficulty>(), Ok(d));
    }
  }

  #[test]
  fn unknown_difficulty_falls_back_to_early_clinical() {
    let d: Difficulty = " Expert ".parse().unwrap();
    assert_eq!(d, Difficulty::Other("Expert".into()));
    assert_eq!(d.target_year(), TargetYear::EarlyClinical);
    assert_eq!(d.target_year().describe(), "Early Clinical (Year 3-4)");
    assert_eq!(d.focus(), "complex scenarios and nuanced decision-making");
    assert_eq!(serde_json::to_value(&d).unwrap(), json!("Expert"));
    assert_eq!("  ".parse::<Difficulty>(), Err(MissingDifficulty));
  }

  #[test]
  fn difficulty_round_trips_through_wire_names() {
    let d: Difficulty = serde_json::from_value(json!("UKMLA")).unwrap();
    assert_eq!(d, Difficulty::Ukmla);
    assert_eq!(serde_json::to_value(Difficulty::Foundation).unwrap(), json!("Foundation"));
    assert!(serde_json::from_value::<Difficulty>(json!("")).is_err());
  }

  #[test]
  fn related_resources_accept_both_shapes() {
    let v = json!(["NICE Guidelines", {"title": "BMJ", "url": "https://bmj.com", "type": "guide"}]);
    let r: Vec<RelatedResource> = serde_json::from_value(v).unwrap();
    assert_eq!(r[0], RelatedResource::Plain("NICE Guidelines".into()));
    assert!(matches!(&r[1], RelatedResource::Link { kind: Some(k), .. } if k == "guide"));
  }

  #[test]
  fn evaluation_score_accepts_quoted_numbers() {
    let e: AnswerEvaluation = serde_json::from_value(json!({"score": "85%"})).unwrap();
    assert_eq!(e.score, 85.0);
    let e: AnswerEvaluation = serde_json::from_value(json!({"score": 7})).unwrap();
    assert_eq!(e.score, 7.0);
    assert!(serde_json::from_value::<AnswerEvaluation>(json!({"score": "good"})).is_err());
    for non_finite in ["NaN", "inf", "-inf", "infinity"] {
      assert!(serde_json::from_value::<AnswerEvaluation>(json!({ "score": non_finite })).is_err());
    }
    assert!(serde_json::from_value::<AnswerEvaluation>(json!({"strengths": []})).is_err());
  }

  #[test]
  fn percent_uses_declared_scale() {
    assert_eq!(ScoreScale::OneToTen.to_percent(7.0), 70.0);
    assert_eq!(ScoreScale::Percent.to_percent(85.0), 85.0);
    assert_eq!(ScoreScale::OneToTen.to_percent(12.0), 100.0);
  }

  #[test]
  fn question_invariant_reports_first_violation() {
    let mut q = GeneratedQuestion {
      specialty: "Cardiology".into(),
      difficulty: Difficulty::Foundation,
      scenario: "A 54-year-old man...".into(),
      question: "What is the diagnosis?".into(),
      model_answer: String::new(),
      strengths: vec!["s".into()],
      areas_for_improvement: vec!["a".into()],
      learning_points: vec!["l".into()],
      related_resources: vec![],
    };
    assert_eq!(q.violation(), None);
    q.learning_points.clear();
    assert_eq!(q.violation(), Some("learningPoints list is empty"));
    q.scenario = "  ".into();
    assert_eq!(q.violation(), Some("scenario is empty"));
  }
}
