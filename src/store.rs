//! Storage collaborator: records produced around the gateway and the aggregates the
//! dashboard reads back.
//!
//! `Store` is the seam; `MemoryStore` is a process-local implementation backed by one
//! `tokio::sync::RwLock`. Timestamps come from the store's clock so aggregates can be
//! tested against a fixed "now".

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{AnswerEvaluation, Difficulty, GeneratedQuestion, RelatedResource, ScoreScale};
use crate::error::StoreError;
use crate::seeds;

pub type UserId = i64;
pub type SpecialtyId = i64;
pub type QuestionId = i64;

pub const WEEK_DAYS: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
  pub id: UserId,
  pub name: String,
  pub role: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialty {
  pub id: SpecialtyId,
  pub name: String,
  pub description: String,
  pub question_count: i64,
  pub color_class: String,
  pub bg_class: String,
  pub text_class: String,
  pub mastery_percentage: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSpecialty {
  pub name: String,
  pub description: String,
  pub question_count: i64,
  pub color_class: String,
  pub bg_class: String,
  pub text_class: String,
  pub mastery_percentage: i64,
}

impl NewSpecialty {
  /// A specialty first seen in a generation request: no description, primary colours.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: String::new(),
      question_count: 0,
      color_class: "bg-primary".into(),
      bg_class: "bg-primary bg-opacity-10".into(),
      text_class: "text-primary".into(),
      mastery_percentage: 0,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuestion {
  pub id: QuestionId,
  pub specialty_id: SpecialtyId,
  pub user_id: Option<UserId>,
  pub difficulty: Difficulty,
  pub scenario: String,
  pub question: String,
  pub model_answer: String,
  pub strengths: Vec<String>,
  pub areas_for_improvement: Vec<String>,
  pub learning_points: Vec<String>,
  pub related_resources: Vec<RelatedResource>,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnswer {
  pub id: i64,
  pub question_id: QuestionId,
  pub user_id: UserId,
  pub answer: String,
  pub evaluation: AnswerEvaluation,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
  pub id: i64,
  pub question_id: QuestionId,
  pub user_id: UserId,
  pub score: f64,
  pub score_scale: ScoreScale,
  pub created_at: DateTime<Utc>,
}

impl Attempt {
  pub fn percent(&self) -> f64 {
    self.score_scale.to_percent(self.score)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
  Answer,
  Practice,
  Review,
  Achievement,
  Gap,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
  pub id: i64,
  pub user_id: UserId,
  #[serde(rename = "type")]
  pub kind: ActivityKind,
  pub title: String,
  pub description: String,
  /// Minutes.
  pub duration: i64,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewActivity {
  pub user_id: UserId,
  pub kind: ActivityKind,
  pub title: String,
  pub description: String,
  pub duration: i64,
}

/// Dashboard summary. Percentages are whole numbers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
  pub questions_answered: i64,
  pub accuracy_rate: i64,
  pub questions_weekly_change: i64,
  pub accuracy_weekly_change: i64,
  pub strongest_area: Option<String>,
  pub strongest_area_accuracy: i64,
  pub weakest_area: Option<String>,
  pub weakest_area_accuracy: i64,
  pub active_days: i64,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Guideline,
  Questionbank,
  Ukmla,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDetails {
  pub organization: Option<String>,
  pub platform: Option<String>,
  pub free: Option<bool>,
  pub has_demo: Option<bool>,
  pub demo_url: Option<String>,
  pub publisher: Option<String>,
  pub date: Option<String>,
  pub question_count: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
  pub id: i64,
  #[serde(rename = "type")]
  pub kind: ResourceKind,
  pub title: String,
  pub description: String,
  pub url: String,
  #[serde(flatten)]
  pub details: ResourceDetails,
  pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpecialtyPerformance {
  pub specialty_id: SpecialtyId,
  pub name: String,
  pub questions: i64,
  /// Mean attempt score as a percentage of its scale.
  pub accuracy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DifficultyPerformance {
  pub difficulty: Difficulty,
  pub questions: i64,
  pub accuracy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressPoint {
  pub date: NaiveDate,
  pub questions_attempted: i64,
  pub accuracy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DayActivity {
  pub day: &'static str,
  pub questions: i64,
  pub minutes: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
  /// The store's clock; every record timestamp comes from here.
  fn now(&self) -> DateTime<Utc>;

  async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;

  async fn specialties(&self) -> Result<Vec<Specialty>, StoreError>;
  async fn specialty_by_name(&self, name: &str) -> Result<Option<Specialty>, StoreError>;
  async fn create_specialty(&self, new: NewSpecialty) -> Result<Specialty, StoreError>;

  async fn create_question(
    &self,
    specialty_id: SpecialtyId,
    user_id: Option<UserId>,
    question: &GeneratedQuestion,
  ) -> Result<StoredQuestion, StoreError>;
  async fn get_question(&self, id: QuestionId) -> Result<Option<StoredQuestion>, StoreError>;

  async fn save_answer(
    &self,
    question_id: QuestionId,
    user_id: UserId,
    answer: &str,
    evaluation: &AnswerEvaluation,
  ) -> Result<StoredAnswer, StoreError>;
  /// Most recent answer by this user to this question.
  async fn answer_for_question(&self, question_id: QuestionId, user_id: UserId) -> Result<Option<StoredAnswer>, StoreError>;

  async fn save_attempt(
    &self,
    question_id: QuestionId,
    user_id: UserId,
    score: f64,
    scale: ScoreScale,
  ) -> Result<Attempt, StoreError>;
  async fn attempts(&self, user_id: UserId) -> Result<Vec<Attempt>, StoreError>;

  async fn log_activity(&self, new: NewActivity) -> Result<Activity, StoreError>;
  /// Newest first.
  async fn recent_activity(&self, user_id: UserId, limit: usize) -> Result<Vec<Activity>, StoreError>;

  async fn user_stats(&self, user_id: UserId) -> Result<Option<UserStats>, StoreError>;
  async fn update_user_stats(&self, user_id: UserId, stats: UserStats) -> Result<UserStats, StoreError>;

  /// Ordered by accuracy, best first.
  async fn performance_by_specialty(&self, user_id: UserId) -> Result<Vec<SpecialtyPerformance>, StoreError>;
  /// Ordered Foundation, Intermediate, Advanced, UKMLA, then free-form labels alphabetically;
  /// bands without attempts are omitted.
  async fn performance_by_difficulty(&self, user_id: UserId) -> Result<Vec<DifficultyPerformance>, StoreError>;
  /// One row per day with attempts in the last `days` days, oldest first.
  async fn progress_over_time(&self, user_id: UserId, days: i64) -> Result<Vec<ProgressPoint>, StoreError>;
  /// Activity over the last 7 days, Sunday to Saturday, with empty days filled in.
  /// Minutes count only practice sessions.
  async fn weekly_activity(&self, user_id: UserId) -> Result<Vec<DayActivity>, StoreError>;

  async fn resources(&self, kind: ResourceKind) -> Result<Vec<Resource>, StoreError>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct Serials {
  specialty: i64,
  question: i64,
  answer: i64,
  attempt: i64,
  activity: i64,
  resource: i64,
}

fn next(counter: &mut i64) -> i64 {
  *counter += 1;
  *counter
}

#[derive(Default)]
struct Tables {
  serials: Serials,
  users: HashMap<UserId, User>,
  specialties: BTreeMap<SpecialtyId, Specialty>,
  questions: HashMap<QuestionId, StoredQuestion>,
  answers: Vec<StoredAnswer>,
  attempts: Vec<Attempt>,
  activity: Vec<Activity>,
  stats: HashMap<UserId, UserStats>,
  resources: Vec<Resource>,
}

impl Tables {
  fn insert_specialty(&mut self, new: NewSpecialty) -> Specialty {
    let id = next(&mut self.serials.specialty);
    let s = Specialty {
      id,
      name: new.name,
      description: new.description,
      question_count: new.question_count,
      color_class: new.color_class,
      bg_class: new.bg_class,
      text_class: new.text_class,
      mastery_percentage: new.mastery_percentage,
    };
    self.specialties.insert(id, s.clone());
    s
  }

  fn user_attempts(&self, user_id: UserId) -> impl Iterator<Item = &Attempt> {
    self.attempts.iter().filter(move |a| a.user_id == user_id)
  }
}

#[derive(Clone)]
pub struct MemoryStore {
  tables: Arc<RwLock<Tables>>,
  clock: Clock,
}

impl MemoryStore {
  /// Store preloaded with the mock user, the built-in specialties and the resource library.
  pub fn seeded() -> Self {
    let mut t = Tables::default();
    let user = seeds::mock_user();
    t.users.insert(user.id, user);
    for s in seeds::seed_specialties() {
      t.insert_specialty(s);
    }
    for mut r in seeds::seed_resources() {
      r.id = next(&mut t.serials.resource);
      t.resources.push(r);
    }
    Self { tables: Arc::new(RwLock::new(t)), clock: Arc::new(Utc::now) }
  }

  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }
}

fn mean(sum: f64, n: i64) -> f64 {
  if n == 0 { 0.0 } else { sum / n as f64 }
}

#[async_trait]
impl Store for MemoryStore {
  fn now(&self) -> DateTime<Utc> {
    (self.clock)()
  }

  async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
    Ok(self.tables.read().await.users.get(&id).cloned())
  }

  async fn specialties(&self) -> Result<Vec<Specialty>, StoreError> {
    Ok(self.tables.read().await.specialties.values().cloned().collect())
  }

  async fn specialty_by_name(&self, name: &str) -> Result<Option<Specialty>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.specialties.values().find(|s| s.name.eq_ignore_ascii_case(name.trim())).cloned())
  }

  async fn create_specialty(&self, new: NewSpecialty) -> Result<Specialty, StoreError> {
    let mut t = self.tables.write().await;
    if t.specialties.values().any(|s| s.name.eq_ignore_ascii_case(&new.name)) {
      return Err(StoreError::Duplicate(format!("specialty '{}'", new.name)));
    }
    Ok(t.insert_specialty(new))
  }

  async fn create_question(
    &self,
    specialty_id: SpecialtyId,
    user_id: Option<UserId>,
    question: &GeneratedQuestion,
  ) -> Result<StoredQuestion, StoreError> {
    let now = self.now();
    let mut t = self.tables.write().await;
    let specialty = t
      .specialties
      .get_mut(&specialty_id)
      .ok_or(StoreError::MissingReference { entity: "specialty", id: specialty_id })?;
    specialty.question_count += 1;

    let id = next(&mut t.serials.question);
    let stored = StoredQuestion {
      id,
      specialty_id,
      user_id,
      difficulty: question.difficulty.clone(),
      scenario: question.scenario.clone(),
      question: question.question.clone(),
      model_answer: question.model_answer.clone(),
      strengths: question.strengths.clone(),
      areas_for_improvement: question.areas_for_improvement.clone(),
      learning_points: question.learning_points.clone(),
      related_resources: question.related_resources.clone(),
      created_at: now,
    };
    t.questions.insert(id, stored.clone());
    Ok(stored)
  }

  async fn get_question(&self, id: QuestionId) -> Result<Option<StoredQuestion>, StoreError> {
    Ok(self.tables.read().await.questions.get(&id).cloned())
  }

  async fn save_answer(
    &self,
    question_id: QuestionId,
    user_id: UserId,
    answer: &str,
    evaluation: &AnswerEvaluation,
  ) -> Result<StoredAnswer, StoreError> {
    let now = self.now();
    let mut t = self.tables.write().await;
    if !t.questions.contains_key(&question_id) {
      return Err(StoreError::MissingReference { entity: "question", id: question_id });
    }
    let stored = StoredAnswer {
      id: next(&mut t.serials.answer),
      question_id,
      user_id,
      answer: answer.to_string(),
      evaluation: evaluation.clone(),
      created_at: now,
    };
    t.answers.push(stored.clone());
    Ok(stored)
  }

  async fn answer_for_question(&self, question_id: QuestionId, user_id: UserId) -> Result<Option<StoredAnswer>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.answers.iter().rev().find(|a| a.question_id == question_id && a.user_id == user_id).cloned())
  }

  async fn save_attempt(
    &self,
    question_id: QuestionId,
    user_id: UserId,
    score: f64,
    scale: ScoreScale,
  ) -> Result<Attempt, StoreError> {
    let now = self.now();
    let mut t = self.tables.write().await;
    if !t.questions.contains_key(&question_id) {
      return Err(StoreError::MissingReference { entity: "question", id: question_id });
    }
    let attempt = Attempt {
      id: next(&mut t.serials.attempt),
      question_id,
      user_id,
      score,
      score_scale: scale,
      created_at: now,
    };
    t.attempts.push(attempt.clone());
    Ok(attempt)
  }

  async fn attempts(&self, user_id: UserId) -> Result<Vec<Attempt>, StoreError> {
    Ok(self.tables.read().await.user_attempts(user_id).cloned().collect())
  }

  async fn log_activity(&self, new: NewActivity) -> Result<Activity, StoreError> {
    let now = self.now();
    let mut t = self.tables.write().await;
    let a = Activity {
      id: next(&mut t.serials.activity),
      user_id: new.user_id,
      kind: new.kind,
      title: new.title,
      description: new.description,
      duration: new.duration,
      created_at: now,
    };
    t.activity.push(a.clone());
    Ok(a)
  }

  async fn recent_activity(&self, user_id: UserId, limit: usize) -> Result<Vec<Activity>, StoreError> {
    let t = self.tables.read().await;
    let mut rows: Vec<Activity> = t.activity.iter().filter(|a| a.user_id == user_id).cloned().collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows.truncate(limit);
    Ok(rows)
  }

  async fn user_stats(&self, user_id: UserId) -> Result<Option<UserStats>, StoreError> {
    Ok(self.tables.read().await.stats.get(&user_id).cloned())
  }

  async fn update_user_stats(&self, user_id: UserId, mut stats: UserStats) -> Result<UserStats, StoreError> {
    stats.updated_at = Some(self.now());
    self.tables.write().await.stats.insert(user_id, stats.clone());
    Ok(stats)
  }

  async fn performance_by_specialty(&self, user_id: UserId) -> Result<Vec<SpecialtyPerformance>, StoreError> {
    let t = self.tables.read().await;
    let mut groups: BTreeMap<SpecialtyId, (i64, f64)> = BTreeMap::new();
    for a in t.user_attempts(user_id) {
      let Some(q) = t.questions.get(&a.question_id) else { continue };
      let g = groups.entry(q.specialty_id).or_insert((0, 0.0));
      g.0 += 1;
      g.1 += a.percent();
    }
    let mut rows: Vec<SpecialtyPerformance> = groups
      .into_iter()
      .filter_map(|(id, (n, sum))| {
        let s = t.specialties.get(&id)?;
        Some(SpecialtyPerformance { specialty_id: id, name: s.name.clone(), questions: n, accuracy: mean(sum, n) })
      })
      .collect();
    rows.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy).then_with(|| a.name.cmp(&b.name)));
    Ok(rows)
  }

  async fn performance_by_difficulty(&self, user_id: UserId) -> Result<Vec<DifficultyPerformance>, StoreError> {
    let t = self.tables.read().await;
    let mut groups: BTreeMap<Difficulty, (i64, f64)> = BTreeMap::new();
    for a in t.user_attempts(user_id) {
      let Some(q) = t.questions.get(&a.question_id) else { continue };
      let g = groups.entry(q.difficulty.clone()).or_insert((0, 0.0));
      g.0 += 1;
      g.1 += a.percent();
    }
    Ok(
      groups
        .into_iter()
        .map(|(difficulty, (n, sum))| DifficultyPerformance { difficulty, questions: n, accuracy: mean(sum, n) })
        .collect(),
    )
  }

  async fn progress_over_time(&self, user_id: UserId, days: i64) -> Result<Vec<ProgressPoint>, StoreError> {
    let since = self.now() - Duration::days(days);
    let t = self.tables.read().await;
    let mut groups: BTreeMap<NaiveDate, (i64, f64)> = BTreeMap::new();
    for a in t.user_attempts(user_id).filter(|a| a.created_at >= since) {
      let g = groups.entry(a.created_at.date_naive()).or_insert((0, 0.0));
      g.0 += 1;
      g.1 += a.percent();
    }
    Ok(
      groups
        .into_iter()
        .map(|(date, (n, sum))| ProgressPoint { date, questions_attempted: n, accuracy: mean(sum, n) })
        .collect(),
    )
  }

  async fn weekly_activity(&self, user_id: UserId) -> Result<Vec<DayActivity>, StoreError> {
    let since = self.now() - Duration::days(7);
    let t = self.tables.read().await;
    let mut days: Vec<DayActivity> =
      WEEK_DAYS.iter().map(|&day| DayActivity { day, questions: 0, minutes: 0 }).collect();
    for a in t.activity.iter().filter(|a| a.user_id == user_id && a.created_at >= since) {
      let slot = &mut days[a.created_at.weekday().num_days_from_sunday() as usize];
      slot.questions += 1;
      if a.kind == ActivityKind::Practice {
        slot.minutes += a.duration;
      }
    }
    Ok(days)
  }

  async fn resources(&self, kind: ResourceKind) -> Result<Vec<Resource>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.resources.iter().filter(|r| r.kind == kind).cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::sync::atomic::{AtomicI64, Ordering};

  fn question(difficulty: Difficulty) -> GeneratedQuestion {
    GeneratedQuestion {
      specialty: "ignored".into(),
      difficulty,
      scenario: "A 30-year-old woman with palpitations.".into(),
      question: "What is the next step?".into(),
      model_answer: "ECG".into(),
      strengths: vec!["s".into()],
      areas_for_improvement: vec!["a".into()],
      learning_points: vec!["l".into()],
      related_resources: vec![RelatedResource::Plain("NICE".into())],
    }
  }

  fn evaluation(score: f64, scale: ScoreScale) -> AnswerEvaluation {
    AnswerEvaluation {
      score,
      score_scale: scale,
      model_answer: String::new(),
      strengths: vec![],
      areas_for_improvement: vec![],
      learning_points: vec![],
      related_resources: vec![],
    }
  }

  /// Clock that tests can move by setting unix seconds.
  fn movable_clock(start: DateTime<Utc>) -> (Clock, Arc<AtomicI64>) {
    let secs = Arc::new(AtomicI64::new(start.timestamp()));
    let handle = secs.clone();
    let clock: Clock = Arc::new(move || {
      Utc.timestamp_opt(handle.load(Ordering::SeqCst), 0).single().unwrap_or_else(Utc::now)
    });
    (clock, secs)
  }

  #[tokio::test]
  async fn seeded_store_has_reference_data() {
    let s = MemoryStore::seeded();
    assert_eq!(s.user(seeds::MOCK_USER_ID).await.unwrap().unwrap().name, "Dr. Jane Smith");
    let names: Vec<_> = s.specialties().await.unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names[0], "Cardiology");
    assert_eq!(names.len(), 6);
    assert_eq!(s.resources(ResourceKind::Ukmla).await.unwrap().len(), 4);
    assert!(s.specialty_by_name("cardiology").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn writes_check_references() {
    let s = MemoryStore::seeded();
    let err = s.create_question(999, None, &question(Difficulty::Foundation)).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingReference { entity: "specialty", id: 999 }));
    let err = s.save_answer(42, 1, "x", &evaluation(5.0, ScoreScale::OneToTen)).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingReference { entity: "question", .. }));
    assert!(matches!(
      s.create_specialty(NewSpecialty::named("Cardiology")).await,
      Err(StoreError::Duplicate(_))
    ));
  }

  #[tokio::test]
  async fn latest_answer_wins_and_question_count_grows() {
    let s = MemoryStore::seeded();
    let before = s.specialty_by_name("Neurology").await.unwrap().unwrap();
    let q = s.create_question(before.id, Some(1), &question(Difficulty::Advanced)).await.unwrap();
    let after = s.specialty_by_name("Neurology").await.unwrap().unwrap();
    assert_eq!(after.question_count, before.question_count + 1);

    s.save_answer(q.id, 1, "first", &evaluation(4.0, ScoreScale::OneToTen)).await.unwrap();
    s.save_answer(q.id, 1, "second", &evaluation(9.0, ScoreScale::OneToTen)).await.unwrap();
    assert_eq!(s.answer_for_question(q.id, 1).await.unwrap().unwrap().answer, "second");
    assert!(s.answer_for_question(q.id, 2).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn performance_mixes_scales_as_percentages() {
    let s = MemoryStore::seeded();
    let cardio = s.specialty_by_name("Cardiology").await.unwrap().unwrap().id;
    let neuro = s.specialty_by_name("Neurology").await.unwrap().unwrap().id;
    let q1 = s.create_question(cardio, Some(1), &question(Difficulty::Ukmla)).await.unwrap();
    let q2 = s.create_question(neuro, Some(1), &question(Difficulty::Foundation)).await.unwrap();
    s.save_attempt(q1.id, 1, 8.0, ScoreScale::OneToTen).await.unwrap();
    s.save_attempt(q1.id, 1, 90.0, ScoreScale::Percent).await.unwrap();
    s.save_attempt(q2.id, 1, 5.0, ScoreScale::OneToTen).await.unwrap();

    let by_spec = s.performance_by_specialty(1).await.unwrap();
    assert_eq!(by_spec[0].name, "Cardiology");
    assert_eq!(by_spec[0].questions, 2);
    assert!((by_spec[0].accuracy - 85.0).abs() < 1e-9);
    assert_eq!(by_spec[1].accuracy, 50.0);

    let by_diff = s.performance_by_difficulty(1).await.unwrap();
    let order: Vec<_> = by_diff.iter().map(|d| d.difficulty.clone()).collect();
    assert_eq!(order, vec![Difficulty::Foundation, Difficulty::Ukmla]);
    assert!(s.performance_by_specialty(2).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn weekly_activity_is_gap_filled_and_counts_practice_minutes() {
    // 2024-05-13 is a Monday.
    let monday = Utc.with_ymd_and_hms(2024, 5, 13, 10, 0, 0).unwrap();
    let (clock, secs) = movable_clock(monday - Duration::days(10));
    let s = MemoryStore::seeded().with_clock(clock);
    let log = |kind, duration| NewActivity { user_id: 1, kind, title: "t".into(), description: "d".into(), duration };

    s.log_activity(log(ActivityKind::Practice, 99)).await.unwrap();
    secs.store(monday.timestamp(), Ordering::SeqCst);
    s.log_activity(log(ActivityKind::Practice, 30)).await.unwrap();
    s.log_activity(log(ActivityKind::Answer, 0)).await.unwrap();
    secs.store((monday + Duration::days(2)).timestamp(), Ordering::SeqCst);
    s.log_activity(log(ActivityKind::Review, 20)).await.unwrap();

    let week = s.weekly_activity(1).await.unwrap();
    assert_eq!(week.len(), 7);
    assert_eq!(week[0], DayActivity { day: "Sunday", questions: 0, minutes: 0 });
    assert_eq!(week[1], DayActivity { day: "Monday", questions: 2, minutes: 30 });
    assert_eq!(week[3], DayActivity { day: "Wednesday", questions: 1, minutes: 0 });

    let recent = s.recent_activity(1, 2).await.unwrap();
    assert_eq!(recent[0].kind, ActivityKind::Review);
    assert_eq!(recent[1].kind, ActivityKind::Answer);
  }

  #[tokio::test]
  async fn progress_groups_by_day_within_window() {
    let day = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let (clock, secs) = movable_clock(day - Duration::days(40));
    let s = MemoryStore::seeded().with_clock(clock);
    let cardio = s.specialty_by_name("Cardiology").await.unwrap().unwrap().id;
    let q = s.create_question(cardio, Some(1), &question(Difficulty::Intermediate)).await.unwrap();

    s.save_attempt(q.id, 1, 2.0, ScoreScale::OneToTen).await.unwrap();
    secs.store(day.timestamp(), Ordering::SeqCst);
    s.save_attempt(q.id, 1, 6.0, ScoreScale::OneToTen).await.unwrap();
    s.save_attempt(q.id, 1, 8.0, ScoreScale::OneToTen).await.unwrap();
    secs.store((day + Duration::days(1)).timestamp(), Ordering::SeqCst);
    s.save_attempt(q.id, 1, 100.0, ScoreScale::Percent).await.unwrap();

    let rows = s.progress_over_time(1, 30).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, day.date_naive());
    assert_eq!(rows[0].questions_attempted, 2);
    assert_eq!(rows[0].accuracy, 70.0);
    assert_eq!(rows[1].accuracy, 100.0);
  }
}
