//! Public protocol structs for the HTTP endpoints (serde ready).
//! Field names are camelCase on the wire to match the web client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AnswerEvaluation, Difficulty, RelatedResource, ScoreScale};
use crate::gateway::ProviderStatus;
use crate::store::{
    Activity, ActivityKind, DayActivity, DifficultyPerformance, ProgressPoint, SpecialtyPerformance,
    StoredAnswer, UserStats,
};

// ---- Questions ----

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub specialty: String,
    pub difficulty: String,
    pub count: i64,
    #[serde(default)]
    pub topics: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub specialty: String,
    pub difficulty: Difficulty,
    pub scenario: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    pub provider: String,
    pub questions: Vec<QuestionSummary>,
}

// ---- Answers ----

/// Clients send question ids either as numbers or as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuestionRef {
    Number(i64),
    Text(String),
}

impl QuestionRef {
    pub fn id(&self) -> Option<i64> {
        match self {
            QuestionRef::Number(n) => Some(*n),
            QuestionRef::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionRef::Number(n) => write!(f, "{n}"),
            QuestionRef::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub question_id: QuestionRef,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub provider: String,
    #[serde(flatten)]
    pub answer: StoredAnswer,
}

#[derive(Debug, Deserialize)]
pub struct BatchIn {
    pub answers: Vec<AnswerIn>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItemOut {
    Success {
        #[serde(rename = "questionId")]
        question_id: String,
        evaluation: AnswerEvaluation,
    },
    Error {
        #[serde(rename = "questionId")]
        question_id: String,
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchOut {
    /// Batch evaluations are synthetic, so no AI provider serves them.
    pub provider: Option<String>,
    pub results: Vec<BatchItemOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackOut {
    pub id: i64,
    pub specialty: String,
    pub difficulty: Difficulty,
    pub scenario: String,
    pub question: String,
    pub user_answer: String,
    pub score: f64,
    pub score_scale: ScoreScale,
    pub model_answer: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub learning_points: Vec<String>,
    pub related_resources: Vec<RelatedResource>,
}

// ---- Dashboard ----

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
    pub questions_answered: i64,
    pub accuracy_rate: i64,
    pub questions_weekly_change: i64,
    pub accuracy_weekly_change: i64,
    pub strongest_area: String,
    pub strongest_area_accuracy: i64,
    pub weakest_area: String,
    pub weakest_area_accuracy: i64,
    pub active_days: i64,
}

impl From<Option<UserStats>> for StatsOut {
    fn from(stats: Option<UserStats>) -> Self {
        let s = stats.unwrap_or_default();
        StatsOut {
            questions_answered: s.questions_answered,
            accuracy_rate: s.accuracy_rate,
            questions_weekly_change: s.questions_weekly_change,
            accuracy_weekly_change: s.accuracy_weekly_change,
            strongest_area: s.strongest_area.unwrap_or_else(|| "N/A".into()),
            strongest_area_accuracy: s.strongest_area_accuracy,
            weakest_area: s.weakest_area.unwrap_or_else(|| "N/A".into()),
            weakest_area_accuracy: s.weakest_area_accuracy,
            active_days: s.active_days,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOut {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: &'static str,
    pub icon_class: &'static str,
    pub icon_bg_class: &'static str,
    pub time_ago: String,
}

pub fn activity_out(a: &Activity, now: DateTime<Utc>) -> ActivityOut {
    let (icon, icon_class, icon_bg_class) = match a.kind {
        ActivityKind::Achievement => ("star", "h-5 w-5 text-amber-500", "bg-amber-100"),
        ActivityKind::Review => ("sync", "h-5 w-5 text-primary", "bg-indigo-100"),
        ActivityKind::Gap => ("exclamation", "h-5 w-5 text-red-500", "bg-red-100"),
        ActivityKind::Answer | ActivityKind::Practice => ("check", "h-5 w-5 text-secondary", "bg-green-100"),
    };
    ActivityOut {
        id: a.id,
        title: a.title.clone(),
        description: a.description.clone(),
        icon,
        icon_class,
        icon_bg_class,
        time_ago: time_ago(now, a.created_at),
    }
}

/// "Just now", "3 hours ago", "2 days ago", then a plain date after a week.
pub fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let hours = (now - then).num_hours();
    let days = hours / 24;
    if hours < 1 {
        "Just now".into()
    } else if hours < 24 {
        format!("{} {} ago", hours, if hours == 1 { "hour" } else { "hours" })
    } else if days < 7 {
        format!("{} {} ago", days, if days == 1 { "day" } else { "days" })
    } else {
        then.format("%d/%m/%Y").to_string()
    }
}

/// Accuracy rounded to one decimal place.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Serialize, PartialEq)]
pub struct NamedAccuracy {
    pub name: String,
    pub questions: i64,
    pub accuracy: f64,
}

impl From<SpecialtyPerformance> for NamedAccuracy {
    fn from(p: SpecialtyPerformance) -> Self {
        NamedAccuracy { name: p.name, questions: p.questions, accuracy: round1(p.accuracy) }
    }
}

impl From<DifficultyPerformance> for NamedAccuracy {
    fn from(p: DifficultyPerformance) -> Self {
        NamedAccuracy { name: p.difficulty.to_string(), questions: p.questions, accuracy: round1(p.accuracy) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceOut {
    pub total_questions: i64,
    pub overall_accuracy: i64,
    pub active_days: i64,
    pub by_difficulty: Vec<NamedAccuracy>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
    pub date: String,
    pub questions_attempted: i64,
    pub accuracy: f64,
}

impl From<ProgressPoint> for ProgressOut {
    fn from(p: ProgressPoint) -> Self {
        ProgressOut {
            date: p.date.format("%Y-%m-%d").to_string(),
            questions_attempted: p.questions_attempted,
            accuracy: round1(p.accuracy),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DayActivityOut {
    pub day: &'static str,
    pub questions: i64,
    pub minutes: i64,
}

impl From<DayActivity> for DayActivityOut {
    fn from(d: DayActivity) -> Self {
        DayActivityOut { day: d.day, questions: d.questions, minutes: d.minutes }
    }
}

// ---- Misc ----

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ProvidersOut {
    /// Serving provider of the most recent successful AI call.
    pub current: Option<String>,
    pub providers: Vec<ProviderStatus>,
}
