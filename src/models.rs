//models.rs
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Millisecond timestamp ids, as assigned when an entity is created.
pub type WorkoutId = i64;
pub type ExerciseId = i64;

/// Which input of a set is being edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetField {
    Weight,
    Reps,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Set {
    /// Raw weight input in kg; empty until the user fills it.
    #[serde(deserialize_with = "lenient_string", default)]
    pub weight: String,
    #[serde(deserialize_with = "lenient_string", default)]
    pub reps: String,
    #[serde(default)]
    pub completed: bool,
}

impl Set {
    /// Both weight and reps have been entered.
    pub fn is_filled(&self) -> bool {
        !self.weight.trim().is_empty() && !self.reps.trim().is_empty()
    }

    /// `weight * reps` for a completed, filled set; zero otherwise.
    pub fn volume(&self) -> f64 {
        if !self.completed || !self.is_filled() {
            return 0.0;
        }
        match (leading_float(&self.weight), leading_int(&self.reps)) {
            (Some(weight), Some(reps)) => weight * reps as f64,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub name: String,
    pub sets: Vec<Set>,
}

impl Exercise {
    /// A fresh exercise always starts with one empty set.
    pub fn new(id: ExerciseId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sets: vec![Set::default()],
        }
    }

    pub fn volume(&self) -> f64 {
        self.sets.iter().map(Set::volume).sum()
    }
}

/// The workout currently in progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub id: WorkoutId,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub notes: String,
}

impl WorkoutSession {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            id: start_time.timestamp_millis(),
            start_time,
            exercises: Vec::new(),
            notes: String::new(),
        }
    }

    pub fn exercise_mut(&mut self, id: ExerciseId) -> Option<&mut Exercise> {
        self.exercises.iter_mut().find(|ex| ex.id == id)
    }

    pub fn total_volume(&self) -> f64 {
        crate::stats::total_volume(&self.exercises)
    }
}

/// A finished workout as stored in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedWorkout {
    pub id: WorkoutId,
    pub start_time: DateTime<Utc>,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub notes: String,
    pub end_time: DateTime<Utc>,
    /// Whole seconds between start and end.
    pub duration: u64,
    #[serde(default)]
    pub total_volume: f64,
}

impl CompletedWorkout {
    pub fn from_session(session: WorkoutSession, end_time: DateTime<Utc>) -> Self {
        let duration = (end_time - session.start_time).num_seconds().max(0) as u64;
        let total_volume = session.total_volume();
        Self {
            id: session.id,
            start_time: session.start_time,
            exercises: session.exercises,
            notes: session.notes,
            end_time,
            duration,
            total_volume,
        }
    }
}

/// Completed workouts, most recent first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog(Vec<CompletedWorkout>);

impl HistoryLog {
    pub fn new(workouts: Vec<CompletedWorkout>) -> Self {
        Self(workouts)
    }

    pub fn prepend(&mut self, workout: CompletedWorkout) {
        self.0.insert(0, workout);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompletedWorkout> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[CompletedWorkout] {
        &self.0
    }
}

/// The blob handed to the persistence store.
///
/// `exercises` mirrors `currentWorkout.exercises` and `workoutStartTime` mirrors
/// `currentWorkout.startTime` in milliseconds; both are rebuilt on every save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub current_workout: Option<WorkoutSession>,
    #[serde(default)]
    pub workout_history: HistoryLog,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub workout_start_time: Option<i64>,
}

impl PersistedState {
    pub fn snapshot(current: Option<&WorkoutSession>, history: &HistoryLog) -> Self {
        Self {
            current_workout: current.cloned(),
            workout_history: history.clone(),
            exercises: current.map(|s| s.exercises.clone()).unwrap_or_default(),
            workout_start_time: current.map(|s| s.start_time.timestamp_millis()),
        }
    }
}

/// Document produced by export and accepted by import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub workout_history: HistoryLog,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

/// Leading integer of `s`, ignoring anything after the digits ("8.5" -> 8).
/// Decimal number at the start of `s` ("62.5kg" reads as 62.5).
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut digits = 0;
    let mut seen_dot = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if digits == 0 {
        return None;
    }
    s[..end].parse().ok()
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(weight: &str, reps: &str, completed: bool) -> Set {
        Set {
            weight: weight.to_string(),
            reps: reps.to_string(),
            completed,
        }
    }

    #[test]
    fn volume_counts_only_completed_filled_sets() {
        assert_eq!(set("100", "5", true).volume(), 500.0);
        assert_eq!(set("100", "5", false).volume(), 0.0);
        assert_eq!(set("", "5", true).volume(), 0.0);
        assert_eq!(set("62.5", "8.9", true).volume(), 500.0);
        assert_eq!(set("abc", "5", true).volume(), 0.0);
    }

    #[test]
    fn set_values_accept_numbers() {
        let set: Set = serde_json::from_str(r#"{"weight": 80, "reps": "10", "completed": true}"#)
            .unwrap();
        assert_eq!(set.weight, "80");
        assert_eq!(set.volume(), 800.0);
    }

    #[test]
    fn snapshot_mirrors_current_workout() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut session = WorkoutSession::new(start);
        session.exercises.push(Exercise::new(1, "Squat"));

        let state = PersistedState::snapshot(Some(&session), &HistoryLog::default());
        assert_eq!(state.exercises, session.exercises);
        assert_eq!(state.workout_start_time, Some(1_700_000_000_000));

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("currentWorkout").is_some());
        assert!(json.get("workoutHistory").unwrap().is_array());
    }

    #[test]
    fn leading_int_parses_prefix() {
        assert_eq!(leading_int(" 12 "), Some(12));
        assert_eq!(leading_int("7kg"), Some(7));
        assert_eq!(leading_int("x7"), None);
    }

    #[test]
    fn weight_reads_a_leading_decimal() {
        assert_eq!(set("62.5kg", "8", true).volume(), 500.0);
        assert_eq!(set(" 40 ", "10", true).volume(), 400.0);
        assert_eq!(set("kg", "8", true).volume(), 0.0);
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("-2.5.1"), Some(-2.5));
        assert_eq!(leading_float("-."), None);
    }
}
