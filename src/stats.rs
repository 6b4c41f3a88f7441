// Statistics derived from workout history. Nothing here is stored; everything is recomputed.

use chrono::{Local, NaiveDate};

use crate::models::{CompletedWorkout, Exercise, HistoryLog};

/// Aggregate figures shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStats {
    pub total_workouts: usize,
    pub total_volume: f64,
    pub current_streak: u32,
}

impl HistoryStats {
    pub fn compute(history: &HistoryLog, today: NaiveDate) -> Self {
        Self {
            total_workouts: history.len(),
            total_volume: history.iter().map(|w| w.total_volume).sum(),
            current_streak: current_streak(history, today),
        }
    }
}

/// One line of the recent-history list.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub date: NaiveDate,
    pub exercise_count: usize,
    pub duration: String,
    pub total_volume: f64,
}

impl WorkoutSummary {
    pub fn of(workout: &CompletedWorkout) -> Self {
        Self {
            date: workout.start_time.with_timezone(&Local).date_naive(),
            exercise_count: workout.exercises.len(),
            duration: format_duration(workout.duration),
            total_volume: workout.total_volume,
        }
    }
}

/// Summaries of the `limit` most recent workouts.
pub fn recent_summaries(history: &HistoryLog, limit: usize) -> Vec<WorkoutSummary> {
    history.iter().take(limit).map(WorkoutSummary::of).collect()
}

/// Sum of `weight * reps` over completed sets with both values present.
pub fn total_volume(exercises: &[Exercise]) -> f64 {
    exercises.iter().map(Exercise::volume).sum()
}

/// Consecutive workout days counted back from `today`.
///
/// A single missed day is tolerated only before the first match: a workout
/// yesterday but not today still starts the streak at 1. Later gaps end it.
pub fn current_streak(history: &HistoryLog, today: NaiveDate) -> u32 {
    let mut streak: u32 = 0;
    for workout in history.iter() {
        let day = workout.start_time.with_timezone(&Local).date_naive();
        let days_diff = (today - day).num_days();

        if days_diff == i64::from(streak) {
            streak += 1;
        } else if days_diff == i64::from(streak) + 1 {
            if streak == 0 {
                streak = 1;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    streak
}

/// `H:MM:SS` once past an hour, `M:SS` below.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// `MM:SS`, as shown on the rest timer.
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
