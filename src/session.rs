// Workout session state machine: the single owner of the active workout and its history.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{TrackerConfig, RECENT_HISTORY_LIMIT, TICK_BUFFER, TICK_INTERVAL};
use crate::error::{ImportError, SessionError};
use crate::models::{
    CompletedWorkout, Exercise, ExerciseId, ExportDocument, HistoryLog, PersistedState, Set,
    SetField, WorkoutId, WorkoutSession,
};
use crate::stats::{recent_summaries, HistoryStats, WorkoutSummary};
use crate::store::StateStore;
use crate::timer::{RestTimer, RestTimerState, RestTransition, Ticker, TimerKind, TimerTick};
use crate::transfer;

/// Notification sent to observers after every state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    WorkoutStarted { id: WorkoutId },
    WorkoutResumed { id: WorkoutId },
    /// Exercises or sets of the active workout changed.
    ExercisesChanged,
    WorkoutFinished { id: WorkoutId, duration: u64 },
    WorkoutCancelled,
    HistoryReplaced { workouts: usize },
    Elapsed { seconds: u64 },
    Rest { transition: RestTransition, state: RestTimerState },
}

pub struct SessionEngine<S: StateStore> {
    store: S,
    clock: Arc<dyn Clock>,
    rest_seconds: u32,
    active: Option<WorkoutSession>,
    history: HistoryLog,
    last_exercise_id: ExerciseId,
    rest: RestTimer,
    elapsed_ticker: Option<Ticker>,
    rest_ticker: Option<Ticker>,
    next_generation: u64,
    tick_tx: mpsc::Sender<TimerTick>,
    tick_rx: mpsc::Receiver<TimerTick>,
    changes: broadcast::Sender<Change>,
}

impl<S: StateStore> SessionEngine<S> {
    /// Load saved state and resume any workout that was in progress.
    ///
    /// A store that fails to load is treated as empty.
    pub async fn open(store: S, clock: Arc<dyn Clock>, config: &TrackerConfig) -> Self {
        let state = match store.load().await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("could not load saved state, starting fresh: {}", e);
                PersistedState::default()
            }
        };

        let (tick_tx, tick_rx) = mpsc::channel(TICK_BUFFER);
        let (changes, _) = broadcast::channel(64);

        let mut engine = Self {
            store,
            clock,
            rest_seconds: config.rest_seconds,
            active: None,
            history: HistoryLog::default(),
            last_exercise_id: 0,
            rest: RestTimer::new(config.rest_extension_seconds),
            elapsed_ticker: None,
            rest_ticker: None,
            next_generation: 0,
            tick_tx,
            tick_rx,
            changes,
        };
        engine.restore(state);
        engine.resume_workout();
        engine
    }

    fn restore(&mut self, state: PersistedState) {
        self.history = state.workout_history;
        self.active = state.current_workout.map(|mut session| {
            if session.exercises.is_empty() {
                session.exercises = state.exercises;
            }
            session
        });
        self.last_exercise_id = self
            .active
            .iter()
            .flat_map(|s| s.exercises.iter().map(|ex| ex.id))
            .max()
            .unwrap_or(0);
        debug!(
            "restored state: active={} history={}",
            self.active.is_some(),
            self.history.len()
        );
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub fn active(&self) -> Option<&WorkoutSession> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn rest_state(&self) -> RestTimerState {
        self.rest.state()
    }

    /// Seconds since the active workout started, measured on the wall clock.
    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.active
            .as_ref()
            .map(|s| (self.clock.now() - s.start_time).num_seconds().max(0) as u64)
    }

    pub fn is_tracking_elapsed(&self) -> bool {
        self.elapsed_ticker.is_some()
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats::compute(&self.history, self.clock.today())
    }

    pub fn recent(&self) -> Vec<WorkoutSummary> {
        recent_summaries(&self.history, RECENT_HISTORY_LIMIT)
    }

    /// Begin a new workout. Rejected while another one is in progress.
    pub async fn start_workout(&mut self) -> Result<WorkoutId, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::WorkoutInProgress);
        }
        let session = WorkoutSession::new(self.clock.now());
        let id = session.id;
        self.active = Some(session);
        self.start_elapsed_ticker();
        self.persist().await;

        info!("workout {} started", id);
        self.emit(Change::WorkoutStarted { id });
        Ok(id)
    }

    /// Restart elapsed tracking for a workout restored from the store.
    ///
    /// Returns false when there is nothing to resume or tracking is already running.
    pub fn resume_workout(&mut self) -> bool {
        let Some(id) = self.active.as_ref().map(|s| s.id) else {
            return false;
        };
        if self.elapsed_ticker.is_some() {
            return false;
        }
        self.start_elapsed_ticker();

        info!(
            "workout {} resumed, {}s elapsed",
            id,
            self.elapsed_seconds().unwrap_or(0)
        );
        self.emit(Change::WorkoutResumed { id });
        true
    }

    pub async fn add_exercise(&mut self, name: &str) -> Result<ExerciseId, SessionError> {
        if self.active.is_none() {
            return Err(SessionError::NoActiveSession);
        }
        let id = self.next_exercise_id();
        if let Some(session) = self.active.as_mut() {
            session.exercises.push(Exercise::new(id, name));
        }
        self.persist().await;

        debug!("added exercise {} ({})", id, name);
        self.emit(Change::ExercisesChanged);
        Ok(id)
    }

    /// Remove an exercise. Unknown ids are ignored.
    pub async fn remove_exercise(&mut self, exercise_id: ExerciseId) -> bool {
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        let before = session.exercises.len();
        session.exercises.retain(|ex| ex.id != exercise_id);
        if session.exercises.len() == before {
            return false;
        }
        self.commit_exercises().await;
        true
    }

    pub async fn add_set(&mut self, exercise_id: ExerciseId) -> bool {
        let Some(exercise) = self.exercise_mut(exercise_id) else {
            return false;
        };
        exercise.sets.push(Set::default());
        self.commit_exercises().await;
        true
    }

    /// Remove a set. The last remaining set of an exercise is never removed.
    pub async fn remove_set(&mut self, exercise_id: ExerciseId, index: usize) -> bool {
        let Some(exercise) = self.exercise_mut(exercise_id) else {
            return false;
        };
        if exercise.sets.len() <= 1 || index >= exercise.sets.len() {
            return false;
        }
        exercise.sets.remove(index);
        self.commit_exercises().await;
        true
    }

    /// Overwrite the weight or reps input of a set. The value is stored as entered.
    pub async fn update_set(
        &mut self,
        exercise_id: ExerciseId,
        index: usize,
        field: SetField,
        value: &str,
    ) -> bool {
        let Some(set) = self
            .exercise_mut(exercise_id)
            .and_then(|ex| ex.sets.get_mut(index))
        else {
            return false;
        };
        match field {
            SetField::Weight => set.weight = value.to_string(),
            SetField::Reps => set.reps = value.to_string(),
        }
        self.commit_exercises().await;
        true
    }

    /// Mark a set done and start the rest countdown.
    ///
    /// Returns `Ok(false)` for an unknown exercise or index.
    pub async fn complete_set(
        &mut self,
        exercise_id: ExerciseId,
        index: usize,
    ) -> Result<bool, SessionError> {
        let Some(set) = self
            .exercise_mut(exercise_id)
            .and_then(|ex| ex.sets.get_mut(index))
        else {
            return Ok(false);
        };
        if !set.is_filled() {
            return Err(SessionError::IncompleteSet { exercise_id, index });
        }
        set.completed = true;
        debug!("completed set {} of exercise {}", index, exercise_id);

        self.commit_exercises().await;
        self.start_rest(self.rest_seconds);
        Ok(true)
    }

    /// Close the active workout and prepend it to history.
    pub async fn finish_workout(&mut self) -> Result<CompletedWorkout, SessionError> {
        match self.active.as_ref() {
            None => return Err(SessionError::NoActiveSession),
            Some(session) if session.exercises.is_empty() => {
                return Err(SessionError::NoExercises)
            }
            Some(_) => {}
        }
        self.elapsed_ticker = None;
        let Some(session) = self.active.take() else {
            return Err(SessionError::NoActiveSession);
        };

        let completed = CompletedWorkout::from_session(session, self.clock.now());
        self.history.prepend(completed.clone());
        self.persist().await;

        info!(
            "workout {} finished after {}s, volume {}",
            completed.id, completed.duration, completed.total_volume
        );
        self.emit(Change::WorkoutFinished {
            id: completed.id,
            duration: completed.duration,
        });
        Ok(completed)
    }

    /// Discard the active workout. Nothing happens unless `confirmed` is true.
    pub async fn cancel_workout(&mut self, confirmed: bool) -> bool {
        if !confirmed || self.active.is_none() {
            return false;
        }
        self.elapsed_ticker = None;
        let discarded = self.active.take();
        self.persist().await;

        if let Some(session) = discarded {
            info!("workout {} cancelled", session.id);
        }
        self.emit(Change::WorkoutCancelled);
        true
    }

    /// Start a rest countdown, replacing any countdown already running.
    pub fn start_rest(&mut self, seconds: u32) -> RestTimerState {
        self.rest_ticker = None;
        let transition = self.rest.start(seconds);
        if transition == RestTransition::Started {
            self.start_rest_ticker();
        }
        self.emit_rest(transition)
    }

    /// Add the extension to what is left on the running countdown.
    pub fn extend_rest(&mut self) -> Option<RestTimerState> {
        let transition = self.rest.extend()?;
        self.start_rest_ticker();
        Some(self.emit_rest(transition))
    }

    pub fn skip_rest(&mut self) -> Option<RestTimerState> {
        let transition = self.rest.skip()?;
        self.rest_ticker = None;
        Some(self.emit_rest(transition))
    }

    /// Wait for the next live timer tick and apply it.
    ///
    /// The host drives the timers by calling this in a loop. Ticks from
    /// cancelled timers are discarded. Ticks are buffered up to `TICK_BUFFER`
    /// and dropped beyond that, so a rest countdown only advances while the
    /// host keeps calling. Pends while no timer runs.
    pub async fn next_tick(&mut self) -> Option<Change> {
        loop {
            let tick = self.tick_rx.recv().await?;
            if let Some(change) = self.apply_tick(tick) {
                return Some(change);
            }
        }
    }

    fn apply_tick(&mut self, tick: TimerTick) -> Option<Change> {
        match tick.kind {
            TimerKind::Elapsed => {
                if !is_current(&self.elapsed_ticker, tick.generation) {
                    return None;
                }
                let seconds = self.elapsed_seconds()?;
                let change = Change::Elapsed { seconds };
                self.emit(change.clone());
                Some(change)
            }
            TimerKind::Rest => {
                if !is_current(&self.rest_ticker, tick.generation) {
                    return None;
                }
                let transition = self.rest.tick()?;
                if transition == RestTransition::Expired {
                    self.rest_ticker = None;
                }
                let state = self.emit_rest(transition);
                Some(Change::Rest { transition, state })
            }
        }
    }

    pub fn export(&self) -> ExportDocument {
        transfer::export_history(&self.history, self.clock.now())
    }

    /// Replace history with the one in `raw`. Malformed input leaves history untouched.
    pub async fn import_history(&mut self, raw: &str) -> Result<usize, ImportError> {
        let history = match transfer::parse_import(raw) {
            Ok(history) => history,
            Err(e) => {
                warn!("import rejected: {}", e);
                return Err(e);
            }
        };
        let workouts = history.len();
        self.history = history;
        self.persist().await;

        info!("imported {} workouts", workouts);
        self.emit(Change::HistoryReplaced { workouts });
        Ok(workouts)
    }

    fn exercise_mut(&mut self, exercise_id: ExerciseId) -> Option<&mut Exercise> {
        self.active.as_mut()?.exercise_mut(exercise_id)
    }

    /// Millisecond timestamp, bumped past the previous id when two land in the same millisecond.
    fn next_exercise_id(&mut self) -> ExerciseId {
        let id = self
            .clock
            .now()
            .timestamp_millis()
            .max(self.last_exercise_id + 1);
        self.last_exercise_id = id;
        id
    }

    fn start_elapsed_ticker(&mut self) {
        let generation = self.bump_generation();
        self.elapsed_ticker = Some(Ticker::spawn(
            TimerKind::Elapsed,
            generation,
            TICK_INTERVAL,
            self.tick_tx.clone(),
        ));
    }

    fn start_rest_ticker(&mut self) {
        // Drop the old ticker first so two countdowns never overlap.
        self.rest_ticker = None;
        let generation = self.bump_generation();
        self.rest_ticker = Some(Ticker::spawn(
            TimerKind::Rest,
            generation,
            TICK_INTERVAL,
            self.tick_tx.clone(),
        ));
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    async fn commit_exercises(&mut self) {
        self.persist().await;
        self.emit(Change::ExercisesChanged);
    }

    /// Write-through save. A failed save is logged; in-memory state stays authoritative.
    async fn persist(&self) {
        let state = PersistedState::snapshot(self.active.as_ref(), &self.history);
        if let Err(e) = self.store.save(&state).await {
            warn!("failed to persist workout state: {}", e);
        }
    }

    fn emit_rest(&self, transition: RestTransition) -> RestTimerState {
        let state = self.rest.state();
        debug!("rest timer {:?}, {} left", transition, state.display());
        self.emit(Change::Rest { transition, state });
        state
    }

    fn emit(&self, change: Change) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

fn is_current(ticker: &Option<Ticker>, generation: u64) -> bool {
    ticker.as_ref().map(Ticker::generation) == Some(generation)
}
