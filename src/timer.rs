// Rest countdown state machine and the background tickers that drive it.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stats::format_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestPhase {
    Idle,
    Running,
    Expired,
    Skipped,
}

/// What the last rest timer operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestTransition {
    Started,
    Ticked,
    Extended,
    Expired,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestTimerState {
    pub phase: RestPhase,
    /// Seconds left on the countdown. The display is derived from this.
    pub remaining: u32,
}

impl RestTimerState {
    pub fn display(&self) -> String {
        format_time(self.remaining)
    }
}

/// Countdown between sets.
///
/// `remaining` is the single source of truth: ticks decrement it, extensions
/// add to it, and the shown `MM:SS` is computed from it.
#[derive(Debug, Clone)]
pub struct RestTimer {
    phase: RestPhase,
    remaining: u32,
    extension: u32,
}

impl RestTimer {
    pub fn new(extension: u32) -> Self {
        Self {
            phase: RestPhase::Idle,
            remaining: 0,
            extension,
        }
    }

    /// (Re)start the countdown. A zero duration expires immediately.
    pub fn start(&mut self, seconds: u32) -> RestTransition {
        self.remaining = seconds;
        if seconds == 0 {
            self.phase = RestPhase::Expired;
            return RestTransition::Expired;
        }
        self.phase = RestPhase::Running;
        RestTransition::Started
    }

    /// Advance one second. Ignored unless running.
    pub fn tick(&mut self) -> Option<RestTransition> {
        if self.phase != RestPhase::Running {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.phase = RestPhase::Expired;
            Some(RestTransition::Expired)
        } else {
            Some(RestTransition::Ticked)
        }
    }

    /// Add the extension to the time currently left and keep running.
    pub fn extend(&mut self) -> Option<RestTransition> {
        if self.phase != RestPhase::Running {
            return None;
        }
        self.remaining += self.extension;
        Some(RestTransition::Extended)
    }

    pub fn skip(&mut self) -> Option<RestTransition> {
        if self.phase != RestPhase::Running {
            return None;
        }
        self.phase = RestPhase::Skipped;
        Some(RestTransition::Skipped)
    }

    pub fn is_running(&self) -> bool {
        self.phase == RestPhase::Running
    }

    pub fn state(&self) -> RestTimerState {
        RestTimerState {
            phase: self.phase,
            remaining: self.remaining,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Elapsed,
    Rest,
}

/// One firing of a ticker. `generation` identifies the ticker that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Repeating background tick. Cancelled when dropped.
pub struct Ticker {
    token: CancellationToken,
    generation: u64,
}

impl Ticker {
    /// Spawn a ticker firing every `period`, first after one full period.
    ///
    /// A tick that finds the channel full is dropped, so an undrained channel
    /// never grows past its capacity. The task ends when the receiver is gone.
    pub fn spawn(
        kind: TimerKind,
        generation: u64,
        period: Duration,
        tx: mpsc::Sender<TimerTick>,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        match tx.try_send(TimerTick { kind, generation }) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                debug!("{:?} tick {} dropped, receiver behind", kind, generation);
                            }
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }
            debug!("{:?} ticker {} stopped", kind, generation);
        });

        Self { token, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
