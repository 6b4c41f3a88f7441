//! Workout session tracking with local persistence, plus an offline asset cache.
//!
//! [`session::SessionEngine`] owns the in-progress workout and its history and
//! writes them through a [`store::StateStore`] after every change.
//! [`cache::gateway::CacheGateway`] serves app assets from a versioned cache.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod stats;
pub mod store;
pub mod timer;
pub mod transfer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{GatewayError, ImportError, NetworkError, SessionError, StoreError};
pub use models::{CompletedWorkout, Exercise, HistoryLog, Set, SetField, WorkoutSession};
pub use session::{Change, SessionEngine};
