//! Audio engine - decks, EQ, crossfader, scheduler and the facade
//!
//! - Deck: single-track player with gain ramp, EQ and time-stretch
//! - ThreeBandEq: cascaded biquad EQ used by each deck
//! - Crossfader: position-to-mix-parameter mapping with automation
//! - Scheduler / SchedulerRenderer: playlist playback across two decks
//! - AutomixEngine: the host-facing facade

mod crossfader;
mod deck;
mod engine;
mod eq;
mod scheduler;

pub use crossfader::{Crossfader, CurveType};
pub use deck::Deck;
pub use engine::AutomixEngine;
pub use eq::{BiquadCoeffs, ThreeBandEq};
pub use scheduler::{Scheduler, SchedulerRenderer, StatusCallback, TrackLoader};
