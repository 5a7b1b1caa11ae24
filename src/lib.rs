//! Ferroelectric hysteresis loop analysis.
//!
//! Two batch pipelines over a directory of measurement files:
//!
//! * [`transform`] rescales raw instrument exports into compact E–D tables.
//! * [`analysis`] splits each E–D trace into upper and lower branches and
//!   fits the coercive field (Ec) and spontaneous polarization (Ps).
//!
//! [`batch`] drives both over the files selected by [`config::Config`].

pub mod analysis;
pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod transform;

pub use error::LoopError;
