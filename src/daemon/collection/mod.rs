use crate::window_api::WindowSample;

pub mod accounting;
pub mod afk;
pub mod collector;

/// Message passed from the collector to the processing module: an active sample together with
/// the duration it is charged with.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSample {
    pub sample: WindowSample,
    pub duration_seconds: f64,
}
