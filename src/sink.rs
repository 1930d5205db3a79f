// src/sink.rs
//! Consumer callback contracts

use crate::gps::data::{LocationEvent, RawSentenceEvent, SatelliteStatusEvent, SessionStatus};

/// Receives decoded events on the dispatch worker thread.
///
/// Every callback is fire-and-forget. Implementations default to no-ops so
/// a consumer only overrides the events it cares about.
pub trait EventSink: Send + Sync {
    fn on_location(&self, _event: &LocationEvent) {}

    fn on_satellite_status(&self, _event: &SatelliteStatusEvent) {}

    fn on_raw_sentence(&self, _event: &RawSentenceEvent) {}

    fn on_session_status(&self, _status: SessionStatus) {}
}

