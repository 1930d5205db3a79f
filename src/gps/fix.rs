// src/gps/fix.rs
//! Position/velocity aggregation across GGA and RMC sentences

use super::{
    data::{current_time_millis, LocationEvent, SatelliteStatusEvent},
    nmea::{DecodedSentence, GsvData},
};

/// Knots to meters per second
pub const KNOTS_TO_MPS: f64 = 0.514;

/// Value of a scalar field that no sentence has set yet
pub const UNKNOWN: f64 = -1.0;

/// Latest known fix fields, merged from every decoded GGA/RMC
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixState {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,     // m/s
    pub direction: f64, // degrees true
    pub horizontal_accuracy: f64,
}

impl FixState {
    /// State at session start: position zero, every other scalar unknown
    pub fn unknown() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: UNKNOWN,
            speed: UNKNOWN,
            direction: UNKNOWN,
            horizontal_accuracy: UNKNOWN,
        }
    }
}

#[derive(Debug)]
pub struct FixAggregator {
    state: FixState,
}

impl Default for FixAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl FixAggregator {
    pub fn new() -> Self {
        Self {
            state: FixState::unknown(),
        }
    }

    pub fn state(&self) -> &FixState {
        &self.state
    }

    /// Reset to the unknown sentinels, done when a session starts
    pub fn reset(&mut self) {
        self.state = FixState::unknown();
    }

    /// Zero every field, done when a session ends
    pub fn clear(&mut self) {
        self.state = FixState::default();
    }

    /// Merge a decoded sentence into the fix.
    ///
    /// GGA and RMC each produce a snapshot of the whole fix; fields a
    /// sentence leaves empty keep their previous value.
    pub fn apply(&mut self, sentence: &DecodedSentence) -> Option<LocationEvent> {
        match sentence {
            DecodedSentence::Gga(gga) => {
                merge(&mut self.state.latitude, gga.latitude);
                merge(&mut self.state.longitude, gga.longitude);
                merge(&mut self.state.altitude, gga.altitude);
                merge(&mut self.state.horizontal_accuracy, gga.hdop);
                Some(self.snapshot())
            }
            DecodedSentence::Rmc(rmc) => {
                merge(&mut self.state.latitude, rmc.latitude);
                merge(&mut self.state.longitude, rmc.longitude);
                merge(&mut self.state.speed, rmc.speed_knots.map(|knots| knots * KNOTS_TO_MPS));
                merge(&mut self.state.direction, rmc.track_angle);
                Some(self.snapshot())
            }
            _ => None,
        }
    }

    fn snapshot(&self) -> LocationEvent {
        LocationEvent {
            latitude: self.state.latitude,
            longitude: self.state.longitude,
            altitude: self.state.altitude,
            speed: self.state.speed,
            direction: self.state.direction,
            accuracy: self.state.horizontal_accuracy,
            timestamp: current_time_millis(),
        }
    }
}

fn merge(field: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Satellite status straight from a GSV sentence; the fix is untouched
pub fn satellite_status(gsv: &GsvData) -> SatelliteStatusEvent {
    SatelliteStatusEvent::new(gsv.satellites.clone())
}
