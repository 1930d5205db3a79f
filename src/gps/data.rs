// src/gps/data.rs
//! GPS event structures delivered to consumers

use chrono::Utc;
use serde::Serialize;

/// Maximum number of satellites carried by a single status event
pub const MAX_SATELLITES: usize = 32;

/// Wall-clock time in milliseconds since the Unix epoch
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SatelliteInfo {
    pub prn: u16,               // Satellite PRN/ID number
    pub snr: Option<f32>,       // Signal-to-noise ratio in dB-Hz
    pub elevation: Option<f32>, // Elevation angle in degrees
    pub azimuth: Option<f32>,   // Azimuth angle in degrees
}

impl SatelliteInfo {
    pub fn new(prn: u16) -> Self {
        Self {
            prn,
            ..Default::default()
        }
    }

    pub fn signal_strength_description(&self) -> &'static str {
        match self.snr {
            Some(snr) if snr >= 40.0 => "Excellent",
            Some(snr) if snr >= 35.0 => "Good",
            Some(snr) if snr >= 25.0 => "Fair",
            Some(snr) if snr >= 15.0 => "Poor",
            Some(_) => "Very Poor",
            None => "Unknown",
        }
    }
}

/// Snapshot of the aggregated fix, emitted after every GGA or RMC sentence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationEvent {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,  // meters above MSL
    pub speed: f64,     // m/s
    pub direction: f64, // degrees true
    pub accuracy: f64,  // HDOP
    pub timestamp: i64, // ms since epoch, taken when the event was built
}

/// Satellites in view, accumulated over a GSV sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteStatusEvent {
    pub count: usize,
    pub satellites: Vec<SatelliteInfo>,
}

impl SatelliteStatusEvent {
    pub fn new(satellites: Vec<SatelliteInfo>) -> Self {
        Self {
            count: satellites.len(),
            satellites,
        }
    }
}

/// A validated sentence exactly as framed in the stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSentenceEvent {
    pub timestamp: i64,
    pub text: String,
    pub length: usize,
}

impl RawSentenceEvent {
    pub fn new(text: String) -> Self {
        Self {
            timestamp: current_time_millis(),
            length: text.len(),
            text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Begin,
    End,
}

/// Decoded event produced alongside the raw sentence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GpsEvent {
    Location(LocationEvent),
    SatelliteStatus(SatelliteStatusEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sentence_length() {
        let raw = RawSentenceEvent::new("$GPGSA,A,3,,,,,,,,,,,,,1.0,1.0,1.0*30".to_string());
        assert_eq!(raw.length, raw.text.len());
        assert!(raw.timestamp > 0);
    }

    #[test]
    fn test_satellite_status_count() {
        let status = SatelliteStatusEvent::new(vec![SatelliteInfo::new(1), SatelliteInfo::new(2)]);
        assert_eq!(status.count, 2);
    }

    #[test]
    fn test_signal_strength_description() {
        let mut sat = SatelliteInfo::new(12);
        assert_eq!(sat.signal_strength_description(), "Unknown");
        sat.snr = Some(46.0);
        assert_eq!(sat.signal_strength_description(), "Excellent");
        sat.snr = Some(20.0);
        assert_eq!(sat.signal_strength_description(), "Poor");
    }
}
