// src/display/terminal.rs
//! Terminal event sink: coloured text or JSON lines

use crate::{
    error::{ParserError, Result},
    gps::data::{GpsEvent, LocationEvent, RawSentenceEvent, SatelliteStatusEvent, SessionStatus},
    sink::EventSink,
};
use chrono::{TimeZone, Utc};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use log::debug;
use serde::Serialize;
use std::{
    io::{self, Write},
    sync::Mutex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonLine<'a> {
    Decoded(&'a GpsEvent),
    Raw(&'a RawSentenceEvent),
    Session { status: SessionStatus },
}

/// Prints every event it receives
pub struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
    format: OutputFormat,
    show_raw: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout(format: OutputFormat, show_raw: bool) -> Self {
        Self::new(io::stdout(), format, show_raw)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, format: OutputFormat, show_raw: bool) -> Self {
        Self {
            out: Mutex::new(out),
            format,
            show_raw,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, render: impl FnOnce(&mut W, OutputFormat) -> Result<()>) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = render(&mut *out, self.format).and_then(|_| out.flush().map_err(ParserError::Io)) {
            debug!("Terminal output failed: {}", e);
        }
    }
}

fn json_line(out: &mut impl Write, line: &JsonLine<'_>) -> Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    writeln!(out)?;
    Ok(())
}

fn format_time(timestamp: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(ts) => ts.format("%H:%M:%S%.3f").to_string(),
        None => timestamp.to_string(),
    }
}

fn render_location(out: &mut impl Write, event: &LocationEvent) -> Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Yellow),
        Print(format!("[{}] LOCATION ", format_time(event.timestamp))),
        ResetColor,
        Print(format!(
            "lat {:>11.6} lon {:>11.6} alt {:>7.1} m  speed {:>6.2} m/s  dir {:>6.1}  acc {:>5.1}\n",
            event.latitude, event.longitude, event.altitude, event.speed, event.direction, event.accuracy
        ))
    )?;
    Ok(())
}

fn render_satellites(out: &mut impl Write, event: &SatelliteStatusEvent) -> Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Magenta),
        Print(format!("SATELLITES {}\n", event.count)),
        ResetColor
    )?;

    for sat in &event.satellites {
        let snr = sat.snr.map_or("--".to_string(), |snr| format!("{:.0}", snr));
        execute!(
            out,
            Print(format!(
                "  PRN {:>3}  SNR {:>3}  el {:>5}  az {:>5}  {}\n",
                sat.prn,
                snr,
                sat.elevation.map_or("--".to_string(), |v| format!("{:.0}", v)),
                sat.azimuth.map_or("--".to_string(), |v| format!("{:.0}", v)),
                sat.signal_strength_description()
            ))
        )?;
    }
    Ok(())
}

impl<W: Write + Send> EventSink for TerminalSink<W> {
    fn on_location(&self, event: &LocationEvent) {
        self.emit(|out, format| match format {
            OutputFormat::Json => json_line(out, &JsonLine::Decoded(&GpsEvent::Location(*event))),
            OutputFormat::Text => render_location(out, event),
        });
    }

    fn on_satellite_status(&self, event: &SatelliteStatusEvent) {
        self.emit(|out, format| match format {
            OutputFormat::Json => json_line(out, &JsonLine::Decoded(&GpsEvent::SatelliteStatus(event.clone()))),
            OutputFormat::Text => render_satellites(out, event),
        });
    }

    fn on_raw_sentence(&self, event: &RawSentenceEvent) {
        if !self.show_raw {
            return;
        }
        self.emit(|out, format| match format {
            OutputFormat::Json => json_line(out, &JsonLine::Raw(event)),
            OutputFormat::Text => {
                execute!(
                    out,
                    SetForegroundColor(Color::Blue),
                    Print(format!("  {}\n", event.text)),
                    ResetColor
                )?;
                Ok(())
            }
        });
    }

    fn on_session_status(&self, status: SessionStatus) {
        self.emit(|out, format| match format {
            OutputFormat::Json => json_line(out, &JsonLine::Session { status }),
            OutputFormat::Text => {
                let label = match status {
                    SessionStatus::Begin => "SESSION BEGIN",
                    SessionStatus::End => "SESSION END",
                };
                execute!(
                    out,
                    SetForegroundColor(Color::Green),
                    Print(format!("{}\n", label)),
                    ResetColor
                )?;
                Ok(())
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::data::SatelliteInfo;

    fn location() -> LocationEvent {
        LocationEvent {
            latitude: 48.1173,
            longitude: 11.516667,
            altitude: 545.4,
            speed: -1.0,
            direction: -1.0,
            accuracy: 0.9,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_json_lines() {
        let sink = TerminalSink::new(Vec::new(), OutputFormat::Json, true);
        sink.on_session_status(SessionStatus::Begin);
        sink.on_location(&location());
        sink.on_raw_sentence(&RawSentenceEvent::new("$GPGSV,1,1,00*79".to_string()));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "session");
        assert_eq!(lines[0]["status"], "Begin");
        assert_eq!(lines[1]["event"], "decoded");
        assert_eq!(lines[1]["type"], "location");
        assert_eq!(lines[1]["altitude"], 545.4);
        assert_eq!(lines[2]["event"], "raw");
        assert_eq!(lines[2]["text"], "$GPGSV,1,1,00*79");
    }

    #[test]
    fn test_text_output() {
        let sink = TerminalSink::new(Vec::new(), OutputFormat::Text, false);
        sink.on_location(&location());
        let mut sat = SatelliteInfo::new(7);
        sat.snr = Some(41.0);
        sink.on_satellite_status(&SatelliteStatusEvent::new(vec![sat]));
        sink.on_raw_sentence(&RawSentenceEvent::new("$GPGSV,1,1,00*79".to_string()));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("LOCATION"));
        assert!(output.contains("SATELLITES 1"));
        assert!(output.contains("Excellent"));
        assert!(!output.contains("$GPGSV"));
    }
}
