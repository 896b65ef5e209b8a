// src/keystroke/features.rs - Keystroke timing feature extraction
use crate::error::{BiometricError, Result};
use crate::utils::{mean, std_dev};
use serde::{Deserialize, Serialize};

/// Minimum timed intervals for a sample to carry enough signal
const MIN_TIMED_INTERVALS: usize = 10;

/// Edge of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEdge {
    Down,
    Up,
}

/// One raw key event captured during a typed attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub edge: KeyEdge,
    /// Monotonic timestamp in milliseconds
    pub timestamp_ms: f64,
}

impl KeyEvent {
    pub fn down(key: &str, timestamp_ms: f64) -> Self {
        KeyEvent {
            key: key.to_string(),
            edge: KeyEdge::Down,
            timestamp_ms,
        }
    }

    pub fn up(key: &str, timestamp_ms: f64) -> Self {
        KeyEvent {
            key: key.to_string(),
            edge: KeyEdge::Up,
            timestamp_ms,
        }
    }
}

/// Timing series measured from one typed attempt
#[derive(Debug, Clone, Default)]
pub struct KeystrokeTimings {
    /// Key-down to matching key-up, per key press
    pub hold_times: Vec<f64>,
    /// Consecutive key-down to key-down intervals
    pub down_down: Vec<f64>,
    /// Key-up to next key-down intervals (flight times)
    pub up_down: Vec<f64>,
    /// Key-down events observed (excluding Enter)
    pub key_count: usize,
    /// Backspace key-down events
    pub backspace_count: usize,
    /// Span from first to last key-down in milliseconds
    pub duration_ms: f64,
}

impl KeystrokeTimings {
    fn timed_intervals(&self) -> usize {
        self.hold_times.len() + self.down_down.len() + self.up_down.len()
    }
}

/// Extracts fixed-length feature vectors from raw key event streams
#[derive(Debug, Clone)]
pub struct KeystrokeFeatureExtractor {
    password_length: usize,
}

impl KeystrokeFeatureExtractor {
    pub fn new(password_length: usize) -> Self {
        KeystrokeFeatureExtractor { password_length }
    }

    /// Feature vector length produced by this extractor: 3*L + 1
    pub fn feature_length(&self) -> usize {
        3 * self.password_length + 1
    }

    /// Convert one attempt's events into a fixed-length feature vector.
    ///
    /// Layout: hold[0..L] ++ down_down[0..L-1] ++ up_down[0..L-1]
    /// ++ [typing_speed, mean_flight_time, error_rate, press_pressure],
    /// each series truncated or zero-padded to its slot.
    pub fn extract(&self, events: &[KeyEvent]) -> Result<Vec<f64>> {
        let timings = self.measure(events);

        if timings.timed_intervals() < MIN_TIMED_INTERVALS {
            return Err(BiometricError::InsufficientSignal(format!(
                "captured {} timed intervals, need at least {}",
                timings.timed_intervals(),
                MIN_TIMED_INTERVALS
            )));
        }

        // Keys per second over the span of the attempt
        let typing_speed = if timings.duration_ms > 0.0 {
            timings.key_count as f64 / (timings.duration_ms / 1000.0)
        } else {
            0.0
        };
        let mean_flight_time = mean(&timings.up_down);
        let error_rate = timings.backspace_count as f64;
        let press_pressure = std_dev(&timings.hold_times);

        let l = self.password_length;
        let mut features = Vec::with_capacity(self.feature_length());
        push_padded(&mut features, &timings.hold_times, l);
        push_padded(&mut features, &timings.down_down, l.saturating_sub(1));
        push_padded(&mut features, &timings.up_down, l.saturating_sub(1));
        features.push(typing_speed);
        features.push(mean_flight_time);
        features.push(error_rate);
        features.push(press_pressure);
        features.truncate(self.feature_length());

        Ok(features)
    }

    /// Measure the raw timing series from an event stream (Enter is skipped)
    pub fn measure(&self, events: &[KeyEvent]) -> KeystrokeTimings {
        let events: Vec<&KeyEvent> = events.iter().filter(|e| e.key != "Enter").collect();

        let downs: Vec<(usize, &KeyEvent)> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.edge == KeyEdge::Down)
            .map(|(i, e)| (i, *e))
            .collect();

        let mut timings = KeystrokeTimings {
            key_count: downs.len(),
            ..Default::default()
        };

        if let (Some((_, first)), Some((_, last))) = (downs.first(), downs.last()) {
            timings.duration_ms = last.timestamp_ms - first.timestamp_ms;
        }

        // Hold time: each key-down paired with the next same-key key-up
        let mut matched_ups: Vec<Option<&KeyEvent>> = Vec::with_capacity(downs.len());
        for (index, down) in &downs {
            let up = events[index + 1..]
                .iter()
                .find(|e| e.edge == KeyEdge::Up && e.key == down.key)
                .copied();
            if let Some(up) = up {
                timings.hold_times.push(up.timestamp_ms - down.timestamp_ms);
            }
            matched_ups.push(up);

            if down.key == "Backspace" {
                timings.backspace_count += 1;
            }
        }

        // Down-down and up-down intervals over consecutive key-downs.
        // When the current key has no matching up event (truncated capture or
        // stuck key), the up-down interval falls back to down-down.
        for i in 0..downs.len().saturating_sub(1) {
            let (_, current) = downs[i];
            let (_, next) = downs[i + 1];

            timings
                .down_down
                .push(next.timestamp_ms - current.timestamp_ms);

            let up_down = match matched_ups[i] {
                Some(up) => next.timestamp_ms - up.timestamp_ms,
                None => next.timestamp_ms - current.timestamp_ms,
            };
            timings.up_down.push(up_down);
        }

        timings
    }
}

fn push_padded(out: &mut Vec<f64>, values: &[f64], len: usize) {
    for i in 0..len {
        out.push(values.get(i).copied().unwrap_or(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Regular typing: 11 keys, hold 100ms, down-down 150ms
    pub(crate) fn synthetic_events() -> Vec<KeyEvent> {
        synthetic_events_with_hold(100.0)
    }

    pub(crate) fn synthetic_events_with_hold(hold_ms: f64) -> Vec<KeyEvent> {
        let keys = ["p", "a", "s", "s", "w", "o", "r", "d", "x", "y", "z"];
        let mut events = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let down = i as f64 * 150.0;
            events.push(KeyEvent::down(key, down));
            events.push(KeyEvent::up(key, down + hold_ms));
        }
        events
    }

    #[test]
    fn test_vector_length_is_3l_plus_1() {
        let extractor = KeystrokeFeatureExtractor::new(11);
        let features = extractor.extract(&synthetic_events()).unwrap();
        assert_eq!(features.len(), 34);
    }

    #[test]
    fn test_timing_series_values() {
        let extractor = KeystrokeFeatureExtractor::new(11);
        let timings = extractor.measure(&synthetic_events());

        assert_eq!(timings.hold_times.len(), 11);
        assert_eq!(timings.down_down.len(), 10);
        assert_eq!(timings.up_down.len(), 10);
        assert!(timings.hold_times.iter().all(|&h| (h - 100.0).abs() < 1e-9));
        assert!(timings.down_down.iter().all(|&d| (d - 150.0).abs() < 1e-9));
        assert!(timings.up_down.iter().all(|&u| (u - 50.0).abs() < 1e-9));
        assert_eq!(timings.backspace_count, 0);
    }

    #[test]
    fn test_up_down_fallback_without_matching_up() {
        // Second key never releases; its flight time falls back to down-down
        let events = vec![
            KeyEvent::down("a", 0.0),
            KeyEvent::up("a", 80.0),
            KeyEvent::down("b", 150.0),
            KeyEvent::down("c", 300.0),
            KeyEvent::up("c", 380.0),
        ];
        let extractor = KeystrokeFeatureExtractor::new(3);
        let timings = extractor.measure(&events);

        assert_eq!(timings.up_down.len(), 2);
        assert!((timings.up_down[0] - 70.0).abs() < 1e-9); // 150 - 80
        assert!((timings.up_down[1] - 150.0).abs() < 1e-9); // fallback: 300 - 150
    }

    #[test]
    fn test_enter_is_ignored_and_backspace_counted() {
        let mut events = synthetic_events();
        events.push(KeyEvent::down("Enter", 2000.0));
        events.push(KeyEvent::up("Enter", 2050.0));
        events.insert(4, KeyEvent::down("Backspace", 200.0));
        events.insert(5, KeyEvent::up("Backspace", 260.0));

        let extractor = KeystrokeFeatureExtractor::new(11);
        let timings = extractor.measure(&events);
        assert_eq!(timings.backspace_count, 1);
        assert_eq!(timings.key_count, 12); // 11 keys + backspace, no Enter
    }

    #[test]
    fn test_insufficient_signal_rejected() {
        let events = vec![
            KeyEvent::down("a", 0.0),
            KeyEvent::up("a", 90.0),
            KeyEvent::down("b", 140.0),
            KeyEvent::up("b", 230.0),
        ];
        let extractor = KeystrokeFeatureExtractor::new(11);
        match extractor.extract(&events) {
            Err(BiometricError::InsufficientSignal(_)) => {}
            other => panic!("expected InsufficientSignal, got {:?}", other.map(|v| v.len())),
        }
    }
}
