//! Detection of repeated identical tool calls.
//!
//! A model that keeps issuing the same call with the same arguments is not
//! making progress; the engine injects corrective guidance instead of
//! burning the remaining step budget on repeats.

use std::collections::VecDeque;

/// Guidance injected when a loop is detected.
pub const STUCK_GUIDANCE: &str = "Observation:\nThe same tool call has now been repeated several times with identical arguments and identical results. The current approach is not working. Analyze why the previous attempts failed, then either try a different tool or different arguments, or explain the problem in a final answer.";

pub struct LoopDetector {
    recent: VecDeque<String>,
    threshold: usize,
}

impl LoopDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(threshold),
            threshold: threshold.max(2),
        }
    }

    /// Record a tool invocation.
    pub fn record(&mut self, tool: &str, arguments: &serde_json::Value) {
        let key = format!("{tool}:{arguments}");
        if self.recent.len() == self.threshold {
            self.recent.pop_front();
        }
        self.recent.push_back(key);
    }

    /// True when the last `threshold` invocations were identical.
    pub fn is_stuck(&self) -> bool {
        if self.recent.len() < self.threshold {
            return false;
        }
        let first = &self.recent[0];
        self.recent.iter().all(|k| k == first)
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_identical_calls_trip_the_detector() {
        let mut detector = LoopDetector::new(3);
        let args = serde_json::json!({"a": 1});
        detector.record("add", &args);
        assert!(!detector.is_stuck());
        detector.record("add", &args);
        assert!(!detector.is_stuck());
        detector.record("add", &args);
        assert!(detector.is_stuck());
    }

    #[test]
    fn different_arguments_reset_progress() {
        let mut detector = LoopDetector::new(3);
        detector.record("add", &serde_json::json!({"a": 1}));
        detector.record("add", &serde_json::json!({"a": 2}));
        detector.record("add", &serde_json::json!({"a": 1}));
        assert!(!detector.is_stuck());
    }

    #[test]
    fn reset_clears_history() {
        let mut detector = LoopDetector::new(2);
        let args = serde_json::json!({});
        detector.record("t", &args);
        detector.record("t", &args);
        assert!(detector.is_stuck());
        detector.reset();
        assert!(!detector.is_stuck());
    }
}
