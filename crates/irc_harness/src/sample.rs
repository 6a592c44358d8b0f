use std::time::{Duration, Instant, SystemTime};

pub const RESPONSE_CODE_OK: &str = "200";
pub const RESPONSE_CODE_ERROR: &str = "500";

/// Outcome of one virtual user invocation, in the shape the load-test driver records.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub label: String,
    pub request_text: String,
    pub response_text: String,
    pub success: bool,
    pub error_text: Option<String>,
    pub response_code: String,
    pub response_message: String,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub elapsed: Duration,
    start_instant: Option<Instant>,
}

impl SampleResult {
    pub fn new(label: impl Into<String>) -> Self {
        SampleResult {
            label: label.into(),
            request_text: String::new(),
            response_text: String::new(),
            success: false,
            error_text: None,
            response_code: String::new(),
            response_message: String::new(),
            started_at: None,
            ended_at: None,
            elapsed: Duration::ZERO,
            start_instant: None,
        }
    }

    pub fn sample_start(&mut self) {
        self.started_at = Some(SystemTime::now());
        self.start_instant = Some(Instant::now());
    }

    /// Stops the timer. Without a prior `sample_start` the elapsed time stays zero.
    pub fn sample_end(&mut self) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(SystemTime::now());
        if let Some(start) = self.start_instant {
            self.elapsed = start.elapsed();
        }
    }

    pub fn set_success(&mut self, response: String) {
        self.response_text = response;
        self.success = true;
        self.error_text = None;
        self.response_code = RESPONSE_CODE_OK.to_owned();
        self.response_message = "OK".to_owned();
    }

    pub fn set_failure(&mut self, error: &impl std::fmt::Display) {
        let error = error.to_string();
        self.response_text = error.clone();
        self.success = false;
        self.response_code = RESPONSE_CODE_ERROR.to_owned();
        self.response_message = error.clone();
        self.error_text = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_then_timing() {
        let mut result = SampleResult::new("vu0000000");
        result.sample_start();
        result.set_failure(&"boom");
        result.sample_end();
        assert!(!result.success);
        assert_eq!(result.response_code, "500");
        assert_eq!(result.error_text.as_deref(), Some("boom"));
        assert_eq!(result.response_text, "boom");
        assert!(result.started_at.unwrap() <= result.ended_at.unwrap());
    }

    #[test]
    fn test_end_without_start_keeps_zero_elapsed() {
        let mut result = SampleResult::new("x");
        result.sample_end();
        assert_eq!(result.elapsed, Duration::ZERO);
        assert!(result.started_at.is_none());
    }
}
