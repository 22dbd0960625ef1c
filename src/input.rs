use crate::config::DEFAULT_MAX_MESSAGE_LENGTH;

/// Fraction of the limit at which the input is flagged as nearly full.
pub const WARNING_THRESHOLD: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthLevel {
    Ok,
    Warning,
    OverLimit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputAssessment {
    pub chars: usize,
    pub max: usize,
    pub level: LengthLevel,
}

impl InputAssessment {
    /// Share of the limit in use, capped at 1.0.
    pub fn progress(&self) -> f64 {
        (self.chars as f64 / self.max as f64).min(1.0)
    }

    pub fn is_over_limit(&self) -> bool {
        self.level == LengthLevel::OverLimit
    }
}

/// Message length limits, counted in characters rather than bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputLimits {
    max_length: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LENGTH)
    }
}

impl InputLimits {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn assess(&self, text: &str) -> InputAssessment {
        let chars = text.chars().count();
        let ratio = chars as f64 / self.max_length as f64;
        let level = if chars > self.max_length {
            LengthLevel::OverLimit
        } else if ratio >= WARNING_THRESHOLD {
            LengthLevel::Warning
        } else {
            LengthLevel::Ok
        };
        InputAssessment {
            chars,
            max: self.max_length,
            level,
        }
    }
}
