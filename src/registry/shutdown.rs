use std::fmt;

/// Outcome of closing every registered handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Handles closed successfully
    pub closed: Vec<String>,
    /// Handles whose close failed, with the error
    pub failed: Vec<(String, String)>,
    /// The grace period elapsed before every close finished
    pub timed_out: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.timed_out
    }

    pub(crate) fn record(&mut self, handle: String, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.closed.push(handle),
            Err(error) => self.failed.push((handle, error)),
        }
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} closed, {} failed{}",
            self.closed.len(),
            self.failed.len(),
            if self.timed_out { ", timed out" } else { "" }
        )
    }
}
