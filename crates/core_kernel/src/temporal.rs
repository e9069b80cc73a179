//! Coverage period handling
//!
//! Insurance enrollment is expressed in calendar dates: coverage starts on
//! a given day and either runs open-ended or ends on an inclusive end date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must not be after end {end}")]
    InvalidPeriod {
        start: String,
        end: String,
    },
}

/// Where a date falls relative to a coverage period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodPosition {
    /// Coverage has not started yet
    NotStarted,
    /// Date is inside the period
    Active,
    /// Coverage ended before the date
    Expired,
}

/// The dates an insurance policy is in force
///
/// Both bounds are inclusive; `end = None` means open-ended coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePeriod {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl CoveragePeriod {
    /// Creates a new coverage period
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let Some(end) = end {
            if start > end {
                return Err(TemporalError::InvalidPeriod {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(Self { start, end })
    }

    /// Creates an open-ended period
    pub fn open_ended(start: NaiveDate) -> Self {
        Self { start, end: None }
    }

    /// Classifies a date against this period
    pub fn position(&self, date: NaiveDate) -> PeriodPosition {
        if date < self.start {
            PeriodPosition::NotStarted
        } else if self.end.is_some_and(|end| date > end) {
            PeriodPosition::Expired
        } else {
            PeriodPosition::Active
        }
    }

    /// Returns true if this period contains the given date
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.position(date) == PeriodPosition::Active
    }
}
