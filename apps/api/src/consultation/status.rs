use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Lifecycle of a consultation request. Changes only through the admin
/// status endpoint; there are no automatic transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Connected,
    Completed,
    Done,
    Cancelled,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 6] = [
        ConsultationStatus::Pending,
        ConsultationStatus::Confirmed,
        ConsultationStatus::Connected,
        ConsultationStatus::Completed,
        ConsultationStatus::Done,
        ConsultationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Confirmed => "confirmed",
            ConsultationStatus::Connected => "connected",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Done => "done",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                AppError::Validation(format!(
                    "Invalid status. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}
