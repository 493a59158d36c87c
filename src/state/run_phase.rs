//! Run lifecycle and stop-reason definitions
//!
//! A run moves strictly forward through `Idle -> Running -> Draining -> Finished`.

use crate::HoundError;
use serde::Serialize;
use std::fmt;

/// Lifecycle phase of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Created, frontier not yet seeded
    Idle,

    /// Workers are pulling from the frontier
    Running,

    /// Stop decided; waiting for in-flight workers within the grace period
    Draining,

    /// Summary built; nothing else happens in this run
    Finished,
}

impl RunPhase {
    /// Returns true if `next` is the phase that legally follows this one
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Finished)
        )
    }

    /// Moves to `next`, rejecting skipped or backward transitions
    pub fn transition(self, next: RunPhase) -> Result<RunPhase, HoundError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HoundError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run stopped accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The caller's target of new records was met
    QuotaReached,

    /// The hard ceiling on detail fetches was hit
    CrawlLimit,

    /// The wall-clock budget ran out
    Deadline,

    /// No work left and no worker could produce more
    FrontierExhausted,

    /// The caller cancelled the run
    Cancelled,
}

impl StopReason {
    /// Converts the reason to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::QuotaReached => "quota_reached",
            Self::CrawlLimit => "crawl_limit",
            Self::Deadline => "deadline",
            Self::FrontierExhausted => "frontier_exhausted",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a reason from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "quota_reached" => Some(Self::QuotaReached),
            "crawl_limit" => Some(Self::CrawlLimit),
            "deadline" => Some(Self::Deadline),
            "frontier_exhausted" => Some(Self::FrontierExhausted),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::QuotaReached,
            Self::CrawlLimit,
            Self::Deadline,
            Self::FrontierExhausted,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
