//! Call log record and the call state machine.
//!
//! ```text
//! ringing ──answer──▶ answered ──end──▶ ended
//!    │ └────────────────end────────────▶ ended
//!    └──reject──▶ declined
//! ```
//!
//! `ended` and `declined` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TetherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Audio,
    Video,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for CallKind {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(TetherError::validation("call_type must be 'audio' or 'video'")),
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ringing,
    Answered,
    Declined,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Answered => "answered",
            Self::Declined => "declined",
            Self::Ended => "ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Ended)
    }
}

impl FromStr for CallStatus {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ringing" => Ok(Self::Ringing),
            "answered" => Ok(Self::Answered),
            "declined" => Ok(Self::Declined),
            "ended" => Ok(Self::Ended),
            other => Err(TetherError::Internal(anyhow::anyhow!(
                "unknown call status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a call an identity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Caller,
    Callee,
}

/// Audit record for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub kind: CallKind,
    pub status: CallStatus,
    pub channel_name: String,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds; zero until the call ends.
    pub duration_secs: i64,
}

impl CallLog {
    /// A freshly initiated call, ringing.
    pub fn ringing(
        id: Uuid,
        caller_id: Uuid,
        callee_id: Uuid,
        kind: CallKind,
        channel_name: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            caller_id,
            callee_id,
            kind,
            status: CallStatus::Ringing,
            channel_name,
            started_at,
            answered_at: None,
            ended_at: None,
            duration_secs: 0,
        }
    }

    pub fn participant(&self, user_id: Uuid) -> Option<Participant> {
        if user_id == self.caller_id {
            Some(Participant::Caller)
        } else if user_id == self.callee_id {
            Some(Participant::Callee)
        } else {
            None
        }
    }

    /// The other side of the call from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if user_id == self.caller_id {
            self.callee_id
        } else {
            self.caller_id
        }
    }

    /// `ringing → answered`.
    pub fn answer(&mut self, now: DateTime<Utc>) -> Result<(), TetherError> {
        if self.status != CallStatus::Ringing {
            return Err(TetherError::invalid_state("call is no longer ringing"));
        }
        self.status = CallStatus::Answered;
        self.answered_at = Some(now);
        Ok(())
    }

    /// `ringing → declined`.
    pub fn decline(&mut self, now: DateTime<Utc>) -> Result<(), TetherError> {
        if self.status != CallStatus::Ringing {
            return Err(TetherError::invalid_state("call is no longer ringing"));
        }
        self.status = CallStatus::Declined;
        self.ended_at = Some(now);
        Ok(())
    }

    /// `ringing | answered → ended`. Duration counts from the answer, never negative.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), TetherError> {
        if self.status.is_terminal() {
            return Err(TetherError::invalid_state("call has already finished"));
        }
        self.duration_secs = self
            .answered_at
            .map(|answered| (now - answered).num_seconds().max(0))
            .unwrap_or(0);
        self.status = CallStatus::Ended;
        self.ended_at = Some(now);
        Ok(())
    }
}
