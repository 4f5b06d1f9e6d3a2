//! Vote Ledger Rules
//!
//! A user holds at most one vote per thread. Resubmitting replaces the stored
//! voice, and the thread's vote total moves by the difference:
//!
//! | stored | new | delta |
//! |--------|-----|-------|
//! | none   | +1  | +1    |
//! | none   | -1  | -1    |
//! | +1     | +1  |  0    |
//! | -1     | -1  |  0    |
//! | -1     | +1  | +2    |
//! | +1     | -1  | -2    |
//!
//! The backends apply the delta through the counter aggregator in the same
//! transaction that upserts the vote row.

use crate::error::ForumError;
use serde::{Deserialize, Serialize};

/// A single vote. Only -1 and +1 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Voice {
    Down,
    Up,
}

impl Voice {
    pub fn value(self) -> i32 {
        match self {
            Voice::Down => -1,
            Voice::Up => 1,
        }
    }
}

impl TryFrom<i32> for Voice {
    type Error = ForumError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Voice::Down),
            1 => Ok(Voice::Up),
            other => Err(ForumError::InvalidVoice(other)),
        }
    }
}

impl From<Voice> for i32 {
    fn from(voice: Voice) -> Self {
        voice.value()
    }
}

/// Amount to add to a thread's vote total when `next` replaces `previous`.
pub fn vote_delta(previous: Option<Voice>, next: Voice) -> i32 {
    match previous {
        None => next.value(),
        Some(previous) => next.value() - previous.value(),
    }
}
