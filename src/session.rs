use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

use crate::model::Session;

// Minutes after midnight, exchange-local.
const OPEN: u32 = 9 * 60 + 30;
const OPENING_END: u32 = 11 * 60;
const POWER_START: u32 = 15 * 60;
const CLOSE: u32 = 16 * 60;

/// Bucket an exchange-local (US/Eastern) bar time. Boundaries are start-inclusive.
pub fn classify_session(timestamp: NaiveDateTime) -> Session {
    let minute_of_day = timestamp.hour() * 60 + timestamp.minute();
    if !(OPEN..CLOSE).contains(&minute_of_day) {
        Session::Off
    } else if minute_of_day < OPENING_END {
        Session::Opening
    } else if minute_of_day < POWER_START {
        Session::Midday
    } else {
        Session::Power
    }
}

/// Which sessions may produce actionable signals. `OFF` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub opening: bool,
    pub midday: bool,
    pub power: bool,
}

impl Default for TimeFilter {
    fn default() -> Self {
        Self {
            opening: true,
            midday: false,
            power: true,
        }
    }
}

impl TimeFilter {
    pub const ALL_SESSIONS: TimeFilter = TimeFilter {
        opening: true,
        midday: true,
        power: true,
    };

    pub fn allows(&self, session: Session) -> bool {
        match session {
            Session::Opening => self.opening,
            Session::Midday => self.midday,
            Session::Power => self.power,
            Session::Off => false,
        }
    }
}

/// Current wall-clock time in US/Eastern, without the offset.
pub fn now_eastern() -> NaiveDateTime {
    to_eastern(Utc::now())
}

/// `now` on the US/Eastern wall clock, matching vendor bar timestamps.
pub fn to_eastern(now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&New_York).naive_local()
}

pub fn utc_label(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
