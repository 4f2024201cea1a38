use std::fmt;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::interval::Interval;

pub const MAX_TITLE_LEN: usize = 200;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an auditorium.
    RoomId
);
entity_id!(
    /// Identifier of a movie in the catalogue.
    MovieId
);
entity_id!(
    /// Identifier of a recurring daily screening.
    ScreeningId
);
entity_id!(
    /// Identifier of a sold ticket.
    TicketId
);

/// An auditorium; its capacity bounds ticket sales per screening and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(with = "length_format")]
    pub length: Duration,
}

/// A movie shown in a room every day at `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screening {
    pub id: ScreeningId,
    pub room: RoomId,
    pub movie: MovieId,
    pub time: NaiveTime,
}

impl Screening {
    /// Time slot the screening occupies in its room each day.
    pub fn interval(&self, movie_length: Duration) -> Interval {
        Interval::new(self.time, movie_length)
    }
}

/// Admission to one screening on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub screening: ScreeningId,
    pub date: NaiveDate,
}

/// Room payload as received from clients. Capacity is signed so negative input is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDraft {
    #[serde(default)]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDraft {
    pub title: String,
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningDraft {
    pub room: RoomId,
    pub movie: MovieId,
    pub time: String,
}

/// Malformed client input. Nothing is written when one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("capacity must be zero or greater (found {0})")]
    NegativeCapacity(i64),
    #[error("capacity {0} is too large")]
    CapacityOutOfRange(i64),
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title must be at most {max} characters (found {found})")]
    TitleTooLong { max: usize, found: usize },
    #[error("'{0}' is not a valid length, expected HH:MM:SS")]
    InvalidLength(String),
    #[error("movie length must be greater than zero")]
    NonPositiveLength,
    #[error("'{0}' is not a valid time of day, expected HH:MM or HH:MM:SS")]
    InvalidTime(String),
    #[error("'{0}' is not a valid date, expected YYYY-MM-DD")]
    InvalidDate(String),
}

pub fn validate_capacity(raw: Option<i64>, default: u32) -> Result<u32, ValidationError> {
    match raw {
        None => Ok(default),
        Some(value) if value < 0 => Err(ValidationError::NegativeCapacity(value)),
        Some(value) => u32::try_from(value).map_err(|_| ValidationError::CapacityOutOfRange(value)),
    }
}

pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let found = title.chars().count();
    if found > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong {
            max: MAX_TITLE_LEN,
            found,
        });
    }
    Ok(title.to_string())
}

pub fn parse_length(raw: Option<&str>, default: Duration) -> Result<Duration, ValidationError> {
    let length = match raw {
        None => default,
        Some(raw) => length_format::parse(raw)
            .ok_or_else(|| ValidationError::InvalidLength(raw.to_string()))?,
    };
    if length <= Duration::zero() {
        return Err(ValidationError::NonPositiveLength);
    }
    Ok(length)
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime(raw.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// `HH:MM:SS` encoding for movie lengths. Hours may exceed 23.
pub mod length_format {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Longest movie length accepted anywhere, in hours.
    pub const MAX_HOURS: i64 = 9_999;

    pub fn format(length: &Duration) -> String {
        let total = length.num_seconds().max(0);
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }

    /// Accepts `HH:MM:SS`, `MM:SS` or a bare number of seconds.
    pub fn parse(raw: &str) -> Option<Duration> {
        let parts = raw
            .trim()
            .split(':')
            .map(|part| part.trim().parse::<i64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let (hours, minutes, seconds) = match parts.as_slice() {
            [seconds] => (0, 0, *seconds),
            [minutes, seconds] => (0, *minutes, *seconds),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return None,
        };

        if !(0..=MAX_HOURS).contains(&hours) || !(0..60).contains(&minutes) {
            return None;
        }
        if !(0..=MAX_HOURS * 3600).contains(&seconds) {
            return None;
        }
        if parts.len() > 1 && seconds >= 60 {
            return None;
        }

        Some(Duration::hours(hours) + Duration::minutes(minutes) + Duration::seconds(seconds))
    }

    pub fn serialize<S>(length: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(length))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("'{raw}' is not a valid length, expected HH:MM:SS"))
        })
    }
}
