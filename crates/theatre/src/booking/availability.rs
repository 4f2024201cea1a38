use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::domain::{Room, Screening, ScreeningId, Ticket};
use super::repository::{Repository, RepositoryError};

/// Seat situation of one screening on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAvailability {
    pub screening: ScreeningId,
    pub date: NaiveDate,
    pub capacity: u32,
    pub sold: u32,
    pub remaining: u32,
    pub started: bool,
}

impl SeatAvailability {
    pub fn can_sell(&self) -> bool {
        !self.started && self.sold < self.capacity
    }
}

/// True once the showing of `screening` on `date` has begun relative to `now`.
pub fn has_started(screening: &Screening, date: NaiveDate, now: NaiveDateTime) -> bool {
    date.and_time(screening.time) < now
}

/// Decides whether another ticket may be sold for a screening and date.
///
/// Each date of a recurring screening has its own pool of `room.capacity` seats, so
/// only tickets for the requested date are counted.
pub struct AvailabilityEvaluator<'a, R: ?Sized> {
    tickets: &'a R,
}

impl<'a, R> AvailabilityEvaluator<'a, R>
where
    R: Repository<Ticket> + ?Sized,
{
    pub fn new(tickets: &'a R) -> Self {
        Self { tickets }
    }

    pub fn sold(&self, screening: ScreeningId, date: NaiveDate) -> Result<u32, RepositoryError> {
        let count = self
            .tickets
            .count_where(&|ticket| ticket.screening == screening && ticket.date == date)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    pub fn evaluate(
        &self,
        screening: &Screening,
        room: &Room,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SeatAvailability, RepositoryError> {
        let started = has_started(screening, date, now);
        let sold = self.sold(screening.id, date)?;
        let remaining = if started {
            0
        } else {
            room.capacity.saturating_sub(sold)
        };

        Ok(SeatAvailability {
            screening: screening.id,
            date,
            capacity: room.capacity,
            sold,
            remaining,
            started,
        })
    }

    /// Backdated or already started showings never have seats remaining, whatever
    /// the capacity.
    pub fn are_seats_remaining(
        &self,
        screening: &Screening,
        room: &Room,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<bool, RepositoryError> {
        if has_started(screening, date, now) {
            return Ok(false);
        }
        Ok(self.sold(screening.id, date)? < room.capacity)
    }
}
