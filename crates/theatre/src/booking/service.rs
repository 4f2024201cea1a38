use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::BookingConfig;

use super::availability::{AvailabilityEvaluator, SeatAvailability};
use super::domain::{
    parse_date, parse_length, parse_time, validate_capacity, validate_title, Movie, MovieDraft,
    MovieId, Room, RoomDraft, RoomId, Screening, ScreeningDraft, ScreeningId, Ticket, TicketId,
    ValidationError,
};
use super::guard::SchedulingGuard;
use super::locks::KeyedLocks;
use super::repository::{Entity, Repository, RepositoryError, TheatreStore};

/// Service composing the scheduling guard, availability evaluator and repository.
///
/// Screening admission is serialized per room and ticket sales per
/// `(screening, date)`, so the read-then-write checks cannot be raced by concurrent
/// callers of the same service. Anything that depends on a movie's length also holds
/// that movie's lock. Movie locks are always taken before room locks.
pub struct BookingService<S> {
    store: Arc<S>,
    config: BookingConfig,
    guard: SchedulingGuard,
    movie_locks: KeyedLocks<MovieId>,
    room_locks: KeyedLocks<RoomId>,
    seat_locks: KeyedLocks<(ScreeningId, NaiveDate)>,
    sequences: Sequences,
}

#[derive(Debug)]
struct Sequences {
    room: AtomicU64,
    movie: AtomicU64,
    screening: AtomicU64,
    ticket: AtomicU64,
}

fn next_id(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed)
}

fn first_free_id<E: Entity>(rows: &[E]) -> AtomicU64 {
    let highest = rows
        .iter()
        .map(|row| Into::<u64>::into(row.id()))
        .max()
        .unwrap_or(0);
    AtomicU64::new(highest + 1)
}

impl<S> BookingService<S>
where
    S: TheatreStore,
{
    /// Build the service on top of `store`. Identifier sequences resume after the
    /// highest identifier already stored.
    pub fn new(store: Arc<S>, config: BookingConfig) -> Result<Self, BookingError> {
        let sequences = Sequences {
            room: first_free_id(&Repository::<Room>::list(&*store)?),
            movie: first_free_id(&Repository::<Movie>::list(&*store)?),
            screening: first_free_id(&Repository::<Screening>::list(&*store)?),
            ticket: first_free_id(&Repository::<Ticket>::list(&*store)?),
        };

        Ok(Self {
            store,
            config,
            guard: SchedulingGuard,
            movie_locks: KeyedLocks::default(),
            room_locks: KeyedLocks::default(),
            seat_locks: KeyedLocks::default(),
            sequences,
        })
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn registered_locks(&self) -> usize {
        self.movie_locks.registered()
            + self.room_locks.registered()
            + self.seat_locks.registered()
    }

    fn repo<E: Entity>(&self) -> &dyn Repository<E>
    where
        S: Repository<E>,
    {
        &*self.store
    }

    fn require<E: Entity>(&self, id: E::Id) -> Result<E, BookingError>
    where
        S: Repository<E>,
    {
        self.repo::<E>()
            .get(id)?
            .ok_or_else(|| BookingError::not_found::<E>(id))
    }

    // Rooms

    pub fn rooms(&self) -> Result<Vec<Room>, BookingError> {
        Ok(self.repo::<Room>().list()?)
    }

    pub fn room(&self, id: RoomId) -> Result<Room, BookingError> {
        self.require(id)
    }

    pub fn create_room(&self, draft: RoomDraft) -> Result<Room, BookingError> {
        let capacity = validate_capacity(draft.capacity, self.config.default_room_capacity)?;
        let room = Room {
            id: RoomId(next_id(&self.sequences.room)),
            capacity,
        };
        let room = self.repo::<Room>().save(room)?;
        info!(room = %room.id, capacity = room.capacity, "room created");
        Ok(room)
    }

    /// Replace a room's capacity. An omitted capacity keeps the current value.
    pub fn update_room(&self, id: RoomId, draft: RoomDraft) -> Result<Room, BookingError> {
        let mut room: Room = self.require(id)?;
        room.capacity = validate_capacity(draft.capacity, room.capacity)?;
        let room = self.repo::<Room>().save(room)?;
        info!(room = %room.id, capacity = room.capacity, "room updated");
        Ok(room)
    }

    /// Delete a room together with its screenings and their tickets.
    pub fn delete_room(&self, id: RoomId) -> Result<(), BookingError> {
        self.room_locks.with(&id, || {
            let room: Room = self.require(id)?;
            self.repo::<Room>().delete(room.id)?;
            let screenings = self
                .repo::<Screening>()
                .list()?
                .into_iter()
                .filter(|screening| screening.room == id);
            for screening in screenings {
                self.remove_screening(&screening)?;
            }
            info!(room = %id, "room deleted");
            Ok(())
        })
    }

    // Movies

    pub fn movies(&self) -> Result<Vec<Movie>, BookingError> {
        Ok(self.repo::<Movie>().list()?)
    }

    pub fn movie(&self, id: MovieId) -> Result<Movie, BookingError> {
        self.require(id)
    }

    pub fn create_movie(&self, draft: MovieDraft) -> Result<Movie, BookingError> {
        let title = validate_title(&draft.title)?;
        let length = parse_length(draft.length.as_deref(), self.config.default_movie_length)?;
        let movie = Movie {
            id: MovieId(next_id(&self.sequences.movie)),
            title,
            length,
        };
        let movie = self.repo::<Movie>().save(movie)?;
        info!(movie = %movie.id, title = %movie.title, "movie created");
        Ok(movie)
    }

    /// Replace a movie's title and length. A new length is admitted only when none of
    /// the movie's screenings would then overlap another screening in its room.
    pub fn update_movie(&self, id: MovieId, draft: MovieDraft) -> Result<Movie, BookingError> {
        let title = validate_title(&draft.title)?;

        self.movie_locks.with(&id, || {
            let current: Movie = self.require(id)?;
            let length = parse_length(draft.length.as_deref(), current.length)?;

            if length == current.length {
                let movie = self.repo::<Movie>().save(Movie { title, ..current })?;
                info!(movie = %movie.id, "movie renamed");
                return Ok(movie);
            }

            // Screenings of this movie cannot be added or moved while its lock is held,
            // so this room set stays complete until the save below.
            let rooms: BTreeSet<RoomId> = self
                .repo::<Screening>()
                .list()?
                .into_iter()
                .filter(|screening| screening.movie == id)
                .map(|screening| screening.room)
                .collect();

            self.room_locks.with_all(rooms.iter().copied(), || {
                for room in &rooms {
                    let schedule = self.room_schedule(*room, Some((id, length)))?;
                    let retimed = schedule.iter().filter(|(screening, _)| screening.movie == id);
                    for (screening, slot_length) in retimed {
                        let existing = schedule.iter().map(|(other, len)| (other, *len));
                        let conflict = self.guard.first_conflict(
                            screening,
                            *slot_length,
                            Some(screening.id),
                            existing,
                        );
                        let Some(conflict) = conflict else {
                            continue;
                        };
                        warn!(
                            movie = %id,
                            screening = %screening.id,
                            conflict = %conflict,
                            "movie length change rejected"
                        );
                        return Err(BookingError::ConflictingSchedule {
                            room: *room,
                            existing: conflict,
                        });
                    }
                }

                let movie = self.repo::<Movie>().save(Movie { id, title, length })?;
                info!(movie = %movie.id, length_minutes = length.num_minutes(), "movie updated");
                Ok(movie)
            })
        })
    }

    /// Delete a movie together with its screenings and their tickets.
    pub fn delete_movie(&self, id: MovieId) -> Result<(), BookingError> {
        self.movie_locks.with(&id, || {
            let movie: Movie = self.require(id)?;
            let screenings: Vec<Screening> = self
                .repo::<Screening>()
                .list()?
                .into_iter()
                .filter(|screening| screening.movie == id)
                .collect();
            let rooms = screenings.iter().map(|screening| screening.room);

            self.room_locks.with_all(rooms, || {
                self.repo::<Movie>().delete(movie.id)?;
                for screening in &screenings {
                    self.remove_screening(screening)?;
                }
                info!(movie = %id, screenings = screenings.len(), "movie deleted");
                Ok(())
            })
        })
    }

    // Screenings

    pub fn screenings(&self) -> Result<Vec<Screening>, BookingError> {
        Ok(self.repo::<Screening>().list()?)
    }

    pub fn screening(&self, id: ScreeningId) -> Result<Screening, BookingError> {
        self.require(id)
    }

    /// Admit and persist a new screening unless it overlaps another screening in the
    /// same room. Room and movie are read under their locks, so the check uses the
    /// current movie length.
    pub fn schedule_screening(&self, draft: ScreeningDraft) -> Result<Screening, BookingError> {
        let time = parse_time(&draft.time)?;

        self.movie_locks.with(&draft.movie, || {
            self.room_locks.with(&draft.room, || {
                let room: Room = self.require(draft.room)?;
                let movie: Movie = self.require(draft.movie)?;
                let proposed = Screening {
                    id: ScreeningId(next_id(&self.sequences.screening)),
                    room: room.id,
                    movie: movie.id,
                    time,
                };
                self.admit(&proposed, movie.length, None)?;

                let screening = self.repo::<Screening>().save(proposed)?;
                info!(
                    screening = %screening.id,
                    room = %screening.room,
                    movie = %screening.movie,
                    time = %screening.time,
                    "screening scheduled"
                );
                Ok(screening)
            })
        })
    }

    /// Move a screening to a new room, movie or time. The screening is checked against
    /// every other screening in its target room.
    pub fn reschedule_screening(
        &self,
        id: ScreeningId,
        draft: ScreeningDraft,
    ) -> Result<Screening, BookingError> {
        let time = parse_time(&draft.time)?;

        loop {
            let previous: Screening = self.require(id)?;
            let moved = self.movie_locks.with(&draft.movie, || -> Result<_, BookingError> {
                self.room_locks.with_all([previous.room, draft.room], || {
                    let current: Screening = self.require(id)?;
                    if current.room != previous.room {
                        // Moved by another caller since it was read; lock the new room.
                        return Ok(None);
                    }
                    let room: Room = self.require(draft.room)?;
                    let movie: Movie = self.require(draft.movie)?;
                    let proposed = Screening {
                        id,
                        room: room.id,
                        movie: movie.id,
                        time,
                    };
                    self.admit(&proposed, movie.length, Some(id))?;

                    let screening = self.repo::<Screening>().save(proposed)?;
                    info!(
                        screening = %screening.id,
                        room = %screening.room,
                        time = %screening.time,
                        "screening rescheduled"
                    );
                    Ok(Some(screening))
                })
            })?;
            if let Some(screening) = moved {
                return Ok(screening);
            }
        }
    }

    /// Delete a screening and its tickets.
    pub fn delete_screening(&self, id: ScreeningId) -> Result<(), BookingError> {
        let screening: Screening = self.require(id)?;
        self.room_locks.with(&screening.room, || {
            self.remove_screening(&screening)?;
            info!(screening = %id, "screening deleted");
            Ok(())
        })
    }

    fn admit(
        &self,
        proposed: &Screening,
        length: Duration,
        replacing: Option<ScreeningId>,
    ) -> Result<(), BookingError> {
        let schedule = self.room_schedule(proposed.room, None)?;
        let existing = schedule.iter().map(|(screening, len)| (screening, *len));
        match self.guard.first_conflict(proposed, length, replacing, existing) {
            None => Ok(()),
            Some(conflict) => {
                warn!(
                    room = %proposed.room,
                    time = %proposed.time,
                    conflict = %conflict,
                    "screening rejected: overlaps existing screening"
                );
                Err(BookingError::ConflictingSchedule {
                    room: proposed.room,
                    existing: conflict,
                })
            }
        }
    }

    /// Screenings in `room` paired with the length of their movie. `length_override`
    /// substitutes a pending length for one movie.
    fn room_schedule(
        &self,
        room: RoomId,
        length_override: Option<(MovieId, Duration)>,
    ) -> Result<Vec<(Screening, Duration)>, BookingError> {
        let mut lengths: HashMap<MovieId, Duration> = self
            .repo::<Movie>()
            .list()?
            .into_iter()
            .map(|movie| (movie.id, movie.length))
            .collect();
        if let Some((movie, length)) = length_override {
            lengths.insert(movie, length);
        }

        Ok(self
            .repo::<Screening>()
            .list()?
            .into_iter()
            .filter(|screening| screening.room == room)
            .filter_map(|screening| {
                let length = lengths.get(&screening.movie).copied()?;
                Some((screening, length))
            })
            .collect())
    }

    fn remove_screening(&self, screening: &Screening) -> Result<(), BookingError> {
        self.repo::<Screening>().delete(screening.id)?;
        let tickets: Vec<Ticket> = self
            .repo::<Ticket>()
            .list()?
            .into_iter()
            .filter(|ticket| ticket.screening == screening.id)
            .collect();
        for ticket in &tickets {
            self.repo::<Ticket>().delete(ticket.id)?;
        }
        debug!(
            screening = %screening.id,
            tickets = tickets.len(),
            "screening removed with its tickets"
        );
        Ok(())
    }

    // Tickets

    pub fn ticket(&self, id: TicketId) -> Result<Ticket, BookingError> {
        self.require(id)
    }

    pub fn tickets_for(&self, screening: ScreeningId) -> Result<Vec<Ticket>, BookingError> {
        let screening: Screening = self.require(screening)?;
        Ok(self
            .repo::<Ticket>()
            .list()?
            .into_iter()
            .filter(|ticket| ticket.screening == screening.id)
            .collect())
    }

    /// Sell one ticket for `screening` on `requested_date`, or on the calendar date of
    /// `now` when no date is given.
    pub fn buy_ticket(
        &self,
        screening: ScreeningId,
        requested_date: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Ticket, BookingError> {
        let date = resolve_date(requested_date, now)?;
        let screening: Screening = self.require(screening)?;

        self.seat_locks.with(&(screening.id, date), || {
            let screening: Screening = self.require(screening.id)?;
            let room: Room = self.require(screening.room)?;
            let evaluator = AvailabilityEvaluator::new(self.repo::<Ticket>());

            if !evaluator.are_seats_remaining(&screening, &room, date, now)? {
                warn!(
                    screening = %screening.id,
                    %date,
                    capacity = room.capacity,
                    "ticket rejected: sold out or showing already started"
                );
                return Err(BookingError::SoldOutOrPast {
                    screening: screening.id,
                    date,
                });
            }

            let ticket = self.repo::<Ticket>().save(Ticket {
                id: TicketId(next_id(&self.sequences.ticket)),
                screening: screening.id,
                date,
            })?;
            info!(ticket = %ticket.id, screening = %screening.id, %date, "ticket sold");
            Ok(ticket)
        })
    }

    pub fn availability(
        &self,
        screening: ScreeningId,
        requested_date: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<SeatAvailability, BookingError> {
        let date = resolve_date(requested_date, now)?;
        let screening: Screening = self.require(screening)?;
        let room: Room = self.require(screening.room)?;
        let evaluator = AvailabilityEvaluator::new(self.repo::<Ticket>());
        Ok(evaluator.evaluate(&screening, &room, date, now)?)
    }
}

fn resolve_date(requested: Option<&str>, now: NaiveDateTime) -> Result<NaiveDate, BookingError> {
    match requested {
        Some(raw) => Ok(parse_date(raw)?),
        None => Ok(now.date()),
    }
}

/// Coarse classification of [`BookingError`] used by transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; nothing was written.
    Validation,
    /// Overlapping screening, sold out or past showing, or a store constraint.
    Conflict,
    NotFound,
    Internal,
}

/// Error raised by the booking service. Every variant is scoped to one request.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Overlaps existing screening")]
    ConflictingSchedule { room: RoomId, existing: ScreeningId },
    #[error("Sold out or showing already started")]
    SoldOutOrPast { screening: ScreeningId, date: NaiveDate },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BookingError {
    fn not_found<E: Entity>(id: E::Id) -> Self {
        Self::NotFound {
            kind: E::KIND,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::ConflictingSchedule { .. } | BookingError::SoldOutOrPast { .. } => {
                ErrorKind::Conflict
            }
            BookingError::NotFound { .. } => ErrorKind::NotFound,
            BookingError::Repository(RepositoryError::ConstraintViolation(_)) => {
                ErrorKind::Conflict
            }
            BookingError::Repository(RepositoryError::Unavailable(_)) => ErrorKind::Internal,
        }
    }
}
