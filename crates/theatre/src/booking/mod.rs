//! Rooms, movies, screenings and tickets.
//!
//! The scheduling guard admits a screening only when it does not overlap another
//! screening in the same room. The availability evaluator allows a ticket sale only
//! while the showing has not started and the room still has seats for that date. The
//! booking service runs both checks under per-key locks so concurrent requests cannot
//! oversell a showing or double-book a room.

pub mod availability;
pub mod domain;
pub mod guard;
pub mod interval;
pub(crate) mod locks;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use availability::{has_started, AvailabilityEvaluator, SeatAvailability};
pub use domain::{
    Movie, MovieDraft, MovieId, Room, RoomDraft, RoomId, Screening, ScreeningDraft, ScreeningId,
    Ticket, TicketId, ValidationError,
};
pub use guard::SchedulingGuard;
pub use interval::{overlaps, Interval};
pub use memory::MemoryStore;
pub use repository::{Entity, Repository, RepositoryError, TheatreStore};
pub use router::{error_response, theatre_router, BuyTicketRequest, JsonBody, TheatreApi};
pub use service::{BookingError, BookingService, ErrorKind};
