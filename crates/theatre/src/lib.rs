//! Booking backend for a movie theatre.
//!
//! Rooms, movies, screenings and tickets live behind the [`booking`] module. The
//! scheduling guard keeps screenings in one room from overlapping and the
//! availability evaluator keeps ticket sales within room capacity per calendar date.

pub mod booking;
pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;
