use std::fmt::{Debug, Display};
use std::hash::Hash;

use super::domain::{Movie, MovieId, Room, RoomId, Screening, ScreeningId, Ticket, TicketId};

/// A persisted record addressed by a copyable identifier.
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    type Id: Copy + Eq + Ord + Hash + Debug + Display + Into<u64> + Send + Sync + 'static;

    /// Human readable entity name used in error messages.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;
}

impl Entity for Room {
    type Id = RoomId;
    const KIND: &'static str = "room";

    fn id(&self) -> RoomId {
        self.id
    }
}

impl Entity for Movie {
    type Id = MovieId;
    const KIND: &'static str = "movie";

    fn id(&self) -> MovieId {
        self.id
    }
}

impl Entity for Screening {
    type Id = ScreeningId;
    const KIND: &'static str = "screening";

    fn id(&self) -> ScreeningId {
        self.id
    }
}

impl Entity for Ticket {
    type Id = TicketId;
    const KIND: &'static str = "ticket";

    fn id(&self) -> TicketId {
        self.id
    }
}

/// Storage abstraction so the booking core can run against any backend.
pub trait Repository<E: Entity>: Send + Sync {
    fn list(&self) -> Result<Vec<E>, RepositoryError>;
    fn get(&self, id: E::Id) -> Result<Option<E>, RepositoryError>;
    /// Insert or replace the record stored under `entity.id()`.
    fn save(&self, entity: E) -> Result<E, RepositoryError>;
    /// Returns `false` when nothing was stored under `id`.
    fn delete(&self, id: E::Id) -> Result<bool, RepositoryError>;
    fn count_where(&self, predicate: &dyn Fn(&E) -> bool) -> Result<usize, RepositoryError>;
}

/// Every collaborator the booking service needs from the persistence layer.
pub trait TheatreStore:
    Repository<Room> + Repository<Movie> + Repository<Screening> + Repository<Ticket> + 'static
{
}

impl<T> TheatreStore for T where
    T: Repository<Room>
        + Repository<Movie>
        + Repository<Screening>
        + Repository<Ticket>
        + 'static
{
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
