use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{Movie, Room, Screening, Ticket};
use super::repository::{Entity, Repository, RepositoryError};

/// In-process backend for the booking service.
///
/// Each entity lives in its own table. Saving a screening or ticket checks that the
/// records it references exist, the way foreign keys would in a relational store.
/// Cascading deletes are the service's job.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Table<Room>,
    movies: Table<Movie>,
    screenings: Table<Screening>,
    tickets: Table<Ticket>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_screening(&self, screening: &Screening) -> Result<(), RepositoryError> {
        if !self.rooms.contains(screening.room)? {
            return Err(RepositoryError::ConstraintViolation(format!(
                "screening {} references missing room {}",
                screening.id, screening.room
            )));
        }
        if !self.movies.contains(screening.movie)? {
            return Err(RepositoryError::ConstraintViolation(format!(
                "screening {} references missing movie {}",
                screening.id, screening.movie
            )));
        }
        Ok(())
    }

    fn check_ticket(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
        if !self.screenings.contains(ticket.screening)? {
            return Err(RepositoryError::ConstraintViolation(format!(
                "ticket {} references missing screening {}",
                ticket.id, ticket.screening
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Table<E: Entity> {
    rows: Mutex<BTreeMap<E::Id, E>>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<E: Entity> Table<E> {
    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<E::Id, E>>, RepositoryError> {
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} table lock poisoned", E::KIND)))
    }

    fn contains(&self, id: E::Id) -> Result<bool, RepositoryError> {
        Ok(self.rows()?.contains_key(&id))
    }
}

macro_rules! memory_repository {
    ($entity:ty, $table:ident $(, $check:ident)?) => {
        impl Repository<$entity> for MemoryStore {
            fn list(&self) -> Result<Vec<$entity>, RepositoryError> {
                Ok(self.$table.rows()?.values().cloned().collect())
            }

            fn get(&self, id: <$entity as Entity>::Id) -> Result<Option<$entity>, RepositoryError> {
                Ok(self.$table.rows()?.get(&id).cloned())
            }

            fn save(&self, entity: $entity) -> Result<$entity, RepositoryError> {
                $(self.$check(&entity)?;)?
                self.$table.rows()?.insert(entity.id(), entity.clone());
                Ok(entity)
            }

            fn delete(&self, id: <$entity as Entity>::Id) -> Result<bool, RepositoryError> {
                Ok(self.$table.rows()?.remove(&id).is_some())
            }

            fn count_where(
                &self,
                predicate: &dyn Fn(&$entity) -> bool,
            ) -> Result<usize, RepositoryError> {
                Ok(self
                    .$table
                    .rows()?
                    .values()
                    .filter(|row| predicate(row))
                    .count())
            }
        }
    };
}

memory_repository!(Room, rooms);
memory_repository!(Movie, movies);
memory_repository!(Screening, screenings, check_screening);
memory_repository!(Ticket, tickets, check_ticket);
