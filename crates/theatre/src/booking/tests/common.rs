use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::booking::domain::{
    Movie, MovieDraft, MovieId, Room, RoomDraft, RoomId, Screening, ScreeningDraft, ScreeningId,
};
use crate::booking::interval::Interval;
use crate::booking::memory::MemoryStore;
use crate::booking::repository::{Entity, Repository, RepositoryError};
use crate::booking::router::theatre_router;
use crate::booking::service::BookingService;
use crate::clock::FixedClock;
use crate::config::BookingConfig;

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 11, 22).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

/// 09:00 on [`today`].
pub(super) fn now() -> NaiveDateTime {
    today().and_time(at(9, 0))
}

pub(super) fn interval(hour: u32, minute: u32, minutes: i64) -> Interval {
    Interval::new(at(hour, minute), Duration::minutes(minutes))
}

pub(super) fn screening(id: u64, room: u64, movie: u64, time: NaiveTime) -> Screening {
    Screening {
        id: ScreeningId(id),
        room: RoomId(room),
        movie: MovieId(movie),
        time,
    }
}

pub(super) fn build_service() -> (Arc<BookingService<MemoryStore>>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = BookingService::new(store.clone(), BookingConfig::default())
        .expect("service builds on empty store");
    (Arc::new(service), store)
}

pub(super) fn add_room(service: &BookingService<MemoryStore>, capacity: i64) -> Room {
    service
        .create_room(RoomDraft {
            capacity: Some(capacity),
        })
        .expect("room created")
}

pub(super) fn add_movie(service: &BookingService<MemoryStore>, title: &str, length: &str) -> Movie {
    service
        .create_movie(MovieDraft {
            title: title.to_string(),
            length: Some(length.to_string()),
        })
        .expect("movie created")
}

pub(super) fn draft(room: &Room, movie: &Movie, time: &str) -> ScreeningDraft {
    ScreeningDraft {
        room: room.id,
        movie: movie.id,
        time: time.to_string(),
    }
}

/// Room of `capacity` with a one hour movie screened daily at 10:00.
pub(super) fn seeded_screening(
    service: &BookingService<MemoryStore>,
    capacity: i64,
) -> (Room, Movie, Screening) {
    let room = add_room(service, capacity);
    let movie = add_movie(service, "Short Feature", "01:00:00");
    let screening = service
        .schedule_screening(draft(&room, &movie, "10:00"))
        .expect("screening admitted");
    (room, movie, screening)
}

pub(super) fn theatre_router_with_service(
    service: Arc<BookingService<MemoryStore>>,
) -> axum::Router {
    theatre_router(service, Arc::new(FixedClock(now())))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

type ReadHook = Box<dyn FnOnce() + Send>;

/// Memory store that can be switched offline, failing every call as a lost
/// database connection would. It can also run a callback the next time a movie is
/// read, to interleave another request at that point.
#[derive(Default)]
pub(super) struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
    movie_read_hook: Mutex<Option<ReadHook>>,
}

impl FlakyStore {
    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(super) fn on_next_movie_read(&self, hook: impl FnOnce() + Send + 'static) {
        *self.movie_read_hook.lock().expect("hook mutex") = Some(Box::new(hook));
    }

    fn run_read_hook<E: Entity>(&self) {
        if E::KIND != Movie::KIND {
            return;
        }
        let hook = self.movie_read_hook.lock().expect("hook mutex").take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("database offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl<E: Entity> Repository<E> for FlakyStore
where
    MemoryStore: Repository<E>,
{
    fn list(&self) -> Result<Vec<E>, RepositoryError> {
        self.check()?;
        Repository::<E>::list(&self.inner)
    }

    fn get(&self, id: E::Id) -> Result<Option<E>, RepositoryError> {
        self.check()?;
        let row = Repository::<E>::get(&self.inner, id);
        self.run_read_hook::<E>();
        row
    }

    fn save(&self, entity: E) -> Result<E, RepositoryError> {
        self.check()?;
        Repository::<E>::save(&self.inner, entity)
    }

    fn delete(&self, id: E::Id) -> Result<bool, RepositoryError> {
        self.check()?;
        Repository::<E>::delete(&self.inner, id)
    }

    fn count_where(&self, predicate: &dyn Fn(&E) -> bool) -> Result<usize, RepositoryError> {
        self.check()?;
        Repository::<E>::count_where(&self.inner, predicate)
    }
}
