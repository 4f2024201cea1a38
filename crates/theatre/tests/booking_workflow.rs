use std::sync::Arc;
use std::thread;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use theatre::booking::{
    overlaps, BookingError, BookingService, ErrorKind, Interval, MemoryStore, MovieDraft,
    RoomDraft, ScreeningDraft,
};
use theatre::config::BookingConfig;

fn opening_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 11, 22).expect("valid opening day")
}

fn morning() -> NaiveDateTime {
    opening_day().and_time(NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"))
}

fn theatre() -> Arc<BookingService<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    Arc::new(BookingService::new(store, BookingConfig::default()).expect("service builds"))
}

#[test]
fn opening_night_sells_out_then_tomorrow_opens_fresh() {
    let service = theatre();
    let room = service
        .create_room(RoomDraft { capacity: Some(1) })
        .expect("room created");
    let movie = service
        .create_movie(MovieDraft {
            title: "Opening Night".to_string(),
            length: Some("01:00:00".to_string()),
        })
        .expect("movie created");
    let screening = service
        .schedule_screening(ScreeningDraft {
            room: room.id,
            movie: movie.id,
            time: "10:00".to_string(),
        })
        .expect("screening admitted");

    let first = service
        .buy_ticket(screening.id, None, morning())
        .expect("first ticket");
    assert_eq!(first.date, opening_day());

    let second = service.buy_ticket(screening.id, None, morning());
    match second {
        Err(err @ BookingError::SoldOutOrPast { .. }) => assert_eq!(err.kind(), ErrorKind::Conflict),
        other => panic!("expected sold out, got {other:?}"),
    }

    let tomorrow = service
        .buy_ticket(screening.id, Some("2019-11-23"), morning())
        .expect("tomorrow's ticket");
    assert_eq!(tomorrow.date, opening_day() + Duration::days(1));
}

#[test]
fn double_booking_a_room_is_refused() {
    let service = theatre();
    let room = service
        .create_room(RoomDraft { capacity: Some(50) })
        .expect("room created");
    let movie = service
        .create_movie(MovieDraft {
            title: "Epic".to_string(),
            length: Some("03:00:00".to_string()),
        })
        .expect("movie created");

    service
        .schedule_screening(ScreeningDraft {
            room: room.id,
            movie: movie.id,
            time: "18:00".to_string(),
        })
        .expect("evening screening");
    let late = service.schedule_screening(ScreeningDraft {
        room: room.id,
        movie: movie.id,
        time: "20:59".to_string(),
    });
    assert!(matches!(late, Err(BookingError::ConflictingSchedule { .. })));

    service
        .schedule_screening(ScreeningDraft {
            room: room.id,
            movie: movie.id,
            time: "21:00".to_string(),
        })
        .expect("back to back screening");
}

#[test]
fn parallel_buyers_never_exceed_capacity() {
    let service = theatre();
    let room = service
        .create_room(RoomDraft { capacity: Some(10) })
        .expect("room created");
    let movie = service
        .create_movie(MovieDraft {
            title: "Premiere".to_string(),
            length: None,
        })
        .expect("movie created");
    let screening = service
        .schedule_screening(ScreeningDraft {
            room: room.id,
            movie: movie.id,
            time: "19:30".to_string(),
        })
        .expect("screening admitted");

    let buyers: Vec<_> = (0..40)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.buy_ticket(screening.id, None, morning()))
        })
        .collect();

    let mut sold = 0;
    let mut refused = 0;
    for buyer in buyers {
        match buyer.join().expect("buyer finishes") {
            Ok(_) => sold += 1,
            Err(BookingError::SoldOutOrPast { .. }) => refused += 1,
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }
    assert_eq!(sold, 10);
    assert_eq!(refused, 30);

    let seats = service
        .availability(screening.id, None, morning())
        .expect("availability");
    assert_eq!(seats.remaining, 0);
    assert!(!seats.can_sell());
}

#[test]
fn overlap_is_exposed_as_a_pure_function() {
    let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).expect("valid time");
    let matinee = Interval::new(at(14, 0), Duration::minutes(90));
    let evening = Interval::new(at(15, 30), Duration::minutes(90));
    let overlapping = Interval::new(at(15, 29), Duration::minutes(10));

    assert!(!overlaps(&matinee, &evening));
    assert!(overlaps(&matinee, &overlapping));
    assert!(overlaps(&overlapping, &matinee));
}
