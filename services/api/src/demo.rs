use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use std::sync::Arc;
use theatre::booking::{
    BookingError, BookingService, MemoryStore, MovieDraft, RoomDraft, ScreeningDraft, Ticket,
};
use theatre::config::BookingConfig;
use theatre::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Calendar date the demo treats as today (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Seats in the demo room.
    #[arg(long, default_value_t = 1)]
    pub(crate) capacity: u32,
}

/// Outcome of one purchase attempt in the demo run.
#[derive(Debug)]
pub(crate) struct Purchase {
    pub(crate) label: &'static str,
    pub(crate) outcome: Result<Ticket, BookingError>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let now = today.and_time(NaiveTime::MIN);

    println!("Theatre booking demo");
    println!("  Today: {today}");
    println!("  Room capacity: {}", args.capacity);

    for purchase in sell_out(args.capacity, now)? {
        match purchase.outcome {
            Ok(ticket) => println!(
                "  {}: ticket {} for screening {} on {}",
                purchase.label, ticket.id, ticket.screening, ticket.date
            ),
            Err(err) => println!("  {}: rejected ({err})", purchase.label),
        }
    }
    Ok(())
}

/// Fill one evening screening for today, try once more, then buy for tomorrow.
pub(crate) fn sell_out(capacity: u32, now: NaiveDateTime) -> Result<Vec<Purchase>, AppError> {
    let store = Arc::new(MemoryStore::new());
    let service = BookingService::new(store, BookingConfig::default())?;

    let room = service.create_room(RoomDraft {
        capacity: Some(i64::from(capacity)),
    })?;
    let movie = service.create_movie(MovieDraft {
        title: "The Demo Reel".to_string(),
        length: Some("01:00:00".to_string()),
    })?;
    let screening = service.schedule_screening(ScreeningDraft {
        room: room.id,
        movie: movie.id,
        time: "20:00".to_string(),
    })?;

    let mut purchases = Vec::new();
    for _ in 0..capacity {
        purchases.push(Purchase {
            label: "today",
            outcome: service.buy_ticket(screening.id, None, now),
        });
    }
    purchases.push(Purchase {
        label: "today, room full",
        outcome: service.buy_ticket(screening.id, None, now),
    });

    let tomorrow = (now.date() + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    purchases.push(Purchase {
        label: "tomorrow",
        outcome: service.buy_ticket(screening.id, Some(&tomorrow), now),
    });

    Ok(purchases)
}
