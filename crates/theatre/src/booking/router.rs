use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::clock::Clock;

use super::domain::{
    MovieDraft, MovieId, RoomDraft, RoomId, ScreeningDraft, ScreeningId, TicketId,
};
use super::repository::TheatreStore;
use super::service::{BookingError, BookingService, ErrorKind};

/// Shared handler state: the booking service and the clock that supplies `now`.
pub struct TheatreApi<S, C: ?Sized> {
    service: Arc<BookingService<S>>,
    clock: Arc<C>,
}

impl<S, C: ?Sized> TheatreApi<S, C> {
    pub fn new(service: Arc<BookingService<S>>, clock: Arc<C>) -> Self {
        Self { service, clock }
    }
}

impl<S, C: ?Sized> Clone for TheatreApi<S, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Optional body of a ticket purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyTicketRequest {
    #[serde(default)]
    pub date: Option<String>,
}

/// JSON request body whose decoding failures answer 400 with an `{"error": ...}`
/// payload, like every other client error of this API.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        decode(&body).map(JsonBody)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        let payload = json!({ "error": format!("invalid request body: {err}") });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

/// Router builder exposing the room, movie, screening and ticket endpoints.
pub fn theatre_router<S, C>(service: Arc<BookingService<S>>, clock: Arc<C>) -> Router
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    Router::new()
        .route(
            "/rooms",
            get(list_rooms_handler::<S, C>).post(create_room_handler::<S, C>),
        )
        .route(
            "/rooms/:id",
            get(room_handler::<S, C>)
                .put(update_room_handler::<S, C>)
                .delete(delete_room_handler::<S, C>),
        )
        .route(
            "/movies",
            get(list_movies_handler::<S, C>).post(create_movie_handler::<S, C>),
        )
        .route(
            "/movies/:id",
            get(movie_handler::<S, C>)
                .put(update_movie_handler::<S, C>)
                .delete(delete_movie_handler::<S, C>),
        )
        .route(
            "/screenings",
            get(list_screenings_handler::<S, C>).post(create_screening_handler::<S, C>),
        )
        .route(
            "/screenings/:id",
            get(screening_handler::<S, C>)
                .put(update_screening_handler::<S, C>)
                .delete(delete_screening_handler::<S, C>),
        )
        .route(
            "/screenings/:id/buyticket",
            post(buy_ticket_handler::<S, C>),
        )
        .route(
            "/screenings/:id/availability",
            get(availability_today_handler::<S, C>),
        )
        .route(
            "/screenings/:id/availability/:date",
            get(availability_handler::<S, C>),
        )
        .route(
            "/screenings/:id/tickets",
            get(screening_tickets_handler::<S, C>),
        )
        .route("/tickets/:id", get(ticket_handler::<S, C>))
        .with_state(TheatreApi::new(service, clock))
}

/// Map a booking failure onto a status code and `{"error": ...}` body.
pub fn error_response(err: BookingError) -> Response {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => {
            error!(error = %err, "booking request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, BookingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn respond_empty(result: Result<(), BookingError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_rooms_handler<S, C>(State(api): State<TheatreApi<S, C>>) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.rooms())
}

pub(crate) async fn room_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<RoomId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.room(id))
}

pub(crate) async fn create_room_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    JsonBody(draft): JsonBody<RoomDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::CREATED, api.service.create_room(draft))
}

pub(crate) async fn update_room_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<RoomId>,
    JsonBody(draft): JsonBody<RoomDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.update_room(id, draft))
}

pub(crate) async fn delete_room_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<RoomId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond_empty(api.service.delete_room(id))
}

pub(crate) async fn list_movies_handler<S, C>(State(api): State<TheatreApi<S, C>>) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.movies())
}

pub(crate) async fn movie_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<MovieId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.movie(id))
}

pub(crate) async fn create_movie_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    JsonBody(draft): JsonBody<MovieDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::CREATED, api.service.create_movie(draft))
}

pub(crate) async fn update_movie_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<MovieId>,
    JsonBody(draft): JsonBody<MovieDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.update_movie(id, draft))
}

pub(crate) async fn delete_movie_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<MovieId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond_empty(api.service.delete_movie(id))
}

pub(crate) async fn list_screenings_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.screenings())
}

pub(crate) async fn screening_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.screening(id))
}

pub(crate) async fn create_screening_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    JsonBody(draft): JsonBody<ScreeningDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::CREATED, api.service.schedule_screening(draft))
}

pub(crate) async fn update_screening_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
    JsonBody(draft): JsonBody<ScreeningDraft>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.reschedule_screening(id, draft))
}

pub(crate) async fn delete_screening_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond_empty(api.service.delete_screening(id))
}

/// Accepts an empty body (ticket for today) or `{"date": "YYYY-MM-DD"}`.
pub(crate) async fn buy_ticket_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
    body: Bytes,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        BuyTicketRequest::default()
    } else {
        match decode::<BuyTicketRequest>(&body) {
            Ok(request) => request,
            Err(rejection) => return rejection,
        }
    };

    let now = api.clock.now();
    respond(
        StatusCode::CREATED,
        api.service.buy_ticket(id, request.date.as_deref(), now),
    )
}

pub(crate) async fn availability_today_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    let now = api.clock.now();
    respond(StatusCode::OK, api.service.availability(id, None, now))
}

pub(crate) async fn availability_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path((id, date)): Path<(ScreeningId, String)>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    let now = api.clock.now();
    respond(StatusCode::OK, api.service.availability(id, Some(&date), now))
}

pub(crate) async fn screening_tickets_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<ScreeningId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.tickets_for(id))
}

pub(crate) async fn ticket_handler<S, C>(
    State(api): State<TheatreApi<S, C>>,
    Path(id): Path<TicketId>,
) -> Response
where
    S: TheatreStore,
    C: Clock + ?Sized + 'static,
{
    respond(StatusCode::OK, api.service.ticket(id))
}
