//! Workshop booking route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chainline_core::{BookingId, ServiceId};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{ApiError, Booking, BookingInput, CatalogApi, Service};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireCustomer;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Longest note passed on to the workshop.
const MAX_NOTES_CHARS: usize = 500;

/// Booking form data.
#[derive(Debug, Deserialize)]
pub struct BookingForm {
    pub service_id: ServiceId,
    /// `datetime-local` input value (`YYYY-MM-DDTHH:MM`), interpreted as UTC.
    pub scheduled_for: String,
    #[serde(default)]
    pub notes: String,
}

/// Bookings page template.
#[derive(Template, WebTemplate)]
#[template(path = "bookings/index.html")]
pub struct BookingsTemplate {
    pub customer: Option<CurrentCustomer>,
    pub bookings: Vec<Booking>,
    pub services: Vec<Service>,
    pub error: Option<String>,
}

/// Validate the submitted form into an API request.
fn booking_input(form: BookingForm, now: DateTime<Utc>) -> std::result::Result<BookingInput, String> {
    let scheduled_for = NaiveDateTime::parse_from_str(form.scheduled_for.trim(), "%Y-%m-%dT%H:%M")
        .map_err(|_| "Please choose a date and time.".to_string())?
        .and_utc();

    if scheduled_for <= now {
        return Err("Please choose a time in the future.".to_string());
    }

    let notes = form.notes.trim();
    if notes.chars().count() > MAX_NOTES_CHARS {
        return Err(format!(
            "Notes can be at most {MAX_NOTES_CHARS} characters."
        ));
    }

    Ok(BookingInput {
        service_id: form.service_id,
        scheduled_for,
        notes: (!notes.is_empty()).then(|| notes.to_string()),
    })
}

async fn render(
    state: &AppState,
    customer: CurrentCustomer,
    error: Option<String>,
) -> Result<BookingsTemplate> {
    let (bookings, services) = tokio::join!(
        state.api().bookings(&customer.token),
        state.api().services()
    );

    Ok(BookingsTemplate {
        customer: Some(customer),
        bookings: bookings?,
        services: services?,
        error,
    })
}

/// Display the customer's bookings and the booking form.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<impl IntoResponse> {
    render(&state, customer, None).await
}

/// Book a workshop service.
///
/// Validation problems, including ones the API reports, re-render the page
/// with the message.
#[instrument(skip(state, customer, form), fields(customer_id = %customer.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<BookingForm>,
) -> Result<Response> {
    let input = match booking_input(form, Utc::now()) {
        Ok(input) => input,
        Err(message) => {
            let page = render(&state, customer, Some(message)).await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    match state.api().create_booking(&customer.token, &input).await {
        Ok(booking) => {
            tracing::info!(booking_id = %booking.id, "Service booked");
            add_breadcrumb("bookings", "Service booked", None);
            Ok(Redirect::to("/bookings").into_response())
        }
        Err(ApiError::Validation(message)) => {
            let page = render(&state, customer, Some(message)).await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Cancel one of the customer's bookings.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<BookingId>,
) -> Result<Redirect> {
    let booking = state.api().cancel_booking(&customer.token, id).await?;
    tracing::info!(booking_id = %booking.id, status = ?booking.status, "Booking canceled");
    Ok(Redirect::to("/bookings"))
}
