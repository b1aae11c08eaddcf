//! Admin route handlers (admin role claim required).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use chainline_core::BookingStatus;
use tracing::instrument;

use crate::api::Booking;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// All-bookings page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/bookings.html")]
pub struct AdminBookingsTemplate {
    pub customer: Option<CurrentCustomer>,
    pub bookings: Vec<Booking>,
    pub pending: usize,
}

/// Bookings awaiting the workshop, soonest first, then the rest newest first.
fn workshop_order(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| {
        let open = |booking: &Booking| booking.status.is_cancellable();
        open(b)
            .cmp(&open(a))
            .then_with(|| {
                if open(a) {
                    a.scheduled_for.cmp(&b.scheduled_for)
                } else {
                    b.scheduled_for.cmp(&a.scheduled_for)
                }
            })
    });
    bookings
}

/// Display every customer's bookings.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn bookings(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let bookings = workshop_order(state.api().all_bookings(&admin.token).await?);
    let pending = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Pending)
        .count();

    Ok(AdminBookingsTemplate {
        customer: Some(admin),
        bookings,
        pending,
    })
}

/// Drop cached catalog reads so price and stock edits show up immediately.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn refresh_catalog(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Redirect {
    state.api().invalidate_catalog().await;
    tracing::info!("Catalog cache cleared");
    Redirect::to("/admin/bookings")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chainline_core::{BookingId, ServiceId};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn booking(id: i32, day: u32, status: BookingStatus) -> Booking {
        Booking {
            id: BookingId::new(id),
            service_id: ServiceId::new(1),
            service_name: "Full service".to_string(),
            scheduled_for: Utc.with_ymd_and_hms(2026, 6, day, 10, 0, 0).unwrap(),
            notes: None,
            status,
            customer_email: Some("rider@example.com".to_string()),
        }
    }

    #[test]
    fn test_open_bookings_first_soonest_first() {
        let ordered = workshop_order(vec![
            booking(1, 3, BookingStatus::Completed),
            booking(2, 9, BookingStatus::Pending),
            booking(3, 5, BookingStatus::Confirmed),
            booking(4, 7, BookingStatus::Canceled),
        ]);
        let ids: Vec<i32> = ordered.iter().map(|b| b.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }
}
