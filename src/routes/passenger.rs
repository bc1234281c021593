use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{logout_guard, passenger_validator, AuthUser},
    bookings::{self, NewBooking},
    db::log_activity,
    models::{stars, BookingRow, SERVICE_PLATFORM, SERVICE_TRAIN, STATUS_COMPLETED, STATUS_PENDING},
    pricing::{LuggageCounts, PriceTable, MAX_BAGS_PER_TYPE},
    routes::booking_error_response,
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct PriceLine {
    bag_type: String,
    unit_price: i64,
}

#[derive(Clone, Debug)]
struct BookingFormView {
    passenger_name: String,
    passenger_phone: String,
    pnr_number: String,
    train_number: String,
    platform_number: String,
    coach_number: String,
    trolley: String,
    suitcase: String,
    backpack: String,
    handbag: String,
    carton: String,
    train_selected: bool,
}

impl BookingFormView {
    fn empty(auth: &AuthUser) -> Self {
        Self {
            passenger_name: auth.name.clone(),
            passenger_phone: String::new(),
            pnr_number: String::new(),
            train_number: String::new(),
            platform_number: String::new(),
            coach_number: String::new(),
            trolley: "0".to_string(),
            suitcase: "0".to_string(),
            backpack: "0".to_string(),
            handbag: "0".to_string(),
            carton: "0".to_string(),
            train_selected: false,
        }
    }
}

#[derive(Clone, Debug)]
struct BookingItemView {
    id: String,
    status: String,
    luggage: String,
    service_label: String,
    pnr_number: String,
    train_number: String,
    platform_number: String,
    coach_number: String,
    price: i64,
    created_at: String,
    porter_name: String,
    porter_phone: String,
    has_porter: bool,
    can_cancel: bool,
    can_rate: bool,
    has_rating: bool,
    rating_display: String,
}

#[derive(Template)]
#[template(path = "passenger_dashboard.html")]
struct PassengerDashboardTemplate {
    passenger_name: String,
    prices: Vec<PriceLine>,
    train_pickup_charge: i64,
    form: BookingFormView,
    errors: Vec<String>,
    bookings: Vec<BookingItemView>,
    has_bookings: bool,
}

#[derive(Deserialize)]
struct BookingForm {
    passenger_name: String,
    passenger_phone: String,
    pnr_number: String,
    train_number: String,
    platform_number: String,
    coach_number: String,
    trolley_bags: Option<String>,
    suitcase_bags: Option<String>,
    backpack_bags: Option<String>,
    handbag_bags: Option<String>,
    carton_bags: Option<String>,
    service_type: String,
}

#[derive(Deserialize)]
struct RatingForm {
    rating: i64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/passenger")
            .wrap(HttpAuthentication::basic(passenger_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/bookings").route(web::post().to(create_booking)))
            .service(web::resource("/bookings/{id}/cancel").route(web::post().to(cancel_booking)))
            .service(web::resource("/bookings/{id}/rating").route(web::post().to(rate_booking))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/passenger/dashboard"))
        .finish()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let prices = PriceTable::load(&state.db).await;
    let form = BookingFormView::empty(&auth);
    Ok(render_dashboard(&state, &auth, &prices, form, Vec::new()).await)
}

async fn render_dashboard(
    state: &web::Data<AppState>,
    auth: &AuthUser,
    prices: &PriceTable,
    form: BookingFormView,
    errors: Vec<String>,
) -> HttpResponse {
    let rows = bookings::passenger_bookings(&state.db, &auth.id)
        .await
        .unwrap_or_default();
    let bookings: Vec<BookingItemView> = rows.into_iter().map(to_item_view).collect();

    let price_lines = prices
        .entries()
        .iter()
        .map(|entry| PriceLine {
            bag_type: entry.bag_type.clone(),
            unit_price: entry.unit_price,
        })
        .collect();

    render(PassengerDashboardTemplate {
        passenger_name: auth.name.clone(),
        prices: price_lines,
        train_pickup_charge: crate::pricing::TRAIN_PICKUP_CHARGE,
        form,
        errors,
        has_bookings: !bookings.is_empty(),
        bookings,
    })
}

async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<BookingForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let counts = LuggageCounts {
        trolley: parse_count(form.trolley_bags.as_deref()),
        suitcase: parse_count(form.suitcase_bags.as_deref()),
        backpack: parse_count(form.backpack_bags.as_deref()),
        handbag: parse_count(form.handbag_bags.as_deref()),
        carton: parse_count(form.carton_bags.as_deref()),
    };

    let mut errors = Vec::new();
    if form.passenger_name.trim().is_empty() {
        errors.push("Passenger name is required.".to_string());
    }
    let phone = form.passenger_phone.trim();
    if !(phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())) {
        errors.push("Please enter a valid 10-digit phone number.".to_string());
    }
    if form.pnr_number.trim().is_empty() {
        errors.push("PNR number is required.".to_string());
    }
    if form.train_number.trim().is_empty() {
        errors.push("Train number is required.".to_string());
    }
    if counts.total() == 0 {
        errors.push("Please select at least one luggage item.".to_string());
    }
    if form.service_type != SERVICE_PLATFORM && form.service_type != SERVICE_TRAIN {
        errors.push("Please choose a service type.".to_string());
    }

    let prices = PriceTable::load(&state.db).await;

    if !errors.is_empty() {
        let form_view = BookingFormView {
            passenger_name: form.passenger_name,
            passenger_phone: form.passenger_phone,
            pnr_number: form.pnr_number,
            train_number: form.train_number,
            platform_number: form.platform_number,
            coach_number: form.coach_number,
            trolley: counts.trolley.to_string(),
            suitcase: counts.suitcase.to_string(),
            backpack: counts.backpack.to_string(),
            handbag: counts.handbag.to_string(),
            carton: counts.carton.to_string(),
            train_selected: form.service_type == SERVICE_TRAIN,
        };
        return Ok(render_dashboard(&state, &auth, &prices, form_view, errors).await);
    }

    let new = NewBooking {
        passenger_id: auth.id.clone(),
        passenger_name: form.passenger_name.trim().to_string(),
        passenger_phone: phone.to_string(),
        pnr_number: form.pnr_number.trim().to_string(),
        train_number: form.train_number.trim().to_string(),
        platform_number: form.platform_number.trim().to_string(),
        coach_number: form.coach_number.trim().to_string(),
        counts,
        service_type: form.service_type,
    };

    let booking = match bookings::create_booking(&state.db, &prices, new).await {
        Ok(booking) => booking,
        Err(err) => return Ok(booking_error_response(err)),
    };

    log_activity(
        &state.db,
        "booking_created",
        &format!("{} booked a porter for train {}.", booking.passenger_name, booking.train_number),
        Some(&auth.id),
        Some(&booking.id),
    )
    .await;

    let _ = state.events.send(ServerEvent::from_row("booking_created", booking));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/passenger/dashboard"))
        .finish())
}

async fn cancel_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    if let Err(err) = bookings::cancel_booking(&state.db, &booking_id, &auth.id).await {
        return Ok(booking_error_response(err));
    }

    log_activity(
        &state.db,
        "booking_cancelled",
        &format!("{} cancelled a pending booking.", auth.name),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let _ = state
        .events
        .send(ServerEvent::removed("booking_cancelled", &booking_id));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/passenger/dashboard"))
        .finish())
}

async fn rate_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<RatingForm>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let booking = match bookings::rate_booking(&state.db, &booking_id, &auth.id, form.rating).await
    {
        Ok(booking) => booking,
        Err(err) => return Ok(booking_error_response(err)),
    };

    log_activity(
        &state.db,
        "booking_rated",
        &format!("{} rated a completed booking {} stars.", auth.name, form.rating),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let _ = state.events.send(ServerEvent::from_row("booking_rated", booking));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/passenger/dashboard"))
        .finish())
}

/// Reads a bag-count field, treating anything unparseable as zero and
/// clamping the rest into 0..=MAX_BAGS_PER_TYPE.
fn parse_count(value: Option<&str>) -> i64 {
    value
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0)
        .clamp(0, MAX_BAGS_PER_TYPE)
}

fn to_item_view(row: BookingRow) -> BookingItemView {
    let luggage = row.luggage_summary();
    let has_porter = row.porter_id.is_some();
    let can_cancel = row.status == STATUS_PENDING && row.porter_id.is_none();
    let can_rate = row.status == STATUS_COMPLETED && row.rating.is_none();
    let service_label = if row.service_type == SERVICE_TRAIN {
        "Inside Train Pickup"
    } else {
        "Platform Pickup"
    };

    BookingItemView {
        id: row.id,
        status: row.status,
        luggage,
        service_label: service_label.to_string(),
        pnr_number: row.pnr_number,
        train_number: row.train_number,
        platform_number: row.platform_number,
        coach_number: row.coach_number,
        price: row.price,
        created_at: row.created_at,
        porter_name: row.porter_name.unwrap_or_else(|| "Unassigned".to_string()),
        porter_phone: row.porter_phone.unwrap_or_else(|| "N/A".to_string()),
        has_porter,
        can_cancel,
        can_rate,
        has_rating: row.rating.is_some(),
        rating_display: row.rating.map(stars).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_fields_are_clamped_into_range() {
        assert_eq!(parse_count(Some("3")), 3);
        assert_eq!(parse_count(Some(" 7 ")), 7);
        assert_eq!(parse_count(Some("-2")), 0);
        assert_eq!(parse_count(Some("9223372036854775807")), MAX_BAGS_PER_TYPE);
        assert_eq!(parse_count(Some("999999")), MAX_BAGS_PER_TYPE);
    }

    #[test]
    fn unparseable_count_fields_read_as_zero() {
        assert_eq!(parse_count(None), 0);
        assert_eq!(parse_count(Some("")), 0);
        assert_eq!(parse_count(Some("two")), 0);
    }
}
