use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{logout_guard, porter_validator, AuthUser},
    bookings,
    db::log_activity,
    models::{stars, BookingRow, SERVICE_TRAIN},
    routes::booking_error_response,
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct JobView {
    id: String,
    passenger_name: String,
    passenger_phone: String,
    platform_number: String,
    coach_number: String,
    train_number: String,
    luggage: String,
    service_label: String,
    price: i64,
    rating_display: String,
}

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: String,
}

#[derive(Template)]
#[template(path = "porter_dashboard.html")]
struct PorterDashboardTemplate {
    porter_name: String,
    phone: String,
    phone_errors: Vec<String>,
    phone_saved: bool,
    stats: Vec<StatCard>,
    available: Vec<JobView>,
    has_available: bool,
    active: Vec<JobView>,
    has_active: bool,
    completed: Vec<JobView>,
    has_completed: bool,
}

#[derive(Deserialize)]
struct PhoneForm {
    phone: String,
}

#[derive(Deserialize)]
struct DashboardQuery {
    phone_saved: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/porter")
            .wrap(HttpAuthentication::basic(porter_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/jobs/{id}/accept").route(web::post().to(accept_job)))
            .service(web::resource("/jobs/{id}/complete").route(web::post().to(complete_job)))
            .service(web::resource("/profile/phone").route(web::post().to(update_phone))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/porter/dashboard"))
        .finish()
}

async fn dashboard(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse> {
    let phone_saved = query.phone_saved.as_deref() == Some("1");
    Ok(render_dashboard(&state, &auth, Vec::new(), phone_saved).await)
}

async fn render_dashboard(
    state: &web::Data<AppState>,
    auth: &AuthUser,
    phone_errors: Vec<String>,
    phone_saved: bool,
) -> HttpResponse {
    let available: Vec<JobView> = bookings::pending_bookings(&state.db)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(to_job_view)
        .collect();
    let active: Vec<JobView> = bookings::porter_active_bookings(&state.db, &auth.id)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(to_job_view)
        .collect();
    let completed: Vec<JobView> = bookings::porter_completed_bookings(&state.db, &auth.id)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(to_job_view)
        .collect();

    let stats = match bookings::porter_stats(&state.db, &auth.id).await {
        Ok(stats) => vec![
            StatCard {
                label: "Jobs completed".to_string(),
                value: stats.completed_jobs.to_string(),
            },
            StatCard {
                label: "Total earnings".to_string(),
                value: format!("₹{}", stats.total_earnings),
            },
            StatCard {
                label: "Average rating".to_string(),
                value: stats.average_rating_label(),
            },
        ],
        Err(err) => {
            log::error!("Porter stats query failed: {err}");
            Vec::new()
        }
    };

    let phone = sqlx::query_scalar::<_, Option<String>>("SELECT phone FROM users WHERE id = ?")
        .bind(&auth.id)
        .fetch_one(&state.db)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    render(PorterDashboardTemplate {
        porter_name: auth.name.clone(),
        phone,
        phone_errors,
        phone_saved,
        stats,
        has_available: !available.is_empty(),
        available,
        has_active: !active.is_empty(),
        active,
        has_completed: !completed.is_empty(),
        completed,
    })
}

async fn accept_job(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let booking = match bookings::accept_booking(&state.db, &booking_id, &auth.id).await {
        Ok(booking) => booking,
        Err(err) => return Ok(booking_error_response(err)),
    };

    log_activity(
        &state.db,
        "booking_accepted",
        &format!("{} accepted a job on platform {}.", auth.name, booking.platform_number),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let _ = state.events.send(ServerEvent::from_row("booking_accepted", booking));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/porter/dashboard"))
        .finish())
}

async fn complete_job(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let booking = match bookings::complete_booking(&state.db, &booking_id, &auth.id).await {
        Ok(booking) => booking,
        Err(err) => return Ok(booking_error_response(err)),
    };

    log_activity(
        &state.db,
        "booking_completed",
        &format!("{} completed a job for {}.", auth.name, booking.passenger_name),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let _ = state.events.send(ServerEvent::from_row("booking_completed", booking));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/porter/dashboard"))
        .finish())
}

async fn update_phone(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<PhoneForm>,
) -> Result<HttpResponse> {
    let phone = form.phone.trim().to_string();
    if !(phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())) {
        return Ok(render_dashboard(
            &state,
            &auth,
            vec!["Please enter a valid 10-digit phone number.".to_string()],
            false,
        )
        .await);
    }

    sqlx::query("UPDATE users SET phone = ? WHERE id = ?")
        .bind(&phone)
        .bind(&auth.id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "porter_phone_updated",
        &format!("{} updated their contact number.", auth.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/porter/dashboard?phone_saved=1"))
        .finish())
}

fn to_job_view(row: BookingRow) -> JobView {
    let luggage = row.luggage_summary();
    let service_label = if row.service_type == SERVICE_TRAIN {
        "Inside Train Pickup"
    } else {
        "Platform Pickup"
    };
    JobView {
        id: row.id,
        passenger_name: row.passenger_name,
        passenger_phone: row.passenger_phone,
        platform_number: row.platform_number,
        coach_number: row.coach_number,
        train_number: row.train_number,
        luggage,
        service_label: service_label.to_string(),
        price: row.price,
        rating_display: row.rating.map(stars).unwrap_or_else(|| "Not rated".to_string()),
    }
}
