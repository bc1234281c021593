use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{admin_validator, logout_guard, AuthUser},
    bookings,
    db::log_activity,
    models::{stars, ActivityRow, BookingRow, UserRow, ROLE_PASSENGER, ROLE_PORTER},
    pricing::PriceTable,
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: String,
}

#[derive(Clone, Debug)]
struct CompletedJobView {
    passenger_name: String,
    porter_name: String,
    price: i64,
    rating_display: String,
}

#[derive(Clone, Debug)]
struct ActivityView {
    message: String,
    created_at: String,
}

#[derive(Clone, Debug)]
struct PorterView {
    id: String,
    name: String,
    email: String,
    phone: String,
    approved: bool,
    completed_jobs: i64,
    average_rating: String,
}

#[derive(Clone, Debug)]
struct PassengerView {
    name: String,
    email: String,
}

#[derive(Clone, Debug)]
struct PriceField {
    bag_type: String,
    unit_price: i64,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct AdminDashboardTemplate {
    admin_name: String,
    stats: Vec<StatCard>,
    completed_jobs: Vec<CompletedJobView>,
    has_completed_jobs: bool,
    activities: Vec<ActivityView>,
}

#[derive(Template)]
#[template(path = "admin_porters.html")]
struct AdminPortersTemplate {
    porters: Vec<PorterView>,
    has_porters: bool,
    passengers: Vec<PassengerView>,
    has_passengers: bool,
}

#[derive(Template)]
#[template(path = "admin_prices.html")]
struct AdminPricesTemplate {
    prices: Vec<PriceField>,
    errors: Vec<String>,
    saved: bool,
}

#[derive(Deserialize)]
struct ApprovalForm {
    approved: String,
}

#[derive(Deserialize)]
struct PriceUpdateForm {
    trolley: String,
    suitcase: String,
    backpack: String,
    handbag: String,
    carton: String,
}

#[derive(Deserialize)]
struct PricesQuery {
    saved: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/porters").route(web::get().to(list_users)))
            .service(
                web::resource("/porters/{id}/approval").route(web::post().to(set_approval)),
            )
            .service(
                web::resource("/prices")
                    .route(web::get().to(price_editor))
                    .route(web::post().to(save_prices)),
            ),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/admin/dashboard"))
        .finish()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let stats = match bookings::platform_stats(&state.db).await {
        Ok(totals) => vec![
            StatCard {
                label: "Total bookings".to_string(),
                value: totals.total_bookings.to_string(),
            },
            StatCard {
                label: "Pending".to_string(),
                value: totals.pending.to_string(),
            },
            StatCard {
                label: "In progress".to_string(),
                value: totals.accepted.to_string(),
            },
            StatCard {
                label: "Completed".to_string(),
                value: totals.completed.to_string(),
            },
            StatCard {
                label: "Total earnings".to_string(),
                value: format!("₹{}", totals.total_earnings),
            },
        ],
        Err(err) => {
            log::error!("Platform stats query failed: {err}");
            Vec::new()
        }
    };

    let completed_jobs: Vec<CompletedJobView> = bookings::completed_bookings(&state.db)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(to_completed_view)
        .collect();

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let activities = activity_rows
        .into_iter()
        .map(|row| ActivityView {
            message: row.message,
            created_at: row.created_at,
        })
        .collect();

    Ok(render(AdminDashboardTemplate {
        admin_name: auth.name.clone(),
        stats,
        has_completed_jobs: !completed_jobs.is_empty(),
        completed_jobs,
        activities,
    }))
}

async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse> {
    let porter_rows = fetch_users_by_role(&state, ROLE_PORTER).await.unwrap_or_default();
    let mut porters = Vec::with_capacity(porter_rows.len());
    for user in porter_rows {
        let stats = bookings::porter_stats(&state.db, &user.id).await;
        let (completed_jobs, average_rating) = match stats {
            Ok(stats) => (stats.completed_jobs, stats.average_rating_label()),
            Err(err) => {
                log::error!("Porter stats query failed for {}: {err}", user.id);
                (0, "N/A".to_string())
            }
        };
        porters.push(PorterView {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone.unwrap_or_else(|| "N/A".to_string()),
            approved: user.approved == 1,
            completed_jobs,
            average_rating,
        });
    }

    let passengers: Vec<PassengerView> = fetch_users_by_role(&state, ROLE_PASSENGER)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|user| PassengerView {
            name: user.name,
            email: user.email,
        })
        .collect();

    Ok(render(AdminPortersTemplate {
        has_porters: !porters.is_empty(),
        porters,
        has_passengers: !passengers.is_empty(),
        passengers,
    }))
}

async fn set_approval(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<ApprovalForm>,
) -> Result<HttpResponse> {
    let porter_id = path.into_inner();
    let approving = match form.approved.as_str() {
        "true" => true,
        "false" => false,
        _ => return Ok(HttpResponse::BadRequest().body("Invalid approval value")),
    };

    let result = sqlx::query("UPDATE users SET approved = ? WHERE id = ? AND role = ?")
        .bind(approving as i64)
        .bind(&porter_id)
        .bind(ROLE_PORTER)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().body("Porter not found"));
    }

    log_activity(
        &state.db,
        "porter_approval",
        &format!(
            "{} {} porter access.",
            auth.name,
            if approving { "approved" } else { "revoked" }
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/porters"))
        .finish())
}

async fn price_editor(
    state: web::Data<AppState>,
    query: web::Query<PricesQuery>,
) -> Result<HttpResponse> {
    let prices = PriceTable::load(&state.db)
        .await
        .entries()
        .iter()
        .map(|entry| PriceField {
            bag_type: entry.bag_type.clone(),
            unit_price: entry.unit_price,
        })
        .collect();

    Ok(render(AdminPricesTemplate {
        prices,
        errors: Vec::new(),
        saved: query.saved.as_deref() == Some("1"),
    }))
}

async fn save_prices(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<PriceUpdateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let fields = [
        ("trolley", form.trolley),
        ("suitcase", form.suitcase),
        ("backpack", form.backpack),
        ("handbag", form.handbag),
        ("carton", form.carton),
    ];

    let mut parsed = Vec::with_capacity(fields.len());
    let mut errors = Vec::new();
    for (bag_type, raw) in &fields {
        match raw.trim().parse::<u32>() {
            Ok(value) => parsed.push((*bag_type, i64::from(value))),
            Err(_) => errors.push(format!(
                "Price for {bag_type} must be a non-negative whole number."
            )),
        }
    }

    if !errors.is_empty() {
        let prices = fields
            .iter()
            .map(|(bag_type, raw)| PriceField {
                bag_type: (*bag_type).to_string(),
                unit_price: raw.trim().parse::<i64>().unwrap_or(0),
            })
            .collect();
        return Ok(render(AdminPricesTemplate {
            prices,
            errors,
            saved: false,
        }));
    }

    let now = chrono::Utc::now().to_rfc3339();
    for (bag_type, unit_price) in parsed {
        sqlx::query(
            r#"INSERT INTO prices (bag_type, unit_price, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(bag_type) DO UPDATE SET
                 unit_price = excluded.unit_price,
                 updated_at = excluded.updated_at"#,
        )
        .bind(bag_type)
        .bind(unit_price)
        .bind(&now)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    log_activity(
        &state.db,
        "prices_updated",
        &format!("{} updated the luggage price table.", auth.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/prices?saved=1"))
        .finish())
}

async fn fetch_users_by_role(
    state: &web::Data<AppState>,
    role: &str,
) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, role, password_hash, approved, phone, created_at
           FROM users
           WHERE role = ?
           ORDER BY name"#,
    )
    .bind(role)
    .fetch_all(&state.db)
    .await
}

fn to_completed_view(row: BookingRow) -> CompletedJobView {
    CompletedJobView {
        passenger_name: row.passenger_name,
        porter_name: row.porter_name.unwrap_or_else(|| "N/A".to_string()),
        price: row.price,
        rating_display: row.rating.map(stars).unwrap_or_else(|| "N/A".to_string()),
    }
}
