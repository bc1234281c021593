use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{
        authenticate_credentials, clear_logout_cookie, hash_password, logout_cookie, new_id,
        role_home, AUTH_REALM,
    },
    db::log_activity,
    models::{ROLE_PASSENGER, ROLE_PORTER},
    pricing::PriceTable,
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct PriceLine {
    bag_type: String,
    unit_price: i64,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    prices: Vec<PriceLine>,
}

#[derive(Clone, Debug, Default)]
struct RegisterView {
    name: String,
    email: String,
    phone: String,
    porter_selected: bool,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    form: RegisterView,
    errors: Vec<String>,
    registered: bool,
    registered_porter: bool,
}

#[derive(Deserialize)]
struct RegisterForm {
    name: String,
    email: String,
    password: String,
    role: String,
    phone: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/register")
                .route(web::get().to(show_register))
                .route(web::post().to(create_account)),
        )
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn home(state: web::Data<AppState>) -> Result<HttpResponse> {
    let prices = PriceTable::load(&state.db)
        .await
        .entries()
        .iter()
        .map(|entry| PriceLine {
            bag_type: entry.bag_type.clone(),
            unit_price: entry.unit_price,
        })
        .collect();

    Ok(render(HomeTemplate { prices }))
}

async fn show_register() -> Result<HttpResponse> {
    Ok(render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
        registered: false,
        registered_porter: false,
    }))
}

async fn create_account(
    state: web::Data<AppState>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let phone = form.phone.unwrap_or_default().trim().to_string();

    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Full name is required.".to_string());
    }
    if form.email.trim().is_empty() || !form.email.contains('@') {
        errors.push("A valid email address is required.".to_string());
    }
    if form.password.trim().len() < 6 {
        errors.push("Password must be at least 6 characters.".to_string());
    }
    if form.role != ROLE_PASSENGER && form.role != ROLE_PORTER {
        errors.push("Please choose passenger or porter.".to_string());
    }
    if !phone.is_empty() && !(phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())) {
        errors.push("Phone number must be exactly 10 digits.".to_string());
    }

    let form_view = RegisterView {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: phone.clone(),
        porter_selected: form.role == ROLE_PORTER,
    };

    if !errors.is_empty() {
        return Ok(render(RegisterTemplate {
            form: form_view,
            errors,
            registered: false,
            registered_porter: false,
        }));
    }

    let password_hash = hash_password(&form.password)
        .map_err(|_| actix_web::error::ErrorInternalServerError("hash failure"))?;
    let approved = if form.role == ROLE_PORTER { 0 } else { 1 };
    let user_id = new_id();
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"INSERT INTO users (id, name, email, role, password_hash, approved, phone, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(form.name.trim())
    .bind(form.email.trim())
    .bind(&form.role)
    .bind(password_hash)
    .bind(approved)
    .bind(if phone.is_empty() { None } else { Some(phone) })
    .bind(now)
    .execute(&state.db)
    .await;

    if let Err(err) = result {
        log::warn!("Registration insert failed for {}: {err}", form_view.email);
        return Ok(render(RegisterTemplate {
            form: form_view,
            errors: vec![registration_error_message(&err)],
            registered: false,
            registered_porter: false,
        }));
    }

    log_activity(
        &state.db,
        "user_registered",
        &format!("{} registered as {}.", form.name.trim(), form.role),
        Some(&user_id),
        None,
    )
    .await;

    Ok(render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
        registered: true,
        registered_porter: form.role == ROLE_PORTER,
    }))
}

/// The email column is unique, so the one insert failure a user can fix
/// themselves gets its own message. Anything else stays generic; the raw
/// error goes to the log, not the page.
fn registration_error_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            "This email address is already registered. Try logging in instead.".to_string()
        }
        _ => "Registration failed, please try again.".to_string(),
    }
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let user = match authenticate_credentials(&state, email, password).await {
        Some(user) => user,
        None => return auth_challenge(),
    };

    let requested = query.next.as_deref().unwrap_or("");
    let requested = if requested.starts_with('/') { requested } else { "" };
    let fallback = role_home(&user.role);
    let scope = format!("/{}", user.role);

    let redirect = if requested.starts_with(scope.as_str()) {
        requested
    } else {
        fallback
    };

    HttpResponse::SeeOther()
        .append_header((header::LOCATION, redirect))
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", AUTH_REALM)))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    async fn insert_account(pool: &SqlitePool, id: &str, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, role, password_hash, approved, phone, created_at)
               VALUES (?, 'Asha Verma', ?, 'passenger', 'x', 1, NULL, ?)"#,
        )
        .bind(id)
        .bind(email)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn duplicate_email_reads_as_already_registered() {
        let pool = test_pool().await;
        insert_account(&pool, "u1", "asha@example.com")
            .await
            .expect("first insert");

        let err = insert_account(&pool, "u2", "asha@example.com")
            .await
            .expect_err("unique email");

        let message = registration_error_message(&err);
        assert_eq!(
            message,
            "This email address is already registered. Try logging in instead."
        );
        assert!(!message.contains("UNIQUE"));
    }

    #[test]
    fn other_failures_stay_generic() {
        let message = registration_error_message(&sqlx::Error::RowNotFound);
        assert_eq!(message, "Registration failed, please try again.");
    }
}
