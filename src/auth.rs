use actix_web::{
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    error::ErrorUnauthorized,
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use uuid::Uuid;

use crate::{
    models::{UserRow, ROLE_ADMIN, ROLE_PASSENGER, ROLE_PORTER},
    state::AppState,
};

pub const AUTH_REALM: &str = "PorterGo";
const LOGOUT_COOKIE: &str = "pgo_logged_out";

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: String,
    pub approved: bool,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();
    authenticate_credentials(state, email, password)
        .await
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))
}

pub async fn authenticate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Option<AuthUser> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, role, password_hash, approved, phone, created_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .ok()??;

    if !verify_password(password, &user.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: user.id,
        name: user.name,
        role: user.role,
        approved: user.approved == 1,
    })
}

pub async fn basic_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if user.role != ROLE_ADMIN {
                return Err((ErrorUnauthorized("Admin access required"), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Porters only reach their dashboard once an admin has flipped the approved
/// flag; revoking it locks them out again on the next request.
pub async fn porter_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if user.role != ROLE_PORTER {
                return Err((ErrorUnauthorized("Porter access required"), req));
            }
            if !user.approved {
                return Err((
                    ErrorUnauthorized("Your porter account is awaiting admin approval"),
                    req,
                ));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn passenger_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if user.role != ROLE_PASSENGER {
                return Err((ErrorUnauthorized("Passenger access required"), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "1")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn clear_logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(0));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn is_logged_out(req: &HttpRequest) -> bool {
    req.cookie(LOGOUT_COOKIE).is_some()
}

pub async fn logout_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: actix_web::body::MessageBody + 'static,
{
    if is_logged_out(req.request()) {
        let path = req.path();
        let login_target = if path.starts_with("/porter") {
            "/porter/dashboard"
        } else if path.starts_with("/passenger") {
            "/passenger/dashboard"
        } else {
            "/admin/dashboard"
        };
        let login_url = format!("/login?next={login_target}");
        let body = format!(
            r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Logged out</title>
    <link rel="stylesheet" href="/static/style.css" />
  </head>
  <body>
    <div class="card">
      <h1>You're logged out</h1>
      <p>Your session has been closed.</p>
      <p><a href="{login_url}">Log in again</a> or <a href="/">return to the home page</a>.</p>
    </div>
  </body>
</html>"#
        );
        let response = HttpResponse::Unauthorized()
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .content_type("text/html; charset=utf-8")
            .body(body);
        return Ok(req.into_response(response));
    }

    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}

pub fn role_home(role: &str) -> &'static str {
    if role == ROLE_ADMIN {
        "/admin/dashboard"
    } else if role == ROLE_PORTER {
        "/porter/dashboard"
    } else if role == ROLE_PASSENGER {
        "/passenger/dashboard"
    } else {
        "/"
    }
}
