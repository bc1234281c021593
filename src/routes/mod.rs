use actix_web::HttpResponse;

use crate::bookings::BookingError;

pub mod admin;
pub mod events;
pub mod passenger;
pub mod porter;
pub mod public;

/// Lifecycle refusals become a plain user-visible message at the call site;
/// nothing is retried and nothing propagates to other views.
pub(crate) fn booking_error_response(err: BookingError) -> HttpResponse {
    match err {
        BookingError::NotFound => HttpResponse::NotFound().body(err.to_string()),
        BookingError::AlreadyClaimed => HttpResponse::Conflict().body(err.to_string()),
        BookingError::Db(ref cause) => {
            log::error!("Booking store error: {cause}");
            HttpResponse::InternalServerError().body(err.to_string())
        }
        _ => HttpResponse::BadRequest().body(err.to_string()),
    }
}
