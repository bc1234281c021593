use actix_web::HttpResponse;
use askama::Template;

const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Renders a page template into an HTML response, or a bare 500 when the
/// template itself fails.
pub fn render<T: Template>(template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok().content_type(HTML_UTF8).body(body),
        Err(err) => {
            log::error!("Failed to render {}: {err}", std::any::type_name::<T>());
            HttpResponse::InternalServerError().finish()
        }
    }
}
