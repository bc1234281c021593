pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_PORTER: &str = "porter";
pub const ROLE_PASSENGER: &str = "passenger";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACCEPTED: &str = "accepted";
pub const STATUS_COMPLETED: &str = "completed";

pub const SERVICE_PLATFORM: &str = "platform";
pub const SERVICE_TRAIN: &str = "train";

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password_hash: String,
    pub approved: i64,
    pub phone: Option<String>,
    pub created_at: String,
}

/// One luggage-porter service request. `porter_name`/`porter_phone` come from
/// the join against `users`, never stored on the booking itself.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: String,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub pnr_number: String,
    pub train_number: String,
    pub platform_number: String,
    pub coach_number: String,
    pub trolley_bags: i64,
    pub suitcase_bags: i64,
    pub backpack_bags: i64,
    pub handbag_bags: i64,
    pub carton_bags: i64,
    pub total_bags: i64,
    pub service_type: String,
    pub price: i64,
    pub status: String,
    pub porter_id: Option<String>,
    pub porter_name: Option<String>,
    pub porter_phone: Option<String>,
    pub rating: Option<i64>,
    pub created_at: String,
}

impl BookingRow {
    /// Human-readable luggage summary, skipping zero counts.
    pub fn luggage_summary(&self) -> String {
        let parts = [
            (self.trolley_bags, "Trolley"),
            (self.suitcase_bags, "Suitcase"),
            (self.backpack_bags, "Backpack"),
            (self.handbag_bags, "Handbag"),
            (self.carton_bags, "Carton"),
        ];
        let listed: Vec<String> = parts
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();
        if listed.is_empty() {
            "None".to_string()
        } else {
            listed.join(", ")
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRow {
    pub bag_type: String,
    pub unit_price: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

pub fn stars(rating: i64) -> String {
    let filled = rating.clamp(0, 5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}
