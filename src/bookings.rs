use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    auth::new_id,
    models::{BookingRow, SERVICE_PLATFORM, SERVICE_TRAIN, STATUS_ACCEPTED, STATUS_COMPLETED, STATUS_PENDING},
    pricing::{LuggageCounts, PriceTable, MAX_BAGS_PER_TYPE},
};

/// Lifecycle refusals carry the message shown to the user; there is no retry
/// machinery, the user simply tries again.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Please select at least one luggage item.")]
    NoLuggage,
    #[error("A booking is limited to {MAX_BAGS_PER_TYPE} bags per luggage type.")]
    TooMuchLuggage,
    #[error("Unknown service type.")]
    InvalidServiceType,
    #[error("Booking not found.")]
    NotFound,
    #[error("This job was already claimed by another porter.")]
    AlreadyClaimed,
    #[error("Only your own active jobs can be marked as completed.")]
    CompleteUnavailable,
    #[error("Ratings must be between 1 and 5 stars.")]
    InvalidRating,
    #[error("This booking can no longer be rated.")]
    RatingUnavailable,
    #[error("Bookings can only be cancelled while pending and unassigned.")]
    CancelUnavailable,
    #[error("Something went wrong, please try again.")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub pnr_number: String,
    pub train_number: String,
    pub platform_number: String,
    pub coach_number: String,
    pub counts: LuggageCounts,
    pub service_type: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PorterStats {
    pub completed_jobs: i64,
    pub total_earnings: i64,
    pub average_rating: Option<f64>,
}

impl PorterStats {
    /// "N/A" when the porter has no rated completed jobs, never 0.
    pub fn average_rating_label(&self) -> String {
        match self.average_rating {
            Some(avg) => format!("{avg:.1}"),
            None => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformStats {
    pub total_bookings: i64,
    pub pending: i64,
    pub accepted: i64,
    pub completed: i64,
    pub total_earnings: i64,
}

const BOOKING_COLUMNS: &str = r#"b.id, b.passenger_id, b.passenger_name, b.passenger_phone,
       b.pnr_number, b.train_number, b.platform_number, b.coach_number,
       b.trolley_bags, b.suitcase_bags, b.backpack_bags, b.handbag_bags, b.carton_bags,
       b.total_bags, b.service_type, b.price, b.status, b.porter_id, b.rating, b.created_at,
       u.name AS porter_name, u.phone AS porter_phone"#;

fn booking_query(filter: &str, order: &str) -> String {
    format!(
        "SELECT {BOOKING_COLUMNS}
         FROM bookings b
         LEFT JOIN users u ON b.porter_id = u.id
         {filter}
         {order}"
    )
}

pub async fn fetch_booking(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Option<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query("WHERE b.id = ?", "LIMIT 1"))
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

/// Passenger's own bookings, newest first. The underlying store gives no
/// ordering, so it is imposed here.
pub async fn passenger_bookings(
    pool: &SqlitePool,
    passenger_id: &str,
) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query(
        "WHERE b.passenger_id = ?",
        "ORDER BY b.created_at DESC",
    ))
    .bind(passenger_id)
    .fetch_all(pool)
    .await
}

/// Jobs any porter may claim.
pub async fn pending_bookings(pool: &SqlitePool) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query(
        "WHERE b.status = 'pending'",
        "ORDER BY b.created_at ASC",
    ))
    .fetch_all(pool)
    .await
}

pub async fn porter_active_bookings(
    pool: &SqlitePool,
    porter_id: &str,
) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query(
        "WHERE b.porter_id = ? AND b.status = 'accepted'",
        "ORDER BY b.created_at ASC",
    ))
    .bind(porter_id)
    .fetch_all(pool)
    .await
}

pub async fn porter_completed_bookings(
    pool: &SqlitePool,
    porter_id: &str,
) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query(
        "WHERE b.porter_id = ? AND b.status = 'completed'",
        "ORDER BY b.created_at DESC",
    ))
    .bind(porter_id)
    .fetch_all(pool)
    .await
}

/// All completed jobs platform-wide, for the admin performance table.
pub async fn completed_bookings(pool: &SqlitePool) -> Result<Vec<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>(&booking_query(
        "WHERE b.status = 'completed'",
        "ORDER BY b.created_at DESC",
    ))
    .fetch_all(pool)
    .await
}

/// Creates a pending, unassigned booking. The price is quoted from the given
/// table once, here, and stored for the life of the booking.
pub async fn create_booking(
    pool: &SqlitePool,
    prices: &PriceTable,
    new: NewBooking,
) -> Result<BookingRow, BookingError> {
    // Range check first: total() and quote() assume in-range counts.
    if !new.counts.within_limit() {
        return Err(BookingError::TooMuchLuggage);
    }
    if new.counts.total() == 0 {
        return Err(BookingError::NoLuggage);
    }
    if new.service_type != SERVICE_PLATFORM && new.service_type != SERVICE_TRAIN {
        return Err(BookingError::InvalidServiceType);
    }

    let booking_id = new_id();
    let price = prices.quote(&new.counts, &new.service_type);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO bookings
           (id, passenger_id, passenger_name, passenger_phone, pnr_number, train_number,
            platform_number, coach_number, trolley_bags, suitcase_bags, backpack_bags,
            handbag_bags, carton_bags, total_bags, service_type, price, status, porter_id,
            rating, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)"#,
    )
    .bind(&booking_id)
    .bind(&new.passenger_id)
    .bind(&new.passenger_name)
    .bind(&new.passenger_phone)
    .bind(&new.pnr_number)
    .bind(&new.train_number)
    .bind(&new.platform_number)
    .bind(&new.coach_number)
    .bind(new.counts.trolley)
    .bind(new.counts.suitcase)
    .bind(new.counts.backpack)
    .bind(new.counts.handbag)
    .bind(new.counts.carton)
    .bind(new.counts.total())
    .bind(&new.service_type)
    .bind(price)
    .bind(STATUS_PENDING)
    .bind(&now)
    .execute(pool)
    .await?;

    fetch_booking(pool, &booking_id)
        .await?
        .ok_or(BookingError::NotFound)
}

/// Claims a pending job for a porter. The update is conditional on the row
/// still being pending and unassigned, so of two racing porters exactly one
/// wins and the other is told the job is gone.
pub async fn accept_booking(
    pool: &SqlitePool,
    booking_id: &str,
    porter_id: &str,
) -> Result<BookingRow, BookingError> {
    let result = sqlx::query(
        r#"UPDATE bookings SET status = ?, porter_id = ?
           WHERE id = ? AND status = ? AND porter_id IS NULL"#,
    )
    .bind(STATUS_ACCEPTED)
    .bind(porter_id)
    .bind(booking_id)
    .bind(STATUS_PENDING)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match fetch_booking(pool, booking_id).await? {
            Some(_) => Err(BookingError::AlreadyClaimed),
            None => Err(BookingError::NotFound),
        };
    }

    fetch_booking(pool, booking_id)
        .await?
        .ok_or(BookingError::NotFound)
}

pub async fn complete_booking(
    pool: &SqlitePool,
    booking_id: &str,
    porter_id: &str,
) -> Result<BookingRow, BookingError> {
    let result = sqlx::query(
        "UPDATE bookings SET status = ? WHERE id = ? AND porter_id = ? AND status = ?",
    )
    .bind(STATUS_COMPLETED)
    .bind(booking_id)
    .bind(porter_id)
    .bind(STATUS_ACCEPTED)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match fetch_booking(pool, booking_id).await? {
            Some(_) => Err(BookingError::CompleteUnavailable),
            None => Err(BookingError::NotFound),
        };
    }

    fetch_booking(pool, booking_id)
        .await?
        .ok_or(BookingError::NotFound)
}

/// Records the passenger's one-time rating of a completed booking. A second
/// attempt is refused here, not merely hidden in the page.
pub async fn rate_booking(
    pool: &SqlitePool,
    booking_id: &str,
    passenger_id: &str,
    rating: i64,
) -> Result<BookingRow, BookingError> {
    if !(1..=5).contains(&rating) {
        return Err(BookingError::InvalidRating);
    }

    let result = sqlx::query(
        r#"UPDATE bookings SET rating = ?
           WHERE id = ? AND passenger_id = ? AND status = ? AND rating IS NULL"#,
    )
    .bind(rating)
    .bind(booking_id)
    .bind(passenger_id)
    .bind(STATUS_COMPLETED)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match fetch_booking(pool, booking_id).await? {
            Some(_) => Err(BookingError::RatingUnavailable),
            None => Err(BookingError::NotFound),
        };
    }

    fetch_booking(pool, booking_id)
        .await?
        .ok_or(BookingError::NotFound)
}

/// Deletes the passenger's own booking, only while still pending and
/// unassigned. Once a porter has claimed it the record is permanent.
pub async fn cancel_booking(
    pool: &SqlitePool,
    booking_id: &str,
    passenger_id: &str,
) -> Result<(), BookingError> {
    let result = sqlx::query(
        r#"DELETE FROM bookings
           WHERE id = ? AND passenger_id = ? AND status = ? AND porter_id IS NULL"#,
    )
    .bind(booking_id)
    .bind(passenger_id)
    .bind(STATUS_PENDING)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match fetch_booking(pool, booking_id).await? {
            Some(_) => Err(BookingError::CancelUnavailable),
            None => Err(BookingError::NotFound),
        };
    }

    Ok(())
}

/// Completed-job count, earnings, and mean of the ratings that exist. AVG
/// skips NULL ratings, so an unrated history yields None rather than zero.
pub async fn porter_stats(
    pool: &SqlitePool,
    porter_id: &str,
) -> Result<PorterStats, sqlx::Error> {
    let (completed_jobs, total_earnings, average_rating) =
        sqlx::query_as::<_, (i64, i64, Option<f64>)>(
            r#"SELECT COUNT(*), COALESCE(SUM(price), 0), AVG(rating)
               FROM bookings
               WHERE porter_id = ? AND status = 'completed'"#,
        )
        .bind(porter_id)
        .fetch_one(pool)
        .await?;

    Ok(PorterStats {
        completed_jobs,
        total_earnings,
        average_rating,
    })
}

/// Same aggregation over every porter combined. Recomputed in full on each
/// dashboard load; fine at this scale.
pub async fn platform_stats(pool: &SqlitePool) -> Result<PlatformStats, sqlx::Error> {
    let (total_bookings, pending, accepted, completed, total_earnings) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN status = 'accepted' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN status = 'completed' THEN price ELSE 0 END), 0)
               FROM bookings"#,
        )
        .fetch_one(pool)
        .await?;

    Ok(PlatformStats {
        total_bookings,
        pending,
        accepted,
        completed,
        total_earnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

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

    async fn insert_user(pool: &SqlitePool, id: &str, role: &str) {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, role, password_hash, approved, phone, created_at)
               VALUES (?, ?, ?, ?, 'x', 1, '9876543210', ?)"#,
        )
        .bind(id)
        .bind(format!("User {id}"))
        .bind(format!("{id}@example.com"))
        .bind(role)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("insert user");
    }

    fn sample_booking(passenger_id: &str) -> NewBooking {
        NewBooking {
            passenger_id: passenger_id.to_string(),
            passenger_name: "Asha Verma".to_string(),
            passenger_phone: "9876543210".to_string(),
            pnr_number: "4521879630".to_string(),
            train_number: "12951".to_string(),
            platform_number: "4".to_string(),
            coach_number: "B2".to_string(),
            counts: LuggageCounts {
                suitcase: 2,
                handbag: 1,
                ..Default::default()
            },
            service_type: "train".to_string(),
        }
    }

    #[tokio::test]
    async fn create_quotes_price_from_the_current_table() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");

        assert_eq!(booking.price, 140);
        assert_eq!(booking.status, "pending");
        assert_eq!(booking.porter_id, None);
        assert_eq!(booking.total_bags, 3);
    }

    #[tokio::test]
    async fn zero_bag_booking_is_rejected_without_a_write() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;

        let mut new = sample_booking("p1");
        new.counts = LuggageCounts::default();
        let err = create_booking(&pool, &PriceTable::fallback(), new)
            .await
            .expect_err("rejected");
        assert!(matches!(err, BookingError::NoLuggage));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn oversized_luggage_counts_are_rejected_without_a_write() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;

        let mut new = sample_booking("p1");
        new.counts = LuggageCounts {
            trolley: i64::MAX,
            suitcase: i64::MAX,
            ..Default::default()
        };
        let err = create_booking(&pool, &PriceTable::fallback(), new)
            .await
            .expect_err("rejected");
        assert!(matches!(err, BookingError::TooMuchLuggage));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn accept_race_leaves_a_single_consistent_porter() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;
        insert_user(&pool, "porter-b", "porter").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");

        let won = accept_booking(&pool, &booking.id, "porter-a")
            .await
            .expect("first accept");
        assert_eq!(won.porter_id.as_deref(), Some("porter-a"));
        assert_eq!(won.status, "accepted");

        let lost = accept_booking(&pool, &booking.id, "porter-b")
            .await
            .expect_err("second accept refused");
        assert!(matches!(lost, BookingError::AlreadyClaimed));

        let after = fetch_booking(&pool, &booking.id)
            .await
            .expect("fetch")
            .expect("exists");
        assert_eq!(after.porter_id.as_deref(), Some("porter-a"));
    }

    #[tokio::test]
    async fn complete_requires_the_assigned_porter_and_accepted_status() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;
        insert_user(&pool, "porter-b", "porter").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");

        // still pending, nobody can complete it
        let err = complete_booking(&pool, &booking.id, "porter-a")
            .await
            .expect_err("pending");
        assert!(matches!(err, BookingError::CompleteUnavailable));

        accept_booking(&pool, &booking.id, "porter-a")
            .await
            .expect("accept");

        let err = complete_booking(&pool, &booking.id, "porter-b")
            .await
            .expect_err("not their job");
        assert!(matches!(err, BookingError::CompleteUnavailable));

        let done = complete_booking(&pool, &booking.id, "porter-a")
            .await
            .expect("complete");
        assert_eq!(done.status, "completed");
        assert_eq!(done.porter_id.as_deref(), Some("porter-a"));
    }

    #[tokio::test]
    async fn rating_is_one_time_and_completed_only() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");

        let err = rate_booking(&pool, &booking.id, "p1", 5)
            .await
            .expect_err("not completed yet");
        assert!(matches!(err, BookingError::RatingUnavailable));

        accept_booking(&pool, &booking.id, "porter-a").await.expect("accept");
        complete_booking(&pool, &booking.id, "porter-a").await.expect("complete");

        let err = rate_booking(&pool, &booking.id, "p1", 9)
            .await
            .expect_err("out of range");
        assert!(matches!(err, BookingError::InvalidRating));

        let rated = rate_booking(&pool, &booking.id, "p1", 4)
            .await
            .expect("first rating");
        assert_eq!(rated.rating, Some(4));

        let err = rate_booking(&pool, &booking.id, "p1", 1)
            .await
            .expect_err("second rating refused");
        assert!(matches!(err, BookingError::RatingUnavailable));

        let after = fetch_booking(&pool, &booking.id)
            .await
            .expect("fetch")
            .expect("exists");
        assert_eq!(after.rating, Some(4));
    }

    #[tokio::test]
    async fn cancel_only_while_pending_and_unassigned() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");

        let err = cancel_booking(&pool, &booking.id, "someone-else")
            .await
            .expect_err("wrong passenger");
        assert!(matches!(err, BookingError::CancelUnavailable));

        accept_booking(&pool, &booking.id, "porter-a").await.expect("accept");

        let err = cancel_booking(&pool, &booking.id, "p1")
            .await
            .expect_err("claimed jobs stay");
        assert!(matches!(err, BookingError::CancelUnavailable));

        let second = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");
        cancel_booking(&pool, &second.id, "p1").await.expect("cancel pending");
        assert!(fetch_booking(&pool, &second.id).await.expect("fetch").is_none());
    }

    #[tokio::test]
    async fn porter_assignment_tracks_status_through_the_lifecycle() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;

        let booking = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");
        assert!(booking.porter_id.is_none() && booking.status == "pending");

        let accepted = accept_booking(&pool, &booking.id, "porter-a").await.expect("accept");
        assert!(accepted.porter_id.is_some() && accepted.status == "accepted");

        let completed = complete_booking(&pool, &booking.id, "porter-a").await.expect("complete");
        assert!(completed.porter_id.is_some() && completed.status == "completed");
    }

    #[tokio::test]
    async fn stats_report_na_average_until_a_rating_exists() {
        let pool = test_pool().await;
        insert_user(&pool, "p1", "passenger").await;
        insert_user(&pool, "porter-a", "porter").await;

        let empty = porter_stats(&pool, "porter-a").await.expect("stats");
        assert_eq!(empty.completed_jobs, 0);
        assert_eq!(empty.total_earnings, 0);
        assert_eq!(empty.average_rating_label(), "N/A");

        let first = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");
        accept_booking(&pool, &first.id, "porter-a").await.expect("accept");
        complete_booking(&pool, &first.id, "porter-a").await.expect("complete");

        // completed but unrated: still N/A
        let unrated = porter_stats(&pool, "porter-a").await.expect("stats");
        assert_eq!(unrated.completed_jobs, 1);
        assert_eq!(unrated.total_earnings, 140);
        assert_eq!(unrated.average_rating_label(), "N/A");

        let second = create_booking(&pool, &PriceTable::fallback(), sample_booking("p1"))
            .await
            .expect("create");
        accept_booking(&pool, &second.id, "porter-a").await.expect("accept");
        complete_booking(&pool, &second.id, "porter-a").await.expect("complete");
        rate_booking(&pool, &second.id, "p1", 3).await.expect("rate");

        let rated = porter_stats(&pool, "porter-a").await.expect("stats");
        assert_eq!(rated.completed_jobs, 2);
        assert_eq!(rated.total_earnings, 280);
        assert_eq!(rated.average_rating_label(), "3.0");

        let platform = platform_stats(&pool).await.expect("platform stats");
        assert_eq!(platform.total_bookings, 2);
        assert_eq!(platform.completed, 2);
        assert_eq!(platform.total_earnings, 280);
    }
}
