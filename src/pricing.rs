use sqlx::SqlitePool;

use crate::models::{PriceRow, SERVICE_TRAIN};

/// Flat surcharge added when the porter boards the train for pickup.
pub const TRAIN_PICKUP_CHARGE: i64 = 20;

/// Upper bound per bag type. Keeps form input honest and the quote
/// arithmetic far away from i64 overflow.
pub const MAX_BAGS_PER_TYPE: i64 = 100;

/// Fallback unit prices, used whenever the prices table is missing or empty
/// so the passenger flow keeps working without configuration.
pub const DEFAULT_PRICES: &[(&str, i64)] = &[
    ("trolley", 60),
    ("suitcase", 50),
    ("backpack", 30),
    ("handbag", 20),
    ("carton", 35),
];

/// Bag counts for one booking request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuggageCounts {
    pub trolley: i64,
    pub suitcase: i64,
    pub backpack: i64,
    pub handbag: i64,
    pub carton: i64,
}

impl LuggageCounts {
    pub fn total(&self) -> i64 {
        self.trolley + self.suitcase + self.backpack + self.handbag + self.carton
    }

    /// Every count within 0..=MAX_BAGS_PER_TYPE. Checked before `total` or
    /// `quote` ever run, so neither can overflow.
    pub fn within_limit(&self) -> bool {
        [self.trolley, self.suitcase, self.backpack, self.handbag, self.carton]
            .iter()
            .all(|count| (0..=MAX_BAGS_PER_TYPE).contains(count))
    }
}

/// Per-bag-type unit prices, loaded explicitly where needed rather than kept
/// in any ambient global. Reloading means calling `load` again.
#[derive(Debug, Clone)]
pub struct PriceTable {
    entries: Vec<PriceRow>,
}

impl PriceTable {
    pub fn fallback() -> Self {
        Self {
            entries: DEFAULT_PRICES
                .iter()
                .map(|(bag_type, unit_price)| PriceRow {
                    bag_type: (*bag_type).to_string(),
                    unit_price: *unit_price,
                })
                .collect(),
        }
    }

    pub async fn load(pool: &SqlitePool) -> Self {
        let entries = sqlx::query_as::<_, PriceRow>(
            "SELECT bag_type, unit_price FROM prices ORDER BY bag_type",
        )
        .fetch_all(pool)
        .await
        .unwrap_or_default();

        if entries.is_empty() {
            log::warn!("Pricing configuration missing, using default prices");
            return Self::fallback();
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[PriceRow] {
        &self.entries
    }

    pub fn unit_price(&self, bag_type: &str) -> i64 {
        self.entries
            .iter()
            .find(|entry| entry.bag_type == bag_type)
            .map(|entry| entry.unit_price)
            .unwrap_or(0)
    }

    /// Price quoted at booking time. The result is stored on the booking and
    /// never recomputed, so later price edits leave existing bookings alone.
    pub fn quote(&self, counts: &LuggageCounts, service_type: &str) -> i64 {
        let mut total = self.unit_price("trolley") * counts.trolley
            + self.unit_price("suitcase") * counts.suitcase
            + self.unit_price("backpack") * counts.backpack
            + self.unit_price("handbag") * counts.handbag
            + self.unit_price("carton") * counts.carton;
        if service_type == SERVICE_TRAIN {
            total += TRAIN_PICKUP_CHARGE;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SERVICE_PLATFORM;

    #[test]
    fn quote_sums_counts_times_unit_prices() {
        let table = PriceTable::fallback();
        let counts = LuggageCounts {
            trolley: 1,
            suitcase: 2,
            ..Default::default()
        };
        assert_eq!(table.quote(&counts, SERVICE_PLATFORM), 60 + 2 * 50);
    }

    #[test]
    fn train_pickup_adds_flat_surcharge() {
        // 2 suitcase @50 + 1 handbag @20 + train service = 140
        let table = PriceTable::fallback();
        let counts = LuggageCounts {
            suitcase: 2,
            handbag: 1,
            ..Default::default()
        };
        assert_eq!(table.quote(&counts, SERVICE_TRAIN), 140);
        assert_eq!(table.quote(&counts, SERVICE_PLATFORM), 120);
    }

    #[test]
    fn unknown_bag_type_costs_nothing() {
        let table = PriceTable::fallback();
        assert_eq!(table.unit_price("duffel"), 0);
    }

    #[test]
    fn counts_at_the_limit_quote_without_overflow() {
        let table = PriceTable::fallback();
        let counts = LuggageCounts {
            trolley: MAX_BAGS_PER_TYPE,
            suitcase: MAX_BAGS_PER_TYPE,
            backpack: MAX_BAGS_PER_TYPE,
            handbag: MAX_BAGS_PER_TYPE,
            carton: MAX_BAGS_PER_TYPE,
        };
        assert!(counts.within_limit());
        assert_eq!(counts.total(), 5 * MAX_BAGS_PER_TYPE);
        assert_eq!(
            table.quote(&counts, SERVICE_TRAIN),
            MAX_BAGS_PER_TYPE * (60 + 50 + 30 + 20 + 35) + TRAIN_PICKUP_CHARGE
        );
    }

    #[test]
    fn extreme_counts_fail_the_limit_check() {
        let huge = LuggageCounts {
            trolley: i64::MAX,
            ..Default::default()
        };
        assert!(!huge.within_limit());

        let negative = LuggageCounts {
            handbag: -1,
            ..Default::default()
        };
        assert!(!negative.within_limit());

        let over_by_one = LuggageCounts {
            carton: MAX_BAGS_PER_TYPE + 1,
            ..Default::default()
        };
        assert!(!over_by_one.within_limit());
    }

    #[test]
    fn empty_counts_quote_only_the_surcharge() {
        let table = PriceTable::fallback();
        let counts = LuggageCounts::default();
        assert_eq!(counts.total(), 0);
        assert_eq!(table.quote(&counts, SERVICE_TRAIN), TRAIN_PICKUP_CHARGE);
    }
}
