use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Formats an order number from a year and an allocated sequence value.
///
/// Format: `WL-<year>-<3-digit-sequence>`. Sequences past 999 widen rather
/// than wrap, so numbers stay unique within a year. The sequence itself
/// comes from the persisted per-year counter in the record store; this
/// function is pure.
pub fn format_order_number(year: i32, sequence: u32) -> String {
    format!("WL-{}-{:03}", year, sequence)
}

/// Convenience: the order-number year for a given creation timestamp.
pub fn order_year(now: DateTime<Utc>) -> i32 {
    now.year()
}

/// Generates an invoice number: `WL-<YYYYMMDD>-<4-digit-random>`.
///
/// Pure with respect to the provided clock and RNG; no blocking, no I/O.
/// The random suffix alone does not guarantee uniqueness - callers verify
/// against the persistence layer before treating the number as final.
pub fn invoice_number(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    format!("WL-{}-{:04}", now.format("%Y%m%d"), rng.random_range(0..10_000))
}
