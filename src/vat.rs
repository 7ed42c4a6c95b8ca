use serde::{Deserialize, Serialize};

/// Dutch standard VAT rate, in percent.
pub const VAT_PERCENTAGE: u8 = 21;

/// VAT breakdown for a tax-exclusive amount in integer cents.
///
/// The wire shape keeps the portal's historical `VAT` capitalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    #[serde(rename = "amountExclVAT")]
    pub amount_excl_vat: i64,
    pub vat_amount: i64,
    #[serde(rename = "amountInclVAT")]
    pub amount_incl_vat: i64,
    pub vat_percentage: u8,
}

/// Computes the 21% VAT breakdown for a tax-exclusive amount in cents.
///
/// Rounding is half-away-from-zero, matching the portal's historical
/// behavior for positive amounts. Negative inputs are not validated here;
/// callers that care reject them before pricing.
pub fn calculate_vat(amount_excl_vat: i64) -> VatBreakdown {
    let vat_amount = round_half_away(amount_excl_vat * i64::from(VAT_PERCENTAGE), 100);
    VatBreakdown {
        amount_excl_vat,
        vat_amount,
        amount_incl_vat: amount_excl_vat + vat_amount,
        vat_percentage: VAT_PERCENTAGE,
    }
}

/// Integer division of `numerator / denominator` rounded half-away-from-zero.
/// `denominator` must be positive.
fn round_half_away(numerator: i64, denominator: i64) -> i64 {
    if numerator >= 0 {
        (numerator + denominator / 2) / denominator
    } else {
        (numerator - denominator / 2) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_exact_multiples() {
        let breakdown = calculate_vat(200_000);
        assert_eq!(breakdown.amount_excl_vat, 200_000);
        assert_eq!(breakdown.vat_amount, 42_000);
        assert_eq!(breakdown.amount_incl_vat, 242_000);
        assert_eq!(breakdown.vat_percentage, 21);
    }

    #[test]
    fn vat_rounds_half_up_for_positive_amounts() {
        // 50 * 0.21 = 10.5 -> rounds to 11
        assert_eq!(calculate_vat(50).vat_amount, 11);
        // 49 * 0.21 = 10.29 -> 10
        assert_eq!(calculate_vat(49).vat_amount, 10);
        // 1 * 0.21 = 0.21 -> 0
        assert_eq!(calculate_vat(1).vat_amount, 0);
        // 3 * 0.21 = 0.63 -> 1
        assert_eq!(calculate_vat(3).vat_amount, 1);
    }

    #[test]
    fn vat_zero_amount() {
        let breakdown = calculate_vat(0);
        assert_eq!(breakdown.vat_amount, 0);
        assert_eq!(breakdown.amount_incl_vat, 0);
    }

    #[test]
    fn vat_negative_amount_rounds_away_from_zero() {
        // Mirrors the positive case: -50 * 0.21 = -10.5 -> -11
        assert_eq!(calculate_vat(-50).vat_amount, -11);
        assert_eq!(calculate_vat(-50).amount_incl_vat, -61);
    }
}
