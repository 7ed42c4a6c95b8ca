use crate::errors::AppError;
use crate::models::{LeadType, Package, PackagePricing, PricingTier};
use crate::vat::calculate_vat;
use serde::{Deserialize, Serialize};

/// Result of pricing one order request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub package_id: String,
    pub package_name: String,
    pub industry: String,
    pub lead_type: LeadType,
    /// The quantity actually billed. Equals the requested quantity for
    /// exclusive packages and the fixed batch size for shared packages.
    pub billable_quantity: u32,
    pub price_per_lead: i64,
    pub total_amount: i64,
    pub vat_amount: i64,
    #[serde(rename = "totalAmountInclVAT")]
    pub total_amount_incl_vat: i64,
    pub vat_percentage: u8,
    pub currency: String,
    /// Display-only summary of which tier or batch applied.
    pub tier_description: String,
}

/// Static pricing configuration mapping `(industry, lead_type)` to a
/// package definition.
#[derive(Debug, Clone)]
pub struct PricingCatalog {
    packages: Vec<Package>,
}

impl PricingCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    /// The catalog sold on warmeleads.nl: Dutch home-improvement verticals,
    /// each with tiered exclusive pricing and a fixed shared batch.
    pub fn default_nl() -> Self {
        let mut packages = Vec::new();
        for (industry, tier_prices, shared_price) in [
            ("Thuisbatterijen", [4250, 4000, 3750], 1250),
            ("Zonnepanelen", [3750, 3500, 3250], 1000),
            ("Warmtepompen", [4750, 4500, 4250], 1500),
            ("Airco", [3500, 3250, 3000], 1000),
            ("Isolatie", [3250, 3000, 2750], 900),
        ] {
            packages.push(Package {
                id: format!("{}-exclusive", industry.to_lowercase()),
                name: format!("{} Exclusief", industry),
                industry: industry.to_string(),
                lead_type: LeadType::Exclusive,
                min_quantity: 30,
                pricing: PackagePricing::Tiered {
                    pricing_tiers: vec![
                        PricingTier {
                            min_quantity: 30,
                            max_quantity: Some(49),
                            price_per_lead: tier_prices[0],
                        },
                        PricingTier {
                            min_quantity: 50,
                            max_quantity: Some(74),
                            price_per_lead: tier_prices[1],
                        },
                        PricingTier {
                            min_quantity: 75,
                            max_quantity: None,
                            price_per_lead: tier_prices[2],
                        },
                    ],
                },
            });
            packages.push(Package {
                id: format!("{}-shared", industry.to_lowercase()),
                name: format!("{} Gedeeld", industry),
                industry: industry.to_string(),
                lead_type: LeadType::Shared,
                min_quantity: 1,
                pricing: PackagePricing::FixedBatch {
                    price_per_lead: shared_price,
                    batch_size: 500,
                },
            });
        }
        Self::new(packages)
    }

    /// Looks up the package for an industry/lead-type combination.
    /// Industry matching is case-insensitive; unknown combinations are a
    /// hard `PackageNotFound`, never a silent default price.
    pub fn find_package(&self, industry: &str, lead_type: LeadType) -> Result<&Package, AppError> {
        self.packages
            .iter()
            .find(|p| p.industry.eq_ignore_ascii_case(industry) && p.lead_type == lead_type)
            .ok_or_else(|| {
                AppError::PackageNotFound(format!(
                    "No {} lead package for industry '{}'",
                    lead_type, industry
                ))
            })
    }

    /// Prices an order request.
    ///
    /// Shared packages sell one fixed-size batch; the requested quantity is
    /// ignored. Exclusive packages resolve a per-unit price from the first
    /// tier (in definition order) whose closed interval contains the
    /// quantity. A quantity below every tier's minimum falls back to the
    /// lowest tier's price; callers enforce `min_quantity` separately.
    pub fn calculate_order(
        &self,
        industry: &str,
        lead_type: LeadType,
        quantity: u32,
    ) -> Result<OrderQuote, AppError> {
        let package = self.find_package(industry, lead_type)?;

        let (price_per_lead, billable_quantity, tier_description) = match &package.pricing {
            PackagePricing::FixedBatch {
                price_per_lead,
                batch_size,
            } => {
                if quantity != *batch_size {
                    tracing::debug!(
                        "Shared package {}: requested quantity {} ignored, billing fixed batch of {}",
                        package.id,
                        quantity,
                        batch_size
                    );
                }
                (
                    *price_per_lead,
                    *batch_size,
                    format!(
                        "Vaste batch van {} gedeelde leads @ {} per lead",
                        batch_size,
                        format_euro(*price_per_lead)
                    ),
                )
            }
            PackagePricing::Tiered { pricing_tiers } => {
                let tier = resolve_tier(pricing_tiers, quantity).ok_or_else(|| {
                    AppError::PackageNotFound(format!(
                        "Package '{}' has no pricing tiers configured",
                        package.id
                    ))
                })?;
                let description = match tier.max_quantity {
                    Some(max) => format!(
                        "Staffel {}-{} leads @ {} per lead",
                        tier.min_quantity,
                        max,
                        format_euro(tier.price_per_lead)
                    ),
                    None => format!(
                        "Staffel {}+ leads @ {} per lead",
                        tier.min_quantity,
                        format_euro(tier.price_per_lead)
                    ),
                };
                (tier.price_per_lead, quantity, description)
            }
        };

        let total_amount = price_per_lead * i64::from(billable_quantity);
        let vat = calculate_vat(total_amount);

        Ok(OrderQuote {
            package_id: package.id.clone(),
            package_name: package.name.clone(),
            industry: package.industry.clone(),
            lead_type: package.lead_type,
            billable_quantity,
            price_per_lead,
            total_amount,
            vat_amount: vat.vat_amount,
            total_amount_incl_vat: vat.amount_incl_vat,
            vat_percentage: vat.vat_percentage,
            currency: "EUR".to_string(),
            tier_description,
        })
    }
}

/// Selects the first tier (definition order) whose range contains the
/// quantity. Quantities below every tier's minimum fall back to the first
/// tier. Returns `None` only for an empty tier list.
fn resolve_tier(tiers: &[PricingTier], quantity: u32) -> Option<&PricingTier> {
    tiers
        .iter()
        .find(|tier| tier.contains(quantity))
        .or_else(|| tiers.first())
}

/// Formats integer cents as a euro amount for display, e.g. `€42,50`.
pub fn format_euro(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}€{},{:02}", sign, abs / 100, abs % 100)
}
