use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Persisted Records ============
//
// These records are stored as JSON blobs and were historically written by a
// JavaScript portal, so the wire shape is camelCase throughout.

/// Lead package type: exclusive leads go to exactly one customer, shared
/// leads are sold to up to ~3 customers in a fixed-size batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadType {
    Exclusive,
    Shared,
}

impl std::fmt::Display for LeadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadType::Exclusive => write!(f, "exclusive"),
            LeadType::Shared => write!(f, "shared"),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Delivered,
    Cancelled,
}

/// Represents one purchase of a lead package.
///
/// Monetary fields are integer cents, VAT-exclusive unless named otherwise.
/// Invariants: `total_amount = price_per_lead * quantity`,
/// `vat_amount = round(total_amount * 0.21)`,
/// `total_amount_incl_vat = total_amount + vat_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Human-readable identifier, format `WL-<year>-<sequence>`.
    pub order_number: String,
    /// Invoice identifier, format `WL-<YYYYMMDD>-<4-digit-random>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_company: Option<String>,
    pub package_id: String,
    pub package_name: String,
    pub industry: String,
    pub lead_type: LeadType,
    /// Billable quantity. For shared packages this is the fixed batch size,
    /// not the quantity the customer asked for.
    pub quantity: u32,
    pub price_per_lead: i64,
    pub total_amount: i64,
    pub vat_amount: i64,
    #[serde(rename = "totalAmountInclVAT")]
    pub total_amount_incl_vat: i64,
    /// Fixed at 21 for the Dutch market.
    pub vat_percentage: u8,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token managed by the record store.
    #[serde(default)]
    pub version: u64,
}

/// Prospect lifecycle status inside a customer's CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Converted,
    Lost,
}

/// Where a lead entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadSource {
    Campaign,
    Import,
    Manual,
}

/// A prospect record nested inside a customer's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub interest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    /// Origin row in an external spreadsheet; used to de-duplicate imports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_row_number: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A portal user attached to a company account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub activated: bool,
}

/// Per-customer email notification preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotifications {
    #[serde(default)]
    pub new_leads: bool,
    #[serde(default)]
    pub status_updates: bool,
    #[serde(default)]
    pub weekly_reports: bool,
}

/// WhatsApp delivery settings for a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    pub phone_number: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// A portal account and its associated leads and settings.
///
/// At most one record exists per owner email; created lazily on first
/// access with defaults. Employee emails are unique within a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub owner_email: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub lead_data: Vec<Lead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_sheet_url: Option<String>,
    #[serde(default)]
    pub email_notifications: EmailNotifications,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_config: Option<WhatsAppConfig>,
    pub last_updated: DateTime<Utc>,
    /// Optimistic-concurrency token managed by the record store.
    #[serde(default)]
    pub version: u64,
}

impl CustomerRecord {
    /// Default-initialized record for lazy creation on first access.
    pub fn new(owner_email: &str) -> Self {
        Self {
            owner_email: owner_email.to_lowercase(),
            company_name: String::new(),
            employees: Vec::new(),
            lead_data: Vec::new(),
            google_sheet_url: None,
            email_notifications: EmailNotifications::default(),
            whatsapp_config: None,
            last_updated: Utc::now(),
            version: 0,
        }
    }
}

// ============ Pricing Configuration ============

/// A quantity range with an associated per-unit price (cents).
///
/// Ranges are closed intervals; `max_quantity: None` means "and above".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub min_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u32>,
    pub price_per_lead: i64,
}

impl PricingTier {
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min_quantity
            && self.max_quantity.map_or(true, |max| quantity <= max)
    }
}

/// How a package prices its leads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackagePricing {
    /// Exclusive packages: per-unit price resolved from ordered tiers.
    #[serde(rename_all = "camelCase")]
    Tiered { pricing_tiers: Vec<PricingTier> },
    /// Shared packages: one fixed-size batch at a fixed per-unit price,
    /// regardless of requested quantity.
    #[serde(rename_all = "camelCase")]
    FixedBatch { price_per_lead: i64, batch_size: u32 },
}

/// A sellable lead package for one `(industry, lead_type)` combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub lead_type: LeadType,
    /// Advertised minimum order size. Pricing itself is permissive below
    /// this; the HTTP layer enforces it where required.
    pub min_quantity: u32,
    pub pricing: PackagePricing,
}

// ============ API Request/Response Models ============

/// Request payload for pricing or creating an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub industry: String,
    pub lead_type: LeadType,
    pub quantity: u32,
}

/// Request payload for manual order creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_email: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_company: Option<String>,
    pub industry: String,
    pub lead_type: LeadType,
    pub quantity: u32,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_payment_method() -> String {
    "manual".to_string()
}

/// Request payload for an order status transition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

/// Merge-patch payload for customer settings. Absent fields are left
/// untouched by the merge-write.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_sheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<EmailNotifications>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_config: Option<WhatsAppConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<Employee>,
}

/// Request payload for adding leads to a customer record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLeadsRequest {
    pub leads: Vec<NewLead>,
    #[serde(default = "default_lead_source")]
    pub source: LeadSource,
}

fn default_lead_source() -> LeadSource {
    LeadSource::Manual
}

/// An incoming lead before the server assigns id/status/timestamps.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub company: Option<String>,
    pub interest: String,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sheet_row_number: Option<u32>,
}

/// Merge-patch payload for a single lead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_serializes_camel_case() {
        let order = Order {
            order_number: "WL-2026-001".into(),
            invoice_number: None,
            customer_email: "jan@bedrijf.nl".into(),
            customer_name: "Jan".into(),
            customer_company: None,
            package_id: "thuisbatterijen-exclusive".into(),
            package_name: "Thuisbatterijen Exclusief".into(),
            industry: "Thuisbatterijen".into(),
            lead_type: LeadType::Exclusive,
            quantity: 50,
            price_per_lead: 4000,
            total_amount: 200_000,
            vat_amount: 42_000,
            total_amount_incl_vat: 242_000,
            vat_percentage: 21,
            currency: "EUR".into(),
            status: OrderStatus::Pending,
            payment_method: "ideal".into(),
            payment_intent_id: None,
            session_id: None,
            created_at: Utc::now(),
            delivered_at: None,
            version: 0,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["orderNumber"], "WL-2026-001");
        assert_eq!(value["leadType"], "exclusive");
        assert_eq!(value["totalAmountInclVAT"], 242_000);
        assert!(value.get("invoiceNumber").is_none());
    }

    #[test]
    fn tier_contains_is_closed_interval() {
        let tier = PricingTier {
            min_quantity: 30,
            max_quantity: Some(49),
            price_per_lead: 4250,
        };
        assert!(tier.contains(30));
        assert!(tier.contains(49));
        assert!(!tier.contains(29));
        assert!(!tier.contains(50));

        let open = PricingTier {
            min_quantity: 75,
            max_quantity: None,
            price_per_lead: 3750,
        };
        assert!(open.contains(75));
        assert!(open.contains(100_000));
    }
}
