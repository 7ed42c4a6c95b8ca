use crate::models::LeadType;
use serde::{Deserialize, Serialize};

/// Webhook payload from the payment provider: a single event object or an
/// array of events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Single(PaymentEvent),
    Batch(Vec<PaymentEvent>),
}

impl WebhookPayload {
    /// Normalizes single-event and batch payloads to a vec of events.
    pub fn into_events(self) -> Vec<PaymentEvent> {
        match self {
            WebhookPayload::Single(event) => vec![event],
            WebhookPayload::Batch(events) => events,
        }
    }
}

/// One verified payment event. The provider guarantees the payment is
/// settled before delivering `checkout.completed`; the metadata carries
/// everything needed to construct the order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// Provider-assigned event id, used for de-duplication.
    pub id: String,
    /// Event type, e.g. `checkout.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub customer_email: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_company: Option<String>,
    pub metadata: PaymentMetadata,
}

fn default_payment_method() -> String {
    "ideal".to_string()
}

/// Order parameters the checkout flow attached to the payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    pub industry: String,
    pub lead_type: LeadType,
    pub quantity: u32,
}

/// Response returned to the payment provider.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub received: usize,
    pub processed: usize,
    pub duplicates: usize,
    pub failed: usize,
}
