use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CustomerRecord, Order};
use crate::pricing::format_euro;
use failsafe::CircuitBreaker;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// A fully rendered transactional message: no unresolved placeholders,
/// absent optional fields render as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Renders the customer-facing order confirmation from a priced order plus
/// the customer record. Never fails on missing optional fields.
pub fn render_order_confirmation(order: &Order, customer: &CustomerRecord) -> RenderedMessage {
    let company = order
        .customer_company
        .clone()
        .or_else(|| {
            (!customer.company_name.is_empty()).then(|| customer.company_name.clone())
        })
        .unwrap_or_default();
    let invoice_line = order
        .invoice_number
        .as_deref()
        .map(|n| format!("Factuurnummer: {}", n))
        .unwrap_or_default();

    let subject = format!("Bevestiging van je bestelling {}", order.order_number);
    let text = format!(
        "Beste {},\n\n\
         Bedankt voor je bestelling bij WarmeLeads!\n\n\
         Bestelnummer: {}\n\
         {}\n\
         Pakket: {} ({} leads, {})\n\
         Prijs per lead: {}\n\
         Subtotaal (excl. btw): {}\n\
         Btw ({}%): {}\n\
         Totaal (incl. btw): {}\n\n\
         {}\n\
         Je leads worden zo snel mogelijk geleverd in je portaal.\n\n\
         Met warme groet,\nTeam WarmeLeads",
        order.customer_name,
        order.order_number,
        invoice_line,
        order.package_name,
        order.quantity,
        order.lead_type,
        format_euro(order.price_per_lead),
        format_euro(order.total_amount),
        order.vat_percentage,
        format_euro(order.vat_amount),
        format_euro(order.total_amount_incl_vat),
        company,
    );
    let html = format!(
        "<h2>Bedankt voor je bestelling bij WarmeLeads!</h2>\
         <p>Beste {},</p>\
         <table>\
         <tr><td>Bestelnummer</td><td><strong>{}</strong></td></tr>\
         <tr><td>Factuurnummer</td><td>{}</td></tr>\
         <tr><td>Pakket</td><td>{} ({} leads, {})</td></tr>\
         <tr><td>Prijs per lead</td><td>{}</td></tr>\
         <tr><td>Subtotaal (excl. btw)</td><td>{}</td></tr>\
         <tr><td>Btw ({}%)</td><td>{}</td></tr>\
         <tr><td><strong>Totaal (incl. btw)</strong></td><td><strong>{}</strong></td></tr>\
         </table>\
         <p>{}</p>\
         <p>Je leads worden zo snel mogelijk geleverd in je portaal.</p>\
         <p>Met warme groet,<br>Team WarmeLeads</p>",
        order.customer_name,
        order.order_number,
        order.invoice_number.as_deref().unwrap_or(""),
        order.package_name,
        order.quantity,
        order.lead_type,
        format_euro(order.price_per_lead),
        format_euro(order.total_amount),
        order.vat_percentage,
        format_euro(order.vat_amount),
        format_euro(order.total_amount_incl_vat),
        company,
    );
    RenderedMessage {
        subject,
        html,
        text,
    }
}

/// Renders the internal admin alert for a new order.
pub fn render_admin_alert(order: &Order) -> RenderedMessage {
    let subject = format!(
        "Nieuwe bestelling {}: {} x {} ({})",
        order.order_number, order.quantity, order.industry, order.lead_type
    );
    let text = format!(
        "Nieuwe bestelling binnengekomen.\n\n\
         Bestelnummer: {}\n\
         Klant: {} <{}>\n\
         Bedrijf: {}\n\
         Pakket: {}\n\
         Aantal: {}\n\
         Totaal (incl. btw): {}\n\
         Betaalmethode: {}\n\
         Status: {:?}",
        order.order_number,
        order.customer_name,
        order.customer_email,
        order.customer_company.as_deref().unwrap_or(""),
        order.package_name,
        order.quantity,
        format_euro(order.total_amount_incl_vat),
        order.payment_method,
        order.status,
    );
    let html = format!("<pre>{}</pre>", text);
    RenderedMessage {
        subject,
        html,
        text,
    }
}

/// Thin wrappers over the email and WhatsApp provider HTTP APIs.
///
/// Delivery is best-effort and sits outside the order's consistency
/// boundary: failures are logged as `NotificationDelivery` errors by the
/// dispatch entry point and never roll back a persisted order. A circuit
/// breaker keeps a dead provider from slowing every order down.
pub struct NotificationService {
    client: Client,
    email_api_url: String,
    email_api_key: Option<String>,
    from_address: String,
    admin_email: String,
    whatsapp_api_url: Option<String>,
    whatsapp_api_key: Option<String>,
    breaker: ProviderBreaker,
}

impl NotificationService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            email_api_url: config.email_api_url.trim_end_matches('/').to_string(),
            email_api_key: config.email_api_key.clone(),
            from_address: config.email_from_address.clone(),
            admin_email: config.admin_email.clone(),
            whatsapp_api_url: config.whatsapp_api_url.clone(),
            whatsapp_api_key: config.whatsapp_api_key.clone(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    /// Sends one email through the provider. Returns the provider message
    /// id, or `Ok(None)` when email is not configured.
    pub async fn send_email(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<Option<String>, AppError> {
        let Some(ref api_key) = self.email_api_key else {
            tracing::warn!(
                "Email provider not configured; skipping '{}' to {}",
                message.subject,
                recipient
            );
            return Ok(None);
        };
        if !self.breaker.is_call_permitted() {
            return Err(AppError::NotificationDelivery(
                "Email provider circuit is open".to_string(),
            ));
        }

        let outcome = self
            .client
            .post(format!("{}/emails", self.email_api_url))
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from_address,
                "to": [recipient],
                "subject": message.subject,
                "html": message.html,
                "text": message.text,
            }))
            .send()
            .await;

        let response = self.record_outcome(outcome.map_err(|e| {
            AppError::NotificationDelivery(format!("Email request failed: {}", e))
        }))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::NotificationDelivery(format!(
                "Email provider returned {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::NotificationDelivery(format!("Failed to parse email response: {}", e))
        })?;
        Ok(body.get("id").and_then(|v| v.as_str()).map(String::from))
    }

    /// Sends a WhatsApp message when the customer has WhatsApp delivery
    /// configured and the provider is set up.
    pub async fn send_whatsapp(
        &self,
        phone_number: &str,
        body_text: &str,
    ) -> Result<Option<String>, AppError> {
        let (Some(api_url), Some(api_key)) =
            (self.whatsapp_api_url.as_deref(), self.whatsapp_api_key.as_deref())
        else {
            tracing::debug!("WhatsApp provider not configured; skipping message");
            return Ok(None);
        };
        if !self.breaker.is_call_permitted() {
            return Err(AppError::NotificationDelivery(
                "WhatsApp provider circuit is open".to_string(),
            ));
        }

        let outcome = self
            .client
            .post(format!("{}/messages", api_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&json!({
                "to": phone_number,
                "body": body_text,
            }))
            .send()
            .await;

        let response = self.record_outcome(outcome.map_err(|e| {
            AppError::NotificationDelivery(format!("WhatsApp request failed: {}", e))
        }))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::NotificationDelivery(format!(
                "WhatsApp provider returned {}",
                status
            )));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::NotificationDelivery(format!("Failed to parse WhatsApp response: {}", e))
        })?;
        Ok(body.get("id").and_then(|v| v.as_str()).map(String::from))
    }

    /// Best-effort dispatch for a freshly persisted order: customer
    /// confirmation, admin alert, and WhatsApp when configured. Failures
    /// are logged and swallowed here - the order is already durable.
    pub async fn dispatch_order_notifications(&self, order: &Order, customer: &CustomerRecord) {
        let confirmation = render_order_confirmation(order, customer);
        match self.send_email(&order.customer_email, &confirmation).await {
            Ok(Some(id)) => {
                tracing::info!(
                    "Order confirmation for {} sent (provider id {})",
                    order.order_number,
                    id
                );
            }
            Ok(None) => {}
            Err(e) => tracing::error!(
                "Failed to send order confirmation for {}: {}",
                order.order_number,
                e
            ),
        }

        let alert = render_admin_alert(order);
        if let Err(e) = self.send_email(&self.admin_email, &alert).await {
            tracing::error!(
                "Failed to send admin alert for {}: {}",
                order.order_number,
                e
            );
        }

        if let Some(ref wa) = customer.whatsapp_config {
            if wa.enabled {
                if let Err(e) = self.send_whatsapp(&wa.phone_number, &confirmation.text).await {
                    tracing::error!(
                        "Failed to send WhatsApp confirmation for {}: {}",
                        order.order_number,
                        e
                    );
                }
            }
        }
    }

    /// Feeds a call outcome to the circuit breaker so consecutive provider
    /// failures eventually open the circuit.
    fn record_outcome<T>(&self, outcome: Result<T, AppError>) -> Result<T, AppError> {
        match self.breaker.call(|| outcome) {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::NotificationDelivery(
                "Email provider circuit is open".to_string(),
            )),
        }
    }
}
