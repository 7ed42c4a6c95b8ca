use crate::errors::AppError;
use crate::handlers::{persist_new_order, validate_email, AppState};
use crate::models::{CreateOrderRequest, OrderStatus};
use crate::webhook_models::{PaymentEvent, WebhookPayload, WebhookResponse};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

/// Payment Provider Webhook Handler
///
/// Receives verified payment events when a checkout completes. Validates
/// the shared webhook secret, de-duplicates events, and creates the order
/// through the same pricing/persistence path as manual creation.
///
/// Expected payload: Single event object OR array of events
/// Authentication: X-Webhook-Token header must match PAYMENT_WEBHOOK_SECRET
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    tracing::info!("Received payment webhook");

    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(&state, &headers)?;

    // 2. Normalize payload (handles both single and batch)
    let events = payload.into_events();
    let total_received = events.len();
    tracing::info!("Processing {} webhook event(s)", total_received);

    let mut processed = 0;
    let mut duplicates = 0;
    let mut failed = 0;

    // 3. Process each event; one failing event must not block the rest
    for event in events {
        match process_payment_event(&state, event).await {
            Ok(ProcessResult::Processed) => processed += 1,
            Ok(ProcessResult::Duplicate) => {
                duplicates += 1;
                tracing::debug!("Skipped duplicate webhook event");
            }
            Ok(ProcessResult::Ignored) => {
                tracing::debug!("Ignored webhook event of unhandled type");
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to process webhook event: {}", e);
            }
        }
    }

    tracing::info!(
        "Webhook processing complete: {} received, {} processed, {} duplicates, {} failed",
        total_received,
        processed,
        duplicates,
        failed
    );

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            status: "received".to_string(),
            received: total_received,
            processed,
            duplicates,
            failed,
        }),
    ))
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.payment_webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("X-Webhook-Token")
        .or_else(|| headers.get("x-webhook-token"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug)]
enum ProcessResult {
    Processed,
    Duplicate,
    Ignored,
}

/// Creates an order from one payment event.
///
/// The event id is remembered in the de-duplication cache so a provider
/// retry of an already-processed delivery is acknowledged without writing
/// a second order.
async fn process_payment_event(
    state: &AppState,
    event: PaymentEvent,
) -> Result<ProcessResult, AppError> {
    if event.event_type != "checkout.completed" && event.event_type != "payment.succeeded" {
        return Ok(ProcessResult::Ignored);
    }

    if state.processed_events_cache.get(&event.id).await.is_some() {
        return Ok(ProcessResult::Duplicate);
    }

    validate_email(&event.customer_email)?;
    if event.metadata.quantity == 0 {
        return Err(AppError::Validation(format!(
            "Event {} carries a zero quantity",
            event.id
        )));
    }

    let request = CreateOrderRequest {
        customer_email: event.customer_email.clone(),
        customer_name: event.customer_name.clone(),
        customer_company: event.customer_company.clone(),
        industry: event.metadata.industry.clone(),
        lead_type: event.metadata.lead_type,
        quantity: event.metadata.quantity,
        payment_method: event.payment_method.clone(),
        payment_intent_id: event.payment_intent_id.clone(),
        session_id: event.session_id.clone(),
    };

    // Payment already settled, so the order starts completed.
    let order = persist_new_order(state, &request, OrderStatus::Completed).await?;

    // Mark the event processed only after the order write succeeded, so a
    // failed write lets the provider's retry try again.
    state
        .processed_events_cache
        .insert(event.id.clone(), Utc::now().timestamp())
        .await;

    // Best-effort: customer record update and notifications never fail the
    // webhook once the order blob is durable.
    match crate::handlers::ensure_customer_record(state, &order).await {
        Ok(customer) => {
            state
                .notifications
                .dispatch_order_notifications(&order, &customer)
                .await;
        }
        Err(e) => {
            tracing::error!(
                "Order {} persisted but customer record update failed: {}",
                order.order_number,
                e
            );
        }
    }

    Ok(ProcessResult::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_compare_basic() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "Secret"));
        assert!(!constant_time_compare("secret", "secret1"));
        assert!(!constant_time_compare("", "secret"));
        assert!(constant_time_compare("", ""));
    }
}
