use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::identifiers;
use crate::models::*;
use crate::notifications::NotificationService;
use crate::pricing::{OrderQuote, PricingCatalog};
use crate::record_store::{customer_path, order_path, order_prefix, RecordStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, OnceLock};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Blob-backed record store (the only persistence layer).
    pub store: RecordStore,
    /// Static pricing configuration.
    pub catalog: PricingCatalog,
    /// Email/WhatsApp dispatch.
    pub notifications: Arc<NotificationService>,
    /// De-duplication cache for payment webhook events: an event id seen
    /// within the TTL window is acknowledged but not re-processed.
    pub processed_events_cache: Cache<String, i64>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "warmeleads-api",
            "version": "0.1.0"
        })),
    )
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid regex")
    })
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email_regex().is_match(email.trim()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            email
        )))
    }
}

fn validate_quantity(quantity: u32) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::Validation(
            "Quantity must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/orders/quote
///
/// Prices an order without persisting anything. Unknown industry/lead-type
/// combinations surface as a 404 with kind `package_not_found`.
pub async fn quote_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<OrderQuote>, AppError> {
    tracing::info!(
        "POST /orders/quote - industry={} leadType={} quantity={}",
        request.industry,
        request.lead_type,
        request.quantity
    );
    validate_quantity(request.quantity)?;
    let quote = state
        .catalog
        .calculate_order(&request.industry, request.lead_type, request.quantity)?;
    Ok(Json(quote))
}

/// POST /api/v1/orders
///
/// Manual order creation: validate, price, allocate identifiers, persist,
/// then dispatch notifications best-effort. Pricing and identifier errors
/// abort before anything is written; a half-priced order is never stored.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    tracing::info!(
        "POST /orders - {} x {} {} for {}",
        request.quantity,
        request.industry,
        request.lead_type,
        request.customer_email
    );

    validate_email(&request.customer_email)?;
    validate_quantity(request.quantity)?;
    if request.customer_name.trim().is_empty() {
        return Err(AppError::Validation("Customer name is required".to_string()));
    }

    let order = persist_new_order(&state, &request, OrderStatus::Pending)
        .await
        .context("creating order")?;

    let customer = ensure_customer_record(&state, &order).await?;
    state
        .notifications
        .dispatch_order_notifications(&order, &customer)
        .await;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Prices the request, allocates the order/invoice identifiers, and writes
/// the order blob. Shared by manual creation and the payment webhook.
pub async fn persist_new_order(
    state: &AppState,
    request: &CreateOrderRequest,
    status: OrderStatus,
) -> Result<Order, AppError> {
    let quote = state
        .catalog
        .calculate_order(&request.industry, request.lead_type, request.quantity)?;

    let now = Utc::now();
    let year = identifiers::order_year(now);
    let sequence = state.store.next_order_sequence(year).await?;
    let order_number = identifiers::format_order_number(year, sequence);
    let invoice_number = identifiers::invoice_number(now, &mut rand::rng());

    let order = Order {
        order_number: order_number.clone(),
        invoice_number: Some(invoice_number),
        customer_email: request.customer_email.trim().to_lowercase(),
        customer_name: request.customer_name.trim().to_string(),
        customer_company: request.customer_company.clone(),
        package_id: quote.package_id.clone(),
        package_name: quote.package_name.clone(),
        industry: quote.industry.clone(),
        lead_type: quote.lead_type,
        quantity: quote.billable_quantity,
        price_per_lead: quote.price_per_lead,
        total_amount: quote.total_amount,
        vat_amount: quote.vat_amount,
        total_amount_incl_vat: quote.total_amount_incl_vat,
        vat_percentage: quote.vat_percentage,
        currency: quote.currency.clone(),
        status,
        payment_method: request.payment_method.clone(),
        payment_intent_id: request.payment_intent_id.clone(),
        session_id: request.session_id.clone(),
        created_at: now,
        delivered_at: None,
        version: 0,
    };

    let path = order_path(&order.customer_email, &order.order_number);
    let patch = serde_json::to_value(&order).context("serializing order")?;
    let stored = state.store.upsert(&path, &patch).await?;

    tracing::info!(
        "Order {} persisted for {} ({} leads, {} excl. btw)",
        order.order_number,
        order.customer_email,
        order.quantity,
        order.total_amount
    );

    serde_json::from_value(stored).context("parsing stored order")
}

/// Lazily creates the customer record on first contact and returns it.
pub async fn ensure_customer_record(
    state: &AppState,
    order: &Order,
) -> Result<CustomerRecord, AppError> {
    let path = customer_path(&order.customer_email);
    let mut patch = json!({ "ownerEmail": order.customer_email.to_lowercase() });
    if let Some(ref company) = order.customer_company {
        patch["companyName"] = json!(company);
    }
    let stored = state
        .store
        .upsert(&path, &patch)
        .await
        .context("updating customer record for order")?;
    serde_json::from_value(stored).context("parsing customer record")
}

/// Which order status transitions are legal. Delivered and cancelled are
/// terminal.
fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Completed)
            | (OrderStatus::Pending, OrderStatus::Delivered)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Completed, OrderStatus::Delivered)
            | (OrderStatus::Completed, OrderStatus::Cancelled)
    )
}

/// PATCH /api/v1/customers/:email/orders/:order_number/status
///
/// The transition guard runs inside the store's read-merge-write cycle, so
/// a status change that races this request (a concurrent cancellation, say)
/// is re-checked against the record as it stands at write time rather than
/// overwritten from a stale read.
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path((email, order_number)): Path<(String, String)>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(
        "PATCH /customers/{}/orders/{}/status -> {:?}",
        email,
        order_number,
        request.status
    );
    validate_email(&email)?;

    let path = order_path(&email, &order_number);
    let target = request.status;
    let stored = state
        .store
        .upsert_with(&path, |current| {
            let current = current.ok_or_else(|| {
                AppError::NotFound(format!("Order {} not found", order_number))
            })?;
            let order: Order =
                serde_json::from_value(current.clone()).context("parsing stored order")?;
            if !can_transition(order.status, target) {
                return Err(AppError::Validation(format!(
                    "Order {} cannot move from {:?} to {:?}",
                    order_number, order.status, target
                )));
            }
            let mut patch = json!({ "status": target });
            if target == OrderStatus::Delivered {
                patch["deliveredAt"] = json!(Utc::now().to_rfc3339());
            }
            Ok(patch)
        })
        .await?;
    serde_json::from_value(stored)
        .context("parsing updated order")
        .map(Json)
}

/// GET /api/v1/customers/:email/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    validate_email(&email)?;
    let records = state.store.load_all(&order_prefix(&email)).await?;
    let mut orders = Vec::with_capacity(records.len());
    for record in records {
        orders.push(serde_json::from_value(record).context("parsing stored order")?);
    }
    Ok(Json(orders))
}

/// GET /api/v1/customers/:email/orders/:order_number
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path((email, order_number)): Path<(String, String)>,
) -> Result<Json<Order>, AppError> {
    validate_email(&email)?;
    let path = order_path(&email, &order_number);
    let record = state
        .store
        .load(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_number)))?;
    serde_json::from_value(record.value)
        .context("parsing stored order")
        .map(Json)
}

/// DELETE /api/v1/customers/:email/orders/:order_number
///
/// Explicit admin delete; orders are otherwise never removed.
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path((email, order_number)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    validate_email(&email)?;
    tracing::warn!("Admin delete of order {} for {}", order_number, email);
    state.store.delete(&order_path(&email, &order_number)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/customers/:email
///
/// Customer records are created lazily on first access with defaults.
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<CustomerRecord>, AppError> {
    validate_email(&email)?;
    let path = customer_path(&email);
    match state.store.load(&path).await? {
        Some(record) => serde_json::from_value(record.value)
            .context("parsing customer record")
            .map(Json),
        None => {
            tracing::info!("First access for {}; creating default customer record", email);
            let default = CustomerRecord::new(&email);
            let patch = serde_json::to_value(&default).context("serializing customer record")?;
            let stored = state.store.upsert(&path, &patch).await?;
            serde_json::from_value(stored)
                .context("parsing customer record")
                .map(Json)
        }
    }
}

/// PATCH /api/v1/customers/:email
///
/// Merge-writes settings onto the customer record. A patch carrying only
/// one field never erases the others; an `employee` entry is merged into
/// `employees` by email rather than overwriting the array.
pub async fn patch_customer(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<CustomerRecord>, AppError> {
    tracing::info!("PATCH /customers/{}", email);
    validate_email(&email)?;

    if let Some(ref url) = patch.google_sheet_url {
        if !url.starts_with("https://") {
            return Err(AppError::Validation(
                "googleSheetUrl must be an HTTPS URL".to_string(),
            ));
        }
    }
    if let Some(ref employee) = patch.employee {
        validate_email(&employee.email)?;
    }

    let mut value = serde_json::to_value(&patch).context("serializing customer patch")?;
    if let Some(employee) = value
        .as_object_mut()
        .and_then(|map| map.remove("employee"))
    {
        value["employees"] = json!([employee]);
    }
    value["ownerEmail"] = json!(email.trim().to_lowercase());

    let stored = state.store.upsert(&customer_path(&email), &value).await?;
    serde_json::from_value(stored)
        .context("parsing customer record")
        .map(Json)
}

/// POST /api/v1/customers/:email/leads
///
/// Adds leads to a customer record. Imports carrying a `sheetRowNumber`
/// already present in the record are dropped by the merge as duplicates.
pub async fn add_leads(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    Json(request): Json<AddLeadsRequest>,
) -> Result<(StatusCode, Json<CustomerRecord>), AppError> {
    tracing::info!(
        "POST /customers/{}/leads - {} lead(s), source {:?}",
        email,
        request.leads.len(),
        request.source
    );
    validate_email(&email)?;
    if request.leads.is_empty() {
        return Err(AppError::Validation("No leads supplied".to_string()));
    }

    let now = Utc::now();
    let mut leads = Vec::with_capacity(request.leads.len());
    for incoming in &request.leads {
        validate_email(&incoming.email)?;
        leads.push(Lead {
            id: uuid::Uuid::new_v4(),
            name: incoming.name.clone(),
            email: incoming.email.trim().to_lowercase(),
            phone: incoming.phone.clone(),
            company: incoming.company.clone(),
            interest: incoming.interest.clone(),
            budget: incoming.budget.clone(),
            timeline: incoming.timeline.clone(),
            notes: incoming.notes.clone(),
            status: LeadStatus::New,
            source: request.source,
            sheet_row_number: incoming.sheet_row_number,
            created_at: now,
            updated_at: now,
        });
    }

    let patch = json!({
        "ownerEmail": email.trim().to_lowercase(),
        "leadData": serde_json::to_value(&leads).context("serializing leads")?,
    });
    let stored = state.store.upsert(&customer_path(&email), &patch).await?;
    let record: CustomerRecord =
        serde_json::from_value(stored).context("parsing customer record")?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PATCH /api/v1/customers/:email/leads/:lead_id
pub async fn patch_lead(
    State(state): State<Arc<AppState>>,
    Path((email, lead_id)): Path<(String, uuid::Uuid)>,
    Json(patch): Json<LeadPatch>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("PATCH /customers/{}/leads/{}", email, lead_id);
    validate_email(&email)?;

    let path = customer_path(&email);
    let record = state
        .store
        .load(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No customer record for {}", email)))?;
    let customer: CustomerRecord =
        serde_json::from_value(record.value).context("parsing customer record")?;

    let mut lead = customer
        .lead_data
        .into_iter()
        .find(|lead| lead.id == lead_id)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

    if let Some(status) = patch.status {
        lead.status = status;
    }
    if let Some(notes) = patch.notes {
        lead.notes = Some(notes);
    }
    lead.updated_at = Utc::now();

    let update = json!({
        "leadData": [serde_json::to_value(&lead).context("serializing lead")?],
    });
    state.store.upsert(&path, &update).await?;
    Ok(Json(lead))
}
