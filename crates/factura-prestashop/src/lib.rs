use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use factura_core::{Customer, Order, OrderGateway, ServiceError};
use factura_platform::{PrestashopConfig, build_http_client};

const SERVICE: &str = "order platform";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// REST client for the order-management platform. Authenticates with the
/// API key as basic-auth username and an empty password; all bodies are
/// requested in JSON output mode.
pub struct PrestashopGateway {
    config: PrestashopConfig,
    client: reqwest::Client,
}

impl PrestashopGateway {
    pub fn new(config: PrestashopConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT_SECS)?,
            config,
        })
    }

    fn is_eligible(&self, order: &Order) -> bool {
        order.current_state == self.config.shipped_state
            && self
                .config
                .payment_methods
                .iter()
                .any(|method| method == &order.payment)
    }
}

#[async_trait]
impl OrderGateway for PrestashopGateway {
    async fn fetch_eligible_orders(&self) -> Result<Vec<Order>, ServiceError> {
        let url = format!("{}/orders", self.config.api_url);
        let state_filter = format!("[{}]", self.config.shipped_state);
        let payment_filter = format!("[{}]", self.config.payment_methods.join("|"));

        info!("fetching shipped orders from {url}");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_password))
            .query(&[
                ("filter[current_state]", state_filter.as_str()),
                ("filter[payment]", payment_filter.as_str()),
                ("display", "full"),
                ("output_format", "JSON"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;
        if !status.is_success() {
            return Err(ServiceError::upstream(
                SERVICE,
                format!("order listing returned {status}: {body}"),
            ));
        }

        let raw_orders = parse_orders_body(&body)?;
        let mut orders = Vec::with_capacity(raw_orders.len());
        for raw in raw_orders {
            let order = raw.into_order()?;
            if self.is_eligible(&order) {
                orders.push(order);
            } else {
                debug!(
                    "order {} excluded (state {}, payment {:?})",
                    order.reference, order.current_state, order.payment
                );
            }
        }

        info!("{} eligible orders", orders.len());
        Ok(orders)
    }

    async fn fetch_customer(&self, order: &Order) -> Result<Customer, ServiceError> {
        if order.customer_id == 0 {
            return Err(ServiceError::not_found("customer", order.reference.clone()));
        }

        let url = format!("{}/customers/{}", self.config.api_url, order.customer_id);
        debug!("fetching customer {} for order {}", order.customer_id, order.reference);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_password))
            .query(&[("output_format", "JSON")])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::not_found("customer", order.reference.clone()));
        }
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::upstream(
                SERVICE,
                format!("customer fetch returned {status}"),
            ));
        }

        let envelope: CustomerEnvelope = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;
        let raw = envelope
            .customer
            .ok_or_else(|| ServiceError::not_found("customer", order.reference.clone()))?;

        Ok(Customer {
            id: raw.id,
            firstname: raw.firstname,
            lastname: raw.lastname,
            email: raw.email,
            company: raw.company.filter(|c| !c.is_empty()),
        })
    }

    async fn mark_invoiced(&self, order: &Order) -> Result<(), ServiceError> {
        let url = format!("{}/order_histories", self.config.api_url);
        let body = serde_json::json!({
            "order_history": {
                "id_order": order.id,
                "id_employee": self.config.employee_id,
                "id_order_state": self.config.invoiced_state,
            }
        });

        info!(
            "updating order {} to state {}",
            order.reference, self.config.invoiced_state
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_password))
            .query(&[("output_format", "JSON")])
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                SERVICE,
                format!("status update returned {status}: {detail}"),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct CustomerEnvelope {
    customer: Option<RawCustomer>,
}

#[derive(Debug, Deserialize)]
struct RawCustomer {
    id: u64,
    #[serde(default)]
    firstname: String,
    #[serde(default)]
    lastname: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    company: Option<String>,
}

/// One order row as the platform serializes it: the record id is numeric,
/// everything else comes through as strings.
#[derive(Debug, Deserialize)]
struct RawOrder {
    id: u64,
    reference: String,
    current_state: String,
    #[serde(default)]
    payment: String,
    #[serde(default)]
    total_paid: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    id_customer: String,
}

impl RawOrder {
    fn into_order(self) -> Result<Order, ServiceError> {
        let current_state = self.current_state.trim().parse().map_err(|_| {
            ServiceError::upstream(
                SERVICE,
                format!("order {}: bad current_state {:?}", self.reference, self.current_state),
            )
        })?;
        let total_paid: Decimal = self.total_paid.trim().parse().map_err(|_| {
            ServiceError::upstream(
                SERVICE,
                format!("order {}: bad total_paid {:?}", self.reference, self.total_paid),
            )
        })?;
        let customer_id = self.id_customer.trim().parse().unwrap_or(0);

        Ok(Order {
            id: self.id,
            reference: self.reference,
            current_state,
            payment: self.payment,
            total_paid,
            currency: self.currency.unwrap_or_else(|| "EUR".to_string()),
            customer_id,
        })
    }
}

/// The listing endpoint answers `{"orders": [...]}` normally but degrades
/// to a bare `[]` or an empty body when nothing matches the filters.
fn parse_orders_body(body: &str) -> Result<Vec<RawOrder>, ServiceError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }

    let envelope: OrdersEnvelope = serde_json::from_str(trimmed)
        .map_err(|e| ServiceError::upstream(SERVICE, format!("bad order listing: {e}")))?;
    Ok(envelope.orders)
}
