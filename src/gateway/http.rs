//! Configuration-driven JSON gateway adapter.
//!
//! Speaks the common REST shape most collection/payout providers share:
//! bearer secret key, `transaction/initialize`, `transaction/verify/{ref}`,
//! `transfer` and `bank/resolve`, with the interesting fields either at the
//! top level or under `data`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

use super::{
    DisbursementRequest, DisbursementResult, GatewayEvent, GatewayStatus, PaymentGateway,
    PaymentInit, PaymentRequest, ResolvedAccount, VirtualAccount, VirtualAccountRequest,
};
use crate::error::AppError;
use crate::models::payment_method::PaymentMethod;

/// Field paths where providers put our reference.
const REFERENCE_PATHS: &[&str] = &[
    "/data/reference",
    "/data/tx_ref",
    "/data/transaction_no",
    "/reference",
    "/tx_ref",
    "/transaction_no",
];

const STATUS_PATHS: &[&str] = &["/data/status", "/status", "/event"];

const AMOUNT_PATHS: &[&str] = &["/data/amount", "/amount"];

pub struct HttpGateway {
    client: Client,
    method: PaymentMethod,
}

impl HttpGateway {
    pub fn new(client: Client, method: PaymentMethod) -> Self {
        Self { client, method }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        let raw = format!("{}/{}", self.method.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| {
            AppError::Gateway(format!(
                "{} base URL is invalid: {}",
                self.method.provider, e
            ))
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, AppError> {
        let response = request
            .bearer_auth(&self.method.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("{} request failed: {}", self.method.provider, e)))?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if !status.is_success() {
            tracing::warn!(
                provider = %self.method.provider,
                status = status.as_u16(),
                "Gateway returned an error response"
            );
            return Err(AppError::Gateway(format!(
                "{} responded {}: {}",
                self.method.provider,
                status.as_u16(),
                message_of(&body)
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn provider(&self) -> &str {
        &self.method.provider
    }

    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInit, AppError> {
        let url = self.endpoint("transaction/initialize")?;
        let body = self
            .send(self.client.post(url).json(&json!({
                "reference": request.transaction_no,
                "amount": request.amount,
                "currency": request.currency,
                "email": request.email,
                "callback_url": request.callback_url,
                "merchant_id": self.method.merchant_id,
            })))
            .await?;

        Ok(PaymentInit {
            authorization_url: string_at(
                &body,
                &["/data/authorization_url", "/data/link", "/authorization_url"],
            ),
            gateway_reference: string_at(&body, &["/data/access_code", "/data/id"]),
        })
    }

    async fn verify_transaction(&self, transaction_no: &str) -> Result<GatewayEvent, AppError> {
        let url = self.endpoint(&format!("transaction/verify/{}", transaction_no))?;
        let body = self.send(self.client.get(url)).await?;

        let mut event = normalize_event(&body).unwrap_or_else(|_| GatewayEvent {
            correlation_id: transaction_no.to_string(),
            status: GatewayStatus::Pending,
            amount: None,
            raw: Value::Null,
        });
        // The verify endpoint is addressed by our reference, so trust it over the body
        event.correlation_id = transaction_no.to_string();
        event.raw = body;
        Ok(event)
    }

    fn handle_webhook(&self, body: &Value) -> Result<GatewayEvent, AppError> {
        normalize_event(body)
    }

    async fn disburse_funds(
        &self,
        request: &DisbursementRequest,
    ) -> Result<DisbursementResult, AppError> {
        let url = self.endpoint("transfer")?;
        let body = self
            .send(self.client.post(url).json(&json!({
                "reference": request.transaction_no,
                "amount": request.amount,
                "currency": request.currency,
                "account_number": request.account_number,
                "account_name": request.account_name,
                "bank_code": request.bank_code,
                "narration": request.narration,
            })))
            .await?;

        let status = string_at(&body, STATUS_PATHS)
            .map(|s| GatewayStatus::normalize(&s))
            .unwrap_or(GatewayStatus::Pending);

        Ok(DisbursementResult {
            gateway_reference: string_at(&body, &["/data/transfer_code", "/data/id", "/data/reference"]),
            status,
        })
    }

    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, AppError> {
        let mut url = self.endpoint("bank/resolve")?;
        url.query_pairs_mut()
            .append_pair("account_number", account_number)
            .append_pair("bank_code", bank_code);

        let body = self.send(self.client.get(url)).await?;
        let account_name = string_at(&body, &["/data/account_name", "/account_name"])
            .ok_or_else(|| AppError::Gateway("account could not be resolved".to_string()))?;

        Ok(ResolvedAccount {
            account_number: account_number.to_string(),
            account_name,
            bank_code: Some(bank_code.to_string()),
        })
    }

    async fn create_virtual_account(
        &self,
        request: &VirtualAccountRequest,
    ) -> Result<VirtualAccount, AppError> {
        let url = self.endpoint("dedicated_account")?;
        let body = self
            .send(self.client.post(url).json(&json!({
                "customer_reference": request.user_id,
                "name": request.username,
                "email": request.email,
                "phone": request.phone,
            })))
            .await?;

        match (
            string_at(&body, &["/data/account_number", "/account_number"]),
            string_at(&body, &["/data/account_name", "/account_name"]),
            string_at(&body, &["/data/bank/name", "/data/bank_name", "/bank_name"]),
        ) {
            (Some(account_no), Some(account_name), Some(bank_name)) => Ok(VirtualAccount {
                account_no,
                account_name,
                bank_name,
            }),
            _ => Err(AppError::Gateway(format!(
                "{} returned an incomplete virtual account",
                self.method.provider
            ))),
        }
    }
}

/// Normalize a provider body into a `GatewayEvent`.
///
/// # Errors
///
/// `InvalidRequest` when no reference can be found in the body.
pub fn normalize_event(body: &Value) -> Result<GatewayEvent, AppError> {
    let correlation_id = string_at(body, REFERENCE_PATHS).ok_or_else(|| {
        AppError::InvalidRequest("callback carries no transaction reference".to_string())
    })?;

    let status = string_at(body, STATUS_PATHS)
        .map(|s| GatewayStatus::normalize(&s))
        .unwrap_or(GatewayStatus::Pending);

    let amount = AMOUNT_PATHS
        .iter()
        .find_map(|path| body.pointer(path))
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));

    Ok(GatewayEvent {
        correlation_id,
        status,
        amount,
        raw: body.clone(),
    })
}

/// First non-empty string (or number rendered as string) at any of `paths`.
fn string_at(body: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match body.pointer(path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn message_of(body: &Value) -> String {
    string_at(body, &["/message", "/error/message", "/error"]).unwrap_or_else(|| "no message".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paystack_style_event() {
        let body = json!({
            "event": "charge.success",
            "data": { "reference": "DEP-1", "status": "success", "amount": 50 }
        });
        let event = normalize_event(&body).unwrap();
        assert_eq!(event.correlation_id, "DEP-1");
        assert_eq!(event.status, GatewayStatus::Success);
        assert_eq!(event.amount, Some(50));
    }

    #[test]
    fn flat_event_with_string_amount() {
        let body = json!({ "tx_ref": "DEP-2", "status": "failed", "amount": "1200" });
        let event = normalize_event(&body).unwrap();
        assert_eq!(event.correlation_id, "DEP-2");
        assert_eq!(event.status, GatewayStatus::Failed);
        assert_eq!(event.amount, Some(1200));
    }

    #[test]
    fn event_without_status_stays_pending() {
        let event = normalize_event(&json!({ "reference": "DEP-3" })).unwrap();
        assert_eq!(event.status, GatewayStatus::Pending);
        assert_eq!(event.amount, None);
    }

    #[test]
    fn event_without_reference_is_rejected() {
        let err = normalize_event(&json!({ "status": "success" })).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
