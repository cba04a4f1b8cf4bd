use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::PaymentConfig,
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Client for the hosted checkout gateway. `config` is `None` when
/// online payments are not configured.
#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    config: Option<PaymentConfig>,
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrder<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl PaymentGateway {
    pub fn new(config: Option<PaymentConfig>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn settings(&self) -> AppResult<&PaymentConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| AppError::PaymentGateway("payment gateway is not configured".into()))
    }

    pub fn key_id(&self) -> AppResult<&str> {
        Ok(self.settings()?.key_id.as_str())
    }

    /// `POST {base}/v1/orders`; `amount` is in minor units.
    pub async fn create_order(&self, amount: i64, receipt: &str) -> AppResult<GatewayOrder> {
        let settings = self.settings()?;
        let url = format!("{}/v1/orders", settings.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&settings.key_id, Some(&settings.key_secret))
            .json(&CreateGatewayOrder {
                amount,
                currency: &settings.currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "gateway rejected order creation");
            return Err(AppError::PaymentGateway(format!(
                "gateway responded with {status}"
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))
    }

    pub fn verify_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> AppResult<bool> {
        let settings = self.settings()?;
        Ok(verify_payment_signature(
            &settings.key_secret,
            gateway_order_id,
            payment_id,
            signature,
        ))
    }
}

/// Constant-time check of a hex HMAC-SHA256 over `"{order_id}|{payment_id}"`.
pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_signature(secret: &str, gateway_order_id: &str, payment_id: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn signature_verifies_for_matching_payload() {
        let sig = payment_signature("shh", "order_9A", "pay_42").unwrap();
        assert!(verify_payment_signature("shh", "order_9A", "pay_42", &sig));
    }

    #[test]
    fn signature_rejects_tampering() {
        let sig = payment_signature("shh", "order_9A", "pay_42").unwrap();
        assert!(!verify_payment_signature("shh", "order_9A", "pay_43", &sig));
        assert!(!verify_payment_signature("other", "order_9A", "pay_42", &sig));
        assert!(!verify_payment_signature("shh", "order_9A", "pay_42", "not-hex"));
    }

    #[test]
    fn unconfigured_gateway_reports_bad_gateway() {
        let gateway = PaymentGateway::new(None);
        assert!(!gateway.is_configured());
        assert!(matches!(
            gateway.verify_signature("o", "p", "s"),
            Err(AppError::PaymentGateway(_))
        ));
    }
}
