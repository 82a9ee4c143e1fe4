use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::WhatsAppConfig;
use crate::error::ReporterError;
use crate::service::normalizer::payload_error;
use crate::types::run::{Recipient, SendResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    instance_name: &'a str,
    phone_number: &'a str,
    message: &'a str,
}

/// Client for the send-message function of the WhatsApp gateway.
#[derive(Clone)]
pub struct WhatsAppApi {
    client: reqwest::Client,
    send_url: Url,
    service_key: Option<String>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl WhatsAppApi {
    pub fn new(cfg: &WhatsAppConfig) -> Result<Self, ReporterError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bacula-reporter/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        let per_minute = NonZeroU32::new(cfg.sends_per_minute).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            send_url: cfg.send_url.clone(),
            service_key: cfg.service_key.clone(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// Send one message. Gateways answer `200` with `success: false` or an
    /// `error` field on logical failures, so the body is checked too.
    pub async fn send_message(
        &self,
        instance_name: &str,
        phone_number: &str,
        message: &str,
    ) -> Result<Value, ReporterError> {
        self.limiter.until_ready().await;

        let mut req = self.client.post(self.send_url.clone()).json(&SendMessageBody {
            instance_name,
            phone_number,
            message,
        });
        if let Some(key) = self.service_key.as_deref() {
            req = req.bearer_auth(key).header("apikey", key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ReporterError::UpstreamStatus(status));
        }

        let body = resp.bytes().await?;
        let payload: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = payload
                .get("error")
                .or_else(|| payload.get("message"))
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .unwrap_or_else(|| "send rejected".to_string());
            return Err(ReporterError::UpstreamPayload(reason));
        }
        if let Some(reason) = payload_error(&payload) {
            return Err(ReporterError::UpstreamPayload(reason));
        }
        Ok(payload)
    }

    /// Deliver `message` to each recipient in order. A failed send is
    /// recorded and the loop moves on.
    pub async fn broadcast(
        &self,
        instance_name: &str,
        recipients: &[Recipient],
        message: &str,
    ) -> Vec<SendResult> {
        let mut results = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let result = match self
                .send_message(instance_name, &recipient.phone_number, message)
                .await
            {
                Ok(response) => {
                    debug!(phone = %recipient.phone_number, "report message sent");
                    SendResult {
                        scheduled_report_id: recipient.scheduled_report_id.clone(),
                        phone_number: recipient.phone_number.clone(),
                        name: recipient.name.clone(),
                        success: true,
                        error: None,
                        response: Some(response).filter(|v| !v.is_null()),
                    }
                }
                Err(e) => {
                    warn!(
                        phone = %recipient.phone_number,
                        scheduled_report = ?recipient.scheduled_report_id,
                        error = %e,
                        "report message failed"
                    );
                    SendResult {
                        scheduled_report_id: recipient.scheduled_report_id.clone(),
                        phone_number: recipient.phone_number.clone(),
                        name: recipient.name.clone(),
                        success: false,
                        error: Some(e.to_string()),
                        response: None,
                    }
                }
            };
            results.push(result);
        }
        results
    }
}
