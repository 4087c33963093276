use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use cinestay_core::booking::Booking;
use cinestay_core::payment::{PaymentGateway, PaymentLink};

use crate::constants::{self, REQUEST_TYPE};
use crate::signature;
use crate::Pay2sError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub bank_id: String,
}

#[derive(Debug, Clone)]
pub struct Pay2sConfig {
    pub endpoint: String,
    pub partner_code: String,
    pub partner_name: String,
    pub access_key: String,
    pub secret_key: String,
    pub ipn_url: String,
    pub redirect_url: String,
    pub bank_accounts: Vec<BankAccount>,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
}

impl Pay2sConfig {
    pub fn with_defaults(endpoint: &str, partner_code: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            partner_code: partner_code.to_string(),
            partner_name: "CineStay".to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            ipn_url: String::new(),
            redirect_url: String::new(),
            bank_accounts: Vec::new(),
            max_retries: constants::MAX_RETRIES,
            request_timeout: Duration::from_millis(constants::REQUEST_TIMEOUT_MS),
            retry_delay: Duration::from_millis(constants::RETRY_DELAY_MS),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest<'a> {
    access_key: &'a str,
    partner_code: &'a str,
    partner_name: &'a str,
    request_id: String,
    amount: i64,
    order_id: &'a str,
    order_info: String,
    order_type: &'static str,
    bank_accounts: &'a [BankAccount],
    redirect_url: &'a str,
    ipn_url: &'a str,
    request_type: &'static str,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    result_code: i32,
    #[serde(default)]
    message: String,
    pay_url: Option<String>,
    qr_code: Option<String>,
}

pub struct Pay2sClient {
    http: reqwest::Client,
    config: Pay2sConfig,
}

impl Pay2sClient {
    pub fn new(config: Pay2sConfig) -> Result<Self, Pay2sError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Signature input of the create-payment call. Bank accounts are signed
    /// as the literal `Array`, matching the gateway.
    pub fn create_signature_string(&self, request_id: &str, amount: i64, order_id: &str, order_info: &str) -> String {
        let amount = amount.to_string();
        signature::canonical(&[
            ("accessKey", self.config.access_key.as_str()),
            ("amount", amount.as_str()),
            ("bankAccounts", "Array"),
            ("ipnUrl", self.config.ipn_url.as_str()),
            ("orderId", order_id),
            ("orderInfo", order_info),
            ("partnerCode", self.config.partner_code.as_str()),
            ("redirectUrl", self.config.redirect_url.as_str()),
            ("requestId", request_id),
            ("requestType", REQUEST_TYPE),
        ])
    }

    async fn send_once(&self, body: &CreatePaymentRequest<'_>) -> Result<CreatePaymentResponse, Pay2sError> {
        let resp = self
            .http
            .post(&self.config.endpoint)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<CreatePaymentResponse>().await?)
    }

    /// Transport errors and 5xx are retried with doubling delay; anything else fails fast.
    async fn send_with_retry(&self, body: &CreatePaymentRequest<'_>) -> Result<CreatePaymentResponse, Pay2sError> {
        let attempts = self.config.max_retries.max(1);
        let mut delay = self.config.retry_delay;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.send_once(body).await {
                Ok(resp) => return Ok(resp),
                Err(Pay2sError::Http(e)) if is_retryable(&e) => {
                    warn!(attempt, max = attempts, error = %e, "Pay2S request failed, retrying");
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }

            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(Pay2sError::RetriesExhausted { attempts, last_error })
    }

    pub async fn create_payment(&self, booking: &Booking) -> Result<PaymentLink, Pay2sError> {
        let request_id = format!("{}-{}", booking.code, uuid::Uuid::new_v4().simple());
        let order_info = format!("Thanh toan {}", booking.code);
        let signature = signature::sign(
            &self.config.secret_key,
            &self.create_signature_string(&request_id, booking.total_amount, &booking.code, &order_info),
        )?;

        let body = CreatePaymentRequest {
            access_key: &self.config.access_key,
            partner_code: &self.config.partner_code,
            partner_name: &self.config.partner_name,
            request_id: request_id.clone(),
            amount: booking.total_amount,
            order_id: &booking.code,
            order_info,
            order_type: REQUEST_TYPE,
            bank_accounts: &self.config.bank_accounts,
            redirect_url: &self.config.redirect_url,
            ipn_url: &self.config.ipn_url,
            request_type: REQUEST_TYPE,
            signature,
        };

        let resp = self.send_with_retry(&body).await?;
        if resp.result_code != 0 {
            let message = if resp.message.is_empty() {
                constants::describe(resp.result_code).to_string()
            } else {
                resp.message
            };
            return Err(Pay2sError::Rejected { code: resp.result_code, message });
        }

        let pay_url = resp.pay_url.ok_or_else(|| Pay2sError::Malformed("payUrl missing".to_string()))?;
        info!(booking_code = %booking.code, request_id = %request_id, "Pay2S payment link created");

        Ok(PaymentLink {
            booking_id: booking.id,
            order_id: booking.code.clone(),
            request_id,
            amount: booking.total_amount,
            pay_url,
            qr_code: resp.qr_code,
            expires_at: booking.expires_at,
        })
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        return true;
    }
    err.status().map(|s| s.is_server_error()).unwrap_or(false)
}

#[async_trait]
impl PaymentGateway for Pay2sClient {
    async fn create_payment_link(
        &self,
        booking: &Booking,
    ) -> Result<PaymentLink, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.create_payment(booking).await?)
    }
}
