use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use cinestay_core::payment::PaymentNotification;

use crate::constants::{classify, describe};
use crate::signature;
use crate::Pay2sError;

/// Accept a JSON string or number and keep its textual form; the gateway signs
/// the text, so numbers must not be reformatted.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

/// IPN body posted by Pay2S.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpnPayload {
    pub partner_code: String,
    pub access_key: String,
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub extra_data: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub message: String,
    pub order_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_info: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pay_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub request_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub response_time: String,
    #[serde(deserialize_with = "string_or_number")]
    pub result_code: String,
    #[serde(deserialize_with = "string_or_number")]
    pub trans_id: String,
    #[serde(rename = "m2signature", alias = "signature", default)]
    pub signature: String,
}

impl IpnPayload {
    pub fn from_value(raw: &Value) -> Result<Self, Pay2sError> {
        serde_json::from_value(raw.clone()).map_err(|e| Pay2sError::Malformed(e.to_string()))
    }

    /// The exact string the gateway signs, fields in fixed order.
    pub fn canonical_string(&self) -> String {
        signature::canonical(&[
            ("accessKey", self.access_key.as_str()),
            ("amount", self.amount.as_str()),
            ("extraData", self.extra_data.as_str()),
            ("message", self.message.as_str()),
            ("orderId", self.order_id.as_str()),
            ("orderInfo", self.order_info.as_str()),
            ("orderType", self.order_type.as_str()),
            ("partnerCode", self.partner_code.as_str()),
            ("payType", self.pay_type.as_str()),
            ("requestId", self.request_id.as_str()),
            ("responseTime", self.response_time.as_str()),
            ("resultCode", self.result_code.as_str()),
            ("transId", self.trans_id.as_str()),
        ])
    }

    /// Compute and attach the signature (simulators and tests).
    pub fn sign_with(mut self, secret_key: &str) -> Result<Self, Pay2sError> {
        self.signature = signature::sign(secret_key, &self.canonical_string())?;
        Ok(self)
    }

    pub fn into_notification(self, raw: Value) -> Result<PaymentNotification, Pay2sError> {
        let amount: i64 = self
            .amount
            .trim()
            .parse()
            .map_err(|_| Pay2sError::Malformed(format!("amount '{}' is not an integer", self.amount)))?;
        let result_code: i32 = self
            .result_code
            .trim()
            .parse()
            .map_err(|_| Pay2sError::Malformed(format!("resultCode '{}' is not an integer", self.result_code)))?;

        if self.trans_id.trim().is_empty() {
            return Err(Pay2sError::Malformed("transId is empty".to_string()));
        }
        if self.order_id.trim().is_empty() {
            return Err(Pay2sError::Malformed("orderId is empty".to_string()));
        }

        let message = if self.message.is_empty() {
            describe(result_code).to_string()
        } else {
            self.message
        };

        Ok(PaymentNotification {
            transaction_id: self.trans_id,
            order_id: self.order_id,
            amount,
            result: classify(result_code),
            result_code,
            message,
            pay_type: Some(self.pay_type).filter(|p| !p.is_empty()),
            raw,
        })
    }
}

/// Partner credentials used to authenticate inbound notifications.
#[derive(Clone)]
pub struct Pay2sVerifier {
    partner_code: String,
    access_key: String,
    secret_key: String,
}

impl Pay2sVerifier {
    pub fn new(partner_code: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            partner_code: partner_code.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn verify(&self, payload: &IpnPayload) -> Result<(), Pay2sError> {
        if payload.partner_code != self.partner_code {
            return Err(Pay2sError::CredentialMismatch("partnerCode"));
        }
        if payload.access_key != self.access_key {
            return Err(Pay2sError::CredentialMismatch("accessKey"));
        }
        if payload.signature.is_empty() {
            return Err(Pay2sError::InvalidSignature);
        }
        signature::verify(&self.secret_key, &payload.canonical_string(), &payload.signature)
    }
}
