use cinestay_core::payment::GatewayResult;

/// `requestType` / `orderType` sent on every create-payment call.
pub const REQUEST_TYPE: &str = "pay2s";

pub const MAX_RETRIES: u32 = 3;
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const RETRY_DELAY_MS: u64 = 1_000;

pub const SUCCESS_CODES: [i32; 2] = [0, 9000];
pub const PENDING_CODES: [i32; 3] = [1000, 7000, 7002];

/// Result codes and their human readable meaning.
pub const RESULT_CODES: &[(i32, &str)] = &[
    (0, "Success"),
    (9000, "Transaction authorized successfully"),
    (1000, "Transaction initiated, waiting for customer payment"),
    (7000, "Transaction is being processed"),
    (7002, "Transaction is being processed by the bank"),
    (10, "System under maintenance"),
    (11, "Access denied"),
    (12, "Unsupported API version"),
    (13, "Merchant authentication failed"),
    (20, "Bad request format"),
    (21, "Invalid transaction amount"),
    (22, "Amount out of allowed range"),
    (40, "Duplicate requestId"),
    (41, "Duplicate orderId"),
    (42, "Invalid or unknown orderId"),
    (43, "Conflicting transaction in progress"),
    (1001, "Insufficient account balance"),
    (1002, "Rejected by the issuing bank"),
    (1003, "Transaction cancelled"),
    (1004, "Amount exceeds payment limit"),
    (1005, "Payment URL or QR code expired"),
    (1006, "Customer declined the payment"),
    (1007, "Account inactive"),
    (99, "Unknown error"),
];

pub fn classify(result_code: i32) -> GatewayResult {
    if SUCCESS_CODES.contains(&result_code) {
        GatewayResult::Success
    } else if PENDING_CODES.contains(&result_code) {
        GatewayResult::Pending
    } else {
        GatewayResult::Failed
    }
}

pub fn describe(result_code: i32) -> &'static str {
    RESULT_CODES
        .iter()
        .find(|(code, _)| *code == result_code)
        .map(|(_, message)| *message)
        .unwrap_or("Unrecognized result code")
}
