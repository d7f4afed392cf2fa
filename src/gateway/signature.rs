//! Payment callback signatures.
//!
//! The hosted checkout returns `(gateway_order_id, gateway_payment_id,
//! signature)` to the client, which forwards all three for verification. The
//! signature is HMAC-SHA256 over `"<gateway_order_id>|<gateway_payment_id>"`
//! keyed with the merchant secret, hex encoded. The secret never leaves the
//! server, so a client cannot mint a valid signature for an unpaid order.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for an order/payment id pair.
pub fn sign(gateway_order_id: &str, gateway_payment_id: &str, secret: &str) -> String {
    let payload = format!("{}|{}", gateway_order_id, gateway_payment_id);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a presented signature against the expected one without leaking the
/// match position through timing.
pub fn verify(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    presented: &str,
    secret: &str,
) -> bool {
    let expected = sign(gateway_order_id, gateway_payment_id, secret);
    constant_time_eq(&expected, presented)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
