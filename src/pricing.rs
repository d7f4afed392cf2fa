//! Trade pricing policy for the storefront.
//!
//! All arithmetic is on minor currency units (paise for INR). Percentages
//! round half-up the way the storefront has always displayed them, so the
//! figures computed here are the figures a buyer saw at checkout. The server
//! recomputes everything from catalog prices and rejects drafts that do not
//! match, making this module the single source of the totals equation:
//!
//! `total = subtotal + discount + tax + shipping`, with `discount <= 0`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::order::ShippingMethod;

/// Trade discount applied to every B2B order, percent of subtotal.
pub const TRADE_DISCOUNT_PERCENT: i64 = 10;

/// GST rate applied on the undiscounted subtotal, percent.
pub const TAX_PERCENT: i64 = 18;

/// Order totals in minor units. `discount` is negative or zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Totals {
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
}

impl Totals {
    /// True when the additive equation holds and the discount does not
    /// increase the total.
    pub fn is_consistent(&self) -> bool {
        self.discount <= 0
            && self.tax >= 0
            && self.shipping >= 0
            && self.subtotal >= 0
            && self.total == self.subtotal + self.discount + self.tax + self.shipping
    }
}

/// Percent of a non-negative amount, rounded half-up in minor units.
fn percent_of(amount: i64, percent: i64) -> i64 {
    (amount * percent + 50) / 100
}

/// Shipping charge for the chosen method. Trade orders currently ship free
/// on either service level.
pub fn shipping_charge(method: ShippingMethod) -> i64 {
    match method {
        ShippingMethod::Standard => 0,
        ShippingMethod::Express => 0,
    }
}

/// Price an order from its line subtotal and shipping method.
pub fn price_order(subtotal: i64, method: ShippingMethod) -> Totals {
    let discount = -percent_of(subtotal, TRADE_DISCOUNT_PERCENT);
    let tax = percent_of(subtotal, TAX_PERCENT);
    let shipping = shipping_charge(method);
    Totals {
        subtotal,
        discount,
        tax,
        shipping,
        total: subtotal + discount + tax + shipping,
    }
}
