// 3.0 fees.rs: trade fee math. fee = floor(|sizeDelta| * price * bps / 10_000),
// priced in collateral units at the venue's current asset price. imposing the
// fee (ledger debit, treasury accrual, event) happens in the account engine;
// this module only computes.

use rust_decimal::Decimal;

use crate::types::{Bps, Price, Quote, SignedSize};

/// Fee owed for a trade of `size_delta` at `price` under a bps schedule.
/// Zero size implies no fee.
pub fn trade_fee(size_delta: SignedSize, price: Price, fee_bps: Bps) -> Quote {
    if size_delta.is_zero() {
        return Quote::zero();
    }
    let notional = size_delta.abs() * price.value();
    Quote::new((notional * fee_bps.as_fraction()).floor())
}

/// Notional value of a size delta at a price, in collateral units.
pub fn notional(size_delta: SignedSize, price: Price) -> Decimal {
    size_delta.abs() * price.value()
}
