//! Fixed-point money handling for the catalog.
//!
//! Amounts travel through the API as [`Decimal`] with two decimal places and are stored as
//! integers: prices in cents, discounts in hundredths of a percent.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::services::{ServiceError, ServiceResult};

pub const MONEY_SCALE: u32 = 2;

/// 99 999 999.99
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

/// 100.00 %
pub const MAX_DISCOUNT_HUNDREDTHS: i32 = 10_000;

/// Price after the discount percentage is applied, rounded half-to-even to cents.
pub fn final_price(price: Decimal, discount: Decimal) -> Decimal {
    if discount > Decimal::ZERO {
        (price - price * discount / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
    } else {
        price
    }
}

pub fn final_price_cents(price_cents: i64, discount_hundredths: i32) -> i64 {
    let price = from_cents(price_cents);
    let discount = from_hundredths(discount_hundredths);
    minor_units(final_price(price, discount))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, MONEY_SCALE)
}

pub fn from_hundredths(hundredths: i32) -> Decimal {
    Decimal::new(i64::from(hundredths), MONEY_SCALE)
}

/// Validates a client supplied price and converts it to cents.
pub fn price_to_cents(field: &str, price: Decimal) -> ServiceResult<i64> {
    if price < Decimal::ZERO {
        return Err(ServiceError::validation(field, "must not be negative"));
    }
    if price > from_cents(MAX_PRICE_CENTS) {
        return Err(ServiceError::validation(
            field,
            format!("must not exceed {}", from_cents(MAX_PRICE_CENTS)),
        ));
    }
    ensure_scale(field, price)?;
    Ok(minor_units(price))
}

/// Validates a client supplied discount percentage and converts it to hundredths.
pub fn discount_to_hundredths(discount: Decimal) -> ServiceResult<i32> {
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(ServiceError::validation(
            "discount",
            "must be between 0 and 100",
        ));
    }
    ensure_scale("discount", discount)?;
    // Bounded by MAX_DISCOUNT_HUNDREDTHS above.
    Ok(minor_units(discount) as i32)
}

fn ensure_scale(field: &str, value: Decimal) -> ServiceResult<()> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ServiceError::validation(
            field,
            format!("must have at most {MONEY_SCALE} decimal places"),
        ));
    }
    Ok(())
}

// Callers only pass values already bounded by MAX_PRICE_CENTS.
fn minor_units(value: Decimal) -> i64 {
    let mut value = value;
    value.rescale(MONEY_SCALE);
    value.mantissa() as i64
}
