use super::cart::CartLine;
use super::money::Money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Pricing parameters applied by [`compute_bill`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillPolicy {
    pub free_delivery_threshold: Money,
    pub delivery_fee: Money,
    /// Fraction of the subtotal, e.g. `0.05` for 5%.
    pub tax_rate: Decimal,
}

impl Default for BillPolicy {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Money::new(dec!(199)),
            delivery_fee: Money::new(dec!(25)),
            tax_rate: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub taxes: Money,
    pub total_amount: Money,
    pub free_delivery_threshold: Money,
    pub amount_to_free_delivery: Money,
}

/// Prices a list of cart lines. Pure: no clock, no I/O.
pub fn compute_bill(items: &[CartLine], policy: &BillPolicy) -> Bill {
    let subtotal: Money = items.iter().map(|line| line.price.times(line.quantity)).sum();
    let threshold = policy.free_delivery_threshold;

    let delivery_fee = if subtotal >= threshold {
        Money::ZERO
    } else {
        policy.delivery_fee
    };
    let taxes = Money::new(subtotal.value() * policy.tax_rate).round_dp(2);
    let amount_to_free_delivery = if subtotal >= threshold {
        Money::ZERO
    } else {
        threshold - subtotal
    };

    Bill {
        subtotal,
        delivery_fee,
        taxes,
        total_amount: subtotal + delivery_fee + taxes,
        free_delivery_threshold: threshold,
        amount_to_free_delivery,
    }
}
