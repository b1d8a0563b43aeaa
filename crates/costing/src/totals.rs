//! Cascading totals: subtotal → profit → tax → total → unit price.
//!
//! Rounding policy (kept for compatibility with historical sheets): every
//! currency stage is rounded half-up to a whole unit before the next stage
//! uses it; unit prices are rounded half-up to two decimals.

use serde::{Deserialize, Serialize};

use printerp_core::ValueObject;

/// Round half-up to a whole currency unit (`2.5 → 3`, `-2.5 → -2`).
pub fn round_currency(amount: f64) -> f64 {
    (amount + 0.5).floor()
}

/// Round half-up to two decimals.
pub fn round_unit_price(amount: f64) -> f64 {
    (amount * 100.0 + 0.5).floor() / 100.0
}

/// Sheet-level inputs of the reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingParameters {
    pub quantity: f64,
    pub profit_margin_percent: f64,
    pub tax_percent: f64,
}

impl Default for PricingParameters {
    fn default() -> Self {
        Self {
            quantity: 0.0,
            profit_margin_percent: 0.0,
            tax_percent: 0.0,
        }
    }
}

/// Derived figures of a variant. Never edited directly.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub sub_total: f64,
    pub profit_amount: f64,
    pub total_after_profit: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub unit_price: f64,
    /// Price per unit before VAT; what quotations and orders receive.
    pub unit_price_ex_vat: f64,
}

impl ValueObject for Totals {}

/// Reduce component contributions and parameters to totals.
///
/// Pure and idempotent; never fails. Callers pass only active rows'
/// contributions (invalid formulas already contribute 0).
pub fn compute_totals<I>(contributions: I, params: &PricingParameters) -> Totals
where
    I: IntoIterator<Item = f64>,
{
    let sub_total = round_currency(contributions.into_iter().sum::<f64>());
    let profit_amount = round_currency(sub_total * params.profit_margin_percent / 100.0);
    let total_after_profit = sub_total + profit_amount;
    let tax_amount = round_currency(total_after_profit * params.tax_percent / 100.0);
    let total = total_after_profit + tax_amount;

    let (unit_price, unit_price_ex_vat) = if params.quantity > 0.0 {
        (
            round_unit_price(total / params.quantity),
            round_unit_price((sub_total + profit_amount) / params.quantity),
        )
    } else {
        (0.0, 0.0)
    };

    Totals {
        sub_total,
        profit_amount,
        total_after_profit,
        tax_amount,
        total,
        unit_price,
        unit_price_ex_vat,
    }
}
