use serde::Serialize;

const PLATFORM_FEE_RATE: f64 = 0.075;
const SGST_RATE: f64 = 0.09;
const CGST_RATE: f64 = 0.09;
const ADVANCE_RATE: f64 = 0.30;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Financials {
    pub platform_fee: f64,
    pub tax_total: f64,
    pub total_amount: f64,
}

/// Platform fee is charged on freight plus insurance; taxes apply to the fee only.
pub fn compute_financials(freight: f64, insurance: f64) -> Financials {
    let subtotal = freight.max(0.0) + insurance.max(0.0);
    let platform_fee = subtotal * PLATFORM_FEE_RATE;
    let tax_total = platform_fee * SGST_RATE + platform_fee * CGST_RATE;

    Financials {
        platform_fee,
        tax_total,
        total_amount: subtotal + platform_fee + tax_total,
    }
}

pub fn advance_amount(total: f64) -> f64 {
    total * ADVANCE_RATE
}

pub fn balance_amount(total: f64, advance: f64) -> f64 {
    (total - advance).max(0.0)
}
