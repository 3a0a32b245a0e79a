use rust_decimal::{Decimal, RoundingStrategy};

use crate::record::Record;

/// Round to 2 decimal places, half away from zero. Every derived sum in the
/// report uses this rounding.
pub fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Coerce a raw OCR/cell string to a decimal. Keeps digits and separators,
/// treats comma as the decimal point, and maps anything unparseable to zero
/// rather than failing — the report is expected to show zeros for garbage.
pub fn safe_decimal(value: &str) -> Decimal {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    cleaned.parse().unwrap_or(Decimal::ZERO)
}

/// Derive the financial chain for a freshly extracted record:
/// weight kg → tons (exact /1000), then the half-up chain
/// usd = weight × price, local = usd × rate, vat = local × pct/100.
pub fn compute_totals(record: &mut Record, rate: Decimal, vat_percent: Decimal) {
    let tons = safe_decimal(&record.weight_raw) / Decimal::from(1000);
    let price = safe_decimal(record.price_raw.as_deref().unwrap_or(""));
    fill_chain(record, tons, price, rate, vat_percent);
}

/// Recompute after a force-link. A weight that already went through
/// `compute_totals` is in tons; a value ≤ 500 is taken as already scaled and
/// is not divided again.
pub fn recompute_after_link(record: &mut Record, rate: Decimal, vat_percent: Decimal) {
    let tons = match record.weight_tons {
        Some(t) if t <= Decimal::from(500) => t,
        Some(t) => t / Decimal::from(1000),
        None => safe_decimal(&record.weight_raw) / Decimal::from(1000),
    };
    let price = safe_decimal(record.price_raw.as_deref().unwrap_or(""));
    fill_chain(record, tons, price, rate, vat_percent);
}

fn fill_chain(record: &mut Record, tons: Decimal, price: Decimal, rate: Decimal, vat_percent: Decimal) {
    let usd = round2(tons * price);
    let local = round2(usd * rate);
    let vat = round2(local * vat_percent / Decimal::from(100));

    record.weight_tons = Some(tons);
    record.unit_price = Some(price);
    record.usd_sum = Some(usd);
    record.exchange_rate = rate;
    record.local_sum = Some(local);
    record.vat_amount = Some(vat);
}
