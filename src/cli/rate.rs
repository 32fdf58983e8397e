use super::ui;
use crate::core::currency::CurrencyCode;
use crate::core::service::RateService;
use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn render_rate(
    from: &CurrencyCode,
    to: &CurrencyCode,
    date: NaiveDate,
    effective: Option<NaiveDate>,
    rate: Decimal,
) -> String {
    let mut output = format!(
        "1 {} = {} {} on {}",
        ui::style_text(from.as_str(), ui::StyleType::TotalLabel),
        ui::style_text(&rate.round_dp(6).normalize().to_string(), ui::StyleType::TotalValue),
        ui::style_text(to.as_str(), ui::StyleType::TotalLabel),
        date
    );
    if let Some(effective) = effective.filter(|d| *d != date && from != to) {
        output.push_str(&ui::style_text(
            &format!(" (nearest available rates: {effective})"),
            ui::StyleType::Subtle,
        ));
    }
    output
}

pub fn run(
    service: &RateService,
    from: &CurrencyCode,
    to: &CurrencyCode,
    date: NaiveDate,
) -> Result<()> {
    let table = service.snapshot();
    for code in [from, to] {
        if !table.supports(code) {
            bail!("No exchange rates for {code}");
        }
    }

    let rate = table
        .resolve(from, to, date)
        .ok_or_else(|| anyhow!("Rate from {from} to {to} is unavailable"))?;
    println!(
        "{}",
        render_rate(from, to, date, table.nearest_date(date), rate)
    );
    Ok(())
}
