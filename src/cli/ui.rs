use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::{Decimal, RoundingStrategy};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an amount rounded to cents; `None` is an unknown conversion.
pub fn format_amount(value: Option<Decimal>) -> String {
    value.map_or("N/A".to_string(), |v| {
        let cents = v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{cents:.2}")
    })
}

/// Right aligned amount cell, red for outflows and green for inflows.
/// Unknown amounts show as a red "N/A".
pub fn amount_cell(value: Option<Decimal>) -> Cell {
    let cell = Cell::new(format_amount(value)).set_alignment(CellAlignment::Right);
    match value {
        None => cell.fg(Color::Red),
        Some(v) if v.is_sign_negative() && !v.is_zero() => cell.fg(Color::Red),
        Some(v) if v.is_zero() => cell.fg(Color::DarkGrey),
        Some(_) => cell.fg(Color::Green),
    }
}

/// Creates a spinner for work of unknown length.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
