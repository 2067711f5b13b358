use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};

use super::{compile, dollar_prices, joined_text, long_enough, name_text, text_lines, RawProduct, CATEGORY};
use crate::normalize::parse_price;

pub static CONTAINER_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        r#"div[class*="product"]"#,
        r#"div[class*="Product"]"#,
        r#"article[class*="product"]"#,
        r#"[data-testid*="product"]"#,
        ".product-tile",
        ".product-item",
    ])
});

static BARE_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?\d+\.\d{2}").unwrap());

/// Promo badges that sometimes sit in the title slot.
const PROMO_LABELS: &[&str] = &["special", "sale", "new"];

pub fn read_tile(tile: ElementRef) -> Option<RawProduct> {
    let name = name_text(tile)
        .filter(|n| !is_placeholder(n))
        .or_else(|| category_line(tile))
        .filter(|n| long_enough(n))?;

    let price_text = pick_price(&joined_text(tile))?;
    Some(RawProduct { name, price_text })
}

fn is_placeholder(name: &str) -> bool {
    !long_enough(name) || PROMO_LABELS.contains(&name.to_lowercase().as_str())
}

/// First text line mentioning the category that is long enough to be a title.
fn category_line(tile: ElementRef) -> Option<String> {
    text_lines(tile)
        .into_iter()
        .find(|line| line.to_lowercase().contains(CATEGORY) && line.chars().count() > 10)
        .map(str::to_string)
}

/// Tiles show the pack price and a per-egg cup price; the cup price is
/// recorded when one falls in the unit band.
fn pick_price(text: &str) -> Option<String> {
    let prices = dollar_prices(text);
    if let Some(first) = prices.first() {
        let unit = prices.iter().find(|p| in_unit_band(p)).unwrap_or(first);
        return Some(unit.to_string());
    }

    BARE_AMOUNT_RE
        .find(text)
        .map(|m| format!("${}", m.as_str().trim_start_matches('$')))
}

fn in_unit_band(price: &str) -> bool {
    parse_price(price)
        .map(|v| v >= Decimal::new(30, 2) && v <= Decimal::new(200, 2))
        .unwrap_or(false)
}
