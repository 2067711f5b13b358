use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{compile, dollar_prices, joined_text, long_enough, name_text, RawProduct};

pub static CONTAINER_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        r#"div[class*="product"]"#,
        r#"div[class*="Product"]"#,
        r#"article[class*="product"]"#,
        r#"[data-testid*="product"]"#,
        ".product-tile",
        ".product-item",
        r#"li[class*="product"]"#,
    ])
});

/// Only `$` amounts count; bare numbers on these tiles are pack sizes.
pub fn read_tile(tile: ElementRef) -> Option<RawProduct> {
    let name = name_text(tile).filter(|n| long_enough(n))?;
    let price_text = dollar_prices(&joined_text(tile)).first()?.to_string();
    Some(RawProduct { name, price_text })
}
