use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::Rejected;
use crate::extract::RawProduct;
use crate::product::ProductRecord;
use crate::store::StoreKind;

// Woolworths tiles fold promo and unit-price text into the title.
static UNIT_PRICE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,]+\.?\d{2}\s*/.*?$").unwrap());
static WAS_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*Was\s*\$[\d,]+\.?\d{2}.*?$").unwrap());
static SAVE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*Save\s*\$[\d,]+\.?\d{2}.*?$").unwrap());
static PRICE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\$[\d,]+\.?\d{2}.*?$").unwrap());

// Pak'nSave appends a pack counter: "Eggs 12pk - 7". Counters can stack.
static PACK_COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*-\s*\d+)+\s*$").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Turn one raw pair into a record, or say why it was dropped.
pub fn normalize(store: StoreKind, raw: &RawProduct) -> Result<ProductRecord, Rejected> {
    let item_name = clean_name(store, &raw.name);
    if item_name.is_empty() {
        return Err(Rejected::EmptyName);
    }

    let price_text = raw.price_text.trim().to_string();
    let price_value = parse_price(&price_text)?;

    Ok(ProductRecord {
        store,
        item_name,
        price_text,
        price_value,
    })
}

pub fn clean_name(store: StoreKind, raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    let cleaned = match store {
        StoreKind::Woolworths => {
            let s = UNIT_PRICE_TAIL_RE.replace(&collapsed, "");
            let s = WAS_TAIL_RE.replace(&s, "");
            let s = SAVE_TAIL_RE.replace(&s, "");
            PRICE_TAIL_RE.replace(&s, "").into_owned()
        }
        StoreKind::PakNSave => PACK_COUNTER_RE.replace(&collapsed, "").into_owned(),
    };
    cleaned.trim().to_string()
}

/// Parse a display price such as `"$8.99"` or `"NZ$1,049.00"`.
pub fn parse_price(text: &str) -> Result<Decimal, Rejected> {
    let unparsable = || Rejected::UnparsablePrice {
        text: text.to_string(),
    };

    let stripped: String = text
        .trim()
        .trim_start_matches("NZ")
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();

    if stripped.is_empty() {
        return Err(unparsable());
    }
    let value = Decimal::from_str(&stripped).map_err(|_| unparsable())?;
    if value.is_sign_negative() {
        return Err(unparsable());
    }
    Ok(value)
}
