pub mod paknsave;
pub mod woolworths;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractionError;
use crate::store::StoreKind;

/// Category filter applied to candidate names, case-insensitive.
pub const CATEGORY: &str = "egg";
const MAX_CANDIDATES: usize = 30;
const MIN_NAME_LEN: usize = 5;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\d,]+\.?\d{2}").unwrap());

static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3, h4, a").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3, h4").unwrap());
static FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, article, li").unwrap());

/// Name and price exactly as the tile displayed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawProduct {
    pub name: String,
    pub price_text: String,
}

/// Pull raw (name, price) pairs in the target category out of a rendered
/// listing page. An empty result is a valid outcome; a page with no product
/// tiles at all is an extraction error.
pub fn extract(store: StoreKind, html: &str) -> Result<Vec<RawProduct>, ExtractionError> {
    let document = Html::parse_document(html);

    let tiles = match store {
        StoreKind::Woolworths => find_tiles(&document, &woolworths::CONTAINER_SELECTORS),
        StoreKind::PakNSave => find_tiles(&document, &paknsave::CONTAINER_SELECTORS),
    };
    if tiles.is_empty() {
        return Err(ExtractionError::NoProductContainers { store });
    }

    let read_tile: fn(ElementRef) -> Option<RawProduct> = match store {
        StoreKind::Woolworths => woolworths::read_tile,
        StoreKind::PakNSave => paknsave::read_tile,
    };

    let mut seen = HashSet::new();
    Ok(tiles
        .into_iter()
        .take(MAX_CANDIDATES)
        .filter_map(read_tile)
        .filter(|p| in_category(&p.name))
        .filter(|p| seen.insert(p.clone()))
        .collect())
}

pub fn in_category(name: &str) -> bool {
    name.to_lowercase().contains(CATEGORY)
}

/// First selector with any match wins; otherwise any block whose class
/// mentions products or the category. Only innermost matches count as tiles.
fn find_tiles<'a>(document: &'a Html, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    for sel in selectors {
        let tiles = innermost(document.select(sel).collect());
        if !tiles.is_empty() {
            tracing::debug!("{} product tiles matched", tiles.len());
            return tiles;
        }
    }

    tracing::debug!("no container selector matched, trying class fallback");
    innermost(
        document
            .select(&FALLBACK_SEL)
            .filter(|el| class_contains(*el, &[CATEGORY, "product"]))
            .collect(),
    )
}

/// Drop matches that wrap another match, e.g. a `product-grid` around its
/// `product-entry` tiles.
fn innermost(matches: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = matches.iter().map(|el| el.id()).collect();
    matches
        .into_iter()
        .filter(|el| !el.descendants().skip(1).any(|n| ids.contains(&n.id())))
        .collect()
}

pub(crate) fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors.iter().map(|s| Selector::parse(s).unwrap()).collect()
}

fn class_contains(el: ElementRef, needles: &[&str]) -> bool {
    el.value()
        .attr("class")
        .map(|c| {
            let c = c.to_lowercase();
            needles.iter().any(|n| c.contains(n))
        })
        .unwrap_or(false)
}

/// Text of the element that most likely holds the product name.
pub(crate) fn name_text(tile: ElementRef) -> Option<String> {
    tile.select(&NAME_SEL)
        .find(|el| class_contains(*el, &["title", "name", "heading"]))
        .or_else(|| tile.select(&LINK_SEL).next())
        .or_else(|| tile.select(&HEADING_SEL).next())
        .map(joined_text)
        .filter(|t| !t.is_empty())
}

/// Trimmed, non-empty text nodes in document order.
pub(crate) fn text_lines<'a>(el: ElementRef<'a>) -> Vec<&'a str> {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

pub(crate) fn joined_text(el: ElementRef) -> String {
    text_lines(el).join(" ")
}

pub(crate) fn dollar_prices(text: &str) -> Vec<&str> {
    PRICE_RE.find_iter(text).map(|m| m.as_str()).collect()
}

pub(crate) fn long_enough(name: &str) -> bool {
    name.chars().count() >= MIN_NAME_LEN
}
