use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Retail chains the crawler knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
pub enum StoreKind {
    #[serde(rename = "Woolworths")]
    Woolworths,
    #[serde(rename = "Pak'nSave")]
    #[value(name = "paknsave")]
    PakNSave,
}

impl StoreKind {
    /// Crawl order for a full run.
    pub const ALL: [StoreKind; 2] = [StoreKind::Woolworths, StoreKind::PakNSave];

    pub fn display_name(self) -> &'static str {
        match self {
            StoreKind::Woolworths => "Woolworths",
            StoreKind::PakNSave => "Pak'nSave",
        }
    }

    pub fn listing_url(self) -> &'static str {
        match self {
            StoreKind::Woolworths => "https://www.woolworths.co.nz/shop/searchproducts?search=Eggs",
            StoreKind::PakNSave => "https://www.paknsave.co.nz/shop/search?pg=1&q=egg",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.display_name())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreKind::ALL
            .into_iter()
            .find(|k| k.display_name() == s)
            .ok_or_else(|| format!("unknown store: {s}"))
    }
}
