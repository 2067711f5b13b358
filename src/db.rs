use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::SinkError;
use crate::product::{PersistedProduct, ProductKey};
use crate::reconcile::ProductSink;
use crate::store::StoreKind;

const PRODUCT_COLUMNS: &str =
    "key, store, item_name, price, price_text, created_at, last_crawl_at";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            key             TEXT PRIMARY KEY,
            store           TEXT NOT NULL,
            item_name       TEXT NOT NULL,
            price           TEXT NOT NULL,
            price_text      TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            last_crawl_at   TEXT NOT NULL,
            last_written_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_store ON products(store);
        ",
    )?;
    Ok(())
}

// ── Upsert path ──

impl ProductSink for Connection {
    fn read_by_key(&self, key: &ProductKey) -> Result<Option<PersistedProduct>, SinkError> {
        let sql = format!("SELECT {} FROM products WHERE key = ?1", PRODUCT_COLUMNS);
        let product = self
            .query_row(&sql, [key.as_str()], product_from_row)
            .optional()?;
        Ok(product)
    }

    /// `created_at`, `store` and `item_name` are only written on insert.
    fn upsert(&self, p: &PersistedProduct) -> Result<(), SinkError> {
        self.execute(
            "INSERT INTO products (key, store, item_name, price, price_text, created_at, last_crawl_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(key) DO UPDATE SET
                price           = excluded.price,
                price_text      = excluded.price_text,
                last_crawl_at   = excluded.last_crawl_at,
                last_written_at = datetime('now')",
            rusqlite::params![
                p.key.as_str(),
                p.store.display_name(),
                p.item_name,
                p.price.to_string(),
                p.price_text,
                p.created_at,
                p.last_crawl_at,
            ],
        )?;
        Ok(())
    }
}

fn product_from_row(row: &Row) -> rusqlite::Result<PersistedProduct> {
    let store: String = row.get(1)?;
    let price: String = row.get(3)?;
    Ok(PersistedProduct {
        key: ProductKey::from_stored(row.get(0)?),
        store: StoreKind::from_str(&store)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?,
        item_name: row.get(2)?,
        price: Decimal::from_str(&price)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        price_text: row.get(4)?,
        created_at: row.get(5)?,
        last_crawl_at: row.get(6)?,
    })
}

// ── Listing ──

pub fn fetch_products(
    conn: &Connection,
    store: Option<StoreKind>,
    limit: usize,
) -> Result<Vec<PersistedProduct>> {
    let sql = format!(
        "SELECT {} FROM products
         WHERE ?1 IS NULL OR store = ?1
         ORDER BY store, item_name
         LIMIT {}",
        PRODUCT_COLUMNS, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([store.map(StoreKind::display_name)], product_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub per_store: Vec<(String, usize)>,
    pub last_crawl_at: Option<DateTime<Utc>>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
    let last_crawl_at: Option<DateTime<Utc>> =
        conn.query_row("SELECT MAX(last_crawl_at) FROM products", [], |r| r.get(0))?;

    let mut stmt =
        conn.prepare("SELECT store, COUNT(*) FROM products GROUP BY store ORDER BY store")?;
    let per_store = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        total,
        per_store,
        last_crawl_at,
    })
}
