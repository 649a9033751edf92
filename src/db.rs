use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use crate::product::CleanProductRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            id         INTEGER PRIMARY KEY,
            title      TEXT NOT NULL CHECK(length(trim(title)) > 0),
            price      REAL NOT NULL CHECK(price > 0),
            rating     REAL NOT NULL CHECK(rating BETWEEN 0 AND 5),
            colors     INTEGER NOT NULL CHECK(colors > 0),
            size       TEXT NOT NULL CHECK(size IN ('XS','S','M','L','XL','XXL')),
            gender     TEXT NOT NULL CHECK(gender IN ('Men','Women','Unisex')),
            timestamp  TEXT NOT NULL,
            loaded_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_gender ON products(gender);
        ",
    )?;
    Ok(())
}

/// Swap the table contents for `rows` in one transaction, then check the count.
pub fn replace_products(conn: &Connection, rows: &[CleanProductRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM products", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO products (title, price, rating, colors, size, gender, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![
                r.title,
                r.price_idr,
                r.rating,
                r.colors,
                r.size.as_str(),
                r.gender.as_str(),
                r.timestamp,
            ])?;
        }
    }
    tx.commit()?;

    let count: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
    if count != rows.len() {
        bail!(
            "Upload verification failed: expected {} rows, found {}",
            rows.len(),
            count
        );
    }
    Ok(count)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub avg_price: Option<f64>,
    pub avg_rating: Option<f64>,
    pub by_gender: Vec<(String, usize)>,
    pub last_loaded: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (total, avg_price, avg_rating, last_loaded) = conn.query_row(
        "SELECT COUNT(*), AVG(price), AVG(rating), MAX(loaded_at) FROM products",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )?;
    let mut stmt =
        conn.prepare("SELECT gender, COUNT(*) FROM products GROUP BY gender ORDER BY gender")?;
    let by_gender = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats {
        total,
        avg_price,
        avg_rating,
        by_gender,
        last_loaded,
    })
}
