//! Relay-level (domain-only) allow/block list persistence, the federation
//! analogue of [`crate::db::spam`]. Unlike agent patterns, entries here are
//! plain domain strings (e.g. `"evil-relay.com"`), never `name::domain`.

use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct DomainListEntry {
    pub id: i64,
    pub domain: String,
    pub reason: Option<String>,
}

pub async fn add_blocked(pool: &AnyPool, domain: &str, reason: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO relay_blocklist (domain, reason) VALUES (?, ?)")
        .bind(domain)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_blocked(pool: &AnyPool, domain: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM relay_blocklist WHERE domain = ?")
        .bind(domain)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_blocked(pool: &AnyPool) -> Result<Vec<DomainListEntry>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, domain, reason FROM relay_blocklist ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| DomainListEntry {
            id: r.get("id"),
            domain: r.get("domain"),
            reason: r.get("reason"),
        })
        .collect())
}

pub async fn add_allowed(pool: &AnyPool, domain: &str, reason: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO relay_allowlist (domain, reason) VALUES (?, ?)")
        .bind(domain)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_allowed(pool: &AnyPool, domain: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM relay_allowlist WHERE domain = ?")
        .bind(domain)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_allowed(pool: &AnyPool) -> Result<Vec<DomainListEntry>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, domain, reason FROM relay_allowlist ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| DomainListEntry {
            id: r.get("id"),
            domain: r.get("domain"),
            reason: r.get("reason"),
        })
        .collect())
}
