//! Agent-level allow/block list persistence.
//!
//! Two pattern forms: exact address (`spammer::evil.com`) and domain
//! wildcard (`*::evil.com`). In-memory set membership for lookups lives in
//! [`crate::policy::spam_filter`]; this module is the SQL-backed source of
//! truth loaded at startup and mutated through the admin surface.

use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct ListEntry {
    pub id: i64,
    pub pattern: String,
    pub reason: Option<String>,
}

pub enum PatternKind {
    Exact(String),
    Domain(String),
}

pub fn classify_pattern(pattern: &str) -> Result<PatternKind, String> {
    let Some((local, domain)) = pattern.split_once("::") else {
        return Err(format!(
            "invalid pattern {pattern:?}: must contain '::' (e.g. 'name::domain' or '*::domain')"
        ));
    };
    if local == "*" {
        Ok(PatternKind::Domain(domain.to_string()))
    } else {
        Ok(PatternKind::Exact(pattern.to_string()))
    }
}

async fn add_pattern(
    pool: &AnyPool,
    table: &str,
    pattern: &str,
    reason: Option<&str>,
) -> Result<(), sqlx::Error> {
    let query = format!("INSERT OR IGNORE INTO {table} (pattern, reason) VALUES (?, ?)");
    sqlx::query(&query)
        .bind(pattern)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

async fn remove_pattern(pool: &AnyPool, table: &str, pattern: &str) -> Result<bool, sqlx::Error> {
    let query = format!("DELETE FROM {table} WHERE pattern = ?");
    let result = sqlx::query(&query).bind(pattern).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

async fn list_patterns(pool: &AnyPool, table: &str) -> Result<Vec<ListEntry>, sqlx::Error> {
    let query = format!("SELECT id, pattern, reason FROM {table} ORDER BY id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|r| ListEntry {
            id: r.get("id"),
            pattern: r.get("pattern"),
            reason: r.get("reason"),
        })
        .collect())
}

pub async fn add_blocked(pool: &AnyPool, pattern: &str, reason: Option<&str>) -> Result<(), sqlx::Error> {
    add_pattern(pool, "blocklist", pattern, reason).await
}

pub async fn remove_blocked(pool: &AnyPool, pattern: &str) -> Result<bool, sqlx::Error> {
    remove_pattern(pool, "blocklist", pattern).await
}

pub async fn list_blocked(pool: &AnyPool) -> Result<Vec<ListEntry>, sqlx::Error> {
    list_patterns(pool, "blocklist").await
}

pub async fn add_allowed(pool: &AnyPool, pattern: &str, reason: Option<&str>) -> Result<(), sqlx::Error> {
    add_pattern(pool, "allowlist", pattern, reason).await
}

pub async fn remove_allowed(pool: &AnyPool, pattern: &str) -> Result<bool, sqlx::Error> {
    remove_pattern(pool, "allowlist", pattern).await
}

pub async fn list_allowed(pool: &AnyPool) -> Result<Vec<ListEntry>, sqlx::Error> {
    list_patterns(pool, "allowlist").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_wildcard_as_domain_pattern() {
        match classify_pattern("*::evil.com").unwrap() {
            PatternKind::Domain(d) => assert_eq!(d, "evil.com"),
            _ => panic!("expected domain pattern"),
        }
    }

    #[test]
    fn classifies_plain_address_as_exact_pattern() {
        match classify_pattern("spammer::evil.com").unwrap() {
            PatternKind::Exact(p) => assert_eq!(p, "spammer::evil.com"),
            _ => panic!("expected exact pattern"),
        }
    }

    #[test]
    fn rejects_pattern_without_separator() {
        assert!(classify_pattern("not-a-pattern").is_err());
    }
}
