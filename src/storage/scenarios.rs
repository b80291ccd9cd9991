//! Scenario entity queries. Feature and step assets are stored as JSON
//! documents in TEXT columns.

use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::{Pool, StorageError};
use crate::run::bundle::Asset;

const UNTITLED: &str = "Untitled Scenario";

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub id: i64,
    pub service_id: i64,
    pub title: String,
    pub features: Vec<Asset>,
    pub steps: Vec<Asset>,
    pub created_at: String,
    pub updated_at: String,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Scenario, String, String)> {
    Ok((
        Scenario {
            id: row.get(0)?,
            service_id: row.get(1)?,
            title: row.get(2)?,
            features: Vec::new(),
            steps: Vec::new(),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        },
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode(raw: (Scenario, String, String)) -> Result<Scenario> {
    let (mut scenario, features_json, steps_json) = raw;
    scenario.features =
        serde_json::from_str(&features_json).context("corrupt features_json column")?;
    scenario.steps = serde_json::from_str(&steps_json).context("corrupt steps_json column")?;
    Ok(scenario)
}

/// Title fallback chain: explicit title, first named feature, "Untitled
/// Scenario" (or the current title on update).
fn resolve_title(title: Option<&str>, features: &[Asset], fallback: &str) -> String {
    if let Some(t) = title {
        if !t.trim().is_empty() {
            return t.trim().to_string();
        }
    }
    if let Some(name) = features.first().and_then(|f| f.name.as_deref()) {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    fallback.to_string()
}

pub fn create(
    pool: &Pool,
    service_id: i64,
    title: Option<&str>,
    features: &[Asset],
    steps: &[Asset],
) -> Result<Scenario> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO scenarios (service_id, title, features_json, steps_json)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            service_id,
            resolve_title(title, features, UNTITLED),
            serde_json::to_string(features)?,
            serde_json::to_string(steps)?,
        ],
    )?;
    let id = conn.last_insert_rowid();
    drop(conn);
    get(pool, service_id, id)
}

/// Scenarios of one service, newest-updated first. This is the service
/// iteration order the run aggregator sees.
pub fn list_by_service(pool: &Pool, service_id: i64) -> Result<Vec<Scenario>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, service_id, title, features_json, steps_json, created_at, updated_at
         FROM scenarios WHERE service_id = ?1
         ORDER BY updated_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([service_id], from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(decode(r?)?);
    }
    Ok(out)
}

pub fn get(pool: &Pool, service_id: i64, id: i64) -> Result<Scenario> {
    let conn = pool.get()?;
    let raw = conn
        .query_row(
            "SELECT id, service_id, title, features_json, steps_json, created_at, updated_at
             FROM scenarios WHERE id = ?1 AND service_id = ?2",
            [id, service_id],
            from_row,
        )
        .optional()?;
    match raw {
        Some(raw) => decode(raw),
        None => Err(StorageError::ScenarioNotFound(id).into()),
    }
}

pub fn update(
    pool: &Pool,
    service_id: i64,
    id: i64,
    title: Option<&str>,
    features: &[Asset],
    steps: &[Asset],
) -> Result<Scenario> {
    let current = get(pool, service_id, id)?;
    let conn = pool.get()?;
    conn.execute(
        "UPDATE scenarios SET title = ?1, features_json = ?2, steps_json = ?3,
                updated_at = datetime('now')
         WHERE id = ?4 AND service_id = ?5",
        rusqlite::params![
            resolve_title(title, features, &current.title),
            serde_json::to_string(features)?,
            serde_json::to_string(steps)?,
            id,
            service_id,
        ],
    )?;
    drop(conn);
    get(pool, service_id, id)
}

pub fn delete(pool: &Pool, service_id: i64, id: i64) -> Result<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "DELETE FROM scenarios WHERE id = ?1 AND service_id = ?2",
        [id, service_id],
    )?;
    if changed == 0 {
        return Err(StorageError::ScenarioNotFound(id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{self, services};

    fn test_pool() -> (tempfile::TempDir, Pool, i64) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        let svc = services::create(&pool, "billing", None).unwrap();
        (dir, pool, svc.id)
    }

    fn asset(name: &str, content: &str) -> Asset {
        Asset::new(Some(name), content)
    }

    #[test]
    fn assets_round_trip_through_json_columns() {
        let (_dir, pool, svc) = test_pool();
        let features = vec![asset("login.feature", "Feature: Login")];
        let steps = vec![asset("steps.js", "Given('x', fn)")];

        let created = create(&pool, svc, Some("Login"), &features, &steps).unwrap();
        let fetched = get(&pool, svc, created.id).unwrap();
        assert_eq!(fetched.features, features);
        assert_eq!(fetched.steps, steps);
    }

    #[test]
    fn title_falls_back_to_first_feature_name() {
        let (_dir, pool, svc) = test_pool();
        let features = vec![asset("checkout.feature", "Feature: Checkout")];

        let untitled = create(&pool, svc, None, &features, &[]).unwrap();
        assert_eq!(untitled.title, "checkout.feature");

        let blank = create(&pool, svc, Some("  "), &[], &[]).unwrap();
        assert_eq!(blank.title, UNTITLED);
    }

    #[test]
    fn update_keeps_title_when_blank() {
        let (_dir, pool, svc) = test_pool();
        let sc = create(&pool, svc, Some("Login"), &[], &[]).unwrap();

        let updated = update(&pool, svc, sc.id, None, &[], &[]).unwrap();
        assert_eq!(updated.title, "Login");
    }

    #[test]
    fn scenario_is_scoped_to_its_service() {
        let (_dir, pool, svc) = test_pool();
        let other = services::create(&pool, "auth", None).unwrap();
        let sc = create(&pool, svc, Some("Login"), &[], &[]).unwrap();

        assert!(get(&pool, other.id, sc.id).is_err());
        assert!(delete(&pool, other.id, sc.id).is_err());
        assert!(get(&pool, svc, sc.id).is_ok());
    }

    #[test]
    fn deleting_a_service_cascades_to_scenarios() {
        let (_dir, pool, svc) = test_pool();
        create(&pool, svc, Some("Login"), &[], &[]).unwrap();

        services::delete(&pool, svc).unwrap();
        assert!(list_by_service(&pool, svc).unwrap().is_empty());
    }
}
