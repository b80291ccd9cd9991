//! Service-level step library queries.

use anyhow::Result;
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::{Pool, StorageError};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStep {
    pub id: i64,
    pub service_id: i64,
    pub name: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceStep> {
    Ok(ServiceStep {
        id: row.get(0)?,
        service_id: row.get(1)?,
        name: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn create(pool: &Pool, service_id: i64, name: Option<&str>, content: &str) -> Result<ServiceStep> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO service_steps (service_id, name, content) VALUES (?1, ?2, ?3)",
        rusqlite::params![service_id, name, content],
    )?;
    let id = conn.last_insert_rowid();
    drop(conn);
    get(pool, service_id, id)
}

pub fn list_by_service(pool: &Pool, service_id: i64) -> Result<Vec<ServiceStep>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, service_id, name, content, created_at, updated_at
         FROM service_steps WHERE service_id = ?1
         ORDER BY updated_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([service_id], from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn get(pool: &Pool, service_id: i64, id: i64) -> Result<ServiceStep> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT id, service_id, name, content, created_at, updated_at
         FROM service_steps WHERE id = ?1 AND service_id = ?2",
        [id, service_id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| StorageError::StepNotFound(id).into())
}

pub fn update(
    pool: &Pool,
    service_id: i64,
    id: i64,
    name: Option<&str>,
    content: &str,
) -> Result<ServiceStep> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE service_steps SET name = ?1, content = ?2, updated_at = datetime('now')
         WHERE id = ?3 AND service_id = ?4",
        rusqlite::params![name, content, id, service_id],
    )?;
    if changed == 0 {
        return Err(StorageError::StepNotFound(id).into());
    }
    drop(conn);
    get(pool, service_id, id)
}

pub fn delete(pool: &Pool, service_id: i64, id: i64) -> Result<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "DELETE FROM service_steps WHERE id = ?1 AND service_id = ?2",
        [id, service_id],
    )?;
    if changed == 0 {
        return Err(StorageError::StepNotFound(id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{self, services};

    fn test_pool() -> (tempfile::TempDir, Pool, i64) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        let svc = services::create(&pool, "billing", None).unwrap();
        (dir, pool, svc.id)
    }

    #[test]
    fn step_library_crud() {
        let (_dir, pool, svc) = test_pool();

        let step = create(&pool, svc, Some("common.js"), "Given('x', fn)").unwrap();
        assert_eq!(step.content, "Given('x', fn)");

        let updated = update(&pool, svc, step.id, None, "Given('y', fn)").unwrap();
        assert!(updated.name.is_none());
        assert_eq!(updated.content, "Given('y', fn)");

        assert_eq!(list_by_service(&pool, svc).unwrap().len(), 1);
        delete(&pool, svc, step.id).unwrap();
        assert!(list_by_service(&pool, svc).unwrap().is_empty());
    }

    #[test]
    fn step_is_scoped_to_its_service() {
        let (_dir, pool, svc) = test_pool();
        let other = services::create(&pool, "auth", None).unwrap();
        let step = create(&pool, svc, None, "Given('x', fn)").unwrap();

        assert!(get(&pool, other.id, step.id).is_err());
        assert!(update(&pool, other.id, step.id, None, "nope").is_err());
    }
}
