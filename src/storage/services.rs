//! Service entity queries.

use anyhow::Result;
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::{Pool, StorageError};

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub scenario_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT: &str = "SELECT s.id, s.name, s.description, s.created_at, s.updated_at,
            (SELECT COUNT(*) FROM scenarios sc WHERE sc.service_id = s.id) AS scenario_count
     FROM services s";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        scenario_count: row.get(5)?,
    })
}

pub fn create(pool: &Pool, name: &str, description: Option<&str>) -> Result<Service> {
    let conn = pool.get()?;
    let name = name.trim();

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM services WHERE name = ?1 COLLATE NOCASE)",
        [name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StorageError::DuplicateServiceName.into());
    }

    conn.execute(
        "INSERT INTO services (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description],
    )?;
    get(pool, conn.last_insert_rowid())
}

pub fn list(pool: &Pool) -> Result<Vec<Service>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY s.name ASC"))?;
    let rows = stmt.query_map([], from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn get(pool: &Pool, id: i64) -> Result<Service> {
    let conn = pool.get()?;
    conn.query_row(&format!("{SELECT} WHERE s.id = ?1"), [id], from_row)
        .optional()?
        .ok_or_else(|| StorageError::ServiceNotFound(id).into())
}

pub fn update(pool: &Pool, id: i64, name: &str, description: Option<&str>) -> Result<Service> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE services SET name = ?1, description = ?2, updated_at = datetime('now')
         WHERE id = ?3",
        rusqlite::params![name.trim(), description, id],
    )?;
    if changed == 0 {
        return Err(StorageError::ServiceNotFound(id).into());
    }
    get(pool, id)
}

pub fn delete(pool: &Pool, id: i64) -> Result<()> {
    let conn = pool.get()?;
    let changed = conn.execute("DELETE FROM services WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StorageError::ServiceNotFound(id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn create_list_update_delete() {
        let (_dir, pool) = test_pool();

        let svc = create(&pool, " billing ", Some("invoices")).unwrap();
        assert_eq!(svc.name, "billing");
        assert_eq!(svc.scenario_count, 0);

        create(&pool, "auth", None).unwrap();
        let all = list(&pool).unwrap();
        assert_eq!(all.len(), 2);
        // name-ascending
        assert_eq!(all[0].name, "auth");

        let updated = update(&pool, svc.id, "billing-v2", None).unwrap();
        assert_eq!(updated.name, "billing-v2");
        assert!(updated.description.is_none());

        delete(&pool, svc.id).unwrap();
        assert!(get(&pool, svc.id).is_err());
    }

    #[test]
    fn duplicate_name_is_rejected_case_insensitively() {
        let (_dir, pool) = test_pool();
        create(&pool, "billing", None).unwrap();

        let err = create(&pool, "BILLING", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::DuplicateServiceName)
        ));
    }

    #[test]
    fn missing_service_is_a_typed_error() {
        let (_dir, pool) = test_pool();
        let err = get(&pool, 42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::ServiceNotFound(42))
        ));
    }
}
