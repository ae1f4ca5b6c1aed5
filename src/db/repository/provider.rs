use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::Provider;

/// Look up a stored provider by exact NPI.
pub fn find_provider_by_npi(
    conn: &Connection,
    npi: &str,
) -> Result<Option<Provider>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, npi, created_at
         FROM providers WHERE npi = ?1 LIMIT 1",
    )?;

    let provider = stmt
        .query_row(params![npi], |row| {
            Ok(Provider {
                id: row.get(0)?,
                name: row.get(1)?,
                npi: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(provider)
}

/// Insert a new provider row, returning its id.
pub fn insert_provider(
    conn: &Connection,
    name: &str,
    npi: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO providers (name, npi) VALUES (?1, ?2)",
        params![name, npi],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn find_by_npi_returns_none_when_absent() {
        let conn = open_memory_database().unwrap();
        assert!(find_provider_by_npi(&conn, "0000000000").unwrap().is_none());
    }

    #[test]
    fn insert_then_find_round_trips() {
        let conn = open_memory_database().unwrap();
        let id = insert_provider(&conn, "Dr. Alice", "1234567890").unwrap();

        let found = find_provider_by_npi(&conn, "1234567890").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "Dr. Alice");
        assert_eq!(found.npi, "1234567890");
    }
}
