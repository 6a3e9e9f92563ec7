//! Database operations for the `memories` table

use rusqlite::types::Type;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{MemoryContent, MemoryRecord};

fn parse_uuid(idx: usize, raw: String) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_memory(row: &rusqlite::Row) -> Result<MemoryRecord, rusqlite::Error> {
    let content: String = row.get(4)?;
    let content: MemoryContent = serde_json::from_str(&content)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(MemoryRecord {
        id: parse_uuid(0, row.get(0)?)?,
        agent_id: parse_uuid(1, row.get(1)?)?,
        user_id: parse_uuid(2, row.get(2)?)?,
        room_id: parse_uuid(3, row.get(3)?)?,
        content,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// Insert a memory unless one with the same id exists.
    /// Returns true if a new row was written.
    pub fn insert_memory(&self, record: &MemoryRecord) -> Result<bool, rusqlite::Error> {
        let content = serde_json::to_string(&record.content)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO memories (id, agent_id, user_id, room_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.id.to_string(),
                record.agent_id.to_string(),
                record.user_id.to_string(),
                record.room_id.to_string(),
                content,
                record.created_at,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Get a single memory by id.
    pub fn get_memory(&self, id: &Uuid) -> Result<Option<MemoryRecord>, rusqlite::Error> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT id, agent_id, user_id, room_id, content, created_at
             FROM memories WHERE id = ?1",
            rusqlite::params![id.to_string()],
            row_to_memory,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Most recent memories of a room, oldest first.
    pub fn list_room_memories(
        &self,
        room_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, rusqlite::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, user_id, room_id, content, created_at
             FROM memories WHERE room_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![room_id.to_string(), limit as i64],
            row_to_memory,
        )?;
        let mut records: Vec<MemoryRecord> = rows.collect::<Result<_, _>>()?;
        records.reverse();
        Ok(records)
    }

    /// Count total memories in the table.
    pub fn count_memories(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.conn();
        conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
    }
}
