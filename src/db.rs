//! Database module for parlor
//!
//! Provides persistence for rooms and their messages.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Room not found: {0}")]
    RoomNotFound(i64),
    #[error("Message text must be a non-empty string")]
    EmptyText,
}

pub type DbResult<T> = Result<T, DbError>;

/// Messages per page, regardless of what the caller asks for
const MAX_MESSAGE_PAGE: i64 = 100;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    ///
    /// `create_schema` corresponds to the boot-time sync flag; when false the
    /// schema is assumed to already exist.
    pub fn open<P: AsRef<Path>>(path: P, create_schema: bool) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        if create_schema {
            db.run_migrations()?;
        } else {
            // Cascade deletes still need the pragma even when we skip DDL
            db.conn
                .lock()
                .unwrap()
                .execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Room Operations ====================

    /// Create a new room; empty or missing titles get a placeholder
    pub fn create_room(&self, title: Option<&str>) -> DbResult<Room> {
        let title = match title {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_ROOM_TITLE,
        };

        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO rooms (title, meta, createdAt, updatedAt) VALUES (?1, NULL, ?2, ?2)",
            params![title, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Room {
            id,
            title: title.to_string(),
            meta: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get room by ID
    pub fn get_room(&self, id: i64) -> DbResult<Room> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, meta, createdAt, updatedAt FROM rooms WHERE id = ?1",
        )?;

        stmt.query_row(params![id], row_to_room).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::RoomNotFound(id),
            other => DbError::Sqlite(other),
        })
    }

    /// List all rooms, most recently active first
    pub fn list_rooms(&self) -> DbResult<Vec<Room>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, meta, createdAt, updatedAt FROM rooms ORDER BY updatedAt DESC",
        )?;

        let rows = stmt.query_map([], row_to_room)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Rename a room
    ///
    /// The title only changes when a non-empty value is supplied; updatedAt is
    /// refreshed either way.
    pub fn rename_room(&self, id: i64, title: Option<&str>) -> DbResult<Room> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now();

            let updated = match title {
                Some(t) if !t.trim().is_empty() => conn.execute(
                    "UPDATE rooms SET title = ?1, updatedAt = ?2 WHERE id = ?3",
                    params![t, now.to_rfc3339(), id],
                )?,
                _ => conn.execute(
                    "UPDATE rooms SET updatedAt = ?1 WHERE id = ?2",
                    params![now.to_rfc3339(), id],
                )?,
            };

            if updated == 0 {
                return Err(DbError::RoomNotFound(id));
            }
        }

        self.get_room(id)
    }

    /// Delete a room and all its messages
    pub fn delete_room(&self, id: i64) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();

        // Messages are deleted by CASCADE
        let deleted = conn.execute("DELETE FROM rooms WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(DbError::RoomNotFound(id));
        }
        Ok(())
    }

    // ==================== Message Operations ====================

    /// Append a message to a room, touching the room's updatedAt
    pub fn append_message(
        &self,
        room_id: i64,
        role: Role,
        text: &str,
        metadata: Option<&Value>,
    ) -> DbResult<Message> {
        if text.is_empty() {
            return Err(DbError::EmptyText);
        }

        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let room_exists: Option<i64> = conn
            .query_row("SELECT id FROM rooms WHERE id = ?1", params![room_id], |row| {
                row.get(0)
            })
            .optional()?;
        if room_exists.is_none() {
            return Err(DbError::RoomNotFound(room_id));
        }

        let metadata_str = metadata.map(Value::to_string);

        conn.execute(
            "INSERT INTO messages (roomId, role, text, metadata, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![room_id, role.to_string(), text, metadata_str, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        // Room ordering reflects last activity
        conn.execute(
            "UPDATE rooms SET updatedAt = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), room_id],
        )?;

        Ok(Message {
            id,
            room_id,
            role,
            text: text.to_string(),
            metadata: metadata.cloned(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get messages for a room in chronological order
    ///
    /// The limit is clamped to 100. An unknown room yields an empty list; the
    /// store does not validate room existence on read.
    pub fn list_messages(
        &self,
        room_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> DbResult<Vec<Message>> {
        let limit = limit.unwrap_or(MAX_MESSAGE_PAGE).clamp(0, MAX_MESSAGE_PAGE);
        let offset = offset.unwrap_or(0).max(0);

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, roomId, role, text, metadata, createdAt, updatedAt
             FROM messages WHERE roomId = ?1
             ORDER BY createdAt ASC, id ASC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![room_id, limit, offset], row_to_message)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        title: row.get(1)?,
        meta: row
            .get::<_, Option<String>>(2)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        room_id: row.get(1)?,
        role: Role::parse(&row.get::<_, String>(2)?).unwrap_or(Role::User),
        text: row.get(3)?,
        metadata: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_room() {
        let db = Database::open_in_memory().unwrap();

        let room = db.create_room(Some("Trip planning")).unwrap();
        assert_eq!(room.title, "Trip planning");
        assert!(room.meta.is_none());

        let fetched = db.get_room(room.id).unwrap();
        assert_eq!(fetched.id, room.id);
        assert_eq!(fetched.title, "Trip planning");
    }

    #[test]
    fn test_create_room_defaults_title() {
        let db = Database::open_in_memory().unwrap();

        let unnamed = db.create_room(None).unwrap();
        assert_eq!(unnamed.title, DEFAULT_ROOM_TITLE);

        let blank = db.create_room(Some("   ")).unwrap();
        assert_eq!(blank.title, DEFAULT_ROOM_TITLE);
    }

    #[test]
    fn test_get_missing_room() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_room(42), Err(DbError::RoomNotFound(42))));
    }

    #[test]
    fn test_rename_room() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(Some("Old name")).unwrap();

        let renamed = db.rename_room(room.id, Some("New name")).unwrap();
        assert_eq!(renamed.title, "New name");
        assert!(renamed.updated_at >= room.updated_at);

        assert!(matches!(
            db.rename_room(999, Some("Nope")),
            Err(DbError::RoomNotFound(999))
        ));
    }

    #[test]
    fn test_rename_with_empty_title_touches_timestamp_only() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(Some("Keep me")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let renamed = db.rename_room(room.id, Some("")).unwrap();
        assert_eq!(renamed.title, "Keep me");
        assert!(renamed.updated_at > room.updated_at);
    }

    #[test]
    fn test_append_and_list_messages() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(Some("Chat")).unwrap();

        let m1 = db.append_message(room.id, Role::User, "Hi", None).unwrap();
        let m2 = db.append_message(room.id, Role::Ai, "Hello!", None).unwrap();

        let messages = db.list_messages(room.id, None, None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, m1.id);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Hi");
        assert_eq!(messages[1].id, m2.id);
        assert_eq!(messages[1].role, Role::Ai);
    }

    #[test]
    fn test_append_touches_room_updated_at() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(Some("Chat")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        db.append_message(room.id, Role::User, "Hi", None).unwrap();

        let touched = db.get_room(room.id).unwrap();
        assert!(touched.updated_at > room.updated_at);
    }

    #[test]
    fn test_append_validation() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(None).unwrap();

        assert!(matches!(
            db.append_message(room.id, Role::User, "", None),
            Err(DbError::EmptyText)
        ));
        assert!(matches!(
            db.append_message(777, Role::User, "Hi", None),
            Err(DbError::RoomNotFound(777))
        ));
    }

    #[test]
    fn test_message_metadata_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(None).unwrap();

        let meta = serde_json::json!({"source": "import", "tokens": 12});
        db.append_message(room.id, Role::User, "Hi", Some(&meta))
            .unwrap();

        let messages = db.list_messages(room.id, None, None).unwrap();
        assert_eq!(messages[0].metadata, Some(meta));
    }

    #[test]
    fn test_list_messages_limit_and_offset() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(None).unwrap();

        for i in 0..5 {
            db.append_message(room.id, Role::User, &format!("msg {i}"), None)
                .unwrap();
        }

        let page = db.list_messages(room.id, Some(2), Some(1)).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text, "msg 1");
        assert_eq!(page[1].text, "msg 2");

        // Caller-requested limits above the cap are clamped
        let capped = db.list_messages(room.id, Some(10_000), None).unwrap();
        assert_eq!(capped.len(), 5);
    }

    #[test]
    fn test_list_messages_clamps_to_max() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(None).unwrap();

        for i in 0..105 {
            db.append_message(room.id, Role::User, &format!("msg {i}"), None)
                .unwrap();
        }

        let page = db.list_messages(room.id, Some(500), None).unwrap();
        assert_eq!(page.len(), 100);
        // Sorted ascending, ids break createdAt ties from rapid writes
        for pair in page.windows(2) {
            assert!((pair[0].created_at, pair[0].id) < (pair[1].created_at, pair[1].id));
        }
    }

    #[test]
    fn test_list_messages_unknown_room_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let messages = db.list_messages(9999, None, None).unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_delete_room_cascades() {
        let db = Database::open_in_memory().unwrap();
        let room = db.create_room(Some("Doomed")).unwrap();
        for _ in 0..3 {
            db.append_message(room.id, Role::User, "Hi", None).unwrap();
        }

        db.delete_room(room.id).unwrap();

        assert!(matches!(
            db.get_room(room.id),
            Err(DbError::RoomNotFound(_))
        ));
        assert!(db.list_messages(room.id, None, None).unwrap().is_empty());

        assert!(matches!(db.delete_room(room.id), Err(DbError::RoomNotFound(_))));
    }

    #[test]
    fn test_list_rooms_ordered_by_activity() {
        let db = Database::open_in_memory().unwrap();
        let first = db.create_room(Some("First")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let _second = db.create_room(Some("Second")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        db.append_message(first.id, Role::User, "bump", None).unwrap();

        let rooms = db.list_rooms().unwrap();
        assert_eq!(rooms[0].title, "First");
        assert_eq!(rooms[1].title, "Second");
    }
}
