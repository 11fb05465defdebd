//! SQLite event store implementation.

use crate::{Error, Event, Result, SessionId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use uuid::Uuid;

/// Aggregate view of one session, as listed by [`EventStore::list_sessions`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

/// SQLite-backed event store.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(session_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, session_id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.session_id.to_string(),
                format_timestamp(&event.timestamp),
                event.kind.name(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load all events for a session in insertion order.
    pub fn load_session(&self, session_id: SessionId) -> Result<Vec<Event>> {
        self.load_events(session_id, None)
    }

    /// Load events for a session, optionally keeping only one kind
    /// (`message`, `tool_call`, `tool_result`, ...).
    pub fn load_events(&self, session_id: SessionId, kind: Option<&str>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, timestamp, data FROM events
             WHERE session_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![session_id.to_string(), kind], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, session, timestamp, data) = row?;
            events.push(Event {
                id: parse_uuid(&id)?,
                session_id: SessionId(parse_uuid(&session)?),
                timestamp: parse_timestamp(&timestamp)?,
                kind: serde_json::from_str(&data)?,
            });
        }
        Ok(events)
    }

    /// Summaries of every recorded session, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id,
                    MIN(timestamp),
                    MAX(CASE WHEN kind = 'session_end' THEN timestamp END),
                    SUM(CASE WHEN kind = 'message' THEN 1 ELSE 0 END)
             FROM events
             GROUP BY session_id
             ORDER BY MIN(timestamp) DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, message_count) = row?;
            sessions.push(SessionSummary {
                id: SessionId(parse_uuid(&id)?),
                started_at: parse_timestamp(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
                message_count: usize::try_from(message_count).unwrap_or_default(),
            });
        }
        Ok(sessions)
    }
}

// Fixed-width so lexical order in SQL matches chronological order.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("timestamp {raw:?}: {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| Error::Corrupt(format!("id {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, Role};
    use chrono::Duration;

    fn event_at(session_id: SessionId, kind: EventKind, offset_secs: i64) -> Event {
        let mut event = Event::new(session_id, kind);
        event.timestamp = DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(offset_secs);
        event
    }

    #[test]
    fn events_load_in_append_order() {
        let store = EventStore::in_memory().unwrap();
        let id = SessionId::new();

        store
            .append(&Event::new(id, EventKind::SessionStart { model: "m".into() }))
            .unwrap();
        store.append(&Event::message(id, Role::User, "hi")).unwrap();
        store
            .append(&Event::message(id, Role::Assistant, "hello"))
            .unwrap();

        let events = store.load_session(id).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1].kind,
            EventKind::Message {
                role: Role::User,
                content: "hi".into()
            }
        );
        assert_eq!(events[2].kind.name(), "message");
    }

    #[test]
    fn kind_filter_keeps_matching_events() {
        let store = EventStore::in_memory().unwrap();
        let id = SessionId::new();

        store.append(&Event::message(id, Role::User, "add 1 and 2")).unwrap();
        store
            .append(&Event::new(
                id,
                EventKind::ToolCall {
                    call_id: "c1".into(),
                    name: "add".into(),
                    input: serde_json::json!({"a": 1, "b": 2}),
                },
            ))
            .unwrap();

        let calls = store.load_events(id, Some("tool_call")).unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0].kind, EventKind::ToolCall { name, .. } if name == "add"));
    }

    #[test]
    fn sessions_are_isolated() {
        let store = EventStore::in_memory().unwrap();
        let a = SessionId::new();
        let b = SessionId::new();

        store.append(&Event::message(a, Role::User, "a")).unwrap();
        store.append(&Event::message(b, Role::User, "b")).unwrap();

        assert_eq!(store.load_session(a).unwrap().len(), 1);
        assert_eq!(store.load_session(b).unwrap().len(), 1);
    }

    #[test]
    fn list_sessions_summarizes_most_recent_first() {
        let store = EventStore::in_memory().unwrap();
        let older = SessionId::new();
        let newer = SessionId::new();

        store
            .append(&event_at(older, EventKind::SessionStart { model: "m".into() }, 0))
            .unwrap();
        store
            .append(&event_at(
                older,
                EventKind::Message {
                    role: Role::User,
                    content: "q".into(),
                },
                1,
            ))
            .unwrap();
        store
            .append(&event_at(older, EventKind::SessionEnd, 2))
            .unwrap();
        store
            .append(&event_at(newer, EventKind::SessionStart { model: "m".into() }, 10))
            .unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer);
        assert!(sessions[0].ended_at.is_none());
        assert_eq!(sessions[0].message_count, 0);
        assert_eq!(sessions[1].id, older);
        assert!(sessions[1].ended_at.is_some());
        assert_eq!(sessions[1].message_count, 1);
    }
}
