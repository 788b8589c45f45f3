//! SQLite-backed event sink.
//!
//! Events land in a `colour_changes` table with a surrogate key, the colour as
//! text, the local wall-clock time as text and the id of the region that changed.

use crate::core_modules::event_sink::{EventSink, SinkError, TIMESTAMP_FORMAT, TransitionEvent};
use crate::core_modules::region::{RegionId, SignalColor};
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, info};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS colour_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    colour_change TEXT NOT NULL,
    time_changed TEXT NOT NULL,
    bounding_box_id INTEGER NOT NULL
)";

const INSERT_EVENT: &str =
    "INSERT INTO colour_changes (colour_change, time_changed, bounding_box_id) VALUES (?1, ?2, ?3)";

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and makes sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let mut sink = Self { conn };
        sink.ensure_schema()?;
        info!(path = %path.display(), "event store ready");
        Ok(sink)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        let mut sink = Self {
            conn: Connection::open_in_memory()?,
        };
        sink.ensure_schema()?;
        Ok(sink)
    }

    /// Reads every recorded event back in insertion order.
    pub fn recorded(&self) -> Result<Vec<TransitionEvent>, SinkError> {
        let mut statement = self.conn.prepare(
            "SELECT colour_change, time_changed, bounding_box_id FROM colour_changes ORDER BY id",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (label, stamp, region) = row?;
            let color = SignalColor::from_label(&label).ok_or(SinkError::UnknownColor(label))?;
            let changed_at = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
                .map_err(|_| SinkError::BadTimestamp(stamp))?;
            events.push(TransitionEvent {
                color,
                changed_at,
                region_id: RegionId::new(region as u64),
            });
        }
        Ok(events)
    }
}

impl EventSink for SqliteSink {
    fn ensure_schema(&mut self) -> Result<(), SinkError> {
        self.conn.execute(CREATE_TABLE, [])?;
        Ok(())
    }

    fn append(&mut self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.conn.execute(
            INSERT_EVENT,
            params![
                event.color.as_str(),
                event.changed_at.format(TIMESTAMP_FORMAT).to_string(),
                event.region_id.value() as i64,
            ],
        )?;
        debug!(id = self.conn.last_insert_rowid(), "event row inserted");
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        self.conn.close().map_err(|(_, error)| SinkError::Database(error))?;
        info!("event store closed");
        Ok(())
    }
}
