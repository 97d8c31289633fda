//! SQLite record sink
//!
//! Rows are inserted through a cached prepared statement and committed in
//! transactions of `batch_size` rows.

use crate::output::schema::initialize_schema;
use crate::output::traits::{RecordSink, SinkError, SinkResult};
use crate::record::LinkRecord;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

const INSERT_LINK_SQL: &str = "INSERT INTO links \
    (date, source_host, secure, source, link, fragment, tag, extras, data_origin) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// Sink writing link records to a SQLite database
pub struct SqliteSink {
    conn: Connection,
    batch_size: usize,
    pending: usize,
    in_transaction: bool,
    finalized: bool,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `batch_size` - Rows per committed transaction
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Database opened and schema initialized
    /// * `Err(SinkError)` - Failed to open the database
    pub fn open(path: &Path, batch_size: usize) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        Self::with_connection(conn, batch_size)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(batch_size: usize) -> SinkResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, batch_size)
    }

    fn with_connection(conn: Connection, batch_size: usize) -> SinkResult<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            batch_size: batch_size.max(1),
            pending: 0,
            in_transaction: false,
            finalized: false,
        })
    }

    fn commit(&mut self) -> SinkResult<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            debug!("Committed batch of {} rows", self.pending);
            self.in_transaction = false;
            self.pending = 0;
        }
        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn write(&mut self, record: &LinkRecord) -> SinkResult<()> {
        if self.finalized {
            return Err(SinkError::Closed);
        }

        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }

        let mut stmt = self.conn.prepare_cached(INSERT_LINK_SQL)?;
        stmt.execute(params![
            record.date,
            record.source_host,
            record.secure,
            record.source,
            record.link,
            record.fragment,
            record.tag,
            record.extras,
            record.data_origin,
        ])?;
        drop(stmt);

        self.pending += 1;

        if self.pending >= self.batch_size {
            self.commit()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> SinkResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.commit()
    }
}
