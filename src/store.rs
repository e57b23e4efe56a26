//! Per-category SQLite tables and their de-duplicated CSV export

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::types::ListingRecord;

/// Table names are interpolated into SQL, so only plain identifiers pass
fn check_table_name(table: &str) -> Result<()> {
    let valid = table
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("Invalid table name: '{}'", table);
    }
    Ok(())
}

/// Drop exact duplicates across all four fields, keeping first occurrences in order
pub fn dedup_records(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Write records as CSV with the table's column names as header
pub fn write_export(records: &[ListingRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create export: {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write export: {}", path.display()))?;
    Ok(())
}

/// Connection to one category's database file
pub struct CategoryStore {
    conn: Connection,
}

impl CategoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store: {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create the four-column table if it does not exist yet
    pub fn ensure_schema(&self, table: &str) -> Result<()> {
        check_table_name(table)?;
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (type_item TEXT, price TEXT, address TEXT, image_link TEXT)",
            table
        ))?;
        Ok(())
    }

    /// Start the batch for one page; nothing is visible until `commit_batch`
    pub fn batch(&mut self) -> Result<PageBatch<'_>> {
        Ok(PageBatch {
            tx: self.conn.transaction()?,
            appended: 0,
        })
    }

    /// Every row in insert order, duplicates included
    pub fn read_all(&self, table: &str) -> Result<Vec<ListingRecord>> {
        check_table_name(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT type_item, price, address, image_link FROM {} ORDER BY rowid",
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(ListingRecord {
                item_description: row.get(0)?,
                price: row.get(1)?,
                address: row.get(2)?,
                image_url: row.get(3)?,
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        check_table_name(table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// De-duplicate the whole table, write it to `file` and hand it back.
    ///
    /// An empty table writes nothing, leaving "no data yet" for readers.
    pub fn export(&self, table: &str, file: &Path) -> Result<Vec<ListingRecord>> {
        let all = self.read_all(table)?;
        let total = all.len();
        let records = dedup_records(all);

        if records.is_empty() {
            info!(table, "table is empty, export skipped");
            return Ok(records);
        }

        write_export(&records, file)?;
        info!(
            table,
            rows = records.len(),
            duplicates = total - records.len(),
            file = %file.display(),
            "exported"
        );
        Ok(records)
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("Failed to close store")
    }
}

/// Inserts for one page, committed together
pub struct PageBatch<'a> {
    tx: Transaction<'a>,
    appended: usize,
}

impl PageBatch<'_> {
    /// Insert one record; duplicates are accepted
    pub fn append(&mut self, table: &str, record: &ListingRecord) -> Result<()> {
        check_table_name(table)?;
        let mut stmt = self
            .tx
            .prepare_cached(&format!("INSERT INTO {} VALUES (?1, ?2, ?3, ?4)", table))?;
        stmt.execute((
            &record.item_description,
            &record.price,
            &record.address,
            &record.image_url,
        ))?;
        self.appended += 1;
        Ok(())
    }

    /// Commit the page; returns how many rows it added
    pub fn commit_batch(self) -> Result<usize> {
        let appended = self.appended;
        self.tx.commit()?;
        debug!(appended, "page committed");
        Ok(appended)
    }
}
