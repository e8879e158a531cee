//! Local table store with SQLite
//!
//! Derived tables are written either wholesale (drop, recreate, insert) or
//! incrementally (create if missing, insert). Each write runs in its own
//! transaction; there is no transaction spanning several tables.

use crate::error::{Result, WrdsError};
use crate::query::{quote_identifier, where_clause, Predicate};
use crate::types::{Exchange, FirmYearRecord, Industry, SecurityDayExcess, SecurityMonthEnriched};
use hashbrown::HashSet;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::path::Path;

/// Batch completion records live here
pub const PROGRESS_TABLE: &str = "_batch_progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop and recreate the table
    Overwrite,
    /// Keep existing rows, create the table if missing
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
}

const fn column(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef { name, sql_type }
}

/// Row type that can be persisted in the local store
pub trait Record: Sized {
    fn columns() -> &'static [ColumnDef];

    /// Columns indexed on table creation
    fn key_columns() -> &'static [&'static str] {
        &[]
    }

    /// Values in the order of `columns()`
    fn to_sql_values(&self) -> Vec<SqlValue>;

    /// Decode a row selected with `columns()` in order
    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Table-level operations the pipeline stages depend on
pub trait TableStore {
    /// Write rows, returning the number inserted
    fn write<R: Record>(&mut self, table: &str, rows: &[R], mode: WriteMode) -> Result<usize>;

    /// Typed read with an optional filter
    fn load<R: Record>(&self, table: &str, filter: &[Predicate]) -> Result<Vec<R>>;

    /// Projected raw read; an empty projection selects every column
    fn read_rows(
        &self,
        table: &str,
        filter: &[Predicate],
        columns: &[&str],
    ) -> Result<Vec<Vec<SqlValue>>>;

    fn drop_table(&mut self, table: &str) -> Result<()>;

    fn table_exists(&self, table: &str) -> Result<bool>;

    fn count(&self, table: &str) -> Result<usize>;

    /// User tables, excluding internal bookkeeping
    fn tables(&self) -> Result<Vec<String>>;
}

/// Per-identifier completion records for resumable batches
pub trait ProgressLedger {
    /// Append `rows` to `table` and record `identifier` as completed in a
    /// single transaction. An empty batch only records completion.
    fn append_completed<R: Record>(
        &mut self,
        table: &str,
        identifier: i64,
        rows: &[R],
    ) -> Result<usize>;

    fn completed_ids(&self, table: &str) -> Result<HashSet<i64>>;

    fn clear_progress(&mut self, table: &str) -> Result<()>;
}

/// Single-file SQLite store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| WrdsError::connection("store", path.display().to_string(), e))?;
        let mut store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WrdsError::connection("store", ":memory:", e))?;
        let mut store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&mut self) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        target TEXT NOT NULL,
                        identifier INTEGER NOT NULL,
                        rows INTEGER NOT NULL,
                        completed_at TEXT NOT NULL,
                        PRIMARY KEY (target, identifier)
                    )",
                    PROGRESS_TABLE
                ),
                [],
            )
            .map_err(|e| {
                WrdsError::store(PROGRESS_TABLE, format!("Failed to create table: {}", e))
            })?;
        Ok(())
    }

    fn column_list(columns: &[ColumnDef]) -> Result<String> {
        let names = columns
            .iter()
            .map(|c| quote_identifier(c.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(names.join(", "))
    }

    fn create_sql<R: Record>(table: &str) -> Result<Vec<String>> {
        let quoted = quote_identifier(table)?;
        let definitions = R::columns()
            .iter()
            .map(|c| Ok(format!("{} {}", quote_identifier(c.name)?, c.sql_type.as_str())))
            .collect::<Result<Vec<_>>>()?;
        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted,
            definitions.join(", ")
        )];
        if !R::key_columns().is_empty() {
            let keys = R::key_columns()
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Result<Vec<_>>>()?;
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&format!("idx_{}_key", table))?,
                quoted,
                keys.join(", ")
            ));
        }
        Ok(statements)
    }

    fn begin(&mut self, table: &str) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .map_err(|e| WrdsError::store(table, format!("Failed to begin transaction: {}", e)))
    }

    /// Create `table` if missing and insert `rows` inside `tx`
    fn insert_rows<R: Record>(tx: &Transaction<'_>, table: &str, rows: &[R]) -> Result<()> {
        for statement in Self::create_sql::<R>(table)? {
            tx.execute(&statement, [])
                .map_err(|e| WrdsError::store(table, format!("Failed to create table: {}", e)))?;
        }
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table)?,
            Self::column_list(R::columns())?,
            vec!["?"; R::columns().len()].join(", ")
        );
        let mut stmt = tx
            .prepare(&insert)
            .map_err(|e| WrdsError::store(table, format!("Failed to prepare insert: {}", e)))?;
        for row in rows {
            stmt.execute(params_from_iter(row.to_sql_values()))
                .map_err(|e| WrdsError::store(table, format!("Failed to insert row: {}", e)))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_sql(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| WrdsError::store("sql", e))
    }
}

impl TableStore for SqliteStore {
    fn write<R: Record>(&mut self, table: &str, rows: &[R], mode: WriteMode) -> Result<usize> {
        let tx = self.begin(table)?;
        if mode == WriteMode::Overwrite {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)?), [])
                .map_err(|e| WrdsError::store(table, format!("Failed to drop table: {}", e)))?;
        }
        Self::insert_rows(&tx, table, rows)?;
        tx.commit()
            .map_err(|e| WrdsError::store(table, format!("Failed to commit: {}", e)))?;

        log::debug!("Wrote {} rows to {} ({:?})", rows.len(), table, mode);
        Ok(rows.len())
    }

    fn load<R: Record>(&self, table: &str, filter: &[Predicate]) -> Result<Vec<R>> {
        let mut params = Vec::new();
        let query = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            Self::column_list(R::columns())?,
            quote_identifier(table)?,
            where_clause(filter, &mut params)?
        );

        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| WrdsError::store(table, format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| R::from_sql_row(row))
            .map_err(|e| WrdsError::store(table, format!("Failed to query rows: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| WrdsError::store(table, format!("Failed to collect rows: {}", e)))?;

        Ok(rows)
    }

    fn read_rows(
        &self,
        table: &str,
        filter: &[Predicate],
        columns: &[&str],
    ) -> Result<Vec<Vec<SqlValue>>> {
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };
        let mut params = Vec::new();
        let query = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            projection,
            quote_identifier(table)?,
            where_clause(filter, &mut params)?
        );

        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| WrdsError::store(table, format!("Failed to prepare query: {}", e)))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| WrdsError::store(table, format!("Failed to query rows: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| WrdsError::store(table, format!("Failed to collect rows: {}", e)))?;

        Ok(rows)
    }

    fn drop_table(&mut self, table: &str) -> Result<()> {
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)?), [])
            .map_err(|e| WrdsError::store(table, format!("Failed to drop table: {}", e)))?;
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| WrdsError::store(table, format!("Failed to inspect schema: {}", e)))?;
        Ok(count > 0)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?),
                [],
                |row| row.get(0),
            )
            .map_err(|e| WrdsError::store(table, format!("Failed to count rows: {}", e)))?;
        Ok(count as usize)
    }

    fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| {
                WrdsError::store("sqlite_master", format!("Failed to prepare query: {}", e))
            })?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| {
                WrdsError::store("sqlite_master", format!("Failed to list tables: {}", e))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                WrdsError::store("sqlite_master", format!("Failed to list tables: {}", e))
            })?;

        Ok(names.into_iter().filter(|n| n != PROGRESS_TABLE).collect())
    }
}

impl ProgressLedger for SqliteStore {
    fn append_completed<R: Record>(
        &mut self,
        table: &str,
        identifier: i64,
        rows: &[R],
    ) -> Result<usize> {
        let tx = self.begin(table)?;
        if !rows.is_empty() {
            Self::insert_rows(&tx, table, rows)?;
        }
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (target, identifier, rows, completed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                PROGRESS_TABLE
            ),
            params![
                table,
                identifier,
                rows.len() as i64,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| {
            WrdsError::store(PROGRESS_TABLE, format!("Failed to record progress: {}", e))
        })?;
        tx.commit()
            .map_err(|e| WrdsError::store(table, format!("Failed to commit: {}", e)))?;

        log::debug!("Appended {} rows to {} for identifier {}", rows.len(), table, identifier);
        Ok(rows.len())
    }

    fn completed_ids(&self, table: &str) -> Result<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT identifier FROM {} WHERE target = ?1",
                PROGRESS_TABLE
            ))
            .map_err(|e| {
                WrdsError::store(PROGRESS_TABLE, format!("Failed to prepare query: {}", e))
            })?;
        let ids = stmt
            .query_map(params![table], |row| row.get::<_, i64>(0))
            .map_err(|e| {
                WrdsError::store(PROGRESS_TABLE, format!("Failed to query progress: {}", e))
            })?
            .collect::<std::result::Result<HashSet<_>, _>>()
            .map_err(|e| {
                WrdsError::store(PROGRESS_TABLE, format!("Failed to collect progress: {}", e))
            })?;
        Ok(ids)
    }

    fn clear_progress(&mut self, table: &str) -> Result<()> {
        self.conn
            .execute(
                &format!("DELETE FROM {} WHERE target = ?1", PROGRESS_TABLE),
                params![table],
            )
            .map_err(|e| {
                WrdsError::store(PROGRESS_TABLE, format!("Failed to clear progress: {}", e))
            })?;
        Ok(())
    }
}

fn date_value(date: chrono::NaiveDate) -> SqlValue {
    SqlValue::Text(date.format("%Y-%m-%d").to_string())
}

fn opt_i32(value: Option<i32>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Integer(v as i64))
}

fn opt_f64(value: Option<f64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Real)
}

impl Record for SecurityMonthEnriched {
    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: [ColumnDef; 18] = [
            column("permno", SqlType::Integer),
            column("date", SqlType::Text),
            column("month", SqlType::Text),
            column("ret", SqlType::Real),
            column("shrout", SqlType::Real),
            column("altprc", SqlType::Real),
            column("exchcd", SqlType::Integer),
            column("siccd", SqlType::Integer),
            column("dlret", SqlType::Real),
            column("dlstcd", SqlType::Integer),
            column("ret_adj", SqlType::Real),
            column("ret_excess", SqlType::Real),
            column("mktcap", SqlType::Real),
            column("mktcap_lag", SqlType::Real),
            column("real_mktcap", SqlType::Real),
            column("exchange", SqlType::Text),
            column("industry", SqlType::Text),
            column("gvkey", SqlType::Text),
        ];
        &COLUMNS
    }

    fn key_columns() -> &'static [&'static str] {
        &["permno", "month"]
    }

    fn to_sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.permno),
            date_value(self.date),
            date_value(self.month),
            opt_f64(self.ret),
            opt_f64(self.shrout),
            opt_f64(self.altprc),
            opt_i32(self.exchcd),
            opt_i32(self.siccd),
            opt_f64(self.dlret),
            opt_i32(self.dlstcd),
            opt_f64(self.ret_adj),
            SqlValue::Real(self.ret_excess),
            SqlValue::Real(self.mktcap),
            SqlValue::Real(self.mktcap_lag),
            opt_f64(self.real_mktcap),
            SqlValue::Text(self.exchange.as_str().to_string()),
            SqlValue::Text(self.industry.as_str().to_string()),
            self.gvkey.clone().map_or(SqlValue::Null, SqlValue::Text),
        ]
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SecurityMonthEnriched {
            permno: row.get(0)?,
            date: row.get(1)?,
            month: row.get(2)?,
            ret: row.get(3)?,
            shrout: row.get(4)?,
            altprc: row.get(5)?,
            exchcd: row.get(6)?,
            siccd: row.get(7)?,
            dlret: row.get(8)?,
            dlstcd: row.get(9)?,
            ret_adj: row.get(10)?,
            ret_excess: row.get(11)?,
            mktcap: row.get(12)?,
            mktcap_lag: row.get(13)?,
            real_mktcap: row.get(14)?,
            exchange: Exchange::parse(&row.get::<_, String>(15)?),
            industry: Industry::parse(&row.get::<_, String>(16)?),
            gvkey: row.get(17)?,
        })
    }
}

impl Record for SecurityDayExcess {
    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: [ColumnDef; 4] = [
            column("permno", SqlType::Integer),
            column("date", SqlType::Text),
            column("month", SqlType::Text),
            column("ret_excess", SqlType::Real),
        ];
        &COLUMNS
    }

    fn key_columns() -> &'static [&'static str] {
        &["permno", "date"]
    }

    fn to_sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.permno),
            date_value(self.date),
            date_value(self.month),
            SqlValue::Real(self.ret_excess),
        ]
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SecurityDayExcess {
            permno: row.get(0)?,
            date: row.get(1)?,
            month: row.get(2)?,
            ret_excess: row.get(3)?,
        })
    }
}

impl Record for FirmYearRecord {
    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: [ColumnDef; 22] = [
            column("gvkey", SqlType::Text),
            column("datadate", SqlType::Text),
            column("year", SqlType::Integer),
            column("seq", SqlType::Real),
            column("ceq", SqlType::Real),
            column("at", SqlType::Real),
            column("lt", SqlType::Real),
            column("txditc", SqlType::Real),
            column("txdb", SqlType::Real),
            column("itcb", SqlType::Real),
            column("pstkrv", SqlType::Real),
            column("pstkl", SqlType::Real),
            column("pstk", SqlType::Real),
            column("capx", SqlType::Real),
            column("oancf", SqlType::Real),
            column("sale", SqlType::Real),
            column("cogs", SqlType::Real),
            column("xint", SqlType::Real),
            column("xsga", SqlType::Real),
            column("be", SqlType::Real),
            column("op", SqlType::Real),
            column("inv", SqlType::Real),
        ];
        &COLUMNS
    }

    fn key_columns() -> &'static [&'static str] {
        &["gvkey", "year"]
    }

    fn to_sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.gvkey.clone()),
            date_value(self.datadate),
            SqlValue::Integer(self.year as i64),
            opt_f64(self.seq),
            opt_f64(self.ceq),
            opt_f64(self.at),
            opt_f64(self.lt),
            opt_f64(self.txditc),
            opt_f64(self.txdb),
            opt_f64(self.itcb),
            opt_f64(self.pstkrv),
            opt_f64(self.pstkl),
            opt_f64(self.pstk),
            opt_f64(self.capx),
            opt_f64(self.oancf),
            opt_f64(self.sale),
            opt_f64(self.cogs),
            opt_f64(self.xint),
            opt_f64(self.xsga),
            opt_f64(self.be),
            opt_f64(self.op),
            opt_f64(self.inv),
        ]
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FirmYearRecord {
            gvkey: row.get(0)?,
            datadate: row.get(1)?,
            year: row.get(2)?,
            seq: row.get(3)?,
            ceq: row.get(4)?,
            at: row.get(5)?,
            lt: row.get(6)?,
            txditc: row.get(7)?,
            txdb: row.get(8)?,
            itcb: row.get(9)?,
            pstkrv: row.get(10)?,
            pstkl: row.get(11)?,
            pstk: row.get(12)?,
            capx: row.get(13)?,
            oancf: row.get(14)?,
            sale: row.get(15)?,
            cogs: row.get(16)?,
            xint: row.get(17)?,
            xsga: row.get(18)?,
            be: row.get(19)?,
            op: row.get(20)?,
            inv: row.get(21)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn day(permno: i64, date: NaiveDate, ret_excess: f64) -> SecurityDayExcess {
        SecurityDayExcess {
            permno,
            date,
            month: crate::calendar::month_start(date),
            ret_excess,
        }
    }

    #[test]
    fn test_store_creation() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.tables().unwrap().is_empty());
        assert!(!store.table_exists("crsp_daily").unwrap());
    }

    #[test]
    fn test_overwrite_replaces_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .write("crsp_daily", &[day(1, d(2021, 1, 4), 0.01)], WriteMode::Overwrite)
            .unwrap();
        store
            .write(
                "crsp_daily",
                &[day(2, d(2021, 1, 4), 0.02), day(2, d(2021, 1, 5), -0.01)],
                WriteMode::Overwrite,
            )
            .unwrap();

        let rows: Vec<SecurityDayExcess> = store.load("crsp_daily", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.permno == 2));
        assert_eq!(rows[1].date, d(2021, 1, 5));
    }

    #[test]
    fn test_append_preserves_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .write("crsp_daily", &[day(1, d(2021, 1, 4), 0.01)], WriteMode::Append)
            .unwrap();
        store
            .write("crsp_daily", &[day(2, d(2021, 1, 4), 0.02)], WriteMode::Append)
            .unwrap();
        assert_eq!(store.count("crsp_daily").unwrap(), 2);
        assert_eq!(store.tables().unwrap(), vec!["crsp_daily".to_string()]);
    }

    #[test]
    fn test_filtered_and_projected_reads() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .write(
                "crsp_daily",
                &[
                    day(1, d(2021, 1, 4), 0.01),
                    day(1, d(2021, 2, 1), 0.03),
                    day(2, d(2021, 1, 4), 0.02),
                ],
                WriteMode::Overwrite,
            )
            .unwrap();

        let filter = [
            Predicate::eq("permno", 1i64),
            Predicate::between("date", d(2021, 1, 1), d(2021, 1, 31)),
        ];
        let rows: Vec<SecurityDayExcess> = store.load("crsp_daily", &filter).unwrap();
        assert_eq!(rows, vec![day(1, d(2021, 1, 4), 0.01)]);

        let raw = store
            .read_rows("crsp_daily", &[Predicate::eq("permno", 2i64)], &["ret_excess"])
            .unwrap();
        assert_eq!(raw, vec![vec![SqlValue::Real(0.02)]]);
    }

    #[test]
    fn test_firm_years_keep_missing_items() {
        let mut store = SqliteStore::in_memory().unwrap();
        let record = FirmYearRecord {
            gvkey: "001690".to_string(),
            datadate: d(2020, 9, 30),
            year: 2020,
            seq: Some(65339.0),
            be: Some(65339.0),
            ..Default::default()
        };
        store
            .write("compustat", &[record.clone()], WriteMode::Overwrite)
            .unwrap();
        let rows: Vec<FirmYearRecord> = store.load("compustat", &[]).unwrap();
        assert_eq!(rows, vec![record]);
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        let mut store = SqliteStore::in_memory().unwrap();
        let err = store
            .write("daily; DROP TABLE x", &[day(1, d(2021, 1, 4), 0.01)], WriteMode::Append)
            .unwrap_err();
        assert!(matches!(err, WrdsError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_progress_ledger() {
        let mut store = SqliteStore::in_memory().unwrap();
        let rows = vec![day(10001, d(2021, 1, 4), 0.01), day(10001, d(2021, 1, 5), 0.02)];
        assert_eq!(store.append_completed("crsp_daily", 10001, &rows).unwrap(), 2);
        store
            .append_completed::<SecurityDayExcess>("crsp_daily", 10002, &[])
            .unwrap();
        store
            .append_completed::<SecurityDayExcess>("other", 10003, &[])
            .unwrap();

        let done = store.completed_ids("crsp_daily").unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.contains(&10002));
        assert_eq!(store.count("crsp_daily").unwrap(), 2);
        assert!(!store.table_exists("other").unwrap());

        store.clear_progress("crsp_daily").unwrap();
        assert!(store.completed_ids("crsp_daily").unwrap().is_empty());
        assert_eq!(store.completed_ids("other").unwrap().len(), 1);
        assert_eq!(store.tables().unwrap(), vec!["crsp_daily".to_string()]);
    }

    #[test]
    fn test_failed_progress_record_rolls_back_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .execute_sql(&format!(
                "CREATE TRIGGER fail_progress BEFORE INSERT ON {} \
                 BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
                PROGRESS_TABLE
            ))
            .unwrap();

        let rows = vec![day(10001, d(2021, 1, 4), 0.01)];
        let err = store.append_completed("crsp_daily", 10001, &rows).unwrap_err();
        assert!(err.is_fatal());
        assert!(!store.table_exists("crsp_daily").unwrap());
        assert!(store.completed_ids("crsp_daily").unwrap().is_empty());

        store.execute_sql("DROP TRIGGER fail_progress").unwrap();
        store.append_completed("crsp_daily", 10001, &rows).unwrap();
        assert_eq!(store.count("crsp_daily").unwrap(), 1);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidy_finance.sqlite");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .write("crsp_daily", &[day(1, d(2021, 1, 4), 0.01)], WriteMode::Overwrite)
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count("crsp_daily").unwrap(), 1);
    }
}
