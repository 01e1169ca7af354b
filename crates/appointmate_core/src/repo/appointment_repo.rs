//! Appointment store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist appointments and answer date/client queries.
//! - Run every write as one `BEGIN IMMEDIATE` unit that re-checks overlap
//!   against live rows before committing.
//!
//! # Invariants
//! - No two `active` rows have overlapping `[start_at, end_at)` intervals.
//! - The explicit re-check runs under the write lock; the schema triggers
//!   reject anything that slips past it as an invariant violation.
//! - `duration_minutes`, `client_name` and `client_email` are never updated.
//! - Rows are never deleted; cancellation flips `status`.

use crate::db::migrations::latest_version;
use crate::db::{is_busy_error, DbError};
use crate::model::appointment::{
    client_key, Appointment, AppointmentId, AppointmentStatus, AppointmentValidationError,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage format for instants; fixed width so text order is time order.
/// Appointment starts are whole minutes, so nothing is lost.
pub const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Storage format for `start_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Abort message raised by the schema overlap triggers.
const OVERLAP_GUARD_MESSAGE: &str = "appointment_overlap";

const APPOINTMENT_SELECT_SQL: &str = "SELECT
    uuid,
    client_name,
    client_email,
    start_at,
    duration_minutes,
    status
FROM appointments";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from appointment store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Candidate failed field validation before any SQL ran.
    Validation(AppointmentValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Lock wait exceeded the connection busy timeout.
    StorageTimeout(DbError),
    /// Id does not exist, or is not in a state the operation accepts.
    NotFound(AppointmentId),
    /// Requested interval overlaps an active appointment.
    Conflict {
        requested_start: NaiveDateTime,
        conflicting: AppointmentId,
    },
    /// Overlap reached the schema guard; indicates a transaction bug.
    InvariantViolation(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid appointment.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::StorageTimeout(err) => write!(f, "appointment store timed out: {err}"),
            Self::NotFound(id) => write!(f, "appointment not found: {id}"),
            Self::Conflict {
                requested_start,
                conflicting,
            } => write!(
                f,
                "slot at {requested_start} overlaps appointment {conflicting}"
            ),
            Self::InvariantViolation(details) => {
                write!(f, "appointment overlap invariant violated: {details}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "appointment repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "appointment repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "appointment repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted appointment data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) | Self::StorageTimeout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AppointmentValidationError> for RepoError {
    fn from(value: AppointmentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_busy() {
            Self::StorageTimeout(value)
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy_error(&value) {
            return Self::StorageTimeout(DbError::Sqlite(value));
        }
        if let rusqlite::Error::SqliteFailure(_, Some(message)) = &value {
            if message.contains(OVERLAP_GUARD_MESSAGE) {
                return Self::InvariantViolation(message.clone());
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Appointment store operations.
///
/// Reads may observe slightly stale data; writes are authoritative and
/// re-validate inside their own transaction.
pub trait AppointmentRepository {
    /// Active appointments starting on `date`, ascending by start.
    fn appointments_on(&self, date: NaiveDate) -> RepoResult<Vec<Appointment>>;
    /// Active appointments whose name matches `name` exactly, ignoring case
    /// and surrounding whitespace. Ascending by start.
    fn appointments_for_client(&self, name: &str) -> RepoResult<Vec<Appointment>>;
    /// One appointment by id, including cancelled ones.
    fn get_appointment(&self, id: AppointmentId) -> RepoResult<Option<Appointment>>;
    /// Atomically checks overlap and inserts an active candidate.
    fn insert_appointment(&mut self, candidate: &Appointment) -> RepoResult<Appointment>;
    /// Atomically moves an active appointment, keeping its duration.
    fn move_appointment(
        &mut self,
        id: AppointmentId,
        new_start: NaiveDateTime,
    ) -> RepoResult<Appointment>;
    /// Marks an appointment cancelled. Already-cancelled rows are returned
    /// unchanged.
    fn cancel_appointment(&mut self, id: AppointmentId) -> RepoResult<Appointment>;
}

/// SQLite-backed appointment store.
///
/// One instance wraps one connection; concurrent callers each open their own
/// connection to the same database file.
pub struct SqliteAppointmentRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteAppointmentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_appointment_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AppointmentRepository for SqliteAppointmentRepository<'_> {
    fn appointments_on(&self, date: NaiveDate) -> RepoResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APPOINTMENT_SELECT_SQL}
             WHERE start_date = ?1
               AND status = 'active'
             ORDER BY start_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([date.format(DATE_FORMAT).to_string()])?;
        let mut appointments = Vec::new();
        while let Some(row) = rows.next()? {
            appointments.push(parse_appointment_row(row)?);
        }
        Ok(appointments)
    }

    fn appointments_for_client(&self, name: &str) -> RepoResult<Vec<Appointment>> {
        let key = client_key(name);
        if key.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "{APPOINTMENT_SELECT_SQL}
             WHERE client_key = ?1
               AND status = 'active'
             ORDER BY start_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([key.as_str()])?;
        let mut appointments = Vec::new();
        while let Some(row) = rows.next()? {
            appointments.push(parse_appointment_row(row)?);
        }
        Ok(appointments)
    }

    fn get_appointment(&self, id: AppointmentId) -> RepoResult<Option<Appointment>> {
        load_appointment(self.conn, id)
    }

    fn insert_appointment(&mut self, candidate: &Appointment) -> RepoResult<Appointment> {
        candidate.validate()?;
        if !candidate.is_active() {
            return Err(RepoError::InvalidData(
                "only active appointments can be inserted".to_string(),
            ));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(conflicting) = find_overlap(&tx, candidate.start, candidate.end(), None)? {
            return Err(RepoError::Conflict {
                requested_start: candidate.start,
                conflicting,
            });
        }

        tx.execute(
            "INSERT INTO appointments (
                uuid,
                client_name,
                client_key,
                client_email,
                start_date,
                start_at,
                end_at,
                duration_minutes,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                candidate.id.to_string(),
                candidate.client_name.as_str(),
                candidate.client_key(),
                candidate.client_email.as_deref(),
                candidate.date().format(DATE_FORMAT).to_string(),
                format_instant(candidate.start),
                format_instant(candidate.end()),
                candidate.duration_minutes,
                candidate.status.as_str(),
            ],
        )?;

        let stored = load_appointment(&tx, candidate.id)?.ok_or_else(|| {
            RepoError::InvalidData("inserted appointment missing in read-back".to_string())
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn move_appointment(
        &mut self,
        id: AppointmentId,
        new_start: NaiveDateTime,
    ) -> RepoResult<Appointment> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = match load_appointment(&tx, id)? {
            Some(appointment) if appointment.is_active() => appointment,
            _ => return Err(RepoError::NotFound(id)),
        };

        let moved = Appointment {
            start: new_start,
            ..current
        };
        moved.validate()?;

        if let Some(conflicting) = find_overlap(&tx, moved.start, moved.end(), Some(id))? {
            return Err(RepoError::Conflict {
                requested_start: new_start,
                conflicting,
            });
        }

        let changed = tx.execute(
            "UPDATE appointments
             SET
                start_date = ?2,
                start_at = ?3,
                end_at = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = 'active';",
            params![
                id.to_string(),
                moved.date().format(DATE_FORMAT).to_string(),
                format_instant(moved.start),
                format_instant(moved.end()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        let stored = load_appointment(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData("moved appointment missing in read-back".to_string())
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn cancel_appointment(&mut self, id: AppointmentId) -> RepoResult<Appointment> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_appointment(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        if !current.is_active() {
            return Ok(current);
        }

        tx.execute(
            "UPDATE appointments
             SET
                status = 'cancelled',
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;

        Ok(Appointment {
            status: AppointmentStatus::Cancelled,
            ..current
        })
    }
}

/// Returns one active appointment overlapping `[start, end)`, if any.
fn find_overlap(
    conn: &Connection,
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude: Option<AppointmentId>,
) -> RepoResult<Option<AppointmentId>> {
    let excluded = exclude.map(|id| id.to_string());
    let value: Option<String> = conn
        .query_row(
            "SELECT uuid
             FROM appointments
             WHERE status = 'active'
               AND start_at < ?2
               AND end_at > ?1
               AND (?3 IS NULL OR uuid <> ?3)
             ORDER BY start_at ASC
             LIMIT 1;",
            params![format_instant(start), format_instant(end), excluded],
            |row| row.get(0),
        )
        .optional()?;

    value.as_deref().map(parse_uuid).transpose()
}

fn load_appointment(conn: &Connection, id: AppointmentId) -> RepoResult<Option<Appointment>> {
    let mut stmt = conn.prepare(&format!("{APPOINTMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_appointment_row(row)?));
    }
    Ok(None)
}

fn parse_appointment_row(row: &Row<'_>) -> RepoResult<Appointment> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text)?;

    let start_text: String = row.get("start_at")?;
    let start = NaiveDateTime::parse_from_str(&start_text, INSTANT_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid instant `{start_text}` in appointments.start_at"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = AppointmentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in appointments.status"
        ))
    })?;

    let duration_minutes = match row.get::<_, i64>("duration_minutes")? {
        value if value > 0 && value <= i64::from(u32::MAX) => value as u32,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid duration `{other}` in appointments.duration_minutes"
            )));
        }
    };

    Ok(Appointment {
        id,
        client_name: row.get("client_name")?,
        client_email: row.get("client_email")?,
        start,
        duration_minutes,
        status,
    })
}

fn parse_uuid(value: &str) -> RepoResult<AppointmentId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in appointments.uuid"))
    })
}

fn format_instant(value: NaiveDateTime) -> String {
    value.format(INSTANT_FORMAT).to_string()
}

fn ensure_appointment_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "appointments")? {
        return Err(RepoError::MissingRequiredTable("appointments"));
    }

    for column in [
        "uuid",
        "client_name",
        "client_key",
        "client_email",
        "start_date",
        "start_at",
        "end_at",
        "duration_minutes",
        "status",
    ] {
        if !table_has_column(conn, "appointments", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "appointments",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
