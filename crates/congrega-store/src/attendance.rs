//! Attendance types, QR codes, and attendance records.
//!
//! QR lookups join the attendance type and its ordered, active field schema
//! into one [`AttendanceQr`] aggregate, cached briefly in a `moka` hot
//! cache (every member scanning the same session hits the same code within
//! seconds). Record creation relies on the partial unique indexes to catch
//! duplicate-registration races: the violation maps to
//! [`StoreError::DuplicateRecord`], never to a crash.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use moka::future::Cache;
use rusqlite::OptionalExtension;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use congrega_core::{FieldDef, FieldKind, FieldOption};

use crate::db::Database;
use crate::error::{StoreError, StoreResult, is_unique_violation};

/// How long a QR aggregate may be served from cache. An operator flipping
/// `active` off waits at most this long to take effect.
const QR_CACHE_TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A QR code joined with its attendance type and field schema.
#[derive(Debug, Clone)]
pub struct AttendanceQr {
    pub id: String,
    /// Canonical uppercase code.
    pub code: String,
    pub type_id: String,
    pub type_name: String,
    /// Presence-only types skip the form entirely.
    pub solo_presencia: bool,
    /// Daily validity window, "HH:MM" wall-clock.
    pub hora_inicio: String,
    pub hora_fin: String,
    pub active: bool,
    /// Active fields ordered by position. Empty for presence-only types.
    pub fields: Vec<FieldDef>,
}

/// Who an attendance record belongs to. Preference order: resolved user id,
/// else phone, else free-text name. The unique indexes mirror this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIdentity {
    User(String),
    Phone(String),
    Name(String),
}

/// Confirmation status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Self-registration awaiting a leader's confirmation.
    PendienteConfirmacion,
    /// Confirmed, either manually registered or reviewed.
    Confirmado,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendienteConfirmacion => "pendiente_confirmacion",
            Self::Confirmado => "confirmado",
        }
    }
}

/// How a record entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMethod {
    /// Self-service via QR code through the bot.
    QrBot,
    /// Registered by a leader on someone's behalf.
    Manual,
}

impl RegistrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QrBot => "qr_bot",
            Self::Manual => "manual",
        }
    }
}

/// Input for creating an attendance record.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub type_id: String,
    /// ISO week start, "YYYY-MM-DD".
    pub week_start: String,
    pub identity: RecordIdentity,
    pub status: RecordStatus,
    pub method: RegistrationMethod,
    pub form_data: Value,
    /// Phone of the leader who performed a manual registration.
    pub registered_by: Option<String>,
}

/// A persisted attendance record.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: String,
    pub type_id: String,
    pub week_start: String,
    pub identity: RecordIdentity,
    pub status: RecordStatus,
    pub method: RegistrationMethod,
    pub created_at: i64,
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Monday of the current ISO week, formatted for the `week_start` column.
pub fn current_week_start() -> String {
    week_start(Utc::now().date_naive()).format("%Y-%m-%d").to_string()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Store for QR lookups and attendance records.
#[derive(Clone)]
pub struct AttendanceStore {
    db: Database,
    qr_cache: Cache<String, Arc<AttendanceQr>>,
}

impl AttendanceStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            qr_cache: Cache::builder()
                .max_capacity(256)
                .time_to_live(QR_CACHE_TTL)
                .build(),
        }
    }

    /// Look up a QR code (canonical uppercase) with its type and ordered
    /// field schema. Hits the cache first; misses query SQLite.
    #[instrument(skip(self))]
    pub async fn find_qr(&self, code: &str) -> StoreResult<Option<Arc<AttendanceQr>>> {
        if let Some(hit) = self.qr_cache.get(code).await {
            return Ok(Some(hit));
        }

        let lookup = code.to_string();
        let qr = self
            .db
            .execute(move |conn| fetch_qr(conn, &lookup))
            .await?;

        match qr {
            Some(qr) => {
                let qr = Arc::new(qr);
                self.qr_cache.insert(code.to_string(), Arc::clone(&qr)).await;
                Ok(Some(qr))
            }
            None => Ok(None),
        }
    }

    /// Whether a record already exists for (identity, week, type).
    pub async fn find_record(
        &self,
        identity: &RecordIdentity,
        week_start: &str,
        type_id: &str,
    ) -> StoreResult<Option<String>> {
        let identity = identity.clone();
        let week_start = week_start.to_string();
        let type_id = type_id.to_string();

        self.db
            .execute(move |conn| {
                let (column, key) = identity_column(&identity);
                let sql = format!(
                    "SELECT id FROM attendance_records
                     WHERE {column} = ?1 AND week_start = ?2 AND type_id = ?3"
                );
                let id = conn
                    .query_row(&sql, rusqlite::params![key, week_start, type_id], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?;
                Ok(id)
            })
            .await
    }

    /// Create an attendance record.
    ///
    /// A unique-index violation (the proactive duplicate check raced
    /// another delivery) comes back as [`StoreError::DuplicateRecord`].
    #[instrument(skip(self, record))]
    pub async fn create_record(
        &self,
        record: NewAttendanceRecord,
    ) -> StoreResult<AttendanceRecord> {
        self.db
            .execute(move |conn| {
                let id = Uuid::now_v7().to_string();
                let now = Utc::now().timestamp();

                let (user_id, phone, name) = match &record.identity {
                    RecordIdentity::User(v) => (Some(v.clone()), None, None),
                    RecordIdentity::Phone(v) => (None, Some(v.clone()), None),
                    RecordIdentity::Name(v) => (None, None, Some(v.clone())),
                };

                conn.execute(
                    "INSERT INTO attendance_records
                        (id, type_id, week_start, user_id, phone, name,
                         status, method, form_data, registered_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        id,
                        record.type_id,
                        record.week_start,
                        user_id,
                        phone,
                        name,
                        record.status.as_str(),
                        record.method.as_str(),
                        serde_json::to_string(&record.form_data)?,
                        record.registered_by,
                        now,
                    ],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::DuplicateRecord(format!(
                            "attendance for week {} already exists",
                            record.week_start
                        ))
                    } else {
                        e.into()
                    }
                })?;

                debug!(id = %id, method = record.method.as_str(), "attendance record created");
                Ok(AttendanceRecord {
                    id,
                    type_id: record.type_id,
                    week_start: record.week_start,
                    identity: record.identity,
                    status: record.status,
                    method: record.method,
                    created_at: now,
                })
            })
            .await
    }
}

/// Which identity column a [`RecordIdentity`] keys on.
fn identity_column(identity: &RecordIdentity) -> (&'static str, &str) {
    match identity {
        RecordIdentity::User(v) => ("user_id", v),
        RecordIdentity::Phone(v) => ("phone", v),
        RecordIdentity::Name(v) => ("name", v),
    }
}

/// Join a QR row with its type and active, ordered fields.
fn fetch_qr(conn: &rusqlite::Connection, code: &str) -> StoreResult<Option<AttendanceQr>> {
    let row = conn
        .query_row(
            "SELECT q.id, q.code, q.type_id, t.name, t.solo_presencia,
                    q.hora_inicio, q.hora_fin, q.active
             FROM qr_codes q JOIN attendance_types t ON t.id = q.type_id
             WHERE q.code = ?1 AND t.active = 1",
            rusqlite::params![code],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, code, type_id, type_name, solo_presencia, hora_inicio, hora_fin, active)) = row
    else {
        return Ok(None);
    };

    let fields = fetch_fields(conn, &type_id)?;

    Ok(Some(AttendanceQr {
        id,
        code,
        type_id,
        type_name,
        solo_presencia,
        hora_inicio,
        hora_fin,
        active,
        fields,
    }))
}

/// Active fields of an attendance type, ordered by position.
fn fetch_fields(conn: &rusqlite::Connection, type_id: &str) -> StoreResult<Vec<FieldDef>> {
    let mut stmt = conn.prepare(
        "SELECT name, label, kind, required, placeholder, min_value, max_value, options
         FROM form_fields
         WHERE type_id = ?1 AND active = 1
         ORDER BY position",
    )?;

    let rows = stmt.query_map(rusqlite::params![type_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<f64>>(5)?,
            row.get::<_, Option<f64>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut fields = Vec::new();
    for row in rows {
        let (name, label, kind, required, placeholder, min_value, max_value, options) = row?;

        let kind = match kind.as_str() {
            "number" => FieldKind::Number,
            "checkbox" => FieldKind::Checkbox,
            "select" => FieldKind::Select,
            "text" => FieldKind::Text,
            other => {
                return Err(StoreError::CorruptRow {
                    entity: "form_fields",
                    reason: format!("unknown field kind: {other}"),
                });
            }
        };

        let options: Vec<FieldOption> = match options {
            Some(json) => serde_json::from_str(&json).map_err(|e| StoreError::CorruptRow {
                entity: "form_fields",
                reason: format!("bad options json: {e}"),
            })?,
            None => Vec::new(),
        };

        fields.push(FieldDef {
            name,
            label,
            kind,
            required,
            placeholder,
            min_value,
            max_value,
            options,
        });
    }

    Ok(fields)
}

// ── tests ────────────────────────────────────────────────────────────
