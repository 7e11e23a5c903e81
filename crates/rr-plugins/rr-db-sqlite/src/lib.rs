//! # rr-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rr-core` domain models.

mod rows;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rows::{choice, incident_from_row, like_pattern, media_from_row, user_from_row};
use rr_core::models::{
    Incident, IncidentFilter, IncidentMedia, IncidentStatus, IncidentType, NewIncident,
    NewIncidentMedia, NewUser, OrderField, Page, ProfileUpdate, Purged, User, UserFilter,
    UserSummary,
};
use rr_core::error::UniqueViolation;
use rr_core::traits::ReportRepo;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;

#[derive(Clone)]
pub struct SqliteReportRepo {
    pool: SqlitePool,
}

impl SqliteReportRepo {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    ///
    /// In-memory URLs get a single pinned connection so every caller sees
    /// the same database.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        schema::migrate(&pool).await?;
        log::info!("SQLite repository ready at {}", url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Drops keys still referenced by a remaining incident or media row.
/// Uploads are content-addressed, so one file can back several rows.
async fn unreferenced(
    conn: &mut sqlx::SqliteConnection,
    mut keys: Vec<String>,
) -> anyhow::Result<Vec<String>> {
    keys.sort();
    keys.dedup();
    let mut orphaned = Vec::with_capacity(keys.len());
    for key in keys {
        let (in_use,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM incidents WHERE photo = ?1 OR voice_note = ?1) \
             OR EXISTS(SELECT 1 FROM incident_media WHERE file = ?1)",
        )
        .bind(&key)
        .fetch_one(&mut *conn)
        .await?;
        if in_use == 0 {
            orphaned.push(key);
        }
    }
    Ok(orphaned)
}

/// Maps SQLite's `UNIQUE constraint failed: users.email` to [`UniqueViolation`].
fn unique_violation(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if let Some(column) = db.message().rsplit('.').next() {
                return UniqueViolation {
                    field: column.trim().to_string(),
                }
                .into();
            }
        }
    }
    err.into()
}

/// Appends the `WHERE` conditions of `filter` to `qb`.
fn push_incident_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &IncidentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(owner) = filter.owner {
        qb.push(" AND user_id = ").push_bind(owner);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.incident_type {
        qb.push(" AND incident_type = ").push_bind(kind.as_str());
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (LOWER(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(description) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(since) = filter.created_since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if filter.with_location {
        qb.push(" AND latitude IS NOT NULL AND longitude IS NOT NULL");
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(role) = filter.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (LOWER(u.username) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(u.email) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(u.phone_number) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl ReportRepo for SqliteReportRepo {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, phone_number, name, is_active, date_joined) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone_number)
        .bind(&user.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unique_violation)?
        .last_insert_rowid();

        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_profile(&self, id: i64, update: ProfileUpdate) -> anyhow::Result<Option<User>> {
        sqlx::query(
            "UPDATE users SET username = COALESCE(?, username), phone_number = COALESCE(?, phone_number) \
             WHERE id = ?",
        )
        .bind(update.username)
        .bind(update.phone_number)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unique_violation)?;
        self.get_user(id).await
    }

    async fn set_user_token(&self, id: i64, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> anyhow::Result<Page<UserSummary>> {
        let per_page = filter.per_page.max(1);

        let mut count = QueryBuilder::new("SELECT COUNT(*) AS n FROM users u");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get("n")?;

        // Out-of-range pages clamp to the last one.
        let num_pages = if total == 0 { 1 } else { (total + per_page - 1) / per_page };
        let page = filter.page.clamp(1, num_pages);

        let mut qb = QueryBuilder::new(
            "SELECT u.*, (SELECT COUNT(*) FROM incidents i WHERE i.user_id = u.id) AS incident_count FROM users u",
        );
        push_user_filters(&mut qb, filter);
        qb.push(" ORDER BY u.date_joined DESC, u.id DESC LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind((page - 1) * per_page);

        let items = qb
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                Ok(UserSummary {
                    user: user_from_row(row)?,
                    incident_count: row.try_get("incident_count")?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    async fn latest_users(&self, limit: i64) -> anyhow::Result<Vec<User>> {
        sqlx::query("SELECT * FROM users ORDER BY date_joined DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn count_users(&self) -> anyhow::Result<(i64, i64)> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN is_active THEN 1 ELSE 0 END), 0) AS active FROM users",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("total")?, row.try_get("active")?))
    }

    /// Deletes the user's incidents explicitly, then the user, in one
    /// transaction. The `ON DELETE CASCADE` on `incidents.user_id` covers
    /// the same ground at the database level.
    async fn delete_user(&self, id: i64) -> anyhow::Result<Option<Purged>> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut storage_keys = Vec::new();
        let rows = sqlx::query("SELECT photo, voice_note FROM incidents WHERE user_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        for row in rows {
            storage_keys.extend(row.try_get::<Option<String>, _>("photo")?);
            storage_keys.extend(row.try_get::<Option<String>, _>("voice_note")?);
        }
        let media = sqlx::query(
            "SELECT m.file FROM incident_media m JOIN incidents i ON i.id = m.incident_id WHERE i.user_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        for row in media {
            storage_keys.push(row.try_get("file")?);
        }

        let incidents = sqlx::query("DELETE FROM incidents WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let storage_keys = unreferenced(&mut *tx, storage_keys).await?;

        tx.commit().await?;
        Ok(Some(Purged {
            incidents,
            storage_keys,
        }))
    }

    async fn create_incident(&self, incident: NewIncident) -> anyhow::Result<Incident> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO incidents (title, description, incident_type, status, latitude, longitude, \
             photo, photo_url, photo_local_path, voice_note, voice_note_url, voice_note_local_path, \
             sync_status, created_at, updated_at, user_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.incident_type.as_str())
        .bind(incident.latitude)
        .bind(incident.longitude)
        .bind(&incident.photo.file)
        .bind(&incident.photo.url)
        .bind(&incident.photo.local_path)
        .bind(&incident.voice_note.file)
        .bind(&incident.voice_note.url)
        .bind(&incident.voice_note.local_path)
        .bind(incident.sync_status.as_str())
        .bind(now)
        .bind(now)
        .bind(incident.user_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_incident(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("incident {} vanished after insert", id))
    }

    async fn get_incident(&self, id: i64) -> anyhow::Result<Option<Incident>> {
        let row = sqlx::query("SELECT * FROM incidents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(incident_from_row).transpose()
    }

    async fn list_incidents(&self, filter: &IncidentFilter) -> anyhow::Result<Vec<Incident>> {
        let mut qb = QueryBuilder::new("SELECT * FROM incidents");
        push_incident_filters(&mut qb, filter);

        let column = match filter.ordering.field {
            OrderField::CreatedAt => "created_at",
            OrderField::UpdatedAt => "updated_at",
            OrderField::Status => "status",
        };
        let direction = if filter.ordering.descending { "DESC" } else { "ASC" };
        qb.push(format!(" ORDER BY {} {}, id {}", column, direction, direction));

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(incident_from_row)
            .collect()
    }

    async fn count_incidents(&self, filter: &IncidentFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM incidents");
        push_incident_filters(&mut qb, filter);
        Ok(qb.build().fetch_one(&self.pool).await?.try_get("n")?)
    }

    async fn update_incident(&self, incident: &Incident) -> anyhow::Result<Incident> {
        sqlx::query(
            "UPDATE incidents SET title = ?, description = ?, incident_type = ?, \
             latitude = ?, longitude = ?, photo = ?, photo_url = ?, photo_local_path = ?, \
             voice_note = ?, voice_note_url = ?, voice_note_local_path = ?, sync_status = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.incident_type.as_str())
        .bind(incident.latitude)
        .bind(incident.longitude)
        .bind(&incident.photo.file)
        .bind(&incident.photo.url)
        .bind(&incident.photo.local_path)
        .bind(&incident.voice_note.file)
        .bind(&incident.voice_note.url)
        .bind(&incident.voice_note.local_path)
        .bind(incident.sync_status.as_str())
        .bind(Utc::now())
        .bind(incident.id)
        .execute(&self.pool)
        .await?;

        self.get_incident(incident.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("incident {} not found", incident.id))
    }

    async fn unreferenced_keys(&self, keys: Vec<String>) -> anyhow::Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        unreferenced(&mut *conn, keys).await
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> anyhow::Result<Option<Incident>> {
        let affected = sqlx::query("UPDATE incidents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Ok(None);
        }
        self.get_incident(id).await
    }

    async fn delete_incident(&self, id: i64) -> anyhow::Result<Option<Purged>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT photo, voice_note FROM incidents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut storage_keys = Vec::new();
        storage_keys.extend(row.try_get::<Option<String>, _>("photo")?);
        storage_keys.extend(row.try_get::<Option<String>, _>("voice_note")?);
        let media = sqlx::query("SELECT file FROM incident_media WHERE incident_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        for row in media {
            storage_keys.push(row.try_get("file")?);
        }

        let incidents = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let storage_keys = unreferenced(&mut *tx, storage_keys).await?;

        tx.commit().await?;
        Ok(Some(Purged {
            incidents,
            storage_keys,
        }))
    }

    async fn count_by_status(&self, owner: Option<i64>) -> anyhow::Result<Vec<(IncidentStatus, i64)>> {
        let mut qb = QueryBuilder::new("SELECT status, COUNT(*) AS n FROM incidents");
        if let Some(owner) = owner {
            qb.push(" WHERE user_id = ").push_bind(owner);
        }
        qb.push(" GROUP BY status");
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok((choice(row, "status")?, row.try_get("n")?)))
            .collect()
    }

    async fn count_by_type(&self, owner: Option<i64>) -> anyhow::Result<Vec<(IncidentType, i64)>> {
        let mut qb = QueryBuilder::new("SELECT incident_type, COUNT(*) AS n FROM incidents");
        if let Some(owner) = owner {
            qb.push(" WHERE user_id = ").push_bind(owner);
        }
        qb.push(" GROUP BY incident_type");
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok((choice(row, "incident_type")?, row.try_get("n")?)))
            .collect()
    }

    async fn incident_timestamps(&self, owner: Option<i64>) -> anyhow::Result<Vec<DateTime<Utc>>> {
        let mut qb = QueryBuilder::new("SELECT created_at FROM incidents");
        if let Some(owner) = owner {
            qb.push(" WHERE user_id = ").push_bind(owner);
        }
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok(row.try_get("created_at")?))
            .collect()
    }

    async fn add_media(&self, media: NewIncidentMedia) -> anyhow::Result<IncidentMedia> {
        let id = sqlx::query(
            "INSERT INTO incident_media (incident_id, file, media_type, caption, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(media.incident_id)
        .bind(&media.file)
        .bind(media.media_type.as_str())
        .bind(&media.caption)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unique_violation)?
        .last_insert_rowid();

        let row = sqlx::query("SELECT * FROM incident_media WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        media_from_row(&row)
    }

    async fn list_media(&self, incident_id: i64) -> anyhow::Result<Vec<IncidentMedia>> {
        sqlx::query("SELECT * FROM incident_media WHERE incident_id = ? ORDER BY created_at ASC, id ASC")
            .bind(incident_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(media_from_row)
            .collect()
    }
}
