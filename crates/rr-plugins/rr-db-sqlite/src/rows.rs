//! Mapping between SQLite rows and `rr-core` domain models.

use anyhow::Context;
use rr_core::models::{Attachment, Incident, IncidentMedia, User};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

/// Reads a TEXT column holding one of the closed enumerations.
pub(crate) fn choice<T>(row: &SqliteRow, column: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    T::from_str(&raw)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("column {}", column))
}

pub(crate) fn user_from_row(row: &SqliteRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: choice(row, "role")?,
        phone_number: row.try_get("phone_number")?,
        name: row.try_get("name")?,
        token: row.try_get("token")?,
        is_active: row.try_get("is_active")?,
        date_joined: row.try_get("date_joined")?,
    })
}

pub(crate) fn incident_from_row(row: &SqliteRow) -> anyhow::Result<Incident> {
    Ok(Incident {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        incident_type: choice(row, "incident_type")?,
        status: choice(row, "status")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        photo: Attachment {
            file: row.try_get("photo")?,
            url: row.try_get("photo_url")?,
            local_path: row.try_get("photo_local_path")?,
        },
        voice_note: Attachment {
            file: row.try_get("voice_note")?,
            url: row.try_get("voice_note_url")?,
            local_path: row.try_get("voice_note_local_path")?,
        },
        sync_status: choice(row, "sync_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        user_id: row.try_get("user_id")?,
    })
}

pub(crate) fn media_from_row(row: &SqliteRow) -> anyhow::Result<IncidentMedia> {
    Ok(IncidentMedia {
        id: row.try_get("id")?,
        incident_id: row.try_get("incident_id")?,
        file: row.try_get("file")?,
        media_type: choice(row, "media_type")?,
        caption: row.try_get("caption")?,
        created_at: row.try_get("created_at")?,
    })
}

/// `%term%` with LIKE wildcards in `term` escaped (use with `ESCAPE '\'`).
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
