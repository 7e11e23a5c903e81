//! Idempotent schema creation, run every time the repository opens.

use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'citizen' CHECK (role IN ('citizen', 'admin')),
        phone_number TEXT NOT NULL DEFAULT '',
        name TEXT,
        token TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        date_joined TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS incidents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        incident_type TEXT NOT NULL DEFAULT 'general'
            CHECK (incident_type IN ('general', 'fire', 'accident', 'medical', 'crime', 'other')),
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'in_progress', 'resolved', 'closed')),
        latitude REAL,
        longitude REAL,
        photo TEXT,
        photo_url TEXT,
        photo_local_path TEXT,
        voice_note TEXT,
        voice_note_url TEXT,
        voice_note_local_path TEXT,
        sync_status TEXT NOT NULL DEFAULT 'pending'
            CHECK (sync_status IN ('pending', 'synced', 'failed')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_incidents_user ON incidents(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_created ON incidents(created_at)",
    "CREATE TABLE IF NOT EXISTS incident_media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        incident_id INTEGER NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
        file TEXT NOT NULL,
        media_type TEXT NOT NULL CHECK (media_type IN ('image', 'video')),
        caption TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_incident_media_incident ON incident_media(incident_id)",
];

pub(crate) async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
