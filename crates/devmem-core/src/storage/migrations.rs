//! Versioned schema migrations, applied in order against `schema_version`.
//!
//! Each migration is a single batch of SQL run through `execute_batch`, the
//! same shape the upstream storage layer this crate was built from uses for
//! its own FTS5-backed schema.

use rusqlite::Connection;

use crate::error::StorageError;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema",
        sql: r#"
        CREATE TABLE code_files (
            id              TEXT PRIMARY KEY,
            real_path       TEXT NOT NULL,
            project_id      TEXT NOT NULL,
            language        TEXT NOT NULL,
            line_count      INTEGER NOT NULL DEFAULT 0,
            size_bytes      INTEGER NOT NULL DEFAULT 0,
            chunk_count     INTEGER NOT NULL DEFAULT 0,
            is_external     INTEGER NOT NULL DEFAULT 0,
            mtime           TEXT NOT NULL,
            content_hash    TEXT NOT NULL,
            indexed_at      TEXT NOT NULL,
            last_indexed_at TEXT NOT NULL,
            UNIQUE(project_id, real_path)
        );

        CREATE TABLE symbols (
            id            TEXT PRIMARY KEY,
            code_file_id  TEXT NOT NULL REFERENCES code_files(id) ON DELETE CASCADE,
            name          TEXT NOT NULL,
            kind          TEXT NOT NULL,
            signature     TEXT,
            line_start    INTEGER NOT NULL
        );
        CREATE INDEX idx_symbols_code_file ON symbols(code_file_id);
        CREATE INDEX idx_symbols_name ON symbols(name);

        CREATE TABLE patterns (
            id            TEXT PRIMARY KEY,
            code_file_id  TEXT NOT NULL REFERENCES code_files(id) ON DELETE CASCADE,
            pattern_name  TEXT NOT NULL,
            category      TEXT NOT NULL,
            description   TEXT NOT NULL,
            evidence      TEXT NOT NULL,
            line_number   INTEGER NOT NULL,
            confidence    REAL NOT NULL
        );
        CREATE INDEX idx_patterns_code_file ON patterns(code_file_id);
        CREATE INDEX idx_patterns_name ON patterns(pattern_name);

        CREATE TABLE learnings (
            id                  TEXT PRIMARY KEY,
            category            TEXT NOT NULL,
            title               TEXT NOT NULL,
            description         TEXT,
            what_happened       TEXT,
            lesson              TEXT NOT NULL,
            prevention          TEXT,
            context             TEXT,
            confidence          TEXT NOT NULL DEFAULT 'low',
            times_validated     INTEGER NOT NULL DEFAULT 0,
            agent_id            TEXT,
            visibility          TEXT NOT NULL DEFAULT 'private',
            source_session_id   TEXT,
            source_url          TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            processed_at        TEXT
        );
        CREATE INDEX idx_learnings_category ON learnings(category);

        CREATE TABLE learning_links (
            from_id     TEXT NOT NULL REFERENCES learnings(id) ON DELETE CASCADE,
            to_id       TEXT NOT NULL REFERENCES learnings(id) ON DELETE CASCADE,
            link_type   TEXT NOT NULL,
            similarity  REAL NOT NULL,
            UNIQUE(from_id, to_id)
        );

        CREATE TABLE sessions (
            id            TEXT PRIMARY KEY,
            summary       TEXT,
            full_context  TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE VIRTUAL TABLE code_files_fts USING fts5(
            real_path, content='code_files', content_rowid='rowid'
        );
        CREATE TRIGGER code_files_ai AFTER INSERT ON code_files BEGIN
            INSERT INTO code_files_fts(rowid, real_path) VALUES (new.rowid, new.real_path);
        END;
        CREATE TRIGGER code_files_ad AFTER DELETE ON code_files BEGIN
            INSERT INTO code_files_fts(code_files_fts, rowid, real_path) VALUES('delete', old.rowid, old.real_path);
        END;
        CREATE TRIGGER code_files_au AFTER UPDATE ON code_files BEGIN
            INSERT INTO code_files_fts(code_files_fts, rowid, real_path) VALUES('delete', old.rowid, old.real_path);
            INSERT INTO code_files_fts(rowid, real_path) VALUES (new.rowid, new.real_path);
        END;

        CREATE VIRTUAL TABLE learnings_fts USING fts5(
            title, description, lesson, content='learnings', content_rowid='rowid'
        );
        CREATE TRIGGER learnings_ai AFTER INSERT ON learnings BEGIN
            INSERT INTO learnings_fts(rowid, title, description, lesson)
            VALUES (new.rowid, new.title, new.description, new.lesson);
        END;
        CREATE TRIGGER learnings_ad AFTER DELETE ON learnings BEGIN
            INSERT INTO learnings_fts(learnings_fts, rowid, title, description, lesson)
            VALUES('delete', old.rowid, old.title, old.description, old.lesson);
        END;
        CREATE TRIGGER learnings_au AFTER UPDATE ON learnings BEGIN
            INSERT INTO learnings_fts(learnings_fts, rowid, title, description, lesson)
            VALUES('delete', old.rowid, old.title, old.description, old.lesson);
            INSERT INTO learnings_fts(rowid, title, description, lesson)
            VALUES (new.rowid, new.title, new.description, new.lesson);
        END;
        "#,
    },
];

pub fn apply_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.sql).map_err(|e| StorageError::Migration {
            version: migration.version,
            reason: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )?;
        tracing::info!(version = migration.version, description = migration.description, "applied migration");
    }

    Ok(())
}
