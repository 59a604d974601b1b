//! Authoritative relational store.
//!
//! Mirrors the reader/writer connection split used elsewhere in this
//! codebase for sqlite-backed stores: a single writer connection behind a
//! `Mutex` serializes all mutations, and a separate reader connection serves
//! concurrent reads without blocking on the writer's transaction. This makes
//! `Store` `Send + Sync` without requiring callers to wrap it in
//! `Arc<Mutex<_>>`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::model::{CodeFile, Confidence, Language, Learning, LearningLink, LinkType, Pattern, Symbol, Visibility};

use super::migrations::apply_migrations;

#[derive(Debug, Default, Clone)]
pub struct CodeFileFilter {
    pub project_id: Option<String>,
    pub language: Option<Language>,
    pub limit: i64,
    pub include_external: bool,
}

#[derive(Debug, Default, Clone)]
pub struct SymbolFilter {
    pub project_id: Option<String>,
    pub limit: i64,
}

#[derive(Debug, Default, Clone)]
pub struct LearningFilter {
    pub category: Option<String>,
    pub agent_id: Option<String>,
    pub caller_agent_id: Option<String>,
    pub limit: i64,
}

pub enum PurgeScope {
    Project(String),
    All,
}

#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    pub merged_count: usize,
    pub links_updated: usize,
}

pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    #[allow(dead_code)]
    path: PathBuf,
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA mmap_size = 268435456;",
    )?;
    Ok(())
}

fn row_to_code_file(row: &rusqlite::Row) -> rusqlite::Result<CodeFile> {
    let language: String = row.get("language")?;
    Ok(CodeFile {
        id: row.get("id")?,
        real_path: row.get("real_path")?,
        project_id: row.get("project_id")?,
        language: language.parse().unwrap(),
        line_count: row.get("line_count")?,
        size_bytes: row.get("size_bytes")?,
        chunk_count: row.get("chunk_count")?,
        is_external: row.get::<_, i64>("is_external")? != 0,
        mtime: row.get("mtime")?,
        content_hash: row.get("content_hash")?,
        indexed_at: row.get("indexed_at")?,
        last_indexed_at: row.get("last_indexed_at")?,
    })
}

fn row_to_learning(row: &rusqlite::Row) -> rusqlite::Result<Learning> {
    let confidence: String = row.get("confidence")?;
    let visibility: String = row.get("visibility")?;
    Ok(Learning {
        id: row.get("id")?,
        category: row.get("category")?,
        title: row.get("title")?,
        description: row.get("description")?,
        what_happened: row.get("what_happened")?,
        lesson: row.get("lesson")?,
        prevention: row.get("prevention")?,
        context: row.get("context")?,
        confidence: confidence.parse().unwrap(),
        times_validated: row.get("times_validated")?,
        agent_id: row.get("agent_id")?,
        visibility: visibility.parse().unwrap(),
        source_session_id: row.get("source_session_id")?,
        source_url: row.get("source_url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        processed_at: row.get("processed_at")?,
    })
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(&path)?;
        configure(&writer)?;
        apply_migrations(&writer)?;

        let reader = Connection::open(&path)?;
        configure(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let writer = Connection::open_in_memory()?;
        configure(&writer)?;
        apply_migrations(&writer)?;
        // in-memory connections are not shared across handles, so the
        // "reader" here reuses a second in-memory DB only for tests that
        // never rely on cross-connection visibility.
        let reader = Connection::open_in_memory()?;
        configure(&reader)?;
        apply_migrations(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path: PathBuf::new(),
        })
    }

    // ------------------------------------------------------------------
    // Code files
    // ------------------------------------------------------------------

    /// Insert or replace a code file by `id`, atomically replacing its
    /// symbol and pattern sets. Returns the prior row, if any.
    pub fn upsert_code_file(
        &self,
        file: &CodeFile,
        symbols: &[Symbol],
        patterns: &[Pattern],
    ) -> Result<Option<CodeFile>, StorageError> {
        let mut conn = self.writer.lock().unwrap();
        let tx = conn.transaction()?;

        let prior = tx
            .query_row(
                "SELECT * FROM code_files WHERE id = ?1",
                params![file.id],
                row_to_code_file,
            )
            .optional()?;

        tx.execute(
            "INSERT INTO code_files
                (id, real_path, project_id, language, line_count, size_bytes,
                 chunk_count, is_external, mtime, content_hash, indexed_at, last_indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                real_path = excluded.real_path,
                project_id = excluded.project_id,
                language = excluded.language,
                line_count = excluded.line_count,
                size_bytes = excluded.size_bytes,
                chunk_count = excluded.chunk_count,
                is_external = excluded.is_external,
                mtime = excluded.mtime,
                content_hash = excluded.content_hash,
                last_indexed_at = excluded.last_indexed_at",
            params![
                file.id,
                file.real_path,
                file.project_id,
                file.language.as_str(),
                file.line_count,
                file.size_bytes,
                file.chunk_count,
                file.is_external as i64,
                file.mtime,
                file.content_hash,
                file.indexed_at,
                file.last_indexed_at,
            ],
        )?;

        tx.execute("DELETE FROM symbols WHERE code_file_id = ?1", params![file.id])?;
        for sym in symbols {
            tx.execute(
                "INSERT INTO symbols (id, code_file_id, name, kind, signature, line_start)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![sym.id, file.id, sym.name, sym.kind, sym.signature, sym.line_start],
            )?;
        }

        tx.execute("DELETE FROM patterns WHERE code_file_id = ?1", params![file.id])?;
        for pat in patterns {
            tx.execute(
                "INSERT INTO patterns
                    (id, code_file_id, pattern_name, category, description, evidence, line_number, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    pat.id,
                    file.id,
                    pat.pattern_name,
                    pat.category,
                    pat.description,
                    pat.evidence,
                    pat.line_number,
                    pat.confidence,
                ],
            )?;
        }

        tx.commit()?;
        Ok(prior)
    }

    pub fn remove_code_file(&self, id: &str, project_id: &str) -> Result<(), StorageError> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "DELETE FROM code_files WHERE id = ?1 AND project_id = ?2",
            params![id, project_id],
        )?;
        Ok(())
    }

    pub fn get_code_file(&self, id: &str) -> Result<Option<CodeFile>, StorageError> {
        let conn = self.reader.lock().unwrap();
        Ok(conn
            .query_row("SELECT * FROM code_files WHERE id = ?1", params![id], row_to_code_file)
            .optional()?)
    }

    pub fn find_files(&self, pattern: &str, filter: &CodeFileFilter) -> Result<Vec<CodeFile>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        let like = format!("%{}%", pattern.replace('%', "\\%"));

        let mut sql = String::from(
            "SELECT * FROM code_files WHERE (real_path LIKE ?1 ESCAPE '\\' OR id LIKE ?1 ESCAPE '\\')",
        );
        if filter.project_id.is_some() {
            sql.push_str(" AND project_id = ?2");
        }
        if filter.language.is_some() {
            sql.push_str(" AND language = ?3");
        }
        if !filter.include_external {
            sql.push_str(" AND is_external = 0");
        }
        sql.push_str(" ORDER BY real_path LIMIT ?4");

        let mut stmt = conn.prepare(&sql)?;
        let project_id = filter.project_id.clone().unwrap_or_default();
        let language = filter.language.map(|l| l.as_str()).unwrap_or_default();

        let rows = stmt.query_map(
            params![like, project_id, language, limit],
            row_to_code_file,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_files_by_symbol(&self, name: &str, filter: &SymbolFilter) -> Result<Vec<CodeFile>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let limit = if filter.limit > 0 { filter.limit } else { 50 };

        let mut sql = String::from(
            "SELECT DISTINCT cf.* FROM code_files cf
             JOIN symbols s ON s.code_file_id = cf.id
             WHERE s.name = ?1",
        );
        if filter.project_id.is_some() {
            sql.push_str(" AND cf.project_id = ?2");
        }
        sql.push_str(" ORDER BY cf.real_path LIMIT ?3");

        let mut stmt = conn.prepare(&sql)?;
        let project_id = filter.project_id.clone().unwrap_or_default();
        let rows = stmt.query_map(params![name, project_id, limit], row_to_code_file)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_symbols(&self, code_file_id: &str) -> Result<Vec<Symbol>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, code_file_id, name, kind, signature, line_start
             FROM symbols WHERE code_file_id = ?1 ORDER BY line_start",
        )?;
        let rows = stmt.query_map(params![code_file_id], |row| {
            Ok(Symbol {
                id: row.get(0)?,
                code_file_id: row.get(1)?,
                name: row.get(2)?,
                kind: row.get(3)?,
                signature: row.get(4)?,
                line_start: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_patterns(&self, code_file_id: &str) -> Result<Vec<Pattern>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, code_file_id, pattern_name, category, description, evidence, line_number, confidence
             FROM patterns WHERE code_file_id = ?1 ORDER BY line_number",
        )?;
        let rows = stmt.query_map(params![code_file_id], |row| {
            Ok(Pattern {
                id: row.get(0)?,
                code_file_id: row.get(1)?,
                pattern_name: row.get(2)?,
                category: row.get(3)?,
                description: row.get(4)?,
                evidence: row.get(5)?,
                line_number: row.get(6)?,
                confidence: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn keyword_search_files(&self, query: &str, limit: i64) -> Result<Vec<CodeFile>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT cf.* FROM code_files_fts f
             JOIN code_files cf ON cf.rowid = f.rowid
             WHERE code_files_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query(query), limit], row_to_code_file);
        match rows {
            Ok(rows) => rows.collect::<Result<Vec<_>, _>>().map_err(Into::into),
            Err(_) => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Learnings
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_learning(
        &self,
        category: &str,
        title: &str,
        description: Option<&str>,
        what_happened: Option<&str>,
        lesson: &str,
        prevention: Option<&str>,
        context: Option<&str>,
        agent_id: Option<&str>,
        visibility: Visibility,
        source_session_id: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<String, StorageError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO learnings
                (id, category, title, description, what_happened, lesson, prevention, context,
                 confidence, times_validated, agent_id, visibility, source_session_id, source_url,
                 created_at, updated_at, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'low', 0, ?9, ?10, ?11, ?12, ?13, ?13, NULL)",
            params![
                id,
                category,
                title,
                description,
                what_happened,
                lesson,
                prevention,
                context,
                agent_id,
                visibility.as_str(),
                source_session_id,
                source_url,
                now,
            ],
        )?;
        Ok(id)
    }

    pub fn get_learning(&self, id: &str) -> Result<Learning, StorageError> {
        let conn = self.reader.lock().unwrap();
        conn.query_row("SELECT * FROM learnings WHERE id = ?1", params![id], row_to_learning)
            .optional()?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// List learnings visible to `caller_agent_id` per the visibility
    /// predicate: owner, or `shared|public`, or no owner at all.
    pub fn list_learnings(&self, filter: &LearningFilter) -> Result<Vec<Learning>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let limit = if filter.limit > 0 { filter.limit } else { 100 };

        let mut sql = String::from("SELECT * FROM learnings WHERE 1=1");
        if filter.category.is_some() {
            sql.push_str(" AND category = :category");
        }
        if filter.agent_id.is_some() {
            sql.push_str(" AND agent_id = :agent_id");
        }
        sql.push_str(
            " AND (agent_id IS NULL OR agent_id = :caller OR visibility IN ('shared', 'public'))",
        );
        sql.push_str(" ORDER BY created_at DESC LIMIT :limit");

        let mut stmt = conn.prepare(&sql)?;
        let category = filter.category.clone().unwrap_or_default();
        let agent_id = filter.agent_id.clone().unwrap_or_default();
        let caller = filter.caller_agent_id.clone().unwrap_or_default();
        let rows = stmt.query_map(
            rusqlite::named_params! {
                ":category": category,
                ":agent_id": agent_id,
                ":caller": caller,
                ":limit": limit,
            },
            row_to_learning,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn keyword_search_learnings(&self, query: &str, limit: i64) -> Result<Vec<Learning>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT l.* FROM learnings_fts f
             JOIN learnings l ON l.rowid = f.rowid
             WHERE learnings_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query(query), limit], row_to_learning);
        match rows {
            Ok(rows) => rows.collect::<Result<Vec<_>, _>>().map_err(Into::into),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Advance confidence one rung per the threshold table, bumping
    /// `times_validated`.
    pub fn validate_learning(&self, id: &str) -> Result<Learning, StorageError> {
        let conn = self.writer.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let mut learning = tx
            .query_row("SELECT * FROM learnings WHERE id = ?1", params![id], row_to_learning)
            .optional()?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        learning.times_validated += 1;
        learning.confidence = learning.confidence.advance(learning.times_validated);
        learning.updated_at = Utc::now();

        tx.execute(
            "UPDATE learnings SET times_validated = ?2, confidence = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, learning.times_validated, learning.confidence.as_str(), learning.updated_at],
        )?;
        tx.commit()?;
        Ok(learning)
    }

    pub fn create_learning_link(
        &self,
        from: &str,
        to: &str,
        link_type: LinkType,
        similarity: Option<f64>,
    ) -> Result<(), StorageError> {
        let conn = self.writer.lock().unwrap();
        // UNIQUE(from_id, to_id) violations are quietly ignored per the
        // store's error contract.
        conn.execute(
            "INSERT OR IGNORE INTO learning_links (from_id, to_id, link_type, similarity)
             VALUES (?1, ?2, ?3, ?4)",
            params![from, to, link_type.as_str(), similarity.unwrap_or(0.0)],
        )?;
        Ok(())
    }

    pub fn get_links_for(&self, learning_id: &str) -> Result<Vec<LearningLink>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT from_id, to_id, link_type, similarity FROM learning_links
             WHERE from_id = ?1 OR to_id = ?1",
        )?;
        let rows = stmt.query_map(params![learning_id], |row| {
            let link_type: String = row.get(2)?;
            Ok(LearningLink {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                link_type: link_type.parse().unwrap(),
                similarity: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Merge `mergees` into `keep` in a single transaction: update `keep`'s
    /// row, redirect every link referencing a mergee, drop self-loops and
    /// dangling duplicates, then delete the mergee rows. Returns how many
    /// learnings were folded away and how many link rows were touched.
    pub fn merge_learnings(
        &self,
        keep: &str,
        mergees: &[String],
        merged_description: &str,
        new_confidence: Confidence,
        new_validations: i64,
    ) -> Result<MergeReport, StorageError> {
        let conn = self.writer.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now();

        tx.execute(
            "UPDATE learnings SET description = ?2, confidence = ?3, times_validated = ?4, updated_at = ?5
             WHERE id = ?1",
            params![keep, merged_description, new_confidence.as_str(), new_validations, now],
        )?;

        let mut links_updated = 0usize;
        for mergee in mergees {
            // Redirect, letting the UNIQUE(from,to) constraint drop rows
            // that would collide with an edge keep already has.
            links_updated += tx.execute(
                "UPDATE OR IGNORE learning_links SET from_id = ?2 WHERE from_id = ?1",
                params![mergee, keep],
            )?;
            links_updated += tx.execute(
                "UPDATE OR IGNORE learning_links SET to_id = ?2 WHERE to_id = ?1",
                params![mergee, keep],
            )?;
            // Anything left still pointing at mergee (the collisions the
            // UPDATE OR IGNORE skipped) is dangling once mergee is deleted;
            // drop it explicitly so no orphan edge survives.
            tx.execute(
                "DELETE FROM learning_links WHERE from_id = ?1 OR to_id = ?1",
                params![mergee],
            )?;
        }

        tx.execute(
            "DELETE FROM learning_links WHERE from_id = ?1 AND to_id = ?1",
            params![keep],
        )?;

        for mergee in mergees {
            tx.execute("DELETE FROM learnings WHERE id = ?1", params![mergee])?;
        }

        tx.commit()?;
        Ok(MergeReport {
            merged_count: mergees.len(),
            links_updated,
        })
    }

    pub fn unprocessed_learnings(&self, category: Option<&str>, limit: i64) -> Result<Vec<Learning>, StorageError> {
        let conn = self.reader.lock().unwrap();
        let limit = if limit > 0 { limit } else { 500 };
        let mut sql = String::from("SELECT * FROM learnings WHERE processed_at IS NULL");
        if category.is_some() {
            sql.push_str(" AND category = ?1");
        }
        sql.push_str(" ORDER BY created_at LIMIT ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![category.unwrap_or_default(), limit], row_to_learning)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn mark_processed(&self, ids: &[String]) -> Result<(), StorageError> {
        let conn = self.writer.lock().unwrap();
        let now = Utc::now();
        for id in ids {
            conn.execute(
                "UPDATE learnings SET processed_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn create_session(&self, summary: Option<&str>, full_context: Option<&str>) -> Result<String, StorageError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, summary, full_context, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, summary, full_context, now],
        )?;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    pub fn purge(&self, scope: PurgeScope) -> Result<(), StorageError> {
        let conn = self.writer.lock().unwrap();
        match scope {
            PurgeScope::Project(project_id) => {
                conn.execute("DELETE FROM code_files WHERE project_id = ?1", params![project_id])?;
            }
            PurgeScope::All => {
                conn.execute_batch(
                    "DELETE FROM code_files; DELETE FROM learnings; DELETE FROM learning_links; DELETE FROM sessions;",
                )?;
            }
        }
        Ok(())
    }

    pub fn stats(&self, project_id: &str) -> Result<StoreStats, StorageError> {
        let conn = self.reader.lock().unwrap();
        let total_files: i64 = conn.query_row(
            "SELECT COUNT(*) FROM code_files WHERE project_id = ?1",
            params![project_id],
            |r| r.get(0),
        )?;
        let total_learnings: i64 = conn.query_row("SELECT COUNT(*) FROM learnings", [], |r| r.get(0))?;
        Ok(StoreStats {
            total_files,
            total_learnings,
        })
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total_files: i64,
    pub total_learnings: i64,
}

/// Escape an FTS5 match expression so arbitrary user query text is treated
/// as a phrase rather than parsed as FTS query syntax.
fn fts_query(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    fn sample_file(id: &str) -> CodeFile {
        let now = Utc::now();
        CodeFile {
            id: id.to_string(),
            real_path: id.to_string(),
            project_id: "proj".to_string(),
            language: Language::Rust,
            line_count: 10,
            size_bytes: 100,
            chunk_count: 1,
            is_external: false,
            mtime: now,
            content_hash: "abc".to_string(),
            indexed_at: now,
            last_indexed_at: now,
        }
    }

    #[test]
    fn upsert_then_find_by_path() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_code_file(&sample_file("src/lib.rs"), &[], &[]).unwrap();
        let found = store
            .find_files("lib.rs", &CodeFileFilter { project_id: Some("proj".into()), ..Default::default() })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "src/lib.rs");
    }

    #[test]
    fn remove_code_file_deletes_row() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_code_file(&sample_file("a.rs"), &[], &[]).unwrap();
        store.remove_code_file("a.rs", "proj").unwrap();
        assert!(store.get_code_file("a.rs").unwrap().is_none());
    }

    #[test]
    fn validate_learning_follows_threshold_table() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .create_learning("testing", "t", None, None, "lesson", None, None, None, Visibility::Private, None, None)
            .unwrap();

        let l = store.validate_learning(&id).unwrap();
        assert_eq!(l.confidence, Confidence::Medium);
        let l = store.validate_learning(&id).unwrap();
        assert_eq!(l.confidence, Confidence::High);
        store.validate_learning(&id).unwrap();
        let l = store.validate_learning(&id).unwrap();
        assert_eq!(l.confidence, Confidence::Proven);
    }

    #[test]
    fn merge_learnings_redirects_links_and_deletes_mergees() {
        let store = Store::open_in_memory().unwrap();
        let keep = store
            .create_learning("testing", "keep", None, None, "l1", None, None, None, Visibility::Private, None, None)
            .unwrap();
        let mergee = store
            .create_learning("testing", "mergee", None, None, "l2", None, None, None, Visibility::Private, None, None)
            .unwrap();
        let other = store
            .create_learning("testing", "other", None, None, "l3", None, None, None, Visibility::Private, None, None)
            .unwrap();

        store.create_learning_link(&other, &mergee, LinkType::Related, Some(0.5)).unwrap();

        store
            .merge_learnings(&keep, &[mergee.clone()], "merged", Confidence::High, 3)
            .unwrap();

        assert!(matches!(store.get_learning(&mergee), Err(StorageError::NotFound(_))));
        let links = store.get_links_for(&keep).unwrap();
        assert!(links.iter().all(|l| l.from_id != mergee && l.to_id != mergee));
    }
}
