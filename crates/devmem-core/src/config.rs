//! Environment-driven configuration, resolved once at daemon/ingestor startup.

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::Error;
use crate::ingest::project_id_of;

/// Chunking contract shared by the ingestor and the vector index. These are
/// the library defaults; a given `Config` may override them (`chunk_size`,
/// `chunk_overlap`) without changing what the rest of the crate calls them.
pub const CHUNK_SIZE: usize = 300;
pub const CHUNK_OVERLAP: usize = 50;

/// Daemon control-port search range, walked from a deterministic hash of the
/// project root until a free port is found.
pub const DAEMON_PORT_RANGE: std::ops::RangeInclusive<u16> = 37890..=38890;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the project being indexed.
    pub project_root: PathBuf,
    /// Stable identifier scoping per-project state; defaults to the project
    /// root's basename.
    pub project_id: String,
    /// Where the sqlite database and vector index files live.
    pub state_dir: PathBuf,
    /// Override for the relational store file; defaults to
    /// `<state_dir>/devmem.db`.
    pub db_path: Option<PathBuf>,
    /// Override for the deterministic control-API port.
    pub daemon_port: Option<u16>,
    /// Prefix used for vector collection names; defaults to `project_id`.
    pub vector_collection_prefix: String,
    /// Maximum file size (bytes) the ingestor will read.
    pub max_file_size: u64,
    /// Glob patterns extending `ingest::language::DEFAULT_IGNORE_GLOBS`.
    pub ignore_globs: Vec<String>,
    /// Chunk size (chars) used by the ingestor's chunker.
    pub chunk_size: usize,
    /// Chunk overlap (chars) used by the ingestor's chunker.
    pub chunk_overlap: usize,
    /// Debounce window for the filesystem watcher, in milliseconds.
    pub debounce_ms: u64,
    /// How often the consolidator runs its duplicate scan, in seconds.
    pub consolidation_interval_secs: u64,
}

impl Config {
    /// Build a `Config` from environment variables, defaulting the state
    /// directory to the platform data dir the way `directories::ProjectDirs`
    /// resolves it for other local-first tools. Every option in the external
    /// configuration surface is read here, prefixed `DEVMEM_` to match this
    /// crate's own environment-variable namespace.
    pub fn from_env(project_root: PathBuf) -> Result<Self, Error> {
        let state_dir = match std::env::var("DEVMEM_STATE_DIR") {
            Ok(v) if !v.is_empty() => PathBuf::from(v),
            _ => default_state_dir(&project_root)?,
        };

        let project_id = match std::env::var("DEVMEM_PROJECT_ID") {
            Ok(v) if !v.is_empty() => v,
            _ => project_id_of(&project_root),
        };

        let db_path = std::env::var("DEVMEM_DB_PATH").ok().filter(|v| !v.is_empty()).map(PathBuf::from);
        let daemon_port = std::env::var("DEVMEM_DAEMON_PORT").ok().and_then(|v| v.parse().ok());
        let vector_collection_prefix = match std::env::var("DEVMEM_VECTOR_COLLECTION_PREFIX") {
            Ok(v) if !v.is_empty() => v,
            _ => project_id.clone(),
        };

        let max_file_size = env_u64("DEVMEM_MAX_FILE_SIZE", 512_000);
        let ignore_globs = std::env::var("DEVMEM_IGNORE_GLOBS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let chunk_size = env_u64("DEVMEM_CHUNK_SIZE", CHUNK_SIZE as u64) as usize;
        let chunk_overlap = env_u64("DEVMEM_CHUNK_OVERLAP", CHUNK_OVERLAP as u64) as usize;
        let debounce_ms = env_u64("DEVMEM_DEBOUNCE_MS", 500);
        let consolidation_interval_secs = env_u64("DEVMEM_CONSOLIDATION_INTERVAL_SECS", 3600);

        Ok(Self {
            project_root,
            project_id,
            state_dir,
            db_path,
            daemon_port,
            vector_collection_prefix,
            max_file_size,
            ignore_globs,
            chunk_size,
            chunk_overlap,
            debounce_ms,
            consolidation_interval_secs,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| self.state_dir.join("devmem.db"))
    }

    pub fn vector_index_dir(&self) -> PathBuf {
        self.state_dir.join("vectors")
    }

    pub fn pid_file(&self, project_id: &str) -> PathBuf {
        self.state_dir.join(format!("daemon-{project_id}.pid"))
    }
}

fn default_state_dir(project_root: &std::path::Path) -> Result<PathBuf, Error> {
    let project_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string());

    let dirs = ProjectDirs::from("dev", "devmem", "devmem")
        .ok_or_else(|| Error::Config("could not resolve platform data directory".into()))?;

    Ok(dirs.data_dir().join("projects").join(project_name))
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = Config::from_env(PathBuf::from("/tmp/some-project")).unwrap();
        assert_eq!(cfg.max_file_size, 512_000);
        assert_eq!(cfg.debounce_ms, 500);
        assert!(cfg.db_path().ends_with("devmem.db"));
    }
}
