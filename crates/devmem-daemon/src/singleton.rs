//! Per-project single-instance discipline: a PID file plus a deterministic
//! port, with reclaim of stale owners and one cooperative takeover attempt.

use std::path::{Path, PathBuf};

use devmem_core::config::DAEMON_PORT_RANGE;

#[derive(Debug, thiserror::Error)]
pub enum SingletonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pid file at {0} is malformed")]
    Malformed(PathBuf),

    #[error("another daemon owns port {port} for a different project ({other_root})")]
    ForeignOwner { port: u16, other_root: String },
}

pub struct PidFile {
    pub pid: u32,
    pub port: u16,
    pub root_path: String,
}

impl PidFile {
    pub fn write(path: &Path, port: u16, root_path: &str) -> Result<(), SingletonError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{}\n{}\n{}", std::process::id(), port, root_path))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Option<PidFile>, SingletonError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let mut lines = content.lines();
        let pid: u32 = lines
            .next()
            .and_then(|l| l.parse().ok())
            .ok_or_else(|| SingletonError::Malformed(path.to_path_buf()))?;
        let port: u16 = lines
            .next()
            .and_then(|l| l.parse().ok())
            .ok_or_else(|| SingletonError::Malformed(path.to_path_buf()))?;
        let root_path = lines.next().unwrap_or_default().to_string();
        Ok(Some(PidFile { pid, port, root_path }))
    }

    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

/// Hash `project_id` into the daemon's fixed port range so restarts of the
/// same project land on the same port without a registry.
pub fn deterministic_port(project_id: &str) -> u16 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in project_id.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let range = DAEMON_PORT_RANGE;
    let span = (*range.end() - *range.start()) as u64 + 1;
    *range.start() + (hash % span) as u16
}

/// `true` if a process with this pid exists (the signal-0 probe: no signal
/// is delivered, only existence/permission is checked).
#[cfg(unix)]
pub fn process_is_alive(pid: u32) -> bool {
    // SAFETY: kill(pid, 0) sends no signal; it only probes for existence and
    // permission, which is the documented way to check liveness on unix.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn process_is_alive(_pid: u32) -> bool {
    true
}

/// Resolve ownership of `pid_path` before binding: reclaim a stale file,
/// or report a foreign owner so the caller can attempt a graceful takeover.
pub enum Ownership {
    Free,
    StaleReclaimed,
    OwnedBySameProject { port: u16 },
    OwnedByOtherProject { port: u16, root_path: String },
}

pub fn resolve_ownership(pid_path: &Path, project_root: &str) -> Result<Ownership, SingletonError> {
    let Some(existing) = PidFile::read(pid_path)? else {
        return Ok(Ownership::Free);
    };

    if !process_is_alive(existing.pid) {
        PidFile::remove(pid_path);
        return Ok(Ownership::StaleReclaimed);
    }

    if existing.root_path == project_root {
        Ok(Ownership::OwnedBySameProject { port: existing.port })
    } else {
        Ok(Ownership::OwnedByOtherProject {
            port: existing.port,
            root_path: existing.root_path,
        })
    }
}
