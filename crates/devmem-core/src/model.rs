//! Domain types shared by the store, the vector index, and the ingestor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
    Java,
    Kotlin,
    Swift,
    Ruby,
    Php,
    C,
    Cpp,
    Csharp,
    Bash,
    Sql,
    Markdown,
    Json,
    Yaml,
    Toml,
    #[default]
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Csharp => "csharp",
            Language::Bash => "bash",
            Language::Sql => "sql",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Unknown => "unknown",
        }
    }

    /// Extension → language, the closed mapping from the external interface.
    /// Unmapped extensions resolve to `Unknown`, which is still indexable.
    pub fn from_extension(ext: &str) -> Language {
        match ext.to_ascii_lowercase().as_str() {
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "py" => Language::Python,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "kt" => Language::Kotlin,
            "swift" => Language::Swift,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "c" | "h" => Language::C,
            "cpp" | "hpp" => Language::Cpp,
            "cs" => Language::Csharp,
            "sh" | "bash" | "zsh" => Language::Bash,
            "sql" => Language::Sql,
            "md" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            _ => Language::Unknown,
        }
    }
}

impl std::str::FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "typescript" => Language::TypeScript,
            "javascript" => Language::JavaScript,
            "python" => Language::Python,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "kotlin" => Language::Kotlin,
            "swift" => Language::Swift,
            "ruby" => Language::Ruby,
            "php" => Language::Php,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            "csharp" => Language::Csharp,
            "bash" => Language::Bash,
            "sql" => Language::Sql,
            "markdown" => Language::Markdown,
            "json" => Language::Json,
            "yaml" => Language::Yaml,
            "toml" => Language::Toml,
            _ => Language::Unknown,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeFile {
    pub id: String,
    pub real_path: String,
    pub project_id: String,
    pub language: Language,
    pub line_count: i64,
    pub size_bytes: i64,
    pub chunk_count: i64,
    pub is_external: bool,
    pub mtime: DateTime<Utc>,
    pub content_hash: String,
    pub indexed_at: DateTime<Utc>,
    pub last_indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub code_file_id: String,
    pub name: String,
    pub kind: String,
    pub signature: Option<String>,
    pub line_start: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub code_file_id: String,
    pub pattern_name: String,
    pub category: String,
    pub description: String,
    pub evidence: String,
    pub line_number: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Shared,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Shared => "shared",
            Visibility::Public => "public",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "shared" => Visibility::Shared,
            "public" => Visibility::Public,
            _ => Visibility::Private,
        })
    }
}

/// The confidence ladder: `low < medium < high < proven`, monotone
/// non-decreasing for a given learning except on deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    Proven,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::Proven => "proven",
        }
    }

    /// Advance one step per the threshold table in `validate_learning`:
    /// low→medium at times_validated ≥ 1, medium→high at ≥ 2, high→proven at ≥ 4.
    pub fn advance(self, times_validated: i64) -> Confidence {
        match self {
            Confidence::Low if times_validated >= 1 => Confidence::Medium,
            Confidence::Medium if times_validated >= 2 => Confidence::High,
            Confidence::High if times_validated >= 4 => Confidence::Proven,
            other => other,
        }
    }

    /// The combined-confidence rule used by the consolidator.
    pub fn from_combined_validations(total: i64) -> Confidence {
        if total >= 5 {
            Confidence::Proven
        } else if total >= 3 {
            Confidence::High
        } else if total >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "medium" => Confidence::Medium,
            "high" => Confidence::High,
            "proven" => Confidence::Proven,
            _ => Confidence::Low,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub what_happened: Option<String>,
    pub lesson: String,
    pub prevention: Option<String>,
    pub context: Option<String>,
    pub confidence: Confidence,
    pub times_validated: i64,
    pub agent_id: Option<String>,
    pub visibility: Visibility,
    pub source_session_id: Option<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    AutoStrong,
    Related,
    Contradicts,
    Extends,
    Supersedes,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::AutoStrong => "auto_strong",
            LinkType::Related => "related",
            LinkType::Contradicts => "contradicts",
            LinkType::Extends => "extends",
            LinkType::Supersedes => "supersedes",
        }
    }
}

impl std::str::FromStr for LinkType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "related" => LinkType::Related,
            "contradicts" => LinkType::Contradicts,
            "extends" => LinkType::Extends,
            "supersedes" => LinkType::Supersedes,
            _ => LinkType::AutoStrong,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningLink {
    pub from_id: String,
    pub to_id: String,
    pub link_type: LinkType,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub summary: Option<String>,
    pub full_context: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chunk of a code file as stored alongside its vector in the index.
/// `language` and `symbols` travel with the embedding so the semantic search
/// path can present a result without a `Store` lookup.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub code_file_id: String,
    pub chunk_index: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    pub language: Language,
    pub symbols: Vec<String>,
}

/// The two corpora carried side by side in the relational store and the
/// vector index. Sessions are ingested verbatim (per-spec: opaque payload)
/// and are not chunked or pattern-scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Code,
    Learnings,
    Sessions,
}

impl Collection {
    pub fn suffix(&self) -> &'static str {
        match self {
            Collection::Code => "code",
            Collection::Learnings => "learnings",
            Collection::Sessions => "sessions",
        }
    }

    pub fn key(&self, project_id: &str) -> String {
        format!("{project_id}_{}", self.suffix())
    }
}
