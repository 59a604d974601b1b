//! Closed pattern catalog detection.
//!
//! For each pattern in the catalog, the first regex hit in a file records
//! exactly one [`Pattern`](crate::model::Pattern) with `evidence` being the
//! matched text truncated to 50 chars. Detection confidence is a flat 0.5
//! since this module answers "is this pattern present", not "how sure are
//! we" (a coarser signal than the per-line confidence scoring used
//! elsewhere for user-taught patterns).

use regex::Regex;
use std::sync::LazyLock;

use crate::model::Pattern;

struct Catalog {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    regex: Regex,
}

static CATALOG: LazyLock<Vec<Catalog>> = LazyLock::new(|| {
    vec![
        Catalog {
            name: "singleton",
            category: "creational",
            description: "Singleton: a class restricting itself to a single shared instance.",
            regex: Regex::new(r"(?i)(getInstance\s*\(\)|static\s+\w+\s+instance\b|private\s+static\s+\w+\s*;\s*$)").unwrap(),
        },
        Catalog {
            name: "factory",
            category: "creational",
            description: "Factory: a function/class that creates objects without exposing the instantiation logic.",
            regex: Regex::new(r"(?i)\b(create[A-Z]\w*|Factory)\b\s*\(").unwrap(),
        },
        Catalog {
            name: "repository",
            category: "structural",
            description: "Repository: an abstraction over data access.",
            regex: Regex::new(r"(?i)\b\w*Repository\b").unwrap(),
        },
        Catalog {
            name: "circuit-breaker",
            category: "resilience",
            description: "Circuit breaker: trips open after repeated failures to stop cascading retries.",
            regex: Regex::new(r"(?i)circuit.?breaker|CircuitBreaker").unwrap(),
        },
        Catalog {
            name: "retry",
            category: "resilience",
            description: "Retry: re-attempts a failed operation, typically with backoff.",
            regex: Regex::new(r"(?i)\bretr(y|ies)\b.*(backoff|attempt)|withRetry\s*\(").unwrap(),
        },
        Catalog {
            name: "error-boundary",
            category: "resilience",
            description: "Error boundary: isolates failures so they don't propagate past a defined edge.",
            regex: Regex::new(r"(?i)ErrorBoundary|componentDidCatch|catch_unwind").unwrap(),
        },
        Catalog {
            name: "memoization",
            category: "performance",
            description: "Memoization: caches a function's results by its arguments.",
            regex: Regex::new(r"(?i)\bmemoiz|\bcache\.get\(|lru_cache|useMemo\s*\(").unwrap(),
        },
        Catalog {
            name: "debounce-throttle",
            category: "performance",
            description: "Debounce/throttle: rate-limits how often a handler runs.",
            regex: Regex::new(r"(?i)\bdebounce\s*\(|\bthrottle\s*\(").unwrap(),
        },
        Catalog {
            name: "event-emitter",
            category: "behavioral",
            description: "Event emitter: a publish/subscribe dispatcher.",
            regex: Regex::new(r"(?i)EventEmitter|\.on\(['\"]|\.emit\(['\"]|addEventListener\(").unwrap(),
        },
        Catalog {
            name: "middleware",
            category: "structural",
            description: "Middleware: a composable request/response pipeline stage.",
            regex: Regex::new(r"(?i)\bmiddleware\b|fn\s+\w+\(.*next:\s*Next").unwrap(),
        },
        Catalog {
            name: "state-machine",
            category: "behavioral",
            description: "State machine: an explicit set of states and transitions.",
            regex: Regex::new(r"(?i)StateMachine|\bmatch\s+state\b|transition\s*\(").unwrap(),
        },
        Catalog {
            name: "builder",
            category: "creational",
            description: "Builder: incrementally constructs a complex object via chained calls.",
            regex: Regex::new(r"(?i)\w*Builder\b.*\bnew\b|\.build\s*\(\)").unwrap(),
        },
    ]
});

pub fn detect(code_file_id: &str, content: &str) -> Vec<Pattern> {
    let mut found = Vec::new();

    for entry in CATALOG.iter() {
        for (i, line) in content.lines().enumerate() {
            if let Some(m) = entry.regex.find(line) {
                let evidence: String = m.as_str().chars().take(50).collect();
                found.push(Pattern {
                    id: uuid::Uuid::new_v4().to_string(),
                    code_file_id: code_file_id.to_string(),
                    pattern_name: entry.name.to_string(),
                    category: entry.category.to_string(),
                    description: entry.description.to_string(),
                    evidence,
                    line_number: (i + 1) as i64,
                    confidence: 0.5,
                });
                break;
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_singleton() {
        let content = "class Config {\n  static getInstance() { return this._i; }\n}\n";
        let patterns = detect("f.ts", content);
        assert!(patterns.iter().any(|p| p.pattern_name == "singleton"));
    }

    #[test]
    fn records_only_first_hit_per_pattern() {
        let content = "function createUser() {}\nfunction createAccount() {}\n";
        let patterns = detect("f.ts", content);
        assert_eq!(patterns.iter().filter(|p| p.pattern_name == "factory").count(), 1);
    }

    #[test]
    fn no_false_positive_on_unrelated_code() {
        let content = "const x = 1 + 1;\n";
        let patterns = detect("f.ts", content);
        assert!(patterns.is_empty());
    }
}
