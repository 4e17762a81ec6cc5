//! Numeric features of a unified diff.
//!
//! The field order of [`FEATURE_NAMES`] is the layout of every feature vector
//! the model is trained on. Reordering it invalidates saved state.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 14;

/// Dense feature vector in [`FEATURE_NAMES`] order.
pub type FeatureVector = [f64; FEATURE_COUNT];

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "num_lines",
    "num_files",
    "additions",
    "deletions",
    "net_changes",
    "has_comments",
    "has_functions",
    "has_imports",
    "has_test",
    "has_docs",
    "has_config",
    "is_python",
    "is_js",
    "is_java",
];

const CONFIG_EXTENSIONS: &[&str] = &[
    ".json",
    ".yml",
    ".yaml",
    ".toml",
    ".ini",
    ".cfg",
    ".conf",
    ".env",
    ".properties",
];
const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs"];

lazy_static! {
    static ref FUNCTION_RE: Regex = Regex::new(concat!(
        r"\b(?:def|function|fn|func)\s+\w+",
        r"|\b(?:public|private|protected)\s+(?:static\s+)?[\w<>\[\],]+\s+\w+\s*\(",
        r"|\b(?:const|let|var)\s+\w+\s*=\s*(?:async\s*)?(?:\([^)]*\)|\w+)\s*=>",
    ))
    .unwrap();
    static ref IMPORT_RE: Regex = Regex::new(concat!(
        r#"(?m)^[+\- ]?\s*(?:import\s+\S|from\s+\S+\s+import\s|#include\s*[<"]|use\s+[\w:]+|using\s+[\w.]+)"#,
        r"|\brequire\s*\(",
    ))
    .unwrap();
    static ref DIFF_GIT_RE: Regex = Regex::new(r"^diff --git a/(\S+) b/(\S+)").unwrap();
}

/// Features extracted from one diff. Flags are booleans here and 0/1 in the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrFeatures {
    pub num_lines: u64,
    pub num_files: u64,
    pub additions: u64,
    pub deletions: u64,
    pub net_changes: i64,
    pub has_comments: bool,
    pub has_functions: bool,
    pub has_imports: bool,
    pub has_test: bool,
    pub has_docs: bool,
    pub has_config: bool,
    pub is_python: bool,
    pub is_js: bool,
    pub is_java: bool,
}

impl PrFeatures {
    /// Dense vector in [`FEATURE_NAMES`] order.
    pub fn vector(&self) -> FeatureVector {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            self.num_lines as f64,
            self.num_files as f64,
            self.additions as f64,
            self.deletions as f64,
            self.net_changes as f64,
            flag(self.has_comments),
            flag(self.has_functions),
            flag(self.has_imports),
            flag(self.has_test),
            flag(self.has_docs),
            flag(self.has_config),
            flag(self.is_python),
            flag(self.is_js),
            flag(self.is_java),
        ]
    }

    /// Name/value pairs in [`FEATURE_NAMES`] order.
    pub fn to_map(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES.iter().copied().zip(self.vector()).collect()
    }
}

/// Extracts [`PrFeatures`] from raw unified-diff text.
pub fn extract_features(diff: &str) -> PrFeatures {
    let mut f = PrFeatures::default();
    let mut paths: Vec<&str> = Vec::new();

    for line in diff.split('\n') {
        f.num_lines += 1;

        if let Some(caps) = DIFF_GIT_RE.captures(line) {
            f.num_files += 1;
            if let Some(p) = caps.get(2) {
                paths.push(p.as_str());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(p) = rest.trim().strip_prefix("b/") {
                paths.push(p);
            }
            continue;
        }
        if line.starts_with('+') && !line.starts_with("+++") {
            f.additions += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            f.deletions += 1;
        }
    }
    f.net_changes = f.additions as i64 - f.deletions as i64;

    paths.sort_unstable();
    paths.dedup();

    f.has_comments = diff.contains('#') || diff.contains("//") || diff.contains("/*");
    f.has_functions = FUNCTION_RE.is_match(diff);
    f.has_imports = IMPORT_RE.is_match(diff);
    f.has_test = paths.iter().any(|p| is_test_path(p));
    f.has_docs = paths.iter().any(|p| is_doc_path(p)) || mentions_docs(diff);
    f.has_config = paths.iter().any(|p| has_extension(p, CONFIG_EXTENSIONS));
    f.is_python = paths.iter().any(|p| has_extension(p, &[".py"]));
    f.is_js = paths.iter().any(|p| has_extension(p, JS_EXTENSIONS));
    f.is_java = paths.iter().any(|p| has_extension(p, &[".java"]));
    f
}

/// Converts a sparse name/value mapping to a dense vector.
///
/// Missing names stay 0 and unknown names are ignored.
pub fn features_to_vector<I, K>(features: I) -> FeatureVector
where
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let mut out = [0.0; FEATURE_COUNT];
    for (name, value) in features {
        if let Some(i) = FEATURE_NAMES.iter().position(|n| *n == name.as_ref()) {
            out[i] = value;
        }
    }
    out
}

fn has_extension(path: &str, exts: &[&str]) -> bool {
    let lower = path.to_ascii_lowercase();
    exts.iter().any(|e| lower.ends_with(e))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let name = file_name(&lower);
    name.starts_with("test_")
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
        || lower.starts_with("tests/")
        || lower.starts_with("test/")
        || lower.contains("/tests/")
        || lower.contains("/test/")
}

fn is_doc_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    file_name(&lower).starts_with("readme")
        || lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.starts_with("docs/")
        || lower.contains("/docs/")
}

fn mentions_docs(diff: &str) -> bool {
    let lower = diff.to_ascii_lowercase();
    lower.contains("readme")
        || lower.contains("documentation")
        || lower.contains(".md")
        || lower.contains(".rst")
        || lower.contains("docs/")
        || diff.contains("\"\"\"")
        || diff.contains("/**")
        || diff.contains("///")
}
