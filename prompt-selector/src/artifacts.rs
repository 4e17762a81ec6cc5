//! Per-PR output files (reviews, result records, benchmark reports).

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::SelectorResult;

/// Replaces every non-alphanumeric char with `_`.
///
/// `"Chain-of-Thought"` becomes `"Chain_of_Thought"`.
pub fn sanitize_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// `review_pr{N}_{prompt}.txt`
pub fn review_file_name(pr_number: u64, prompt: &str) -> String {
    format!("review_pr{pr_number}_{}.txt", sanitize_name(prompt))
}

/// `iterative_results_pr{N}_{YYYYmmdd_HHMMSS}.json`
pub fn results_file_name(pr_number: u64, stamp: &chrono::DateTime<chrono::Local>) -> String {
    format!(
        "iterative_results_pr{pr_number}_{}.json",
        stamp.format("%Y%m%d_%H%M%S")
    )
}

/// `review_reports_all_prompts_PR{N}.md`
pub fn benchmark_file_name(pr_number: u64) -> String {
    format!("review_reports_all_prompts_PR{pr_number}.md")
}

/// Directory that receives every artifact. Created on first write.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `content` to `<dir>/<name>`, returning the full path.
    pub async fn save_text(&self, name: &str, content: &str) -> SelectorResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "artifact written");
        Ok(path)
    }

    /// Pretty JSON variant of [`Self::save_text`].
    pub async fn save_json<T: Serialize>(&self, name: &str, value: &T) -> SelectorResult<PathBuf> {
        let json = serde_json::to_string_pretty(value)?;
        self.save_text(name, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn names_follow_layout() {
        assert_eq!(sanitize_name("complex prompt/string"), "complex_prompt_string");
        assert_eq!(review_file_name(7, "Chain-of-Thought"), "review_pr7_Chain_of_Thought.txt");
        assert_eq!(benchmark_file_name(12), "review_reports_all_prompts_PR12.md");

        let stamp = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 1).unwrap();
        assert_eq!(
            results_file_name(3, &stamp),
            "iterative_results_pr3_20240309_140501.json"
        );
    }

    #[tokio::test]
    async fn save_text_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("out"));
        let path = store.save_text("a.txt", "hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn save_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = ArtifactStore::new(blocker.join("sub"));
        assert!(store.save_text("a.txt", "hello").await.is_err());
    }
}
