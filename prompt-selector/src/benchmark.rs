//! Runs every registered prompt against one PR and ranks the reviews.
//!
//! The learner is not touched; this is an offline comparison.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use pr_gateway::CommentReceipt;
use tracing::{info, warn};

use crate::artifacts::benchmark_file_name;
use crate::errors::SelectorResult;
use crate::host::ReviewHost;
use crate::llm::{GeneratedReview, ReviewGenerator};
use crate::orchestrator::Orchestrator;
use crate::regressor::Regressor;
use crate::scoring::{MetaEvaluator, evaluate_review, heuristic_score};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkOptions {
    /// Sleep between prompts.
    pub pause: Duration,
    /// Post the highest-scoring review as a PR comment.
    pub post_best: bool,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(200),
            post_best: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkEntry {
    pub prompt: String,
    pub review: String,
    pub static_output: String,
    pub retrieved_context: String,
    pub heuristic_score: f64,
    /// Judge mean, `None` when the judge failed.
    pub meta_score: Option<f64>,
    pub final_score: f64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub pr_number: u64,
    /// Ascending by `final_score`; the best entry is last.
    pub entries: Vec<BenchmarkEntry>,
    pub report_path: PathBuf,
    pub posted: Option<CommentReceipt>,
}

impl BenchmarkReport {
    pub fn best(&self) -> Option<&BenchmarkEntry> {
        self.entries.last()
    }
}

impl<H, G, J, R> Orchestrator<H, G, J, R>
where
    H: ReviewHost,
    G: ReviewGenerator,
    J: MetaEvaluator,
    R: Regressor,
{
    pub async fn benchmark_all_prompts(
        &self,
        pr_number: u64,
        opts: &BenchmarkOptions,
    ) -> SelectorResult<BenchmarkReport> {
        let diff = self.host.fetch_diff(pr_number).await?;
        let mut entries = Vec::with_capacity(self.registry.len());

        for (i, template) in self.registry.iter().enumerate() {
            if i > 0 && !opts.pause.is_zero() {
                tokio::time::sleep(opts.pause).await;
            }
            let t0 = Instant::now();
            let generated = match self.generator.generate(pr_number, &diff, template).await {
                Ok(g) => g,
                Err(e) => {
                    warn!(
                        pr = pr_number,
                        prompt = %template.name,
                        error = %e,
                        "prompt invoke failed"
                    );
                    GeneratedReview {
                        review: format!("ERROR: prompt invoke failed: {e}"),
                        static_output: None,
                        context: None,
                    }
                }
            };
            let elapsed = t0.elapsed();

            let eval =
                evaluate_review(&self.judge, &diff, &generated.review, generated.extras()).await;
            let entry = BenchmarkEntry {
                prompt: template.name.clone(),
                heuristic_score: heuristic_score(&eval.heuristics),
                meta_score: eval.meta.as_ref().ok().map(|m| m.mean()),
                final_score: eval.score,
                static_output: generated.static_output.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                retrieved_context: generated.context.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                review: generated.review,
                elapsed,
            };
            info!(
                pr = pr_number,
                prompt = %entry.prompt,
                score = entry.final_score,
                elapsed_ms = elapsed.as_millis() as u64,
                "benchmark prompt scored"
            );
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.final_score.total_cmp(&b.final_score));

        let report_path = self
            .artifacts
            .save_text(&benchmark_file_name(pr_number), &render_markdown(pr_number, &entries))
            .await?;

        let posted = match entries.last() {
            Some(best) if opts.post_best => {
                info!(pr = pr_number, prompt = %best.prompt, "posting best review");
                Some(self.host.post_comment(pr_number, &best.review).await?)
            }
            _ => None,
        };

        Ok(BenchmarkReport {
            pr_number,
            entries,
            report_path,
            posted,
        })
    }
}

/// Markdown report: ranking table then every review in full.
pub fn render_markdown(pr_number: u64, entries: &[BenchmarkEntry]) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "# Prompt benchmark for PR {pr_number}\n");
    let _ = writeln!(s, "| Prompt | Final | Heuristic | Meta | Time (s) |");
    let _ = writeln!(s, "|---|---|---|---|---|");
    for e in entries {
        let meta = e
            .meta_score
            .map(|m| format!("{m:.2}"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let _ = writeln!(
            s,
            "| {} | {:.2} | {:.2} | {} | {:.2} |",
            e.prompt,
            e.final_score,
            e.heuristic_score,
            meta,
            e.elapsed.as_secs_f64()
        );
    }
    for e in entries {
        let _ = writeln!(s, "\n## {} (score {:.2})\n", e.prompt, e.final_score);
        let _ = writeln!(s, "{}\n", e.review.trim());
        let _ = writeln!(
            s,
            "<details><summary>Static analysis</summary>\n\n{}\n</details>\n",
            e.static_output
        );
        let _ = writeln!(
            s,
            "<details><summary>Retrieved context</summary>\n\n{}\n</details>",
            e.retrieved_context
        );
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::orchestrator::OrchestratorConfig;
    use crate::prompts::PromptRegistry;
    use crate::regressor::SgdRegressor;
    use crate::selector::{PromptSelector, SelectorConfig};
    use crate::test_support::{CallLog, FakeGenerator, FakeHost, FakeJudge};
    use tempfile::TempDir;

    fn orch(
        tmp: &TempDir,
        generator: FakeGenerator,
    ) -> Orchestrator<FakeHost, FakeGenerator, FakeJudge, SgdRegressor> {
        let calls = CallLog::default();
        let registry = PromptRegistry::builtin();
        let selector = PromptSelector::new(
            registry.names(),
            SgdRegressor::default(),
            SelectorConfig::default(),
        )
        .unwrap();
        Orchestrator::new(
            FakeHost::new(calls.clone()),
            generator,
            FakeJudge::new(calls),
            selector,
            registry,
            ArtifactStore::new(tmp.path()),
            OrchestratorConfig::default(),
        )
        .unwrap()
    }

    fn quick(post_best: bool) -> BenchmarkOptions {
        BenchmarkOptions {
            pause: Duration::ZERO,
            post_best,
        }
    }

    #[tokio::test]
    async fn ranks_all_prompts_ascending() {
        let tmp = TempDir::new().unwrap();
        let generator = FakeGenerator::new(CallLog::default())
            .with_quality("Meta", 9.0)
            .with_quality("Zero-shot", 1.0);
        let o = orch(&tmp, generator);

        let report = o.benchmark_all_prompts(21, &quick(false)).await.unwrap();

        assert_eq!(report.entries.len(), 7);
        assert!(report.entries.windows(2).all(|w| w[0].final_score <= w[1].final_score));
        assert_eq!(report.entries[0].prompt, "Zero-shot");
        assert_eq!(report.best().unwrap().prompt, "Meta");
        assert!(report.posted.is_none());
        assert_eq!(o.selector().state().sample_count(), 0);

        let md = std::fs::read_to_string(&report.report_path).unwrap();
        assert!(report.report_path.ends_with("review_reports_all_prompts_PR21.md"));
        assert!(md.contains("PR 21"));
        assert!(md.contains("## Meta"));
    }

    #[tokio::test]
    async fn generation_failure_becomes_error_entry() {
        let tmp = TempDir::new().unwrap();
        let generator = FakeGenerator::new(CallLog::default()).failing_on("Reflection");
        let o = orch(&tmp, generator);

        let report = o.benchmark_all_prompts(2, &quick(false)).await.unwrap();
        let failed = report.entries.iter().find(|e| e.prompt == "Reflection").unwrap();
        assert!(failed.review.starts_with("ERROR: prompt invoke failed:"));
        assert_eq!(failed.static_output, "N/A");
        assert_eq!(failed.retrieved_context, "N/A");
        assert_eq!(report.entries.len(), 7);
    }

    #[tokio::test]
    async fn posts_best_review_when_asked() {
        let tmp = TempDir::new().unwrap();
        let generator = FakeGenerator::new(CallLog::default()).with_quality("Few-shot", 10.0);
        let o = orch(&tmp, generator);

        let report = o.benchmark_all_prompts(6, &quick(true)).await.unwrap();
        assert_eq!(report.posted.as_ref().map(|c| c.id), Some(1006));
        let posted = o.host().posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].1.contains("Review by Few-shot"));
    }

    #[tokio::test]
    async fn judge_failure_leaves_meta_empty() {
        let tmp = TempDir::new().unwrap();
        let mut o = orch(&tmp, FakeGenerator::new(CallLog::default()));
        o.judge.fail = true;

        let report = o.benchmark_all_prompts(1, &quick(false)).await.unwrap();
        assert!(report.entries.iter().all(|e| e.meta_score.is_none() && e.final_score == 5.0));
    }
}
