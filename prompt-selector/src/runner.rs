//! Batch runner: a sequence of PRs through one orchestrator.

use std::fmt::Write as _;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::Error;
use crate::host::ReviewHost;
use crate::llm::ReviewGenerator;
use crate::orchestrator::{Orchestrator, PrOutcome};
use crate::regressor::Regressor;
use crate::scoring::MetaEvaluator;
use crate::selector::SelectorStats;

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Merge the saved state before the first PR.
    pub load_previous: bool,
    /// Save state after every N iterations (failed ones count). 0 disables.
    pub save_frequency: usize,
    /// Sleep after each PR.
    pub pause: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            load_previous: true,
            save_frequency: 5,
            pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<PrOutcome>,
    /// PRs that failed, with their error.
    pub failures: Vec<(u64, Error)>,
    pub stats: SelectorStats,
}

/// Processes `prs` in order. A failing PR is logged and skipped.
pub async fn run_selector<H, G, J, R>(
    orch: &mut Orchestrator<H, G, J, R>,
    prs: &[u64],
    opts: &RunOptions,
) -> RunReport
where
    H: ReviewHost,
    G: ReviewGenerator,
    J: MetaEvaluator,
    R: Regressor,
{
    let state_path = orch.config().state_path.clone();
    if opts.load_previous {
        let loaded = orch.selector_mut().load_state(&state_path).await;
        info!(loaded, samples = orch.selector().state().sample_count(), "previous state");
    }

    let mut results = Vec::with_capacity(prs.len());
    let mut failures = Vec::new();

    for (i, &pr) in prs.iter().enumerate() {
        info!(pr, iteration = i + 1, total = prs.len(), "processing PR");
        match orch.process_pr(pr).await {
            Ok(outcome) => results.push(outcome),
            Err(e) => {
                error!(pr, error = %e, "PR failed, skipping");
                failures.push((pr, e));
            }
        }

        let stats = orch.selector().stats();
        info!(
            samples = stats.training_samples,
            avg_score = stats.average_score,
            unique_prompts = stats.unique_prompts_used,
            model_fitted = stats.model_fitted,
            "selector stats"
        );

        if opts.save_frequency > 0 && (i + 1) % opts.save_frequency == 0 {
            orch.selector().save_state(&state_path).await;
        }
        if !opts.pause.is_zero() {
            tokio::time::sleep(opts.pause).await;
        }
    }

    if !orch.selector().save_state(&state_path).await {
        warn!(path = %state_path.display(), "final state save failed");
    }

    let report = RunReport {
        results,
        failures,
        stats: orch.selector().stats(),
    };
    info!("\n{}", render_final_report(&report));
    report
}

/// Plain-text summary printed at the end of a run.
pub fn render_final_report(report: &RunReport) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "{}", "=".repeat(60));
    let _ = writeln!(s, "FINAL ITERATIVE SELECTOR REPORT");
    let _ = writeln!(s, "{}", "=".repeat(60));
    let _ = writeln!(
        s,
        "Processed: {} ok, {} failed",
        report.results.len(),
        report.failures.len()
    );
    let _ = writeln!(s, "Training samples: {}", report.stats.training_samples);
    let _ = writeln!(s, "Average score: {:.2}", report.stats.average_score);
    let _ = writeln!(s, "Model fitted: {}", report.stats.model_fitted);
    let _ = writeln!(s, "Prompt distribution:");
    for (name, count) in &report.stats.prompt_distribution {
        let _ = writeln!(s, "  {name}: {count}");
    }
    let _ = writeln!(s, "Results:");
    for r in &report.results {
        let _ = writeln!(
            s,
            "  PR #{}: {} -> Score: {:.2}",
            r.pr_number, r.selected_prompt, r.score
        );
    }
    for (pr, e) in &report.failures {
        let _ = writeln!(s, "  PR #{pr}: FAILED ({e})");
    }
    s
}
