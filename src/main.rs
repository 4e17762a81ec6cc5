mod telemetry;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use ai_llm_service::LlmClient;
use ai_llm_service::config::default_config::config_from_env;
use prompt_selector::config::pr_numbers_from_env;
use prompt_selector::{
    AnyRegressor, ArtifactStore, BenchmarkOptions, GitHubHost, GitHubSettings, LlmMetaEvaluator,
    LlmReviewGenerator, Orchestrator, PromptRegistry, PromptSelector, RunReport, SelectorSettings,
    SelectorStats, run_selector,
};

type LiveOrchestrator =
    Orchestrator<GitHubHost, LlmReviewGenerator, LlmMetaEvaluator, AnyRegressor>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Learns which review prompt works best for which pull request",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    /// DEBUG logs for the selector, GitHub and LLM crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review PRs in order, choosing the prompt online and learning from each score.
    Select {
        /// PR numbers. Falls back to PR_NUMBERS, then PR_NUMBER.
        prs: Vec<u64>,
        /// Start fresh instead of merging the saved state.
        #[arg(long)]
        no_load: bool,
        /// Save state every N PRs (default from SELECTOR_SAVE_FREQUENCY).
        #[arg(long)]
        save_frequency: Option<usize>,
    },
    /// Run every prompt on one PR and rank the reviews.
    Benchmark {
        pr: u64,
        /// Post the best review as a PR comment.
        #[arg(long)]
        post: bool,
    },
    /// Review one PR with a fixed prompt.
    Review {
        pr: u64,
        #[arg(long, default_value = "Meta")]
        prompt: String,
        /// Post the review as a PR comment.
        #[arg(long)]
        post: bool,
    },
    /// Show what the saved selector state has learned.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real env vars still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init("info", cli.verbose);

    let settings = SelectorSettings::from_env().context("invalid selector settings")?;
    info!(?settings, "settings loaded");

    match cli.command {
        Commands::Select {
            prs,
            no_load,
            save_frequency,
        } => {
            let prs = if prs.is_empty() { pr_numbers_from_env() } else { prs };
            if prs.is_empty() {
                bail!("no PR numbers given (pass them as arguments or set PR_NUMBERS / PR_NUMBER)");
            }

            let mut opts = settings.run_options();
            opts.load_previous = !no_load;
            if let Some(n) = save_frequency {
                opts.save_frequency = n;
            }

            let mut orch = build_orchestrator(&settings)?;
            let report = run_selector(&mut orch, &prs, &opts).await;
            print_run_report(&report);
            if report.results.is_empty() {
                bail!("every PR failed");
            }
        }
        Commands::Benchmark { pr, post } => {
            let orch = build_orchestrator(&settings)?;
            let opts = BenchmarkOptions {
                post_best: post,
                ..BenchmarkOptions::default()
            };
            let report = orch.benchmark_all_prompts(pr, &opts).await?;

            println!("{}", format!("Prompt ranking for PR #{pr}").bold());
            for (rank, e) in report.entries.iter().rev().enumerate() {
                let meta = e
                    .meta_score
                    .map(|m| format!("{m:.2}"))
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "  {:>2}. {:<18} final {:>5.2}  heuristic {:>5.2}  meta {:>5}",
                    rank + 1,
                    e.prompt.cyan(),
                    e.final_score,
                    e.heuristic_score,
                    meta
                );
            }
            println!("Report: {}", report.report_path.display().to_string().blue());
            if let Some(c) = report.posted {
                println!("{} comment {}", "Posted".green().bold(), c.id);
            }
        }
        Commands::Review { pr, prompt, post } => {
            let orch = build_orchestrator(&settings)?;
            let out = orch.review_once(pr, &prompt, post).await?;
            println!("{}", out.review);
            println!("Saved to {}", out.saved_to.display().to_string().blue());
            if let Some(c) = out.comment {
                println!("{} comment {}", "Posted".green().bold(), c.id);
            }
        }
        Commands::Stats => {
            let registry = PromptRegistry::builtin();
            let mut selector = PromptSelector::new(
                registry.names(),
                settings.build_regressor(),
                settings.selector_config(),
            )?;
            if !selector.load_state(&settings.state_path).await {
                warn!(path = %settings.state_path.display(), "no usable saved state");
            }
            print_stats(&selector.stats());
        }
    }

    Ok(())
}

fn build_orchestrator(settings: &SelectorSettings) -> Result<LiveOrchestrator> {
    let github = GitHubSettings::from_env().context("GitHub settings")?;
    let host = GitHubHost::from_settings(&github)?;

    let llm_cfg = config_from_env().context("LLM settings")?;
    let generator = LlmReviewGenerator::new(LlmClient::from_config(llm_cfg.clone())?);
    let judge = LlmMetaEvaluator::new(LlmClient::from_config(llm_cfg.with_temperature(0.0))?);

    let registry = PromptRegistry::builtin();
    let selector = PromptSelector::new(
        registry.names(),
        settings.build_regressor(),
        settings.selector_config(),
    )?;

    Ok(Orchestrator::new(
        host,
        generator,
        judge,
        selector,
        registry,
        ArtifactStore::new(&settings.output_dir),
        settings.orchestrator_config(),
    )?)
}

fn print_stats(stats: &SelectorStats) {
    println!("{}", "Selector state".bold());
    println!("  training samples : {}", stats.training_samples);
    println!("  average score    : {:.2}", stats.average_score);
    println!("  prompts used     : {}", stats.unique_prompts_used);
    println!("  scaler fitted    : {}", stats.is_scaler_fitted);
    println!("  model fitted     : {}", stats.model_fitted);
    for (name, count) in &stats.prompt_distribution {
        println!("    {:<18} {}", name.cyan(), count);
    }
}

fn print_run_report(report: &RunReport) {
    println!("\n{}", "FINAL ITERATIVE SELECTOR REPORT".bold());
    for r in &report.results {
        println!(
            "  PR #{}: {} -> Score: {}",
            r.pr_number,
            r.selected_prompt.cyan(),
            format!("{:.2}", r.score).green()
        );
    }
    for (pr, e) in &report.failures {
        println!("  PR #{}: {} ({})", pr, "FAILED".red().bold(), e);
    }
    print_stats(&report.stats);
}
