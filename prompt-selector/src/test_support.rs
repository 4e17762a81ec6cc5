//! In-memory collaborators for orchestrator, runner and benchmark tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use pr_gateway::CommentReceipt;

use crate::errors::{Error, MetaEvalError, SelectorResult};
use crate::host::ReviewHost;
use crate::llm::{GeneratedReview, ReviewGenerator};
use crate::prompts::PromptTemplate;
use crate::scoring::{MetaEvaluator, MetaScores, ReviewExtras};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn log(calls: &CallLog, entry: String) {
    calls.lock().unwrap().push(entry);
}

pub const SAMPLE_DIFF: &str = "diff --git a/src/app.py b/src/app.py\n\
--- a/src/app.py\n\
+++ b/src/app.py\n\
+import os\n\
+def handler(event):\n\
+    # read config\n\
+    return os.environ.get(\"X\")\n\
-print(\"old\")\n";

#[derive(Default)]
pub struct FakeHost {
    pub calls: CallLog,
    pub failing: HashSet<u64>,
    pub diffs: HashMap<u64, String>,
    pub posted: Mutex<Vec<(u64, String)>>,
}

impl FakeHost {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, pr: u64) -> Self {
        self.failing.insert(pr);
        self
    }
}

impl ReviewHost for FakeHost {
    async fn fetch_diff(&self, pr_number: u64) -> SelectorResult<String> {
        log(&self.calls, format!("fetch:{pr_number}"));
        if self.failing.contains(&pr_number) {
            return Err(Error::Other(format!("PR {pr_number} not found")));
        }
        Ok(self
            .diffs
            .get(&pr_number)
            .cloned()
            .unwrap_or_else(|| SAMPLE_DIFF.to_string()))
    }

    async fn post_comment(&self, pr_number: u64, body: &str) -> SelectorResult<CommentReceipt> {
        log(&self.calls, format!("post:{pr_number}"));
        self.posted.lock().unwrap().push((pr_number, body.to_string()));
        Ok(CommentReceipt {
            id: 1000 + pr_number,
            html_url: None,
        })
    }
}

/// Review text carries `quality=<q>` so [`FakeJudge`] can grade it.
#[derive(Default)]
pub struct FakeGenerator {
    pub calls: CallLog,
    pub quality: HashMap<String, f64>,
    pub failing: HashSet<String>,
}

impl FakeGenerator {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    pub fn with_quality(mut self, prompt: &str, q: f64) -> Self {
        self.quality.insert(prompt.to_string(), q);
        self
    }

    pub fn failing_on(mut self, prompt: &str) -> Self {
        self.failing.insert(prompt.to_string());
        self
    }
}

impl ReviewGenerator for FakeGenerator {
    async fn generate(
        &self,
        pr_number: u64,
        _diff: &str,
        prompt: &PromptTemplate,
    ) -> SelectorResult<GeneratedReview> {
        log(&self.calls, format!("generate:{pr_number}:{}", prompt.name));
        if self.failing.contains(&prompt.name) {
            return Err(Error::Other("model overloaded".into()));
        }
        let q = self.quality.get(&prompt.name).copied().unwrap_or(5.0);
        Ok(GeneratedReview {
            review: format!(
                "## Summary\nReview by {} quality={q}\n\
                 ## Issues\n- possible bug in handler\n\
                 ## Suggestions\n- consider validating input\n",
                prompt.name
            ),
            static_output: Some("static".into()),
            context: None,
        })
    }
}

#[derive(Default)]
pub struct FakeJudge {
    pub calls: CallLog,
    pub fail: bool,
}

impl FakeJudge {
    pub fn new(calls: CallLog) -> Self {
        Self { calls, fail: false }
    }
}

impl MetaEvaluator for FakeJudge {
    async fn meta_evaluate(
        &self,
        _diff: &str,
        review: &str,
        _extras: ReviewExtras<'_>,
    ) -> Result<MetaScores, MetaEvalError> {
        log(&self.calls, "judge".to_string());
        if self.fail {
            return Err(MetaEvalError::Upstream("judge down".into()));
        }
        let q = review
            .split("quality=")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(5.0);
        Ok(MetaScores {
            clarity: q,
            usefulness: q,
            depth: q,
            actionability: q,
            positivity: q,
        })
    }
}
