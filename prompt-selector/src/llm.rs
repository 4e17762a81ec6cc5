//! LLM-backed collaborators: review generation and review judging.

use std::time::Instant;

use ai_llm_service::LlmClient;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::{MetaEvalError, SelectorResult};
use crate::prompts::{MAX_SECTION_CHARS, PromptTemplate, STATIC_UNAVAILABLE, truncate_chars};
use crate::scoring::{MetaEvaluator, MetaScores, ReviewExtras};
use crate::telemetry::prompt_dump::dump_prompt;

/// One generated review plus whatever side inputs were used for it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReview {
    pub review: String,
    pub static_output: Option<String>,
    pub context: Option<String>,
}

impl GeneratedReview {
    pub fn extras(&self) -> ReviewExtras<'_> {
        ReviewExtras {
            static_output: self.static_output.as_deref(),
            context: self.context.as_deref(),
        }
    }
}

/// Produces a review for a diff with a given prompt template.
#[allow(async_fn_in_trait)]
pub trait ReviewGenerator {
    async fn generate(
        &self,
        pr_number: u64,
        diff: &str,
        prompt: &PromptTemplate,
    ) -> SelectorResult<GeneratedReview>;
}

/// [`ReviewGenerator`] over an [`LlmClient`].
pub struct LlmReviewGenerator {
    client: LlmClient,
}

impl LlmReviewGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl ReviewGenerator for LlmReviewGenerator {
    #[instrument(
        skip_all,
        fields(pr = pr_number, prompt = %prompt.name, model = %self.client.model())
    )]
    async fn generate(
        &self,
        pr_number: u64,
        diff: &str,
        prompt: &PromptTemplate,
    ) -> SelectorResult<GeneratedReview> {
        let rendered = prompt.render(diff, STATIC_UNAVAILABLE);
        dump_prompt(pr_number, &prompt.name, &rendered);

        let t0 = Instant::now();
        let review = self
            .client
            .chat(Some(&rendered.system), &rendered.user)
            .await?;
        debug!(
            latency_ms = t0.elapsed().as_millis() as u64,
            chars = review.len(),
            "review generated"
        );

        Ok(GeneratedReview {
            review,
            static_output: Some(STATIC_UNAVAILABLE.to_string()),
            context: None,
        })
    }
}

/* ------------------------------------------------------------------------- */
/* Judge                                                                     */
/* ------------------------------------------------------------------------- */

const JUDGE_SYSTEM: &str = "You are an expert reviewer of code reviews. \
                            Answer with a single JSON object and nothing else.";

/// [`MetaEvaluator`] that asks an LLM to grade a review on five axes.
pub struct LlmMetaEvaluator {
    client: LlmClient,
}

impl LlmMetaEvaluator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

pub fn build_judge_prompt(diff: &str, review: &str, extras: ReviewExtras<'_>) -> String {
    let (diff, _) = truncate_chars(diff, MAX_SECTION_CHARS);
    let (review, _) = truncate_chars(review, MAX_SECTION_CHARS);

    let mut s = String::new();
    s.push_str("Rate the following pull-request review. Score each criterion from 0 to 10:\n");
    s.push_str("- clarity: is it easy to follow?\n");
    s.push_str("- usefulness: would it help the author?\n");
    s.push_str("- depth: does it go beyond surface issues?\n");
    s.push_str("- actionability: are the suggestions concrete?\n");
    s.push_str("- positivity: is the tone constructive?\n");
    s.push_str("\n# Diff\n```diff\n");
    s.push_str(diff);
    s.push_str("\n```\n");
    if let Some(stat) = extras.static_output {
        s.push_str("\n# Static analysis\n");
        s.push_str(truncate_chars(stat, MAX_SECTION_CHARS).0);
        s.push('\n');
    }
    if let Some(ctx) = extras.context {
        s.push_str("\n# Retrieved context\n");
        s.push_str(truncate_chars(ctx, MAX_SECTION_CHARS).0);
        s.push('\n');
    }
    s.push_str("\n# Review\n");
    s.push_str(review);
    s.push_str("\n\nRespond with JSON only:\n");
    s.push_str(
        r#"{"clarity": n, "usefulness": n, "depth": n, "actionability": n, "positivity": n}"#,
    );
    s.push('\n');
    s
}

/// First complete JSON object in `raw` that names a sub-score, else the first
/// object at all. Text after an object's closing brace is ignored.
fn first_json_object(raw: &str) -> Result<Value, MetaEvalError> {
    let mut fallback = None;
    let mut last_err = None;
    for (start, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => {
                if MetaScores::FIELDS.iter().any(|f| map.contains_key(*f)) {
                    return Ok(Value::Object(map));
                }
                fallback.get_or_insert(Value::Object(map));
            }
            Some(Err(e)) => last_err = Some(e.to_string()),
            _ => {}
        }
    }
    fallback.ok_or_else(|| {
        MetaEvalError::Parse(last_err.unwrap_or_else(|| "no JSON object in judge output".into()))
    })
}

/// Reads the five sub-scores from the judge's JSON object.
/// Numbers given as strings are accepted; values are clamped into [0, 10].
pub fn parse_meta_scores(raw: &str) -> Result<MetaScores, MetaEvalError> {
    let v = first_json_object(raw)?;

    let field = |name: &'static str| -> Result<f64, MetaEvalError> {
        let x = match v.get(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        x.filter(|x| x.is_finite()).ok_or(MetaEvalError::Field(name))
    };

    Ok(MetaScores {
        clarity: field("clarity")?,
        usefulness: field("usefulness")?,
        depth: field("depth")?,
        actionability: field("actionability")?,
        positivity: field("positivity")?,
    }
    .clamped())
}

impl MetaEvaluator for LlmMetaEvaluator {
    #[instrument(skip_all, fields(model = %self.client.model()))]
    async fn meta_evaluate(
        &self,
        diff: &str,
        review: &str,
        extras: ReviewExtras<'_>,
    ) -> Result<MetaScores, MetaEvalError> {
        let prompt = build_judge_prompt(diff, review, extras);
        let raw = self
            .client
            .chat(Some(JUDGE_SYSTEM), &prompt)
            .await
            .map_err(|e| MetaEvalError::Upstream(e.to_string()))?;
        parse_meta_scores(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"clarity\": 8, \"usefulness\": 7.5, \
                   \"depth\": \"6\", \"actionability\": 9, \"positivity\": 12}\n```";
        let m = parse_meta_scores(raw).unwrap();
        assert_eq!(m.clarity, 8.0);
        assert_eq!(m.usefulness, 7.5);
        assert_eq!(m.depth, 6.0);
        assert_eq!(m.positivity, 10.0);
    }

    #[test]
    fn ignores_braces_after_the_object() {
        let raw = "{\"clarity\": 8, \"usefulness\": 8, \"depth\": 8, \"actionability\": 8, \
                   \"positivity\": 8}\nNote: the review left the `{}` placeholder in the log call.";
        let m = parse_meta_scores(raw).unwrap();
        assert_eq!(m.clarity, 8.0);
        assert_eq!(m.positivity, 8.0);
    }

    #[test]
    fn skips_braces_before_the_object() {
        let raw = "The `{}` format is fine.\n{\"clarity\": 6, \"usefulness\": 5, \"depth\": 4, \
                   \"actionability\": 3, \"positivity\": 2}";
        let m = parse_meta_scores(raw).unwrap();
        assert_eq!(m.clarity, 6.0);
        assert_eq!(m.positivity, 2.0);
    }

    #[test]
    fn reports_missing_field() {
        let raw = r#"{"clarity": 8, "usefulness": 7, "depth": 6, "actionability": 9}"#;
        assert_eq!(parse_meta_scores(raw), Err(MetaEvalError::Field("positivity")));
    }

    #[test]
    fn reports_unparseable_output() {
        assert!(matches!(parse_meta_scores("no json here"), Err(MetaEvalError::Parse(_))));
        assert!(matches!(parse_meta_scores("{not: json}"), Err(MetaEvalError::Parse(_))));
    }

    #[test]
    fn judge_prompt_includes_optional_sections() {
        let p = build_judge_prompt(
            "+x",
            "looks fine",
            ReviewExtras {
                static_output: Some("clippy: ok"),
                context: None,
            },
        );
        assert!(p.contains("+x"));
        assert!(p.contains("clippy: ok"));
        assert!(!p.contains("# Retrieved context"));
        for f in MetaScores::FIELDS {
            assert!(p.contains(f));
        }
    }
}
