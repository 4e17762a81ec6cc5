//! Review scoring: LLM judgement blended with [`HeuristicMetrics`].
//!
//! `score = 0.6 * meta_mean + 10 * (0.15 L + 0.10 B + 0.10 S + 0.05 M)`
//!
//! - `L`: length term, 1.0 inside the 80..=800 word band, linear ramp below,
//!   `800 / words` above.
//! - `B`: bullets, capped at 10.
//! - `S`: fraction of summary/issues/suggestions sections present.
//! - `M`: 0.5 for mentioning bugs plus 0.5 for making suggestions.
//!
//! Every term lies in [0, 1] so the weighted sum lies in [0, 10]. When the
//! judge fails the score is the neutral [`NEUTRAL_SCORE`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::MetaEvalError;
use crate::heuristics::{HeuristicMetrics, heuristic_metrics};

pub const NEUTRAL_SCORE: f64 = 5.0;

const META_WEIGHT: f64 = 0.6;
const LENGTH_WEIGHT: f64 = 0.15;
const BULLET_WEIGHT: f64 = 0.10;
const SECTION_WEIGHT: f64 = 0.10;
const MENTION_WEIGHT: f64 = 0.05;
const HEURISTIC_WEIGHT: f64 = LENGTH_WEIGHT + BULLET_WEIGHT + SECTION_WEIGHT + MENTION_WEIGHT;

const BAND_LOW: f64 = 80.0;
const BAND_HIGH: f64 = 800.0;
const BULLET_CAP: usize = 10;

/// LLM-judged sub-scores, each on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetaScores {
    pub clarity: f64,
    pub usefulness: f64,
    pub depth: f64,
    pub actionability: f64,
    pub positivity: f64,
}

impl MetaScores {
    pub const FIELDS: [&'static str; 5] =
        ["clarity", "usefulness", "depth", "actionability", "positivity"];

    pub fn mean(&self) -> f64 {
        (self.clarity + self.usefulness + self.depth + self.actionability + self.positivity) / 5.0
    }

    /// Copy with every sub-score clamped into [0, 10].
    pub fn clamped(self) -> Self {
        let c = |v: f64| if v.is_finite() { v.clamp(0.0, 10.0) } else { 0.0 };
        Self {
            clarity: c(self.clarity),
            usefulness: c(self.usefulness),
            depth: c(self.depth),
            actionability: c(self.actionability),
            positivity: c(self.positivity),
        }
    }
}

/// Optional side inputs the generator may have produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewExtras<'a> {
    pub static_output: Option<&'a str>,
    pub context: Option<&'a str>,
}

/// LLM judge of review quality.
#[allow(async_fn_in_trait)]
pub trait MetaEvaluator {
    async fn meta_evaluate(
        &self,
        diff: &str,
        review: &str,
        extras: ReviewExtras<'_>,
    ) -> Result<MetaScores, MetaEvalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub heuristics: HeuristicMetrics,
    pub meta: Result<MetaScores, MetaEvalError>,
}

impl Evaluation {
    /// Meta sub-scores as JSON, or `{"error": ...}` when the judge failed.
    pub fn meta_json(&self) -> serde_json::Value {
        match &self.meta {
            Ok(m) => serde_json::to_value(m).unwrap_or(serde_json::Value::Null),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        }
    }
}

/// Length appropriateness in [0, 1].
pub fn length_term(words: usize) -> f64 {
    let w = words as f64;
    if w < BAND_LOW {
        w / BAND_LOW
    } else if w <= BAND_HIGH {
        1.0
    } else {
        BAND_HIGH / w
    }
}

fn weighted_heuristics(h: &HeuristicMetrics) -> f64 {
    let l = length_term(h.length_words);
    let b = h.bullet_points.min(BULLET_CAP) as f64 / BULLET_CAP as f64;
    let s = h.sections_present() as f64 / 3.0;
    let m = 0.5 * (h.mentions_bug as u8 as f64) + 0.5 * (h.mentions_suggest as u8 as f64);
    LENGTH_WEIGHT * l + BULLET_WEIGHT * b + SECTION_WEIGHT * s + MENTION_WEIGHT * m
}

/// Non-LLM part alone, rescaled to 0-10.
pub fn heuristic_score(h: &HeuristicMetrics) -> f64 {
    (10.0 * weighted_heuristics(h) / HEURISTIC_WEIGHT).clamp(0.0, 10.0)
}

/// Final composite score in [0, 10].
pub fn combine(meta: &MetaScores, h: &HeuristicMetrics) -> f64 {
    let score = META_WEIGHT * meta.clamped().mean() + 10.0 * weighted_heuristics(h);
    score.clamp(0.0, 10.0)
}

/// Scores `review`; a failed judgement yields exactly [`NEUTRAL_SCORE`].
pub async fn evaluate_review<J: MetaEvaluator>(
    judge: &J,
    diff: &str,
    review: &str,
    extras: ReviewExtras<'_>,
) -> Evaluation {
    let heuristics = heuristic_metrics(review);
    let meta = judge.meta_evaluate(diff, review, extras).await;

    let score = match &meta {
        Ok(m) => combine(m, &heuristics),
        Err(e) => {
            warn!(error = %e, "meta evaluation failed, using neutral score");
            NEUTRAL_SCORE
        }
    };
    debug!(
        score,
        words = heuristics.length_words,
        bullets = heuristics.bullet_points,
        "review evaluated"
    );

    Evaluation {
        score,
        heuristics,
        meta,
    }
}
