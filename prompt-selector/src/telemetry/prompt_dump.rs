//! Prompt telemetry: optional dumps of the exact prompts sent to the LLM.
//!
//! Files land under `code_data/selector_tmp/pr<N>/prompts/<nnn>_<prompt>.txt`.
//!
//! ## Env flags
//! - `SELECTOR_LOG_PROMPTS` (bool): enable dumps (default: false)
//! - `SELECTOR_PROMPT_REDACT` (bool): redact secrets (default: true)
//! - `SELECTOR_PROMPT_MAX_CHARS` (usize): 0 = no truncation (default: 0)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{env_flag, env_usize};
use crate::prompts::RenderedPrompt;

lazy_static! {
    static ref SECRET_PATTERNS: Vec<Regex> = [
        r"\bghp_[A-Za-z0-9]{20,}",
        r"\bgithub_pat_[A-Za-z0-9_]{20,}",
        r"\bgsk_[A-Za-z0-9]{20,}",
        r"\bsk-[A-Za-z0-9\-_]{20,}",
        r"(?i)\bBearer\s+[A-Za-z0-9\-_\.=]{16,}",
        r"(?i)\btoken\s*[:=]\s*[A-Za-z0-9\-_\.=]{16,}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

static DUMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Replaces token-looking substrings with `[REDACTED]`.
pub fn redact_secrets(s: &str) -> String {
    let mut out = s.to_string();
    for re in SECRET_PATTERNS.iter() {
        out = re.replace_all(&out, "[REDACTED]").into_owned();
    }
    out
}

fn maybe_truncate(s: String, max_chars: usize) -> (String, bool) {
    if max_chars == 0 || s.chars().count() <= max_chars {
        return (s, false);
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("\n\n[... TRUNCATED ...]\n");
    (out, true)
}

/// Prompt name as a file-name segment.
fn sanitize_for_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn dump_dir(pr_number: u64) -> PathBuf {
    Path::new("code_data")
        .join("selector_tmp")
        .join(format!("pr{pr_number}"))
        .join("prompts")
}

/// Formats a dump body; redaction and truncation applied.
fn dump_body(prompt: &RenderedPrompt, redact: bool, max_chars: usize) -> (String, bool) {
    let mut content = format!("### system\n{}\n\n### user\n{}", prompt.system, prompt.user);
    if redact {
        content = redact_secrets(&content);
    }
    maybe_truncate(content, max_chars)
}

/// Writes the rendered prompt to disk when `SELECTOR_LOG_PROMPTS` is on.
/// Never fails the caller; write errors are logged.
pub fn dump_prompt(pr_number: u64, prompt_name: &str, prompt: &RenderedPrompt) {
    if !env_flag("SELECTOR_LOG_PROMPTS", false) {
        return;
    }
    let redact = env_flag("SELECTOR_PROMPT_REDACT", true);
    let max_chars = env_usize("SELECTOR_PROMPT_MAX_CHARS", 0);
    let (content, truncated) = dump_body(prompt, redact, max_chars);

    let dir = dump_dir(pr_number);
    let seq = DUMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let file = dir.join(format!("{seq:03}_{}.txt", sanitize_for_name(prompt_name)));
    if let Err(e) = std::fs::create_dir_all(&dir).and_then(|()| std::fs::write(&file, &content)) {
        warn!(file = %file.display(), error = %e, "prompt dump failed");
        return;
    }

    debug!(
        pr = pr_number,
        prompt = prompt_name,
        file = %file.display(),
        len = content.chars().count(),
        truncated,
        "prompt dumped"
    );
}
