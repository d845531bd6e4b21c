//! Commit message prompt construction and diff sanitization.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::git::{FileChange, RepositoryState};
use crate::message::validate::{COMMIT_TYPES, DEFAULT_MAX_HEADER_LENGTH, MAX_BODY_LINE_LENGTH};

/// Upper bound on diff text across all files in one prompt.
pub const MAX_PROMPT_DIFF_LENGTH: usize = 40_000;

/// Unstaged paths listed for context before the list is cut short.
const MAX_UNSTAGED_LISTED: usize = 50;

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07")
        .expect("ansi regex is valid")
});

/// Phrases commonly used to hijack an instruction-following model.
static INJECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(ignore|disregard|forget)\s+(all\s+)?(the\s+)?(previous|prior|above)\s+(instructions|prompts?|context)|you\s+are\s+now\s+|new\s+instructions\s*:|system\s+prompt",
    )
    .expect("injection regex is valid")
});

/// Build the prompt asking for a conventional commit message for the staged
/// changes in `state`.
pub fn build_commit_prompt(state: &RepositoryState) -> String {
    let mut prompt = format!(
        r#"You are writing a git commit message for the staged changes below.

Use the Conventional Commits format:

<type>(<optional scope>): <subject>

<optional body>

<optional footer>

## Rules
1. type is one of: {types}
2. scope is optional, lowercase, and names the area touched (e.g. cli, git)
3. subject is imperative, lowercase, with no trailing period
4. the header line is at most {header} characters
5. body lines are at most {body} characters; explain what changed and why
6. do not add a Signed-off-by trailer
7. respond with the commit message only, no commentary and no code fences
"#,
        types = COMMIT_TYPES.join(", "),
        header = DEFAULT_MAX_HEADER_LENGTH,
        body = MAX_BODY_LINE_LENGTH,
    );

    prompt.push_str("\n## Staged files\n");
    for change in &state.staged_changes {
        push_change_line(&mut prompt, change);
    }

    prompt.push_str("\n## Staged diff\n");
    let mut budget = MAX_PROMPT_DIFF_LENGTH;
    for change in &state.staged_changes {
        let Some(diff) = &change.diff else {
            let _ = writeln!(prompt, "\n### {} (diff omitted)", change.path);
            continue;
        };
        let diff = sanitize_diff(diff);
        if diff.len() > budget {
            let _ = writeln!(prompt, "\n### {} (diff omitted, prompt size limit)", change.path);
            budget = 0;
            continue;
        }
        budget -= diff.len();
        let _ = writeln!(prompt, "\n### {}\n{}", change.path, diff);
    }

    if !state.unstaged_changes.is_empty() {
        prompt.push_str("\n## Not staged (context only, not part of this commit)\n");
        for change in state.unstaged_changes.iter().take(MAX_UNSTAGED_LISTED) {
            push_change_line(&mut prompt, change);
        }
        let hidden = state.unstaged_changes.len().saturating_sub(MAX_UNSTAGED_LISTED);
        if hidden > 0 {
            let _ = writeln!(prompt, "- ... and {hidden} more");
        }
    }

    prompt
}

fn push_change_line(prompt: &mut String, change: &FileChange) {
    let path = sanitize_line(&change.path);
    let _ = match &change.old_path {
        Some(old) => writeln!(prompt, "- {}: {} -> {}", change.status, sanitize_line(old), path),
        None => writeln!(prompt, "- {}: {}", change.status, path),
    };
}

/// Make untrusted diff text safe to embed in a prompt.
///
/// Strips ANSI escapes and control characters (keeping newlines and tabs),
/// neutralizes injection phrases and code fences, and collapses runs of blank
/// lines.
pub fn sanitize_diff(diff: &str) -> String {
    let text = ANSI_RE.replace_all(diff, "");
    let text: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let text = INJECTION_RE.replace_all(&text, "[filtered]");
    let text = text.replace("```", "'''");

    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn sanitize_line(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}
