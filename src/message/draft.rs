//! The working commit message and its conventional-commit text form.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Header of a conventional commit: `type(scope)!: subject`.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^()]*)\))?(?P<bang>!)?:\s*(?P<subject>.*)$")
        .expect("header regex is valid")
});

/// Trailer line in a footer: `Token: value`, `Token #value` or `BREAKING CHANGE: ...`.
static TRAILER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(BREAKING[ -]CHANGE|[A-Za-z][A-Za-z0-9-]*)(: | #)\S")
        .expect("trailer regex is valid")
});

/// In-progress commit message, owned by the workflow for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMessageDraft {
    pub commit_type: String,
    pub scope: String,
    pub subject: String,
    pub body: String,
    pub footer: String,
    /// `!` after the type or scope.
    pub breaking: bool,
    pub include_signoff: bool,
}

impl CommitMessageDraft {
    /// Parse free-form AI output into draft fields.
    ///
    /// Tolerates leading chatter and markdown fences. The first line that
    /// looks like a conventional header becomes the header; if none does, the
    /// first non-empty line becomes the subject with an empty type so the
    /// validator flags it. A trailing paragraph made only of trailers becomes
    /// the footer; everything in between is the body.
    pub fn parse(text: &str, include_signoff: bool) -> Option<Self> {
        let stripped = strip_fences(text);
        let lines: Vec<&str> = stripped.lines().map(str::trim_end).collect();

        let header_idx = lines
            .iter()
            .position(|line| HEADER_RE.is_match(line.trim()))
            .or_else(|| lines.iter().position(|line| !line.trim().is_empty()))?;

        let header = lines[header_idx].trim();
        let mut draft = Self::blank(include_signoff);

        match HEADER_RE.captures(header) {
            Some(caps) => {
                draft.commit_type = caps["type"].to_lowercase();
                draft.scope = caps
                    .name("scope")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                draft.subject = caps["subject"].trim().to_string();
                draft.breaking = caps.name("bang").is_some();
            }
            None => draft.subject = header.to_string(),
        }

        let rest = lines[header_idx + 1..].join("\n");
        let paragraphs: Vec<&str> = rest
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let (body_paragraphs, footer) = match paragraphs.split_last() {
            Some((last, init)) if is_footer(last) => (init, Some(*last)),
            _ => (paragraphs.as_slice(), None),
        };

        draft.body = body_paragraphs.join("\n\n");
        if let Some(footer) = footer {
            draft.footer = footer
                .lines()
                .filter(|l| !l.starts_with("Signed-off-by:"))
                .collect::<Vec<_>>()
                .join("\n");
        }

        Some(draft)
    }

    /// The header line: `type(scope)!: subject`.
    pub fn header(&self) -> String {
        let mut header = String::new();
        if !self.commit_type.is_empty() {
            header.push_str(&self.commit_type);
            if !self.scope.is_empty() {
                header.push('(');
                header.push_str(&self.scope);
                header.push(')');
            }
            if self.breaking {
                header.push('!');
            }
            header.push_str(": ");
        }
        header.push_str(&self.subject);
        header
    }

    /// Format the message for git.
    ///
    /// Produces:
    /// ```text
    /// type(scope): subject
    ///
    /// Body text explaining why.
    ///
    /// Refs: #42
    /// Signed-off-by: Name <email>
    /// ```
    ///
    /// `signoff` is the `Name <email>` identity; the trailer is only added
    /// when the draft asks for it and is never duplicated.
    pub fn render(&self, signoff: Option<&str>) -> String {
        let mut parts = vec![self.header()];

        let body = self.body.trim();
        if !body.is_empty() {
            parts.push(String::new());
            parts.push(body.to_string());
        }

        let mut trailers: Vec<String> = Vec::new();
        let footer = self.footer.trim();
        if !footer.is_empty() {
            trailers.push(footer.to_string());
        }
        if self.include_signoff
            && let Some(identity) = signoff
        {
            let line = format!("Signed-off-by: {identity}");
            if !footer.contains(&line) {
                trailers.push(line);
            }
        }

        if !trailers.is_empty() {
            parts.push(String::new());
            parts.push(trailers.join("\n"));
        }

        parts.join("\n")
    }

    /// Draft with every content field empty, keeping the signoff choice.
    pub fn blank(include_signoff: bool) -> Self {
        Self {
            include_signoff,
            ..Default::default()
        }
    }
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_footer(paragraph: &str) -> bool {
    paragraph.lines().all(|line| TRAILER_RE.is_match(line.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_only() {
        let draft = CommitMessageDraft::parse("feat: add usage section", true).unwrap();
        assert_eq!(draft.commit_type, "feat");
        assert_eq!(draft.scope, "");
        assert_eq!(draft.subject, "add usage section");
        assert!(draft.body.is_empty());
        assert!(draft.include_signoff);
    }

    #[test]
    fn test_parse_scope_body_and_footer() {
        let text = "fix(parser): handle empty input\n\nThe parser crashed on empty\nfiles.\n\nRefs: #42\nReviewed-by: Sam";
        let draft = CommitMessageDraft::parse(text, false).unwrap();
        assert_eq!(draft.commit_type, "fix");
        assert_eq!(draft.scope, "parser");
        assert_eq!(draft.subject, "handle empty input");
        assert_eq!(draft.body, "The parser crashed on empty\nfiles.");
        assert_eq!(draft.footer, "Refs: #42\nReviewed-by: Sam");
    }

    #[test]
    fn test_parse_skips_chatter_and_fences() {
        let text = "Here is your commit message:\n```\nchore(deps): bump serde\n```\n";
        let draft = CommitMessageDraft::parse(text, false).unwrap();
        assert_eq!(draft.commit_type, "chore");
        assert_eq!(draft.scope, "deps");
        assert_eq!(draft.subject, "bump serde");
    }

    #[test]
    fn test_parse_non_conventional_keeps_subject() {
        let draft = CommitMessageDraft::parse("Update the readme", false).unwrap();
        assert!(draft.commit_type.is_empty());
        assert_eq!(draft.subject, "Update the readme");
    }

    #[test]
    fn test_parse_breaking_bang() {
        let draft = CommitMessageDraft::parse("feat(api)!: drop v1 endpoints", false).unwrap();
        assert_eq!(draft.subject, "drop v1 endpoints");
        assert!(draft.breaking);
        assert!(draft.footer.is_empty());
        assert_eq!(draft.header(), "feat(api)!: drop v1 endpoints");
    }

    #[test]
    fn test_breaking_footer_is_kept_as_written() {
        let text =
            "refactor!: rename config keys\n\nBREAKING CHANGE: `timeout` is now `timeout_secs`";
        let draft = CommitMessageDraft::parse(text, false).unwrap();
        assert!(draft.breaking);
        assert_eq!(draft.footer, "BREAKING CHANGE: `timeout` is now `timeout_secs`");
        assert_eq!(
            draft.render(None),
            "refactor!: rename config keys\n\nBREAKING CHANGE: `timeout` is now `timeout_secs`"
        );
    }

    #[test]
    fn test_parse_drops_existing_signoff_line() {
        let text = "docs: fix typo\n\nSigned-off-by: Bot <bot@example.com>";
        let draft = CommitMessageDraft::parse(text, true).unwrap();
        assert!(draft.footer.is_empty());
    }

    #[test]
    fn test_parse_empty_returns_none() {
        assert!(CommitMessageDraft::parse("   \n\n", false).is_none());
    }

    #[test]
    fn test_render_subject_only() {
        let draft = CommitMessageDraft::parse("feat(auth): add login endpoint", false).unwrap();
        assert_eq!(draft.render(None), "feat(auth): add login endpoint");
    }

    #[test]
    fn test_render_with_body_and_signoff() {
        let draft = CommitMessageDraft {
            commit_type: "fix".into(),
            scope: "api".into(),
            subject: "handle timeout".into(),
            body: "Large repos hit the limit.".into(),
            footer: "Refs: #7".into(),
            breaking: false,
            include_signoff: true,
        };
        assert_eq!(
            draft.render(Some("Test User <test@example.com>")),
            "fix(api): handle timeout\n\nLarge repos hit the limit.\n\nRefs: #7\nSigned-off-by: Test User <test@example.com>"
        );
    }

    #[test]
    fn test_render_omits_signoff_when_not_requested() {
        let draft = CommitMessageDraft {
            commit_type: "chore".into(),
            subject: "bump deps".into(),
            body: "  ".into(),
            ..Default::default()
        };
        assert_eq!(draft.render(Some("A <a@b.c>")), "chore: bump deps");
    }

    #[test]
    fn test_blank_keeps_signoff_choice() {
        let draft = CommitMessageDraft::blank(true);
        assert!(draft.include_signoff);
        assert!(draft.subject.is_empty());
        assert_eq!(draft.header(), "");
    }
}
