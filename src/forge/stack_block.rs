//! forge::stack_block
//!
//! The machine-readable stack block pancake writes into each PR's
//! description: a table of every branch in the stack with a marker for the
//! current position, rewritten idempotently on every `submit`/`restack`
//! without touching any human-authored text outside the block. Ported from
//! the teacher's `ui::stack_comment` (`generate_stack_comment`/
//! `merge_stack_comment`), renamed to this module's domain and adapted to
//! pancake's `BranchEntry`/`PrBinding` types instead of the teacher's
//! ad hoc `StackBranchInfo`.

const BLOCK_MARKER_START: &str = "<!-- pancake:stack:start -->";
const BLOCK_MARKER_END: &str = "<!-- pancake:stack:end -->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPosition {
    Ancestor,
    Current,
    Descendant,
}

impl StackPosition {
    fn indicator(self) -> &'static str {
        match self {
            StackPosition::Ancestor => "",
            StackPosition::Current => "👈",
            StackPosition::Descendant => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StackBranchInfo {
    pub name: String,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub position: StackPosition,
}

#[derive(Debug, Clone, Default)]
pub struct StackBlockInput {
    /// Top of stack first, trunk-most last — the natural reading order for
    /// a stack comment (spec §4.6).
    pub branches: Vec<StackBranchInfo>,
}

/// Render the stack block body (the markdown table plus its fence
/// markers). Pure function: no I/O.
pub fn generate_stack_block(input: &StackBlockInput) -> String {
    let mut out = String::new();
    out.push_str(BLOCK_MARKER_START);
    out.push('\n');
    out.push_str("### Stack\n\n");
    for branch in &input.branches {
        let link = match (&branch.pr_number, &branch.pr_url) {
            (Some(n), Some(url)) => format!("[#{n}]({url})"),
            _ => "(no PR)".to_string(),
        };
        out.push_str(&format!(
            "- {} `{}` {}\n",
            branch.position.indicator(),
            branch.name,
            link
        ));
    }
    out.push_str(BLOCK_MARKER_END);
    out
}

/// Merge a freshly generated stack block into an existing PR body, replacing
/// any previous block between the markers (searched outside fenced code
/// blocks, so a code sample that happens to contain the marker text is not
/// mistaken for the real block) and otherwise preserving the body verbatim.
/// Appends the block if no existing one is found.
pub fn merge_stack_block(existing_body: Option<&str>, block: &str) -> String {
    let Some(body) = existing_body else {
        return block.to_string();
    };

    match find_marker_bounds(body) {
        Some((start, end)) => {
            let mut merged = String::with_capacity(body.len() + block.len());
            merged.push_str(&body[..start]);
            merged.push_str(block);
            merged.push_str(&body[end..]);
            merged
        }
        None => {
            let mut merged = body.to_string();
            if !merged.is_empty() && !merged.ends_with('\n') {
                merged.push('\n');
            }
            merged.push('\n');
            merged.push_str(block);
            merged
        }
    }
}

fn find_marker_bounds(body: &str) -> Option<(usize, usize)> {
    let start = find_marker_outside_code_blocks(body, BLOCK_MARKER_START)?;
    let end_marker_pos = find_marker_outside_code_blocks(&body[start..], BLOCK_MARKER_END)?;
    let end = start + end_marker_pos + BLOCK_MARKER_END.len();
    Some((start, end))
}

/// Find the first occurrence of `marker` that is not inside a ``` fenced
/// code block.
fn find_marker_outside_code_blocks(text: &str, marker: &str) -> Option<usize> {
    let mut in_code_block = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
        } else if !in_code_block {
            if let Some(pos) = line.find(marker) {
                return Some(offset + pos);
            }
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StackBlockInput {
        StackBlockInput {
            branches: vec![
                StackBranchInfo {
                    name: "feature-b".into(),
                    pr_number: Some(2),
                    pr_url: Some("https://example.com/pr/2".into()),
                    position: StackPosition::Current,
                },
                StackBranchInfo {
                    name: "feature-a".into(),
                    pr_number: Some(1),
                    pr_url: Some("https://example.com/pr/1".into()),
                    position: StackPosition::Ancestor,
                },
            ],
        }
    }

    #[test]
    fn generates_fenced_block_with_current_indicator() {
        let block = generate_stack_block(&sample());
        assert!(block.starts_with(BLOCK_MARKER_START));
        assert!(block.ends_with(BLOCK_MARKER_END));
        assert!(block.contains("👈"));
    }

    #[test]
    fn merge_appends_when_no_existing_block() {
        let merged = merge_stack_block(Some("Human written description."), &generate_stack_block(&sample()));
        assert!(merged.starts_with("Human written description."));
        assert!(merged.contains(BLOCK_MARKER_START));
    }

    #[test]
    fn merge_replaces_existing_block_preserving_surrounding_text() {
        let first = generate_stack_block(&sample());
        let body = format!("Before.\n\n{first}\n\nAfter.");
        let mut updated_input = sample();
        updated_input.branches[0].pr_number = Some(99);
        let second = generate_stack_block(&updated_input);

        let merged = merge_stack_block(Some(&body), &second);
        assert!(merged.starts_with("Before."));
        assert!(merged.trim_end().ends_with("After."));
        assert!(merged.contains("#99"));
        assert!(!merged.contains("#2)"));
    }

    #[test]
    fn marker_inside_code_fence_is_ignored() {
        let fake = format!("```\n{BLOCK_MARKER_START}\nnot real\n{BLOCK_MARKER_END}\n```\n\nReal text.");
        let block = generate_stack_block(&sample());
        let merged = merge_stack_block(Some(&fake), &block);
        assert!(merged.contains("not real"));
        assert!(merged.contains("Real text."));
    }
}
