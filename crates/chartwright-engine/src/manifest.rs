//! Multi-document manifest cleanup
//!
//! A line whose trimmed text is `---` separates documents, except inside a
//! block scalar (`|`, `|-`, `>` ...), where it is content. The block runs
//! for as long as lines are blank or indented deeper than its header.

use once_cell::sync::Lazy;
use regex::Regex;

/// A line whose value is a block scalar indicator
static BLOCK_SCALAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^\s*|:\s+|-\s+)[|>][1-9+-]{0,2}\s*(?:#.*)?$").expect("valid regex")
});

pub const SEPARATOR: &str = "---";

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Split rendered text into documents on real separator lines
///
/// Empty documents are kept; see [`normalize`] to drop them.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut block_indent: Option<usize> = None;

    for line in text.lines() {
        if let Some(indent) = block_indent {
            if line.trim().is_empty() || indentation(line) > indent {
                current.push(line);
                continue;
            }
            block_indent = None;
        }
        if line.trim() == SEPARATOR {
            docs.push(current.join("\n"));
            current.clear();
            continue;
        }
        if BLOCK_SCALAR.is_match(line) {
            block_indent = Some(indentation(line));
        }
        current.push(line);
    }
    docs.push(current.join("\n"));
    docs
}

/// Trim a document, or `None` when nothing but blanks and comments remain
fn clean_document(doc: &str) -> Option<String> {
    let has_content = doc.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    });
    if !has_content {
        return None;
    }
    let start = doc
        .lines()
        .take_while(|line| line.trim().is_empty())
        .map(|line| line.len() + 1)
        .sum::<usize>()
        .min(doc.len());
    Some(doc[start..].trim_end().to_string())
}

/// Clean concatenated template output into a multi-document YAML stream
///
/// Runs of separators collapse to one, leading and trailing separators go
/// away, and documents that are blank or only comments are dropped. The
/// result ends with a newline unless it is empty. Normalizing twice gives
/// the same text as normalizing once.
pub fn normalize(text: &str) -> String {
    let docs: Vec<String> = split_documents(text)
        .iter()
        .filter_map(|doc| clean_document(doc))
        .collect();
    if docs.is_empty() {
        return String::new();
    }
    let mut out = docs.join("\n---\n");
    out.push('\n');
    out
}

/// Whether the last non-blank line of `output` is a separator
pub fn ends_with_separator(output: &str) -> bool {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.trim() == SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_separators() {
        let text = "---\n\n---\na: 1\n---\n---\n\nb: 2\n---\n";
        assert_eq!(normalize(text), "a: 1\n---\nb: 2\n");
    }

    #[test]
    fn test_normalize_drops_comment_only_documents() {
        let text = "# Source: chart/templates/empty.yaml\n---\n# only a comment\n\n---\nkind: Service\n";
        assert_eq!(normalize(text), "kind: Service\n");
    }

    #[test]
    fn test_separator_inside_block_scalar_is_content() {
        let text = "kind: ConfigMap\ndata:\n  script: |-\n    echo one\n    ---\n    echo two\n---\nkind: Secret\n";
        let docs = split_documents(text);
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("    ---"));
        assert_eq!(normalize(text).lines().filter(|l| *l == "---").count(), 1);
    }

    #[test]
    fn test_block_scalar_ends_at_dedent() {
        let text = "a: |\n  text\nb: c\n  ---\nd: e\n";
        let docs = split_documents(text);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1], "d: e");
    }

    #[test]
    fn test_list_item_block_scalar() {
        let text = "args:\n  - >-\n    ---\n  - plain\n";
        assert_eq!(split_documents(text).len(), 1);
    }

    #[test]
    fn test_quoted_pipe_is_not_block_scalar() {
        let text = "cmd: \"a | b\"\n---\nnext: 1\n";
        assert_eq!(split_documents(text).len(), 2);
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "",
            "---\n",
            "a: 1\n---\nb: |\n  x\n  ---\n  y\n---\n\n---\n#c\n",
            "\n\n  x: 1\n   \n---   \ny: 2",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_ends_with_separator() {
        assert!(ends_with_separator("a: 1\n---\n"));
        assert!(ends_with_separator("a: 1\n---  \n\n"));
        assert!(!ends_with_separator("a: 1\n"));
        assert!(!ends_with_separator(""));
    }
}
