//! Positioned messages for configuration documents that fail to parse.

use crate::error::TreeError;
use serde_json::error::Category;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    /// A value of the wrong JSON kind; `detail` names the value and the
    /// expected type.
    Type { detail: String },
    Other { detail: String },
}

/// Where a document went wrong, with the offending source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based byte offset of the failure within `context`.
    pub column: usize,
    /// The full source line containing the failure.
    pub context: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Blank out everything before the failing column, keeping tabs so the
    /// caret lines up under tab-indented source. `column` counts bytes, so a
    /// multi-byte character takes one blank.
    pub fn caret(&self) -> String {
        let limit = self.column.saturating_sub(1);
        let mut caret = String::with_capacity(limit + 1);
        let mut consumed = 0;
        for (idx, c) in self.context.char_indices() {
            if idx >= limit {
                break;
            }
            caret.push(if c == '\t' { '\t' } else { ' ' });
            consumed = idx + c.len_utf8();
        }
        caret.extend(std::iter::repeat(' ').take(limit.saturating_sub(consumed)));
        caret.push('^');
        caret
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Syntax => write!(
                f,
                "{}:{}: syntax error at offset {}:\n{}\n{}",
                self.file,
                self.line,
                self.column,
                self.context,
                self.caret()
            ),
            DiagnosticKind::Type { detail } => write!(
                f,
                "{}:{}: unable to assign value: {}:\n{}\n{}",
                self.file,
                self.line,
                detail,
                self.context,
                self.caret()
            ),
            DiagnosticKind::Other { detail } => {
                write!(f, "{}: unknown error: {}", self.file, detail)
            }
        }
    }
}

/// Turn a `serde_json` failure on `content` into a loader error.
///
/// A failure at the very start of the document means there was nothing
/// usable to parse and is reported as [`TreeError::EmptyDefinition`].
pub fn describe(file: &str, content: &str, err: &serde_json::Error) -> TreeError {
    let line = err.line();
    let column = err.column();
    let context = content
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or_default()
        .to_string();

    let kind = match err.classify() {
        Category::Syntax | Category::Eof => {
            if line <= 1 && column <= 1 {
                return TreeError::EmptyDefinition;
            }
            DiagnosticKind::Syntax
        }
        Category::Data => DiagnosticKind::Type {
            detail: strip_position(err),
        },
        Category::Io => DiagnosticKind::Other {
            detail: err.to_string(),
        },
    };

    TreeError::Malformed(Diagnostic {
        file: file.to_string(),
        line,
        column,
        context,
        kind,
    })
}

/// `serde_json` appends " at line L column C" to every message; the
/// diagnostic prints its own position.
fn strip_position(err: &serde_json::Error) -> String {
    let message = err.to_string();
    let suffix = format!(" at line {} column {}", err.line(), err.column());
    match message.strip_suffix(&suffix) {
        Some(stripped) => stripped.to_string(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fail(content: &str) -> TreeError {
        let err = serde_json::from_str::<serde_json::Value>(content).unwrap_err();
        describe("defs.json", content, &err)
    }

    #[test]
    fn syntax_error_points_at_the_offending_column() {
        let content = "{\n  \"Functions\": {\n    \"GET /a\" [\"DATA x\"]\n  }\n}";
        let TreeError::Malformed(diag) = fail(content) else {
            panic!("expected a positioned diagnostic");
        };

        assert_eq!(diag.line, 3);
        assert_eq!(diag.context, "    \"GET /a\" [\"DATA x\"]");
        assert_eq!(diag.kind, DiagnosticKind::Syntax);

        let rendered = diag.to_string();
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("defs.json:3: syntax error at offset {}:", diag.column)
        );
        assert_eq!(lines.next().unwrap(), diag.context);
        let caret = lines.next().unwrap();
        assert_eq!(caret.len(), diag.column);
        assert!(caret.ends_with('^'));
    }

    #[test]
    fn caret_preserves_tabs() {
        let diag = Diagnostic {
            file: "f".into(),
            line: 2,
            column: 4,
            context: "\t\tx y".into(),
            kind: DiagnosticKind::Syntax,
        };
        assert_eq!(diag.caret(), "\t\t ^");
    }

    #[test]
    fn caret_counts_multibyte_characters_once() {
        let context = "\"/é\" x".to_string();
        let column = context.find('x').unwrap() + 1;
        let diag = Diagnostic {
            file: "f".into(),
            line: 1,
            column,
            context,
            kind: DiagnosticKind::Syntax,
        };
        assert_eq!(diag.caret(), "     ^");
    }

    #[test]
    fn caret_follows_a_real_error_after_non_ascii_text() {
        let content = "{\"Functions\": {\"GET /café\" [\"DATA x\"]}}";
        let TreeError::Malformed(diag) = fail(content) else {
            panic!("expected a positioned diagnostic");
        };
        let caret = diag.caret();
        let blanks = caret.chars().count() - 1;
        let expected = content[..diag.column - 1].chars().count();
        assert_eq!(blanks, expected);
    }

    #[test]
    fn failure_at_document_start_is_empty_definition() {
        assert!(matches!(fail(""), TreeError::EmptyDefinition));
        assert!(matches!(fail("x"), TreeError::EmptyDefinition));
    }

    #[test]
    fn type_mismatch_names_the_value() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Doc {
            #[serde(rename = "Functions")]
            functions: std::collections::BTreeMap<String, Vec<String>>,
        }

        let content = "{\"Functions\": {\"GET /a\": \"DATA x\"}}";
        let err = serde_json::from_str::<Doc>(content).unwrap_err();
        let TreeError::Malformed(diag) = describe("defs.json", content, &err) else {
            panic!("expected a positioned diagnostic");
        };

        let DiagnosticKind::Type { detail } = &diag.kind else {
            panic!("expected a type diagnostic");
        };
        assert!(detail.contains("DATA x"), "{detail}");
        assert!(!detail.contains(" at line "), "{detail}");
        assert!(diag.to_string().starts_with("defs.json:1: unable to assign value:"));
    }
}
