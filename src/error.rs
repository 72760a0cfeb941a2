//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] serde_yaml::Error),

    #[error("Validation failed: {0} problem(s) found")]
    Validation(usize),

    #[error("Missing required input '{name}' and no resolver or default available")]
    MissingInput { name: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FolioError {
    /// Process exit code for the CLI: 2 parse, 3 validation/missing input, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            FolioError::Parse { .. } | FolioError::Frontmatter(_) => 2,
            FolioError::Validation(_) | FolioError::MissingInput { .. } => 3,
            _ => 1,
        }
    }
}

impl FixSuggestion for FolioError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FolioError::Parse { .. } => {
                Some("Check that every <Component> tag is closed or self-closing")
            }
            FolioError::Frontmatter(_) => {
                Some("Check frontmatter YAML: indentation, quoting, and the --- fences")
            }
            FolioError::Validation(_) => Some("Run `folio check <file>` for the full list"),
            FolioError::MissingInput { .. } => {
                Some("Pass the input with --input name=value or declare a default in frontmatter")
            }
            FolioError::Provider(_) => {
                Some("Check the API key env var is set (ANTHROPIC_API_KEY or OPENAI_API_KEY)")
            }
            FolioError::Execution(_) => Some("Check referenced files and expressions"),
            FolioError::Io(_) => Some("Check file path and permissions"),
            FolioError::Json(_) => Some("Ensure the inputs file contains a JSON object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_cli_contract() {
        let parse = FolioError::Parse { line: 3, reason: "unclosed tag".into() };
        assert_eq!(parse.exit_code(), 2);
        assert_eq!(FolioError::Validation(2).exit_code(), 3);
        assert_eq!(FolioError::MissingInput { name: "topic".into() }.exit_code(), 3);
        assert_eq!(FolioError::Provider("boom".into()).exit_code(), 1);
    }

    #[test]
    fn every_variant_has_a_suggestion() {
        let err = FolioError::MissingInput { name: "x".into() };
        assert!(err.fix_suggestion().is_some());
    }
}
