//! Suite summary renderers: terminal and JSON.
//!
//! Each renderer handles a single suite run and the side-by-side
//! comparison of a run without and with repository context.

pub mod json;
pub mod terminal;

use crate::models::{ContextComparison, SuiteSummary};

/// Trait for rendering benchmark results.
pub trait SuiteRenderer {
    fn render(&self, summary: &SuiteSummary) -> String;

    fn render_comparison(&self, comparison: &ContextComparison) -> String;
}

/// Renderer for a `--format` value.
pub fn renderer_for(format: OutputFormat) -> Box<dyn SuiteRenderer> {
    match format {
        OutputFormat::Terminal => Box::new(terminal::TerminalRenderer),
        OutputFormat::Json => Box::new(json::JsonRenderer),
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::ValueEnum;

    #[test]
    fn parse_formats() {
        assert_eq!(OutputFormat::from_str("JSON", true), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("terminal", false), Ok(OutputFormat::Terminal));
        assert!(OutputFormat::from_str("sarif", true).is_err());
    }

    #[test]
    fn renderer_matches_format() {
        let json = renderer_for(OutputFormat::Json).render(&SuiteSummary::default());
        assert!(json.trim_start().starts_with('{'));
        let json =
            renderer_for(OutputFormat::Json).render_comparison(&ContextComparison::default());
        assert!(json.contains("\"with_context\""));
    }
}
