//! Output helpers shared by the commands: JSON printing and error rendering.

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::{FixSuggestion, GdabError, Result};

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
/// Returns an error if `value` cannot be serialized.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render an error for stderr in the requested format.
#[must_use]
pub fn render_error(error: &GdabError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => render_error_json(error),
        OutputFormat::Human => render_simple(error),
    }
}

/// Plain text: header line plus the first runnable fix.
fn render_simple(error: &GdabError) -> String {
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];

    let suggestions = error.fix_suggestions();
    if let Some(suggestion) = suggestions.first() {
        if let Some(cmd) = suggestion.commands.iter().find(|c| !c.starts_with('#')) {
            lines.push(format!("Fix: {cmd}"));
        }
        if !suggestion.context.is_empty() {
            lines.push(format!("Why: {}", suggestion.context));
        }
    }

    lines.join("\n")
}

/// JSON representation of an error for machine consumption.
#[derive(Serialize)]
struct ErrorJson {
    error_code: &'static str,
    kind: &'static str,
    message: String,
    suggestions: Vec<SuggestionJson>,
}

#[derive(Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
}

impl From<FixSuggestion> for SuggestionJson {
    fn from(s: FixSuggestion) -> Self {
        Self {
            commands: s.commands,
            context: s.context,
            prevention: s.prevention,
        }
    }
}

fn render_error_json(error: &GdabError) -> String {
    let json = ErrorJson {
        error_code: error.error_code(),
        kind: error.kind().description(),
        message: error.to_string(),
        suggestions: error
            .fix_suggestions()
            .into_iter()
            .map(SuggestionJson::from)
            .collect(),
    };
    serde_json::to_string(&json).unwrap_or_else(|_| render_simple(error))
}
