//! Failure feedback carried from one attempt into the next prompt.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Diagnostics captured from a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Attempt the diagnostics came from.
    pub attempt: u32,

    /// Name of the first failing gate, if a gate failed.
    pub gate: Option<String>,

    /// Captured output of that gate, verbatim.
    pub gate_output: String,

    /// Dev-server log lines matched since the previous attempt.
    pub runtime_errors: Vec<String>,
}

impl Feedback {
    pub fn is_empty(&self) -> bool {
        self.gate.is_none() && self.runtime_errors.is_empty()
    }

    /// Render the section appended to the base instructions.
    pub fn render(&self) -> String {
        let mut out = format!(
            "## Previous attempt {} failed\n\n\
             Your previous changes did not pass verification. Fix the problems below.\n",
            self.attempt
        );

        if let Some(gate) = &self.gate {
            out.push_str(&format!(
                "\n### {gate} output\n\n```\n{}\n```\n",
                self.gate_output.trim_end()
            ));
        }

        if !self.runtime_errors.is_empty() {
            out.push_str("\n### Runtime errors from the dev server\n\n```\n");
            for line in &self.runtime_errors {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out
    }
}

/// Base instructions plus the previous attempt's feedback, if any.
pub fn compose_prompt(base: &str, feedback: Option<&Feedback>) -> String {
    match feedback {
        Some(feedback) if !feedback.is_empty() => {
            format!("{}\n\n{}", base.trim_end(), feedback.render())
        }
        _ => base.to_string(),
    }
}

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("static ANSI pattern is valid")
    })
}

/// Remove ANSI colour and cursor escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").to_string()
}

/// Lines of `log` that contain any of `signatures`, with escapes stripped.
pub fn match_error_lines(log: &str, signatures: &[String]) -> Vec<String> {
    log.lines()
        .map(strip_ansi)
        .filter(|line| signatures.iter().any(|sig| line.contains(sig.as_str())))
        .map(|line| line.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signatures() -> Vec<String> {
        vec!["TypeError".to_string(), "Module not found".to_string()]
    }

    #[test]
    fn first_attempt_prompt_is_base_only() {
        assert_eq!(compose_prompt("Add a page.", None), "Add a page.");
        assert_eq!(
            compose_prompt("Add a page.", Some(&Feedback::default())),
            "Add a page."
        );
    }

    #[test]
    fn prompt_includes_gate_output_verbatim() {
        let feedback = Feedback {
            attempt: 1,
            gate: Some("build".to_string()),
            gate_output: "Type error: Property 'x' does not exist".to_string(),
            runtime_errors: vec![],
        };
        let prompt = compose_prompt("Add a page.\n", Some(&feedback));
        assert!(prompt.starts_with("Add a page.\n\n## Previous attempt 1 failed"));
        assert!(prompt.contains("### build output"));
        assert!(prompt.contains("Type error: Property 'x' does not exist"));
        assert!(!prompt.contains("Runtime errors"));
    }

    #[test]
    fn prompt_includes_runtime_errors() {
        let feedback = Feedback {
            attempt: 2,
            gate: None,
            gate_output: String::new(),
            runtime_errors: vec!["TypeError: undefined is not a function".to_string()],
        };
        let prompt = compose_prompt("Base", Some(&feedback));
        assert!(prompt.contains("Runtime errors from the dev server"));
        assert!(prompt.contains("TypeError: undefined is not a function"));
    }

    #[test]
    fn strip_ansi_removes_colour_codes() {
        assert_eq!(strip_ansi("\x1b[31m⨯ boom\x1b[39m"), "⨯ boom");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn match_error_lines_filters_by_signature() {
        let log = "ready on :3000\n\
                   \x1b[31mTypeError: x is undefined\x1b[0m\n\
                   compiled\n\
                   Module not found: Can't resolve 'foo'\n";
        let lines = match_error_lines(log, &signatures());
        assert_eq!(
            lines,
            vec![
                "TypeError: x is undefined".to_string(),
                "Module not found: Can't resolve 'foo'".to_string(),
            ]
        );
    }
}
