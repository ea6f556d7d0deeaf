use crate::executor::{ExecutionResult, RunResults};

/// Formats per-node run results into a human-readable report.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Formats every result in execution order, separated by blank lines.
    pub fn format_results(results: &RunResults) -> String {
        results
            .iter()
            .map(|(id, result)| Self::format_result(id, result))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Formats a single node's record.
    pub fn format_result(id: &str, result: &ExecutionResult) -> String {
        let mut out = format!("Block {} ({}):\nOutput:\n", id, result.kind);
        for line in result.output.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        if result.output.is_empty() {
            out.push_str("  (empty)\n");
        }

        if let Some(model) = &result.model {
            out.push_str(&format!("Model: {}\n", model));
        }
        if let Some(latency) = result.latency_ms {
            out.push_str(&format!("Latency: {}ms\n", latency));
        }
        if let Some(tokens) = result.tokens {
            out.push_str(&format!("Tokens: {}\n", tokens));
        }
        // Drop the trailing newline so records join cleanly.
        out.pop();
        out
    }
}
