//! Console output formatter for discovery runs

use colored::Colorize;
use discovery_domain::{DiscoveryRun, Phase, PhaseStatus, RunOutcome};

/// Formats finished runs for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Phase table, outcome and every accepted output
    pub fn format(run: &DiscoveryRun) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Discovery Run"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Query:".cyan().bold(), run.query()));
        output.push_str(&format!("{} {}\n", "Run:".cyan().bold(), run.id()));
        output.push_str(&format!(
            "{} {}\n",
            "Outcome:".cyan().bold(),
            Self::outcome_line(run)
        ));

        output.push_str(&Self::section_header("Phases"));
        for phase in run.phases() {
            output.push_str(&Self::phase_line(phase));
            output.push('\n');
        }

        let accepted = run.accepted_outputs();
        if !accepted.is_empty() {
            output.push_str(&Self::section_header("Accepted Outputs"));
            for (phase_id, candidate) in accepted {
                let body = serde_json::to_string_pretty(candidate.payload())
                    .unwrap_or_else(|_| candidate.payload().to_string());
                output.push_str(&format!(
                    "\n{}\n{}\n",
                    format!("── {} ──", phase_id).yellow().bold(),
                    Self::indent(&body, "  ")
                ));
            }
        }

        if !run.interventions().is_empty() || !run.recoveries().is_empty() {
            output.push_str(&Self::section_header("Decisions"));
            for record in run.interventions() {
                output.push_str(&format!(
                    "  {} {} on {} -> {} ({}, {}ms)\n",
                    "*".dimmed(),
                    record.intervention.kind,
                    record.intervention.phase_id,
                    record.response.action,
                    record.source,
                    record.waited_ms
                ));
            }
            for record in run.recoveries() {
                output.push_str(&format!(
                    "  {} failure on {} -> {} ({})\n",
                    "*".dimmed(),
                    record.report.phase_id,
                    record.resolution,
                    record.source
                ));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(run: &DiscoveryRun) -> String {
        serde_json::to_string_pretty(run).unwrap_or_else(|_| "{}".to_string())
    }

    fn outcome_line(run: &DiscoveryRun) -> String {
        match run.outcome() {
            Some(RunOutcome::Completed { degraded: false }) => "completed".green().to_string(),
            Some(RunOutcome::Completed { degraded: true }) => {
                "completed with skipped phases".yellow().to_string()
            }
            Some(RunOutcome::PartialExport { phase }) => {
                format!("partial results exported after {}", phase)
                    .yellow()
                    .to_string()
            }
            Some(RunOutcome::QueryModified { phase, query }) => format!(
                "stopped at {}; rerun with query \"{}\"",
                phase, query
            )
            .yellow()
            .to_string(),
            Some(RunOutcome::Cancelled) => "cancelled".red().to_string(),
            None => run.status().to_string(),
        }
    }

    fn phase_line(phase: &Phase) -> String {
        let status = match phase.status() {
            PhaseStatus::Completed => phase.status().to_string().green(),
            PhaseStatus::Failed => phase.status().to_string().red(),
            PhaseStatus::Skipped => phase.status().to_string().yellow(),
            _ => phase.status().to_string().dimmed(),
        };
        let score = phase
            .best_score()
            .map(|s| format!("{:.1}/{:.1}", s, phase.pass_threshold()))
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "  {:<24} {:<10} score {:<10} iterations {}/{}",
            phase.name(),
            status,
            score,
            phase.iterations().len(),
            phase.max_iterations()
        );
        if phase.retries_used() > 0 {
            line.push_str(&format!("  retries {}", phase.retries_used()));
        }
        if let Some(race) = phase.race() {
            let stats = race.stats();
            line.push_str(&format!(
                "\n  {:<24} {} hypotheses, {} eliminated, {} breakthrough",
                "",
                stats.total,
                stats.eliminated,
                stats.breakthrough
            ));
            if !phase.carried_forward().is_empty() {
                let ids: Vec<String> = phase
                    .carried_forward()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                line.push_str(&format!("; carried {}", ids.join(", ")));
            }
        }
        line
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
