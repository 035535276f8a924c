//! Interactive reviewer for the terminal.
//!
//! Watches a run's snapshots and prompts on stdin whenever a checkpoint or
//! a failed phase is waiting:
//!
//! ```text
//! ═══════════════════════════════════════════════════════════════
//!   Review recommended: hypothesis
//! ═══════════════════════════════════════════════════════════════
//!
//! Auto-continues in 30s if unanswered.
//!
//! Selectable hypotheses:
//!   literature-1, materials-2
//!
//! Commands:
//!   /continue [ids]  /retry  /modify <text>  /escalate
//!
//! review>
//! ```

use super::commands::{ParsedCommand, parse_failure_command, parse_intervention_command};
use colored::Colorize;
use discovery_application::{ControlAck, ControlError, RunControl};
use discovery_domain::{
    FailureReport, Intervention, InterventionId, InterventionKind, InterventionPoint, PhaseId,
    RunSnapshot,
};
use std::collections::HashSet;
use std::io::{self, Write};
use tracing::{debug, warn};

const RULE: &str = "═══════════════════════════════════════════════════════════════";

/// Terminal reviewer bound to one run
pub struct ConsoleReviewer {
    control: RunControl,
}

enum Pending {
    Intervention(Intervention),
    Failure(FailureReport),
}

impl ConsoleReviewer {
    pub fn new(control: RunControl) -> Self {
        Self { control }
    }

    /// Answer prompts until the run reaches a terminal state.
    pub async fn run(self) {
        let mut snapshots = self.control.subscribe();
        let mut seen_interventions: HashSet<InterventionId> = HashSet::new();
        let mut seen_failures: HashSet<(PhaseId, u32)> = HashSet::new();

        loop {
            let pending = {
                let waited = snapshots
                    .wait_for(|s| {
                        s.run.status().is_terminal()
                            || next_pending(s, &seen_interventions, &seen_failures).is_some()
                    })
                    .await;
                match waited {
                    Ok(snapshot) => next_pending(&snapshot, &seen_interventions, &seen_failures),
                    Err(_) => None,
                }
            };

            let keep_going = match pending {
                Some(Pending::Intervention(intervention)) => {
                    seen_interventions.insert(intervention.id.clone());
                    self.review(&intervention).await
                }
                Some(Pending::Failure(report)) => {
                    seen_failures.insert((report.phase_id.clone(), report.retries_used));
                    self.recover(&report).await
                }
                None => false,
            };
            if !keep_going {
                break;
            }
        }
        debug!(run = %self.control.run_id(), "Console reviewer finished");
    }

    async fn review(&self, intervention: &Intervention) -> bool {
        display_intervention(intervention);
        loop {
            let Some(line) = read_command("review>").await else {
                return self.stdin_closed();
            };
            // The checkpoint may have timed out while the read was blocked.
            if !is_still_pending(&self.control.snapshot(), &intervention.id) {
                println!(
                    "{}",
                    format!(
                        "Checkpoint on {} auto-continued before your answer; '{}' was not applied",
                        intervention.phase_id, line
                    )
                    .dimmed()
                );
                return true;
            }
            let response = match parse_intervention_command(&line, intervention) {
                ParsedCommand::Respond(response) => response,
                ParsedCommand::Help => {
                    print_intervention_commands(intervention);
                    continue;
                }
                ParsedCommand::Empty => continue,
                ParsedCommand::Invalid(message) => {
                    println!("{} {}", "!".yellow(), message);
                    continue;
                }
            };
            match self
                .control
                .respond_to_intervention(&intervention.id, response)
            {
                Ok(ControlAck::Applied) => {
                    println!("{}", "✓ Response recorded".green());
                    return true;
                }
                Ok(ControlAck::AlreadyResolved) => {
                    println!("{}", "Checkpoint was already resolved".dimmed());
                    return true;
                }
                Err(e) => println!("{} {}", "!".yellow(), e),
            }
        }
    }

    async fn recover(&self, report: &FailureReport) -> bool {
        display_failure(report);
        loop {
            let Some(line) = read_command("recover>").await else {
                return self.stdin_closed();
            };
            let resolution = match parse_failure_command(&line, report) {
                ParsedCommand::Respond(resolution) => resolution,
                ParsedCommand::Help => {
                    print_failure_commands(report);
                    continue;
                }
                ParsedCommand::Empty => continue,
                ParsedCommand::Invalid(message) => {
                    println!("{} {}", "!".yellow(), message);
                    continue;
                }
            };
            match self.control.respond_to_failure(&report.phase_id, resolution) {
                Ok(ControlAck::Applied) => {
                    println!("{}", "✓ Decision recorded".green());
                    return true;
                }
                Ok(ControlAck::AlreadyResolved) => {
                    println!("{}", "Failure was already resolved".dimmed());
                    return true;
                }
                Err(ControlError::PhaseNotFailed(_)) => {
                    println!("{}", "Phase is no longer waiting".dimmed());
                    return true;
                }
                Err(e) => println!("{} {}", "!".yellow(), e),
            }
        }
    }

    /// Nobody can answer anymore; stop the run rather than wait forever.
    fn stdin_closed(&self) -> bool {
        warn!(run = %self.control.run_id(), "stdin closed while a decision was pending; cancelling");
        self.control.cancel();
        false
    }
}

fn is_still_pending(snapshot: &RunSnapshot, id: &InterventionId) -> bool {
    snapshot
        .pending_intervention
        .as_ref()
        .is_some_and(|pending| &pending.id == id)
}

fn next_pending(
    snapshot: &RunSnapshot,
    seen_interventions: &HashSet<InterventionId>,
    seen_failures: &HashSet<(PhaseId, u32)>,
) -> Option<Pending> {
    if let Some(iv) = &snapshot.pending_intervention
        && !seen_interventions.contains(&iv.id)
    {
        return Some(Pending::Intervention(iv.clone()));
    }
    if let Some(report) = &snapshot.pending_failure
        && !seen_failures.contains(&(report.phase_id.clone(), report.retries_used))
    {
        return Some(Pending::Failure(report.clone()));
    }
    None
}

fn display_intervention(intervention: &Intervention) {
    let title = match intervention.kind {
        InterventionKind::ApprovalRequired => "Approval required",
        InterventionKind::ReviewRecommended => "Review recommended",
        InterventionKind::EscalationAvailable => "Escalation available",
    };
    println!();
    println!("{}", RULE.yellow().bold());
    println!(
        "{}",
        format!("  {}: {}", title, intervention.phase_id).yellow().bold()
    );
    println!("{}", RULE.yellow().bold());
    println!();

    if let InterventionPoint::AfterIteration { iteration } = intervention.point {
        println!("Iteration {} did not reach the threshold.", iteration);
    }
    match intervention.timeout_ms {
        Some(ms) => println!("Auto-continues in {}s if unanswered.", ms / 1000),
        None => println!("The run waits for your answer."),
    }
    println!();

    if !intervention.selectable.is_empty() {
        println!("{}", "Selectable hypotheses:".cyan().bold());
        let ids: Vec<String> = intervention
            .selectable
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  {}", ids.join(", "));
        println!();
    }
    print_intervention_commands(intervention);
}

fn print_intervention_commands(intervention: &Intervention) {
    println!("{}", "Commands:".cyan().bold());
    for action in &intervention.options {
        let usage = match action.as_str() {
            "continue" if !intervention.selectable.is_empty() => "/continue [ids]".to_string(),
            "modify" => "/modify <guidance>".to_string(),
            other => format!("/{}", other),
        };
        println!("  {}", usage.green());
    }
    println!();
}

fn display_failure(report: &FailureReport) {
    println!();
    println!("{}", RULE.red().bold());
    println!(
        "{}",
        format!("  Phase failed: {}", report.phase_name).red().bold()
    );
    println!("{}", RULE.red().bold());
    println!();
    println!(
        "Best score {:.1} below threshold {:.1} after {} iteration(s).",
        report.best_score, report.threshold, report.iterations
    );
    println!("Retries remaining: {}", report.retries_remaining);
    println!();

    if !report.recommendations.is_empty() {
        println!("{}", "Recommendations:".cyan().bold());
        for rec in &report.recommendations {
            println!(
                "  [{}] {} - {}",
                rec.priority,
                rec.option.to_string().bold(),
                rec.rationale.dimmed()
            );
        }
        println!();
    }
    print_failure_commands(report);
}

fn print_failure_commands(report: &FailureReport) {
    println!("{}", "Commands:".cyan().bold());
    if report.retries_remaining > 0 {
        println!("  {}          - Retry the phase", "/retry".green());
    }
    println!("  {} - Stop; rerun with a new query", "/modify <query>".yellow());
    println!("  {}       - Skip the phase and keep going", "/continue".yellow());
    println!("  {}         - Stop and keep accepted outputs", "/export".red());
    println!();
}

/// Read one line on a blocking thread; `None` on EOF or read error.
async fn read_command(prompt: &'static str) -> Option<String> {
    let read = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
        print!("{} ", prompt.magenta().bold());
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    })
    .await;

    match read {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            warn!("Failed to read input: {}", e);
            None
        }
        Err(e) => {
            warn!("Input task failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::{DiscoveryRun, HypothesisId, RunId};

    fn review() -> Intervention {
        Intervention::after_phase(
            PhaseId::new("hypothesis"),
            InterventionKind::ReviewRecommended,
            Some(30_000),
            vec![HypothesisId::new("literature-1")],
        )
    }

    fn snapshot(pending: Option<Intervention>) -> RunSnapshot {
        let mut snapshot = RunSnapshot::new(DiscoveryRun::new(RunId::new("run-1"), "q", &[]));
        snapshot.pending_intervention = pending;
        snapshot
    }

    #[test]
    fn test_lapsed_checkpoint_is_not_pending() {
        let current = review();
        assert!(is_still_pending(&snapshot(Some(current.clone())), &current.id));

        // timed out and nothing else is waiting
        assert!(!is_still_pending(&snapshot(None), &current.id));

        // timed out and a later checkpoint replaced it
        let later = review();
        assert_ne!(later.id, current.id);
        assert!(!is_still_pending(&snapshot(Some(later)), &current.id));
    }

    #[test]
    fn test_next_pending_skips_seen_interventions() {
        let current = review();
        let snapshot = snapshot(Some(current.clone()));
        let mut seen = HashSet::new();
        assert!(matches!(
            next_pending(&snapshot, &seen, &HashSet::new()),
            Some(Pending::Intervention(iv)) if iv.id == current.id
        ));

        seen.insert(current.id.clone());
        assert!(next_pending(&snapshot, &seen, &HashSet::new()).is_none());
    }
}
