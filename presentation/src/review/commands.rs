//! Reviewer command parsing.
//!
//! | Checkpoint command | Aliases | Effect |
//! |--------------------|---------|--------|
//! | `/continue [ids]` | `c` | Accept; on racing phases optionally pick hypotheses |
//! | `/retry` | `r` | Re-run the phase |
//! | `/skip` | `s` | Skip the phase |
//! | `/modify <text>` | `m` | Re-run or steer with guidance |
//! | `/escalate` | `e` | Re-open as a blocking approval |
//!
//! | Failure command | Aliases | Effect |
//! |-----------------|---------|--------|
//! | `/retry` | `r` | Retry the failed phase |
//! | `/modify <query>` | `m` | Stop; rerun with a new query |
//! | `/continue` | `c` | Skip the phase and keep going |
//! | `/export` | `x` | Stop and keep accepted outputs |

use discovery_domain::{
    FailureReport, FailureResolution, HypothesisId, Intervention, InterventionAction,
    InterventionResponse,
};

/// One parsed line of reviewer input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand<T> {
    Respond(T),
    Help,
    Empty,
    Invalid(String),
}

fn split_command(input: &str) -> (String, &str) {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_lowercase(), rest.trim()),
        None => (trimmed.to_lowercase(), ""),
    }
}

fn is_help(verb: &str) -> bool {
    matches!(verb, "help" | "h" | "?")
}

/// Parse a reply to an intervention checkpoint.
pub fn parse_intervention_command(
    input: &str,
    intervention: &Intervention,
) -> ParsedCommand<InterventionResponse> {
    let (verb, rest) = split_command(input);
    if verb.is_empty() {
        return ParsedCommand::Empty;
    }
    if is_help(&verb) {
        return ParsedCommand::Help;
    }
    let Ok(action) = verb.parse::<InterventionAction>() else {
        return ParsedCommand::Invalid(format!("Unknown command: {}", verb));
    };
    if !intervention.offers(action) {
        return ParsedCommand::Invalid(format!("{} is not offered at this checkpoint", action));
    }

    let mut response = InterventionResponse::new(action);
    match action {
        InterventionAction::Modify if rest.is_empty() => {
            return ParsedCommand::Invalid("/modify needs guidance text".to_string());
        }
        InterventionAction::Continue if !rest.is_empty() && !intervention.selectable.is_empty() => {
            let ids = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(HypothesisId::new)
                .collect();
            response = response.with_selection(ids);
        }
        _ if !rest.is_empty() => response = response.with_comment(rest),
        _ => {}
    }
    ParsedCommand::Respond(response)
}

/// Parse a reply to a failed phase.
pub fn parse_failure_command(input: &str, report: &FailureReport) -> ParsedCommand<FailureResolution> {
    let (verb, rest) = split_command(input);
    match verb.as_str() {
        "" => ParsedCommand::Empty,
        v if is_help(v) => ParsedCommand::Help,
        "retry" | "r" if report.retries_remaining == 0 => ParsedCommand::Invalid(format!(
            "{} has no retries left",
            report.phase_id
        )),
        "retry" | "r" => ParsedCommand::Respond(FailureResolution::RetryPhase),
        "modify" | "m" if rest.is_empty() => {
            ParsedCommand::Invalid("/modify needs the new query".to_string())
        }
        "modify" | "m" => ParsedCommand::Respond(FailureResolution::ModifyQuery {
            query: rest.to_string(),
        }),
        "continue" | "c" => ParsedCommand::Respond(FailureResolution::ContinuePartial),
        "export" | "x" => ParsedCommand::Respond(FailureResolution::ExportPartial),
        other => ParsedCommand::Invalid(format!("Unknown command: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::{
        DiscoveryRun, InterventionKind, Iteration, Phase, PhaseId, PhaseSpec, RunId,
    };

    fn review(selectable: Vec<HypothesisId>) -> Intervention {
        Intervention::after_phase(
            PhaseId::new("hypothesis"),
            InterventionKind::ReviewRecommended,
            Some(30_000),
            selectable,
        )
    }

    fn failed_phase() -> Phase {
        let spec = PhaseSpec::refinement("research", "Research").with_max_iterations(1);
        let mut phase = Phase::new(&spec);
        phase.start().unwrap();
        phase
            .record_iteration(Iteration::collaborator_failure(1, None, "boom", 3))
            .unwrap();
        phase.fail().unwrap();
        phase
    }

    fn report(max_retries: u32) -> FailureReport {
        let run = DiscoveryRun::new(RunId::new("run-1"), "q", &[]);
        FailureReport::for_phase(&failed_phase(), true, max_retries, run.summary())
    }

    #[test]
    fn test_intervention_commands() {
        let iv = review(vec![]);
        assert_eq!(
            parse_intervention_command("/continue", &iv),
            ParsedCommand::Respond(InterventionResponse::proceed())
        );
        assert_eq!(
            parse_intervention_command("  r ", &iv),
            ParsedCommand::Respond(InterventionResponse::new(InterventionAction::Retry))
        );
        assert_eq!(
            parse_intervention_command("/modify focus on cost", &iv),
            ParsedCommand::Respond(
                InterventionResponse::new(InterventionAction::Modify).with_comment("focus on cost")
            )
        );
        assert_eq!(parse_intervention_command("", &iv), ParsedCommand::Empty);
        assert_eq!(parse_intervention_command("?", &iv), ParsedCommand::Help);
    }

    #[test]
    fn test_intervention_rejects_unoffered_and_unknown() {
        let iv = review(vec![]);
        assert!(matches!(
            parse_intervention_command("/skip", &iv),
            ParsedCommand::Invalid(_)
        ));
        assert!(matches!(
            parse_intervention_command("/approve", &iv),
            ParsedCommand::Invalid(_)
        ));
        assert!(matches!(
            parse_intervention_command("/modify", &iv),
            ParsedCommand::Invalid(_)
        ));
    }

    #[test]
    fn test_continue_with_selection() {
        let ids = vec![
            HypothesisId::new("literature-1"),
            HypothesisId::new("process-2"),
        ];
        let iv = review(ids.clone());
        assert_eq!(
            parse_intervention_command("/continue literature-1, process-2", &iv),
            ParsedCommand::Respond(InterventionResponse::proceed().with_selection(ids))
        );
    }

    #[test]
    fn test_failure_commands() {
        let report = report(2);
        assert_eq!(
            parse_failure_command("/retry", &report),
            ParsedCommand::Respond(FailureResolution::RetryPhase)
        );
        assert_eq!(
            parse_failure_command("/modify cheaper catalysts", &report),
            ParsedCommand::Respond(FailureResolution::ModifyQuery {
                query: "cheaper catalysts".to_string()
            })
        );
        assert_eq!(
            parse_failure_command("c", &report),
            ParsedCommand::Respond(FailureResolution::ContinuePartial)
        );
        assert_eq!(
            parse_failure_command("/export", &report),
            ParsedCommand::Respond(FailureResolution::ExportPartial)
        );
        assert!(matches!(
            parse_failure_command("/modify", &report),
            ParsedCommand::Invalid(_)
        ));
    }

    #[test]
    fn test_retry_refused_without_retries_left() {
        let report = report(0);
        assert!(matches!(
            parse_failure_command("/retry", &report),
            ParsedCommand::Invalid(_)
        ));
    }
}
