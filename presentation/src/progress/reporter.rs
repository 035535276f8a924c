//! Progress reporting for discovery runs

use colored::Colorize;
use discovery_application::{RunEvent, RunEventNotifier};
use discovery_domain::{PhaseId, PhaseSpec};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

/// Reports progress with one bar per phase attempt
pub struct ProgressReporter {
    multi: MultiProgress,
    /// Display name and iteration budget per phase
    phases: HashMap<PhaseId, (String, u32)>,
    bars: Mutex<HashMap<PhaseId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new(specs: &[PhaseSpec]) -> Self {
        Self {
            multi: MultiProgress::new(),
            phases: specs
                .iter()
                .map(|s| (s.id.clone(), (s.name.clone(), s.max_iterations)))
                .collect(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn phase_name(&self, id: &PhaseId) -> String {
        self.phases
            .get(id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn with_bar(&self, id: &PhaseId, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock()
            && let Some(pb) = bars.get(id)
        {
            f(pb);
        }
    }

    fn finish_bar(&self, id: &PhaseId, message: String) {
        if let Ok(mut bars) = self.bars.lock()
            && let Some(pb) = bars.remove(id)
        {
            pb.finish_with_message(message);
        }
    }
}

impl RunEventNotifier for ProgressReporter {
    fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::PhaseStarted {
                phase_id, attempt, ..
            } => {
                let max = self.phases.get(phase_id).map_or(1, |(_, max)| *max);
                let pb = self.multi.add(ProgressBar::new(u64::from(max)));
                pb.set_style(Self::phase_style());
                pb.set_prefix(self.phase_name(phase_id));
                pb.set_message(if *attempt > 1 {
                    format!("attempt {}", attempt)
                } else {
                    "starting...".to_string()
                });
                if let Ok(mut bars) = self.bars.lock() {
                    // A retry replaces the finished bar of the previous attempt.
                    bars.insert(phase_id.clone(), pb);
                }
            }
            RunEvent::IterationRecorded {
                phase_id,
                iteration,
                ..
            } => self.with_bar(phase_id, |pb| {
                pb.set_position(u64::from(iteration.index));
                let message = match &iteration.error {
                    Some(error) => format!("{} {}", "x".red(), error),
                    None if iteration.passed => {
                        format!("{} score {:.1}", "v".green(), iteration.score)
                    }
                    None => format!("score {:.1}", iteration.score),
                };
                pb.set_message(message);
            }),
            RunEvent::RaceRound {
                phase_id, stats, ..
            } => self.with_bar(phase_id, |pb| {
                pb.set_message(format!(
                    "{} active, {} eliminated, {} breakthrough",
                    stats.active, stats.eliminated, stats.breakthrough
                ));
            }),
            RunEvent::InterventionRaised { intervention, .. } => {
                self.with_bar(&intervention.phase_id, |pb| {
                    pb.set_message(format!("waiting for {}", intervention.kind).yellow().to_string());
                });
            }
            RunEvent::PhaseCompleted {
                phase_id, score, ..
            } => {
                let score = score.map(|s| format!(" ({:.1})", s)).unwrap_or_default();
                self.finish_bar(phase_id, format!("{}{}", "complete".green(), score));
            }
            RunEvent::PhaseFailed { phase_id, .. } => {
                self.finish_bar(phase_id, "failed".red().to_string());
            }
            RunEvent::PhaseSkipped { phase_id, .. } => {
                self.finish_bar(phase_id, "skipped".yellow().to_string());
            }
            _ => {}
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl RunEventNotifier for SimpleProgress {
    fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { phases, .. } => {
                println!("{} {} phases", "->".cyan(), phases.len());
            }
            RunEvent::PhaseStarted {
                phase_id, attempt, ..
            } => {
                println!("{} {} (attempt {})", "->".cyan(), phase_id.to_string().bold(), attempt);
            }
            RunEvent::IterationRecorded { iteration, .. } => match &iteration.error {
                Some(error) => println!("  {} iteration {}: {}", "x".red(), iteration.index, error),
                None if iteration.passed => println!(
                    "  {} iteration {}: {:.1}",
                    "v".green(),
                    iteration.index,
                    iteration.score
                ),
                None => println!("  - iteration {}: {:.1}", iteration.index, iteration.score),
            },
            RunEvent::RaceRound { stats, .. } => {
                println!(
                    "  round {}: {} active, {} eliminated, {} breakthrough",
                    stats.iteration, stats.active, stats.eliminated, stats.breakthrough
                );
            }
            RunEvent::PhaseCompleted { phase_id, .. } => {
                println!("  {} {} complete", "v".green(), phase_id);
            }
            RunEvent::PhaseFailed { phase_id, .. } => {
                println!("  {} {} failed", "x".red(), phase_id);
            }
            RunEvent::PhaseSkipped { phase_id, .. } => {
                println!("  {} {} skipped", "-".yellow(), phase_id);
            }
            RunEvent::RunFinished { status, .. } => {
                println!("{} run {}", "->".cyan(), status);
                println!();
            }
            _ => {}
        }
    }
}
