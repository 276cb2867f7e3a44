//! Text projection of the fact set for terminal display

use crate::memory::{FactSet, Priority};

/// Counts shown in the status line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSummary {
    pub open_tasks: usize,
    pub completed_tasks: usize,
    pub upcoming_appointments: usize,
    pub locations: usize,
    pub open_deadlines: usize,
    pub high_priority_count: usize,
}

impl FactSummary {
    pub fn of(facts: &FactSet) -> Self {
        Self {
            open_tasks: facts.open_tasks().count(),
            completed_tasks: facts.tasks.iter().filter(|t| t.completed).count(),
            upcoming_appointments: facts.upcoming_appointments().count(),
            locations: facts.locations.len(),
            open_deadlines: facts.open_deadlines().count(),
            high_priority_count: facts
                .open_tasks()
                .filter(|t| t.priority == Priority::High)
                .count()
                + facts
                    .open_deadlines()
                    .filter(|d| d.urgency == Priority::High)
                    .count(),
        }
    }
}

impl std::fmt::Display for FactSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} open tasks ({} done), {} appointments, {} places, {} deadlines",
            self.open_tasks,
            self.completed_tasks,
            self.upcoming_appointments,
            self.locations,
            self.open_deadlines
        )?;
        if self.high_priority_count > 0 {
            write!(f, ", {} high priority", self.high_priority_count)?;
        }
        Ok(())
    }
}

fn check(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Render the fact set as sectioned text. Empty sections are omitted.
pub fn render_fact_set(facts: &FactSet) -> String {
    let mut parts = Vec::new();

    if !facts.summary.is_empty() {
        parts.push(format!("**Summary**: {}", facts.summary));
    }

    if !facts.tasks.is_empty() {
        let lines: Vec<String> = facts
            .tasks
            .iter()
            .map(|t| {
                let mut line = format!("- {} {}", check(t.completed), t.description);
                if t.priority == Priority::High {
                    line.push_str(" [!]");
                }
                if let Some(deadline) = &t.deadline {
                    line.push_str(&format!(" (due {})", deadline));
                }
                line
            })
            .collect();
        parts.push(format!("**Tasks**:\n{}", lines.join("\n")));
    }

    if !facts.appointments.is_empty() {
        let lines: Vec<String> = facts
            .appointments
            .iter()
            .map(|a| {
                let mut line = format!("- {} {} on {}", check(a.cancelled), a.title, a.date);
                if let Some(time) = &a.time {
                    line.push_str(&format!(" at {}", time));
                }
                if let Some(location) = &a.location {
                    line.push_str(&format!(" @ {}", location));
                }
                if let Some(participants) = a.participants.as_ref().filter(|p| !p.is_empty()) {
                    line.push_str(&format!(" with {}", participants.join(", ")));
                }
                if a.cancelled {
                    line.push_str(" (cancelled)");
                }
                line
            })
            .collect();
        parts.push(format!("**Appointments**:\n{}", lines.join("\n")));
    }

    if !facts.locations.is_empty() {
        let lines: Vec<String> = facts
            .locations
            .iter()
            .map(|l| {
                let marker = if l.action_required { "[!] " } else { "" };
                format!("- {}{} ({})", marker, l.name, l.context)
            })
            .collect();
        parts.push(format!("**Places**:\n{}", lines.join("\n")));
    }

    if !facts.deadlines.is_empty() {
        let lines: Vec<String> = facts
            .deadlines
            .iter()
            .map(|d| format!("- {} {} by {} ({})", check(d.resolved), d.item, d.date, d.urgency))
            .collect();
        parts.push(format!("**Deadlines**:\n{}", lines.join("\n")));
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Appointment, Deadline, Location, Task};
    use pretty_assertions::assert_eq;

    fn sample() -> FactSet {
        let mut done = Task::new("post letter", Priority::Low);
        done.completed = true;
        let mut cancelled = Appointment::new("Dentist", "Friday");
        cancelled.cancelled = true;
        FactSet {
            tasks: vec![
                Task::new("buy milk", Priority::High).with_deadline("tomorrow"),
                done,
            ],
            appointments: vec![cancelled],
            locations: vec![Location {
                name: "pharmacy".to_string(),
                context: "pick up prescription".to_string(),
                action_required: true,
            }],
            deadlines: vec![Deadline::new("tax return", "April 15", Priority::High)],
            summary: "Errands".to_string(),
        }
    }

    #[test]
    fn test_render_empty() {
        assert!(render_fact_set(&FactSet::default()).is_empty());
    }

    #[test]
    fn test_render_sections() {
        let text = render_fact_set(&sample());
        assert!(text.starts_with("**Summary**: Errands"));
        assert!(text.contains("- [ ] buy milk [!] (due tomorrow)"));
        assert!(text.contains("- [x] post letter"));
        assert!(text.contains("- [x] Dentist on Friday (cancelled)"));
        assert!(text.contains("- [!] pharmacy (pick up prescription)"));
        assert!(text.contains("- [ ] tax return by April 15 (high)"));
    }

    #[test]
    fn test_summary_counts() {
        let summary = FactSummary::of(&sample());
        assert_eq!(
            summary,
            FactSummary {
                open_tasks: 1,
                completed_tasks: 1,
                upcoming_appointments: 0,
                locations: 1,
                open_deadlines: 1,
                high_priority_count: 2,
            }
        );
        assert_eq!(
            summary.to_string(),
            "1 open tasks (1 done), 0 appointments, 1 places, 1 deadlines, 2 high priority"
        );
    }
}
