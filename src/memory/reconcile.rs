//! Reconciliation of an incremental update into the current fact set.
//!
//! The extraction model has no stable identifiers for facts, so existing facts
//! are addressed by case-insensitive substring match on their primary text
//! field. Rules run in a fixed order: append, flag, targeted update, summary.
//! A fact appended in this increment can therefore be flagged or updated by
//! the same increment.

use super::facts::{FactKind, FactSet, IncrementalUpdate};
use tracing::debug;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Facts appended across all kinds
    pub appended: usize,
    /// Facts whose completed/cancelled/resolved flag flipped to true
    pub flagged: usize,
    /// Targeted updates that found a fact to rewrite
    pub updated: usize,
    /// Targeted updates that matched nothing and were dropped
    pub dropped_updates: usize,
    /// Whether the summary was replaced
    pub summary_replaced: bool,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.appended == 0 && self.flagged == 0 && self.updated == 0 && !self.summary_replaced
    }
}

/// Case-insensitive substring test. Empty needles match nothing.
fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    !needle_lower.is_empty() && haystack.to_lowercase().contains(needle_lower)
}

fn normalized(fragment: &str) -> String {
    fragment.trim().to_lowercase()
}

/// Set `flag` on every item whose text contains any fragment. Returns how many
/// flags flipped from false to true.
fn flag_matching<T>(
    items: &mut [T],
    fragments: &[&String],
    text: impl Fn(&T) -> &str,
    flag: impl Fn(&mut T) -> &mut bool,
) -> usize {
    let mut flipped = 0;
    for fragment in fragments {
        let needle = normalized(fragment);
        for item in items.iter_mut() {
            if contains_ignore_case(text(&*item), &needle) {
                let slot = flag(item);
                if !*slot {
                    *slot = true;
                    flipped += 1;
                }
            }
        }
    }
    flipped
}

/// Replace the primary text of the first item containing `original`.
fn update_first<T>(
    items: &mut [T],
    original: &str,
    updated: &str,
    field: impl Fn(&mut T) -> &mut String,
) -> bool {
    let needle = normalized(original);
    for item in items.iter_mut() {
        let text = field(item);
        if contains_ignore_case(text.as_str(), &needle) {
            *text = updated.to_string();
            return true;
        }
    }
    false
}

/// Merge `update` into `facts` in place.
pub fn apply_update(facts: &mut FactSet, update: IncrementalUpdate) -> MergeReport {
    let mut report = MergeReport::default();

    // 1. Append
    report.appended = update.new_tasks.len()
        + update.new_appointments.len()
        + update.new_locations.len()
        + update.new_deadlines.len();
    facts.tasks.extend(update.new_tasks);
    facts.appointments.extend(update.new_appointments);
    facts.locations.extend(update.new_locations);
    facts.deadlines.extend(update.new_deadlines);

    // 2. Flag
    let task_fragments: Vec<&String> = update
        .completed_tasks
        .iter()
        .chain(update.purchased_items.iter())
        .collect();
    report.flagged += flag_matching(
        &mut facts.tasks,
        &task_fragments,
        |t| t.description.as_str(),
        |t| &mut t.completed,
    );
    let cancelled: Vec<&String> = update.cancelled_appointments.iter().collect();
    report.flagged += flag_matching(
        &mut facts.appointments,
        &cancelled,
        |a| a.title.as_str(),
        |a| &mut a.cancelled,
    );
    let resolved: Vec<&String> = update.resolved_deadlines.iter().collect();
    report.flagged += flag_matching(
        &mut facts.deadlines,
        &resolved,
        |d| d.item.as_str(),
        |d| &mut d.resolved,
    );

    // 3. Targeted updates
    for change in &update.updates {
        let original = change.original_item.as_str();
        let replacement = change.updated_item.trim();
        // A blank replacement would erase the fact's primary text.
        let applied = if replacement.is_empty() {
            false
        } else {
            match change.kind {
                FactKind::Task => {
                    update_first(&mut facts.tasks, original, replacement, |t| &mut t.description)
                }
                FactKind::Appointment => {
                    update_first(&mut facts.appointments, original, replacement, |a| &mut a.title)
                }
                FactKind::Location => {
                    update_first(&mut facts.locations, original, replacement, |l| &mut l.name)
                }
                FactKind::Deadline => {
                    update_first(&mut facts.deadlines, original, replacement, |d| &mut d.item)
                }
                FactKind::Unknown => false,
            }
        };
        if applied {
            report.updated += 1;
        } else {
            debug!(
                "Dropping {} update for '{}': nothing to apply",
                change.kind, change.original_item
            );
            report.dropped_updates += 1;
        }
    }

    // 4. Summary
    if !update.summary.trim().is_empty() {
        facts.summary = update.summary;
        report.summary_replaced = true;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::facts::{Appointment, Deadline, FactUpdate, Priority, Task};
    use pretty_assertions::assert_eq;

    fn facts_with_tasks(descriptions: &[&str]) -> FactSet {
        FactSet {
            tasks: descriptions
                .iter()
                .map(|d| Task::new(*d, Priority::Medium))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_purchased_item_completes_task() {
        let mut facts = facts_with_tasks(&["buy milk"]);
        let update = IncrementalUpdate {
            purchased_items: vec!["milk".to_string()],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert!(facts.tasks[0].completed);
        assert_eq!(report.flagged, 1);
    }

    #[test]
    fn test_fragment_flags_every_match() {
        let mut facts = facts_with_tasks(&["buy milk", "buy milk and eggs", "walk dog"]);
        let update = IncrementalUpdate {
            completed_tasks: vec!["milk".to_string()],
            ..Default::default()
        };

        apply_update(&mut facts, update);

        assert!(facts.tasks[0].completed);
        assert!(facts.tasks[1].completed);
        assert!(!facts.tasks[2].completed);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let mut facts = facts_with_tasks(&["Buy MILK"]);
        let update = IncrementalUpdate {
            completed_tasks: vec!["  milk ".to_string()],
            ..Default::default()
        };
        apply_update(&mut facts, update);
        assert!(facts.tasks[0].completed);
    }

    #[test]
    fn test_empty_fragment_matches_nothing() {
        let mut facts = facts_with_tasks(&["buy milk"]);
        let update = IncrementalUpdate {
            completed_tasks: vec!["".to_string(), "   ".to_string()],
            ..Default::default()
        };
        let report = apply_update(&mut facts, update);
        assert!(!facts.tasks[0].completed);
        assert_eq!(report.flagged, 0);
    }

    #[test]
    fn test_cancel_and_resolve() {
        let mut facts = FactSet {
            appointments: vec![
                Appointment::new("Dentist checkup", "Friday"),
                Appointment::new("Team sync", "Monday"),
            ],
            deadlines: vec![Deadline::new("Tax return", "April 15", Priority::High)],
            ..Default::default()
        };
        let update = IncrementalUpdate {
            cancelled_appointments: vec!["dentist".to_string()],
            resolved_deadlines: vec!["tax".to_string()],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert!(facts.appointments[0].cancelled);
        assert!(!facts.appointments[1].cancelled);
        assert!(facts.deadlines[0].resolved);
        assert_eq!(report.flagged, 2);
    }

    #[test]
    fn test_new_task_flagged_in_same_increment() {
        let mut facts = facts_with_tasks(&["walk dog"]);
        let update = IncrementalUpdate {
            new_tasks: vec![Task::new("pick up bread", Priority::Low)],
            purchased_items: vec!["bread".to_string()],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert_eq!(facts.tasks.len(), 2);
        assert!(facts.tasks[1].completed);
        assert_eq!(report.appended, 1);
        assert_eq!(report.flagged, 1);
    }

    #[test]
    fn test_repeated_mentions_are_not_deduplicated() {
        let mut facts = facts_with_tasks(&["buy milk"]);
        let update = IncrementalUpdate {
            new_tasks: vec![Task::new("buy milk", Priority::Medium)],
            ..Default::default()
        };
        apply_update(&mut facts, update);
        assert_eq!(facts.tasks.len(), 2);
    }

    #[test]
    fn test_targeted_update_rewrites_first_match_only() {
        let mut facts = facts_with_tasks(&["call the plumber", "call the plumber again"]);
        let update = IncrementalUpdate {
            updates: vec![FactUpdate {
                kind: FactKind::Task,
                original_item: "PLUMBER".to_string(),
                updated_item: "call the electrician".to_string(),
                change_description: "switched trades".to_string(),
            }],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert_eq!(facts.tasks[0].description, "call the electrician");
        assert_eq!(facts.tasks[1].description, "call the plumber again");
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_stale_update_is_dropped() {
        let mut facts = facts_with_tasks(&["buy milk"]);
        let before = facts.clone();
        let update = IncrementalUpdate {
            updates: vec![FactUpdate {
                kind: FactKind::Appointment,
                original_item: "buy milk".to_string(),
                updated_item: "buy oat milk".to_string(),
                change_description: String::new(),
            }],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert_eq!(facts, before);
        assert_eq!(report.dropped_updates, 1);
        assert!(report.is_noop());
    }

    #[test]
    fn test_unusable_updates_do_not_block_flags() {
        let mut facts = facts_with_tasks(&["buy milk"]);
        let update = IncrementalUpdate {
            purchased_items: vec!["milk".to_string()],
            updates: vec![
                FactUpdate {
                    kind: FactKind::Task,
                    original_item: "zzz".to_string(),
                    updated_item: String::new(),
                    change_description: String::new(),
                },
                FactUpdate {
                    kind: FactKind::Task,
                    original_item: "milk".to_string(),
                    updated_item: "   ".to_string(),
                    change_description: String::new(),
                },
                FactUpdate {
                    kind: FactKind::Unknown,
                    original_item: "milk".to_string(),
                    updated_item: "oat milk".to_string(),
                    change_description: String::new(),
                },
            ],
            ..Default::default()
        };

        let report = apply_update(&mut facts, update);

        assert!(facts.tasks[0].completed);
        assert_eq!(facts.tasks[0].description, "buy milk");
        assert_eq!(report.flagged, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.dropped_updates, 3);
    }

    #[test]
    fn test_summary_replaced_only_when_non_empty() {
        let mut facts = FactSet {
            summary: "Shopping list".to_string(),
            ..Default::default()
        };
        apply_update(&mut facts, IncrementalUpdate::default());
        assert_eq!(facts.summary, "Shopping list");

        let report = apply_update(
            &mut facts,
            IncrementalUpdate {
                summary: "Shopping done".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(facts.summary, "Shopping done");
        assert!(report.summary_replaced);
    }
}
