//! Offline keyword extractor.
//!
//! Pattern-based stand-in for the hosted model, used when no API key is
//! available. It is deliberately shallow: one sentence yields at most one
//! fact of each kind.

use super::Extractor;
use crate::memory::{
    Appointment, Deadline, FactBundle, FactSet, IncrementalUpdate, Location, Priority, Task,
};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;

const MAX_SUMMARY_CHARS: usize = 160;

/// Extractor driven by regular expressions over individual sentences
pub struct KeywordExtractor {
    task_patterns: Vec<Regex>,
    appointment_pattern: Regex,
    location_pattern: Regex,
    deadline_pattern: Regex,
    when_pattern: Regex,
    urgent_pattern: Regex,
    purchased_pattern: Regex,
    completed_pattern: Regex,
    cancelled_pattern: Regex,
    resolved_pattern: Regex,
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self {
            task_patterns: vec![
                Regex::new(r"(?i)\b(?:need to|have to|has to|must|should|remember to|don't forget to)\s+(.+)").unwrap(),
                Regex::new(r"(?i)\btodo:?\s+(.+)").unwrap(),
            ],
            appointment_pattern: Regex::new(
                r"(?i)\b(?:meeting|appointment|call with|lunch with|dinner with|interview)\b",
            )
            .unwrap(),
            location_pattern: Regex::new(r"(?i)\b(?:at|to|from) the ([a-z][a-z ]{1,30}?)\b(?:\s+(?:on|at|by|tomorrow|today|tonight|and)\b|[.,!?]|$)").unwrap(),
            deadline_pattern: Regex::new(r"(?i)^(.+?)\s+(?:is due|due|deadline(?: is)?)\s+(?:on |by )?(.+)$").unwrap(),
            when_pattern: Regex::new(
                r"(?i)\b(today|tonight|tomorrow|next week|(?:next |this )?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday))\b",
            )
            .unwrap(),
            urgent_pattern: Regex::new(r"(?i)\b(urgent|urgently|asap|immediately|right away)\b").unwrap(),
            purchased_pattern: Regex::new(r"(?i)\b(?:bought|purchased|picked up|got)\s+(?:the |some |a |an )?(.+)").unwrap(),
            completed_pattern: Regex::new(r"(?i)\b(?:finished|completed|done with|did)\s+(?:the |my )?(.+)").unwrap(),
            cancelled_pattern: Regex::new(r"(?i)\b(?:cancelled|canceled|called off)\s+(?:the |my )?(.+)").unwrap(),
            resolved_pattern: Regex::new(r"(?i)\b(?:submitted|sent in|handed in|filed)\s+(?:the |my )?(.+)").unwrap(),
        }
    }

    fn sentences(text: &str) -> impl Iterator<Item = &str> {
        text.split(['.', '!', '?', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn capture(pattern: &Regex, sentence: &str, group: usize) -> Option<String> {
        pattern
            .captures(sentence)
            .and_then(|c| c.get(group))
            .map(|m| clean_fragment(m.as_str()))
            .filter(|s| !s.is_empty())
    }

    fn priority_for(&self, sentence: &str) -> Priority {
        if self.urgent_pattern.is_match(sentence) {
            Priority::High
        } else {
            Priority::Medium
        }
    }

    fn when(&self, sentence: &str) -> Option<String> {
        self.when_pattern
            .captures(sentence)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    /// Facts stated in `text`, in sentence order
    fn scan(&self, text: &str) -> FactSet {
        let mut facts = FactSet::default();

        for sentence in Self::sentences(text) {
            let when = self.when(sentence);

            if let Some(caps) = self.deadline_pattern.captures(sentence) {
                let item = clean_fragment(&caps[1]);
                let date = clean_fragment(&caps[2]);
                if !item.is_empty() && !date.is_empty() {
                    facts
                        .deadlines
                        .push(Deadline::new(item, date, self.priority_for(sentence)));
                    continue;
                }
            }

            if self.appointment_pattern.is_match(sentence) {
                let title = clean_fragment(sentence);
                let date = when.clone().unwrap_or_else(|| "unspecified".to_string());
                let mut appointment = Appointment::new(title, date);
                appointment.location = Self::capture(&self.location_pattern, sentence, 1);
                facts.appointments.push(appointment);
                continue;
            }

            let is_task = self
                .task_patterns
                .iter()
                .find_map(|p| Self::capture(p, sentence, 1));
            if let Some(description) = &is_task {
                let mut task = Task::new(description.clone(), self.priority_for(sentence))
                    .with_context(sentence);
                task.deadline = when;
                facts.tasks.push(task);
            }

            if let Some(name) = Self::capture(&self.location_pattern, sentence, 1) {
                facts.locations.push(Location {
                    name,
                    context: sentence.to_string(),
                    action_required: is_task.is_some(),
                });
            }
        }

        facts
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim filler and time words from the tail of a captured fragment
fn clean_fragment(fragment: &str) -> String {
    let mut words: Vec<&str> = fragment.split_whitespace().collect();
    while let Some(last) = words.last() {
        let lower = last.to_lowercase();
        if matches!(
            lower.as_str(),
            "today" | "tonight" | "tomorrow" | "please" | "now" | "asap" | "urgently"
        ) {
            words.pop();
        } else {
            break;
        }
    }
    words
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == ';' || c == ':')
        .to_string()
}

fn summarize(text: &str) -> String {
    let first = KeywordExtractor::sentences(text).next().unwrap_or_default();
    if first.chars().count() <= MAX_SUMMARY_CHARS {
        return first.to_string();
    }
    let mut truncated: String = first.chars().take(MAX_SUMMARY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl Extractor for KeywordExtractor {
    async fn extract(&self, transcript: &str) -> Result<FactBundle> {
        let mut facts = self.scan(transcript);
        if !facts.is_empty() {
            facts.summary = summarize(transcript);
        }
        Ok(facts)
    }

    async fn extract_incremental(
        &self,
        delta: &str,
        _existing: &FactSet,
    ) -> Result<IncrementalUpdate> {
        let mut update = IncrementalUpdate::default();

        for sentence in Self::sentences(delta) {
            if let Some(item) = Self::capture(&self.cancelled_pattern, sentence, 1) {
                update.cancelled_appointments.push(item);
            } else if let Some(item) = Self::capture(&self.resolved_pattern, sentence, 1) {
                update.resolved_deadlines.push(item);
            } else if let Some(item) = Self::capture(&self.completed_pattern, sentence, 1) {
                update.completed_tasks.push(item);
            } else if let Some(item) = Self::capture(&self.purchased_pattern, sentence, 1) {
                update.purchased_items.push(item);
            }
        }

        let new_facts = self.scan(delta);
        update.new_tasks = new_facts.tasks;
        update.new_appointments = new_facts.appointments;
        update.new_locations = new_facts.locations;
        update.new_deadlines = new_facts.deadlines;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> FactBundle {
        tokio_test::block_on(KeywordExtractor::new().extract(text)).unwrap()
    }

    fn extract_incremental(text: &str) -> IncrementalUpdate {
        tokio_test::block_on(KeywordExtractor::new().extract_incremental(text, &FactSet::default()))
            .unwrap()
    }

    #[test]
    fn test_task_with_deadline() {
        let facts = extract("I need to buy milk tomorrow.");
        assert_eq!(facts.tasks.len(), 1);
        assert_eq!(facts.tasks[0].description, "buy milk");
        assert_eq!(facts.tasks[0].deadline.as_deref(), Some("tomorrow"));
        assert_eq!(facts.tasks[0].priority, Priority::Medium);
        assert_eq!(facts.summary, "I need to buy milk tomorrow");
    }

    #[test]
    fn test_urgent_task_is_high_priority() {
        let facts = extract("I must call the bank asap.");
        assert_eq!(facts.tasks[0].priority, Priority::High);
        assert_eq!(facts.tasks[0].description, "call the bank");
    }

    #[test]
    fn test_appointment() {
        let facts = extract("Dentist appointment on Friday.");
        assert_eq!(facts.appointments.len(), 1);
        assert_eq!(facts.appointments[0].date, "friday");
        assert!(facts.tasks.is_empty());
    }

    #[test]
    fn test_location_from_task_requires_action() {
        let facts = extract("I have to pick up a prescription at the pharmacy.");
        assert_eq!(facts.locations.len(), 1);
        assert_eq!(facts.locations[0].name, "pharmacy");
        assert!(facts.locations[0].action_required);
    }

    #[test]
    fn test_deadline() {
        let facts = extract("The tax return is due by April 15.");
        assert_eq!(facts.deadlines.len(), 1);
        assert_eq!(facts.deadlines[0].item, "The tax return");
        assert_eq!(facts.deadlines[0].date, "April 15");
    }

    #[test]
    fn test_small_talk_yields_nothing() {
        let facts = extract("The weather is lovely. How are you?");
        assert!(facts.is_empty());
        assert!(facts.summary.is_empty());
    }

    #[test]
    fn test_incremental_purchase_and_cancel() {
        let update = extract_incremental("I bought the milk. We cancelled the dentist visit.");
        assert_eq!(update.purchased_items, vec!["milk".to_string()]);
        assert_eq!(update.cancelled_appointments, vec!["dentist visit".to_string()]);
        assert!(update.new_tasks.is_empty());
    }

    #[test]
    fn test_intent_to_cancel_is_not_a_cancellation() {
        let update = extract_incremental("I need to cancel the dentist.");
        assert!(update.cancelled_appointments.is_empty());
        assert_eq!(update.new_tasks.len(), 1);
        assert_eq!(update.new_tasks[0].description, "cancel the dentist");

        let update = extract_incremental("They called off the team lunch.");
        assert_eq!(update.cancelled_appointments, vec!["team lunch".to_string()]);
    }

    #[test]
    fn test_incremental_reports_new_tasks() {
        let update = extract_incremental("Also I need to walk the dog.");
        assert_eq!(update.new_tasks.len(), 1);
        assert_eq!(update.new_tasks[0].description, "walk the dog");
    }
}
