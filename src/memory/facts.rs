//! Fact types extracted from conversation text.
//!
//! Field names follow the extraction wire format (camelCase), so these types
//! double as the request/response schema for the extraction service.

use serde::{Deserialize, Serialize};

/// Priority levels for tasks and urgency levels for deadlines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Something the speaker needs to do
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub description: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            description: description.into(),
            priority,
            deadline: None,
            context: String::new(),
            completed: false,
        }
    }

    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = Some(deadline.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A scheduled meeting, call or visit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub title: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    #[serde(default)]
    pub cancelled: bool,
}

impl Appointment {
    pub fn new(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: date.into(),
            time: None,
            location: None,
            participants: None,
            cancelled: false,
        }
    }
}

/// A place mentioned in conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub action_required: bool,
}

/// Something due by a date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub item: String,
    pub date: String,
    pub urgency: Priority,
    #[serde(default)]
    pub resolved: bool,
}

impl Deadline {
    pub fn new(item: impl Into<String>, date: impl Into<String>, urgency: Priority) -> Self {
        Self {
            item: item.into(),
            date: date.into(),
            urgency,
            resolved: false,
        }
    }
}

/// Kind of fact addressed by a targeted update.
///
/// Any `type` string is accepted on the wire; names other than the four fact
/// kinds (singular or plural) become [`FactKind::Unknown`] and the update is
/// dropped during reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FactKind {
    Task,
    Appointment,
    Location,
    Deadline,
    #[default]
    Unknown,
}

impl From<String> for FactKind {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "task" | "tasks" => Self::Task,
            "appointment" | "appointments" => Self::Appointment,
            "location" | "locations" => Self::Location,
            "deadline" | "deadlines" => Self::Deadline,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Appointment => write!(f, "appointment"),
            Self::Location => write!(f, "location"),
            Self::Deadline => write!(f, "deadline"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The complete current collection of facts plus a running summary.
///
/// Insertion order is extraction order. Duplicates are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FactSet {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
    #[serde(default)]
    pub summary: String,
}

/// Result of a full extraction. Same shape as [`FactSet`].
pub type FactBundle = FactSet;

impl FactSet {
    /// True when no fact of any kind is held (the summary is ignored)
    pub fn is_empty(&self) -> bool {
        self.fact_count() == 0
    }

    /// Number of facts across all kinds
    pub fn fact_count(&self) -> usize {
        self.tasks.len() + self.appointments.len() + self.locations.len() + self.deadlines.len()
    }

    pub fn open_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.completed)
    }

    pub fn upcoming_appointments(&self) -> impl Iterator<Item = &Appointment> {
        self.appointments.iter().filter(|a| !a.cancelled)
    }

    pub fn open_deadlines(&self) -> impl Iterator<Item = &Deadline> {
        self.deadlines.iter().filter(|d| !d.resolved)
    }

    /// Reject payloads whose primary text fields are blank.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_facts(&self.tasks, &self.appointments, &self.locations, &self.deadlines)
    }
}

/// A targeted replacement of a fact's primary text field.
///
/// Updates that cannot be applied (unknown kind, blank text, no match) are
/// dropped by reconciliation rather than rejected here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FactUpdate {
    #[serde(rename = "type", default)]
    pub kind: FactKind,
    #[serde(default)]
    pub original_item: String,
    #[serde(default)]
    pub updated_item: String,
    #[serde(default)]
    pub change_description: String,
}

/// The extraction service's report of what changed in a transcript delta
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalUpdate {
    #[serde(default)]
    pub new_tasks: Vec<Task>,
    #[serde(default)]
    pub new_appointments: Vec<Appointment>,
    #[serde(default)]
    pub new_locations: Vec<Location>,
    #[serde(default)]
    pub new_deadlines: Vec<Deadline>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub cancelled_appointments: Vec<String>,
    #[serde(default)]
    pub purchased_items: Vec<String>,
    #[serde(default)]
    pub resolved_deadlines: Vec<String>,
    #[serde(default)]
    pub updates: Vec<FactUpdate>,
    #[serde(default)]
    pub summary: String,
}

impl IncrementalUpdate {
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_facts(
            &self.new_tasks,
            &self.new_appointments,
            &self.new_locations,
            &self.new_deadlines,
        )
    }
}

fn validate_facts(
    tasks: &[Task],
    appointments: &[Appointment],
    locations: &[Location],
    deadlines: &[Deadline],
) -> std::result::Result<(), String> {
    if tasks.iter().any(|t| t.description.trim().is_empty()) {
        return Err("task with empty description".to_string());
    }
    if appointments.iter().any(|a| a.title.trim().is_empty()) {
        return Err("appointment with empty title".to_string());
    }
    if locations.iter().any(|l| l.name.trim().is_empty()) {
        return Err("location with empty name".to_string());
    }
    if deadlines.iter().any(|d| d.item.trim().is_empty()) {
        return Err("deadline with empty item".to_string());
    }
    Ok(())
}
