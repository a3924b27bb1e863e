//! Lifecycle events raised against a namespace.

use serde::{Deserialize, Serialize};

/// An event that may move a namespace between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Archive,
    Unarchive,
    ScheduleDeletion,
    StartDeletion,
    RescheduleDeletion,
    CancelDeletion,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        Self::Archive,
        Self::Unarchive,
        Self::ScheduleDeletion,
        Self::StartDeletion,
        Self::RescheduleDeletion,
        Self::CancelDeletion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::ScheduleDeletion => "schedule_deletion",
            Self::StartDeletion => "start_deletion",
            Self::RescheduleDeletion => "reschedule_deletion",
            Self::CancelDeletion => "cancel_deletion",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown lifecycle event: {s:?}"))
    }
}
