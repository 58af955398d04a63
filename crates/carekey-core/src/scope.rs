//! Access scope: the (categories, actions, duration, justification) tuple
//! that bounds a grant.
//!
//! A scope is an immutable value. It can only be built through
//! [`AccessScope::new`], which enforces the duration bounds and the
//! minimum justification length, so a scope held anywhere in the system
//! is known to be well-formed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::CoreError;

/// Minimum grant duration in seconds (one minute).
pub const MIN_DURATION_SECS: u32 = 60;

/// Maximum grant duration in seconds (24 hours).
pub const MAX_DURATION_SECS: u32 = 86_400;

/// Minimum length of a scope justification.
pub const MIN_JUSTIFICATION_LEN: usize = 8;

/// A category of health-record data.
///
/// `All` is a wildcard that covers every other category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataCategory {
    /// Wildcard: every category.
    All,
    /// Patient demographics.
    Demographics,
    /// Examination records.
    Exams,
    /// Laboratory results.
    Labs,
    /// Imaging studies.
    Imaging,
    /// Prescription history.
    Prescriptions,
    /// Vital sign measurements.
    Vitals,
    /// Medical history.
    History,
    /// Free-form clinical notes.
    Notes,
}

impl DataCategory {
    /// All concrete (non-wildcard) categories.
    pub const CONCRETE: [DataCategory; 8] = [
        DataCategory::Demographics,
        DataCategory::Exams,
        DataCategory::Labs,
        DataCategory::Imaging,
        DataCategory::Prescriptions,
        DataCategory::Vitals,
        DataCategory::History,
        DataCategory::Notes,
    ];

    /// Stable string form (used in persisted records and audit detail).
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::All => "all",
            DataCategory::Demographics => "demographics",
            DataCategory::Exams => "exams",
            DataCategory::Labs => "labs",
            DataCategory::Imaging => "imaging",
            DataCategory::Prescriptions => "prescriptions",
            DataCategory::Vitals => "vitals",
            DataCategory::History => "history",
            DataCategory::Notes => "notes",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(DataCategory::All),
            "demographics" => Some(DataCategory::Demographics),
            "exams" => Some(DataCategory::Exams),
            "labs" => Some(DataCategory::Labs),
            "imaging" => Some(DataCategory::Imaging),
            "prescriptions" => Some(DataCategory::Prescriptions),
            "vitals" => Some(DataCategory::Vitals),
            "history" => Some(DataCategory::History),
            "notes" => Some(DataCategory::Notes),
            _ => None,
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action a grant may permit on the data it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessAction {
    /// Read existing records.
    Read,
    /// Replace a record.
    Write,
    /// Append a new record without replacing.
    Append,
    /// Re-share records with a further party.
    Share,
}

impl AccessAction {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Read => "read",
            AccessAction::Write => "write",
            AccessAction::Append => "append",
            AccessAction::Share => "share",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable access scope: what data, which actions, for how long, why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessScope {
    categories: BTreeSet<DataCategory>,
    actions: BTreeSet<AccessAction>,
    duration_secs: u32,
    justification: String,
}

impl AccessScope {
    /// Build a validated scope.
    ///
    /// Fails with [`CoreError::InvalidScope`] if the category or action set
    /// is empty, the duration is outside `[MIN_DURATION_SECS,
    /// MAX_DURATION_SECS]`, or the justification is too short.
    pub fn new(
        categories: impl IntoIterator<Item = DataCategory>,
        actions: impl IntoIterator<Item = AccessAction>,
        duration_secs: u32,
        justification: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let categories: BTreeSet<_> = categories.into_iter().collect();
        let actions: BTreeSet<_> = actions.into_iter().collect();
        let justification = justification.into();

        if categories.is_empty() {
            return Err(CoreError::InvalidScope("no data categories".into()));
        }
        if actions.is_empty() {
            return Err(CoreError::InvalidScope("no actions".into()));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
            return Err(CoreError::InvalidScope(format!(
                "duration {} outside [{}, {}] seconds",
                duration_secs, MIN_DURATION_SECS, MAX_DURATION_SECS
            )));
        }
        if justification.trim().len() < MIN_JUSTIFICATION_LEN {
            return Err(CoreError::InvalidScope(format!(
                "justification shorter than {} characters",
                MIN_JUSTIFICATION_LEN
            )));
        }

        Ok(Self {
            categories,
            actions,
            duration_secs,
            justification,
        })
    }

    /// The data categories this scope covers.
    pub fn categories(&self) -> &BTreeSet<DataCategory> {
        &self.categories
    }

    /// The actions this scope permits.
    pub fn actions(&self) -> &BTreeSet<AccessAction> {
        &self.actions
    }

    /// Grant duration in seconds. Always within the configured bounds.
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// The free-text justification given by the requester.
    ///
    /// Caller-supplied text; treat as advisory only.
    pub fn justification(&self) -> &str {
        &self.justification
    }

    /// Does this scope cover a single category?
    pub fn covers_category(&self, category: DataCategory) -> bool {
        self.categories.contains(&DataCategory::All) || self.categories.contains(&category)
    }

    /// Does this scope cover every requested category?
    pub fn covers_categories<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a DataCategory>,
    ) -> bool {
        requested.into_iter().all(|c| self.covers_category(*c))
    }

    /// Does this scope permit the given action?
    ///
    /// `Write` is satisfied by either `Write` or `Append` in the action set.
    pub fn covers_action(&self, action: AccessAction) -> bool {
        if self.actions.contains(&action) {
            return true;
        }
        matches!(action, AccessAction::Write) && self.actions.contains(&AccessAction::Append)
    }
}
