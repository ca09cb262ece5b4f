//! Manual-remediation steps.
//!
//! Whatever the run could not migrate automatically ends up here as an
//! ordered, actionable checklist. Ordering is part of the contract: most
//! critical first, then by assigned number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of a manual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPriority {
    /// Migration is broken until this is done.
    Critical,
    /// Required before production cutover.
    High,
    /// Should be done during the migration window.
    Medium,
    /// Cleanup and hardening.
    Low,
}

impl StepPriority {
    /// Sort rank; lower sorts first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Stable label used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for StepPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of work a manual step is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepCategory {
    /// Writing, reviewing or installing custom plugin code.
    PluginDevelopment,
    /// Provisioning consumers, keys, tokens, certificates.
    Credentials,
    /// Hand-editing the declarative config.
    Configuration,
    /// Applying the config to the target gateway.
    Deployment,
    /// Verifying behavior after cutover.
    Testing,
    /// Human judgement calls the engine could not make.
    Review,
}

impl StepCategory {
    /// Stable label used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PluginDevelopment => "plugin-development",
            Self::Credentials => "credentials",
            Self::Configuration => "configuration",
            Self::Deployment => "deployment",
            Self::Testing => "testing",
            Self::Review => "review",
        }
    }
}

/// One actionable remediation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualStep {
    /// Position in the final ordered plan; assigned by [`sort_steps`].
    pub step_number: u32,
    /// Work category.
    pub category: StepCategory,
    /// Urgency.
    pub priority: StepPriority,
    /// One-line summary.
    pub title: String,
    /// What to do and why.
    pub description: String,
    /// Shell commands to run, in order, when applicable.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Files or constructs the step touches.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl ManualStep {
    /// Create a step; the number is provisional until [`sort_steps`] runs.
    #[must_use]
    pub fn new(
        category: StepCategory,
        priority: StepPriority,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            step_number: 0,
            category,
            priority,
            title: title.into(),
            description: description.into(),
            commands: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Append a shell command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Reference a produced artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }
}

/// Sort steps by priority (critical first) then insertion order, and assign
/// final 1-based step numbers.
pub fn sort_steps(steps: &mut Vec<ManualStep>) {
    // Stable sort keeps insertion order within one priority band.
    steps.sort_by_key(|s| s.priority.rank());
    for (i, step) in steps.iter_mut().enumerate() {
        step.step_number = u32::try_from(i + 1).unwrap_or(u32::MAX);
    }
}
