use std::fmt::{Display, Formatter};
use std::str::FromStr;

use keyward_core::AppError;
use serde::{Deserialize, Serialize};

/// Operations a permission target can grant on its repositories or builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Download and browse artifacts.
    Read,
    /// Deploy and cache artifacts.
    Write,
    /// Annotate artifacts with properties.
    Annotate,
    /// Delete and overwrite artifacts.
    Delete,
    /// Manage the permission target itself.
    Manage,
    /// Manage Xray metadata.
    ManagedXrayMeta,
    /// Distribute release bundles.
    Distribute,
}

impl Operation {
    /// Returns the stable transport value for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Annotate => "annotate",
            Self::Delete => "delete",
            Self::Manage => "manage",
            Self::ManagedXrayMeta => "managedXrayMeta",
            Self::Distribute => "distribute",
        }
    }

    /// Returns the single-letter code used by the legacy permission API.
    ///
    /// `None` means the legacy API has no equivalent for the operation.
    #[must_use]
    pub fn legacy_code(&self) -> Option<&'static str> {
        match self {
            Self::Read => Some("r"),
            Self::Write => Some("w"),
            Self::Annotate => Some("n"),
            Self::Delete => Some("d"),
            Self::Manage => Some("m"),
            Self::ManagedXrayMeta | Self::Distribute => None,
        }
    }

    /// Returns all known operations.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Operation] = &[
            Operation::Read,
            Operation::Write,
            Operation::Annotate,
            Operation::Delete,
            Operation::Manage,
            Operation::ManagedXrayMeta,
            Operation::Distribute,
        ];

        ALL
    }
}

impl Display for Operation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|operation| operation.as_str() == value)
            .ok_or_else(|| {
                let known = Self::all()
                    .iter()
                    .map(Operation::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                AppError::Validation(format!(
                    "unknown operation '{value}', expected one of: {known}"
                ))
            })
    }
}
