use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keyward_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{KeyedPermissionTarget, PermissionTargetKey};

/// Token TTL applied when a role write omits `token_ttl`.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 600;

/// Max TTL applied when a role write omits `max_ttl`.
pub const DEFAULT_MAX_TTL_SECONDS: u64 = 3600;

/// Validated role name used as the record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleName(NonEmptyString);

impl RoleName {
    /// Creates a validated role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new(value.into().trim())?;
        let name = value.as_str();

        if !name
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | '.'))
        {
            return Err(AppError::Validation(format!(
                "role name '{name}' may only contain letters, digits, '_', '-', and '.'"
            )));
        }

        let is_edge = |character: char| character.is_ascii_alphanumeric() || character == '_';
        let starts_ok = name.chars().next().is_some_and(is_edge);
        let ends_ok = name.chars().last().is_some_and(is_edge);
        if !starts_ok || !ends_ok {
            return Err(AppError::Validation(format!(
                "role name '{name}' must start and end with a letter, digit, or '_'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable role identifier generated once at role creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0.hyphenated())
    }
}

/// Credential lifetimes configured for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTtls {
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// Upper bound for issued tokens.
    pub max_ttl: Duration,
}

impl RoleTtls {
    /// Resolves request TTLs, falling back to the defaults for absent values.
    #[must_use]
    pub fn resolve(token_ttl_seconds: Option<u64>, max_ttl_seconds: Option<u64>) -> Self {
        Self {
            token_ttl: Duration::from_secs(token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS)),
            max_ttl: Duration::from_secs(max_ttl_seconds.unwrap_or(DEFAULT_MAX_TTL_SECONDS)),
        }
    }
}

impl Default for RoleTtls {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

/// Reconciliation intent recorded before remote calls are issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReconciliation {
    previous_permission_targets: Vec<KeyedPermissionTarget>,
    started_at: DateTime<Utc>,
}

impl PendingReconciliation {
    /// Returns targets that may still exist remotely from earlier state.
    #[must_use]
    pub fn previous_permission_targets(&self) -> &[KeyedPermissionTarget] {
        self.previous_permission_targets.as_slice()
    }

    /// Returns when the intent was recorded.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Persisted role state, one per role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    name: RoleName,
    role_id: RoleId,
    token_ttl_seconds: u64,
    max_ttl_seconds: u64,
    permission_targets: Vec<KeyedPermissionTarget>,
    raw_permission_targets: Option<String>,
    #[serde(default)]
    pending: Option<PendingReconciliation>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    revision: u64,
}

impl RoleRecord {
    /// Creates a committed record without permission targets.
    #[must_use]
    pub fn new(name: RoleName, role_id: RoleId, ttls: RoleTtls, now: DateTime<Utc>) -> Self {
        Self {
            name,
            role_id,
            token_ttl_seconds: ttls.token_ttl.as_secs(),
            max_ttl_seconds: ttls.max_ttl.as_secs(),
            permission_targets: Vec::new(),
            raw_permission_targets: None,
            pending: None,
            updated_at: now,
            revision: 0,
        }
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the immutable role identifier.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns configured credential lifetimes.
    #[must_use]
    pub fn ttls(&self) -> RoleTtls {
        RoleTtls {
            token_ttl: Duration::from_secs(self.token_ttl_seconds),
            max_ttl: Duration::from_secs(self.max_ttl_seconds),
        }
    }

    /// Returns the desired permission targets.
    #[must_use]
    pub fn permission_targets(&self) -> &[KeyedPermissionTarget] {
        self.permission_targets.as_slice()
    }

    /// Returns the verbatim permission target input.
    #[must_use]
    pub fn raw_permission_targets(&self) -> Option<&str> {
        self.raw_permission_targets.as_deref()
    }

    /// Returns the in-flight reconciliation intent, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingReconciliation> {
        self.pending.as_ref()
    }

    /// Returns whether remote state may lag behind this record.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the write counter, bumped by every mutation.
    ///
    /// Stores use it to reject a save based on a stale read.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns targets known to match remote state, `None` while pending.
    #[must_use]
    pub fn committed_permission_targets(&self) -> Option<&[KeyedPermissionTarget]> {
        (!self.is_pending()).then_some(self.permission_targets.as_slice())
    }

    /// Returns every target that may exist remotely for this role.
    ///
    /// Includes the desired targets and, while pending, the baseline of the
    /// interrupted reconciliation. Keys are unique.
    #[must_use]
    pub fn reconciliation_baseline(&self) -> Vec<KeyedPermissionTarget> {
        let mut baseline = self.permission_targets.clone();
        if let Some(pending) = &self.pending {
            for target in &pending.previous_permission_targets {
                if !contains_key(&baseline, target.key()) {
                    baseline.push(target.clone());
                }
            }
        }

        baseline
    }

    /// Replaces credential lifetimes.
    pub fn set_ttls(&mut self, ttls: RoleTtls, now: DateTime<Utc>) {
        self.token_ttl_seconds = ttls.token_ttl.as_secs();
        self.max_ttl_seconds = ttls.max_ttl.as_secs();
        self.touch(now);
    }

    /// Records the desired targets and marks the record pending.
    pub fn begin_reconciliation(
        &mut self,
        desired: Vec<KeyedPermissionTarget>,
        raw_permission_targets: Option<String>,
        now: DateTime<Utc>,
    ) {
        let previous_permission_targets = self.reconciliation_baseline();
        self.permission_targets = desired;
        self.raw_permission_targets = raw_permission_targets;
        self.pending = Some(PendingReconciliation {
            previous_permission_targets,
            started_at: now,
        });
        self.touch(now);
    }

    /// Records targets that may exist remotely outside the desired list.
    ///
    /// They join the pending baseline, so the next reconciliation or repair
    /// deletes them. Targets whose key is already tracked are ignored.
    pub fn track_stray_targets(&mut self, strays: &[KeyedPermissionTarget], now: DateTime<Utc>) {
        let mut previous_permission_targets = self.reconciliation_baseline();
        for target in strays {
            if !contains_key(&previous_permission_targets, target.key()) {
                previous_permission_targets.push(target.clone());
            }
        }

        self.pending = Some(PendingReconciliation {
            previous_permission_targets,
            started_at: now,
        });
        self.touch(now);
    }

    /// Clears the pending marker once remote state matches the record.
    pub fn commit(&mut self, now: DateTime<Utc>) {
        self.pending = None;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.revision = self.revision.saturating_add(1);
    }
}

fn contains_key(targets: &[KeyedPermissionTarget], key: &PermissionTargetKey) -> bool {
    targets.iter().any(|target| target.key() == key)
}
