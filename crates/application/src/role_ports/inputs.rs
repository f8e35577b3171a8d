use std::time::Duration;

/// Input payload for role create-or-update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveRoleInput {
    /// Role name, the record key.
    pub name: String,
    /// Optional token TTL in seconds.
    pub token_ttl_seconds: Option<u64>,
    /// Optional max TTL in seconds.
    pub max_ttl_seconds: Option<u64>,
    /// Optional serialized permission target list.
    pub permission_targets: Option<String>,
}

/// Remote permission target names touched by one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    /// Targets that did not exist and were created.
    pub created: Vec<String>,
    /// Targets whose content was pushed again.
    pub updated: Vec<String>,
    /// Targets that already matched.
    pub unchanged: Vec<String>,
    /// Stale targets removed.
    pub deleted: Vec<String>,
}

/// Result of a successful create-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    /// Stable role identifier.
    pub role_id: String,
    /// Role name.
    pub role_name: String,
    /// Verbatim permission target input.
    pub permission_targets: Option<String>,
    /// Remote changes applied.
    pub reconciliation: ReconcileSummary,
}

/// Read projection of a stored role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleView {
    /// Role name.
    pub name: String,
    /// Stable role identifier.
    pub role_id: String,
    /// Token TTL in seconds.
    pub token_ttl_seconds: u64,
    /// Max TTL in seconds.
    pub max_ttl_seconds: u64,
    /// Verbatim permission target input.
    pub permission_targets: Option<String>,
    /// Whether remote state may still lag behind the record.
    pub pending: bool,
}

/// Group identity and lifetimes used when issuing credentials for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    /// Role name.
    pub role_name: String,
    /// Stable role identifier.
    pub role_id: String,
    /// Remote group credentials are bound to.
    pub group_name: String,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// Upper bound for issued tokens.
    pub max_ttl: Duration,
}

/// Outcome of a role delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDeletion {
    /// The role and its remote objects were removed.
    Deleted {
        /// Identifier of the removed role.
        role_id: String,
    },
    /// No role was stored under the name.
    NotFound,
}

/// Outcome of repairing one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// A pending reconciliation was completed.
    Repaired(ReconcileSummary),
    /// The record was already committed.
    AlreadyConsistent,
    /// The pending reconciliation is recent and may still be running.
    Deferred,
}

/// Role that could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFailure {
    /// Role name.
    pub role_name: String,
    /// Failure description.
    pub message: String,
}

/// Result of a repair pass over every stored role.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepairReport {
    /// Roles whose pending reconciliation completed.
    pub repaired: Vec<String>,
    /// Number of roles already consistent.
    pub consistent: usize,
    /// Roles left pending because their write is recent or changed during repair.
    pub deferred: Vec<String>,
    /// Roles that are still pending.
    pub failed: Vec<RepairFailure>,
}
