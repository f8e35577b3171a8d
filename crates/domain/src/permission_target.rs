use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use keyward_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::Operation;

/// Only repository a build scope may reference.
pub const BUILD_INFO_REPOSITORY: &str = "artifactory-build-info";

/// Include pattern applied when a scope omits `include_patterns`.
pub const DEFAULT_INCLUDE_PATTERN: &str = "**";

/// Exclude pattern applied when a scope omits `exclude_patterns`.
pub const DEFAULT_EXCLUDE_PATTERN: &str = "";

const PERMISSION_TARGET_NAME_MAX_LENGTH: usize = 64;

/// Raw permission target entry as submitted by callers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionTargetInput {
    /// Optional stable logical name.
    #[serde(default)]
    pub name: Option<String>,
    /// Repository scope.
    #[serde(default)]
    pub repo: Option<PermissionScopeInput>,
    /// Build scope.
    #[serde(default)]
    pub build: Option<PermissionScopeInput>,
}

/// Raw scope declaration inside a permission target entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionScopeInput {
    /// Patterns of paths included in the scope.
    #[serde(default)]
    pub include_patterns: Option<Vec<String>>,
    /// Patterns of paths excluded from the scope.
    #[serde(default)]
    pub exclude_patterns: Option<Vec<String>>,
    /// Repositories covered by the scope.
    #[serde(default)]
    pub repositories: Option<Vec<String>>,
    /// Granted operations, also accepted as `actions`.
    #[serde(default, alias = "actions")]
    pub operations: Option<OperationsInput>,
}

/// Operations declared either as a flat list or per principal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OperationsInput {
    /// Operations granted to the role's own group.
    List(Vec<String>),
    /// Operations keyed by `role`, `group:<name>`, or `user:<name>`.
    ByPrincipal(BTreeMap<String, Vec<String>>),
}

/// Parses the serialized permission target list submitted with a role.
pub fn parse_permission_targets(raw: &str) -> AppResult<Vec<PermissionTargetInput>> {
    serde_json::from_str(raw).map_err(|error| {
        AppError::Validation(format!(
            "permission targets must be a JSON list of permission target objects: {error}"
        ))
    })
}

/// Validates every entry of a desired permission target list.
///
/// The first invalid entry rejects the whole list.
pub fn validate_permission_targets(
    inputs: Vec<PermissionTargetInput>,
) -> AppResult<Vec<PermissionTargetSpec>> {
    let mut specs = Vec::with_capacity(inputs.len());
    let mut seen_names = HashSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let spec = PermissionTargetSpec::new(input).map_err(|error| match error {
            AppError::Validation(message) => {
                AppError::Validation(format!("permission target #{index}: {message}"))
            }
            other => other,
        })?;

        if let Some(name) = spec.name()
            && !seen_names.insert(name.to_owned())
        {
            return Err(AppError::Validation(format!(
                "permission target #{index}: duplicate permission target name '{name}'"
            )));
        }

        specs.push(spec);
    }

    Ok(specs)
}

/// Which resource family a scope grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Repository content.
    Repo,
    /// Build info.
    Build,
}

impl ScopeKind {
    /// Returns the stable field name for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Build => "build",
        }
    }
}

/// Remote principal that receives the operations of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Principal {
    /// The group owned by the role.
    Role,
    /// A named remote group.
    Group(String),
    /// A named remote user.
    User(String),
}

impl FromStr for Principal {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value == "role" {
            return Ok(Self::Role);
        }

        let (kind, name) = value.split_once(':').ok_or_else(|| {
            AppError::Validation(format!(
                "principal '{value}' must be 'role', 'group:<name>', or 'user:<name>'"
            ))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(format!(
                "principal '{value}' is missing a name"
            )));
        }

        match kind.trim() {
            "group" => Ok(Self::Group(name.to_owned())),
            "user" => Ok(Self::User(name.to_owned())),
            other => Err(AppError::Validation(format!(
                "unknown principal kind '{other}'"
            ))),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Role => formatter.write_str("role"),
            Self::Group(name) => write!(formatter, "group:{name}"),
            Self::User(name) => write!(formatter, "user:{name}"),
        }
    }
}

/// Operations granted to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalGrant {
    principal: Principal,
    operations: Vec<Operation>,
}

impl PrincipalGrant {
    /// Returns the receiving principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns granted operations in canonical order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        self.operations.as_slice()
    }
}

/// Validated repository or build scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScope {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    repositories: Vec<String>,
    grants: Vec<PrincipalGrant>,
}

impl PermissionScope {
    /// Creates a validated scope, applying pattern defaults.
    pub fn new(kind: ScopeKind, input: PermissionScopeInput) -> AppResult<Self> {
        let PermissionScopeInput {
            include_patterns,
            exclude_patterns,
            repositories,
            operations,
        } = input;
        let scope = kind.as_str();

        let repositories = validate_repositories(kind, repositories)?;

        let include_patterns = include_patterns
            .filter(|patterns| !patterns.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_INCLUDE_PATTERN.to_owned()]);
        let exclude_patterns = exclude_patterns
            .filter(|patterns| !patterns.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_EXCLUDE_PATTERN.to_owned()]);

        let grants = match operations {
            None => {
                return Err(AppError::Validation(format!(
                    "{scope} scope requires operations"
                )));
            }
            Some(OperationsInput::List(values)) => {
                vec![PrincipalGrant {
                    principal: Principal::Role,
                    operations: parse_operations(scope, "role", values)?,
                }]
            }
            Some(OperationsInput::ByPrincipal(entries)) => {
                if entries.is_empty() {
                    return Err(AppError::Validation(format!(
                        "{scope} scope requires operations"
                    )));
                }

                let mut grants: Vec<PrincipalGrant> = Vec::with_capacity(entries.len());
                for (principal, values) in entries {
                    let parsed = Principal::from_str(principal.as_str())?;
                    if grants.iter().any(|grant| grant.principal == parsed) {
                        return Err(AppError::Validation(format!(
                            "{scope} scope declares principal '{parsed}' more than once"
                        )));
                    }

                    let operations = parse_operations(scope, principal.as_str(), values)?;
                    grants.push(PrincipalGrant {
                        principal: parsed,
                        operations,
                    });
                }
                grants.sort_by(|left, right| left.principal.cmp(&right.principal));
                grants
            }
        };

        Ok(Self {
            include_patterns,
            exclude_patterns,
            repositories,
            grants,
        })
    }

    /// Returns included path patterns.
    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        self.include_patterns.as_slice()
    }

    /// Returns excluded path patterns.
    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        self.exclude_patterns.as_slice()
    }

    /// Returns covered repositories.
    #[must_use]
    pub fn repositories(&self) -> &[String] {
        self.repositories.as_slice()
    }

    /// Returns grants ordered by principal.
    #[must_use]
    pub fn grants(&self) -> &[PrincipalGrant] {
        self.grants.as_slice()
    }
}

fn validate_repositories(
    kind: ScopeKind,
    repositories: Option<Vec<String>>,
) -> AppResult<Vec<String>> {
    let scope = kind.as_str();
    let repositories = repositories.unwrap_or_default();
    if repositories.is_empty() {
        return Err(AppError::Validation(format!(
            "{scope} scope requires at least one repository"
        )));
    }

    let mut validated = Vec::with_capacity(repositories.len());
    for repository in repositories {
        let repository = repository.trim().to_owned();
        if repository.is_empty() {
            return Err(AppError::Validation(format!(
                "{scope} scope repositories must not contain blank entries"
            )));
        }

        if kind == ScopeKind::Build && repository != BUILD_INFO_REPOSITORY {
            return Err(AppError::Validation(format!(
                "build scope only supports repository '{BUILD_INFO_REPOSITORY}', got '{repository}'"
            )));
        }

        if !validated.contains(&repository) {
            validated.push(repository);
        }
    }

    Ok(validated)
}

fn parse_operations(scope: &str, principal: &str, values: Vec<String>) -> AppResult<Vec<Operation>> {
    if values.is_empty() {
        return Err(AppError::Validation(format!(
            "{scope} scope requires at least one operation for '{principal}'"
        )));
    }

    let operations = values
        .iter()
        .map(|value| Operation::from_str(value.trim()))
        .collect::<AppResult<BTreeSet<_>>>()?;

    Ok(operations.into_iter().collect())
}

/// Validated permission target declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTargetSpec {
    name: Option<String>,
    repo: Option<PermissionScope>,
    build: Option<PermissionScope>,
}

impl PermissionTargetSpec {
    /// Creates a validated permission target from caller input.
    pub fn new(input: PermissionTargetInput) -> AppResult<Self> {
        let PermissionTargetInput { name, repo, build } = input;

        let name = name
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(validate_target_name)
            .transpose()?;

        if repo.is_none() && build.is_none() {
            return Err(AppError::Validation(
                "permission target requires a 'repo' or 'build' scope".to_owned(),
            ));
        }

        Ok(Self {
            name,
            repo: repo
                .map(|scope| PermissionScope::new(ScopeKind::Repo, scope))
                .transpose()?,
            build: build
                .map(|scope| PermissionScope::new(ScopeKind::Build, scope))
                .transpose()?,
        })
    }

    /// Returns the optional logical name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the repository scope.
    #[must_use]
    pub fn repo(&self) -> Option<&PermissionScope> {
        self.repo.as_ref()
    }

    /// Returns the build scope.
    #[must_use]
    pub fn build(&self) -> Option<&PermissionScope> {
        self.build.as_ref()
    }

    /// Returns every declared scope with its kind.
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeKind, &PermissionScope)> {
        self.repo
            .iter()
            .map(|scope| (ScopeKind::Repo, scope))
            .chain(self.build.iter().map(|scope| (ScopeKind::Build, scope)))
    }

    /// Returns the distinct operations granted anywhere in this target.
    #[must_use]
    pub fn operations(&self) -> BTreeSet<Operation> {
        self.scopes()
            .flat_map(|(_, scope)| scope.grants())
            .flat_map(|grant| grant.operations().iter().copied())
            .collect()
    }

    /// Returns the identity of this spec when it sits at `index` in a list.
    #[must_use]
    pub fn key_at(&self, index: usize) -> PermissionTargetKey {
        match &self.name {
            Some(name) => PermissionTargetKey::Named(name.clone()),
            None => PermissionTargetKey::Index(index),
        }
    }
}

fn validate_target_name(name: String) -> AppResult<String> {
    if name.len() > PERMISSION_TARGET_NAME_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "permission target name '{name}' exceeds {PERMISSION_TARGET_NAME_MAX_LENGTH} characters"
        )));
    }

    if !name
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | '.'))
    {
        return Err(AppError::Validation(format!(
            "permission target name '{name}' may only contain letters, digits, '_', '-', and '.'"
        )));
    }

    if name.chars().all(|character| character.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "permission target name '{name}' must not be purely numeric"
        )));
    }

    Ok(name)
}

/// Stable identity of a permission target within its role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionTargetKey {
    /// Anonymous target identified by its list position.
    Index(usize),
    /// Target identified by its logical name.
    Named(String),
}

impl Display for PermissionTargetKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(formatter, "{index}"),
            Self::Named(name) => formatter.write_str(name),
        }
    }
}

/// Permission target paired with the identity it was reconciled under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedPermissionTarget {
    key: PermissionTargetKey,
    spec: PermissionTargetSpec,
}

impl KeyedPermissionTarget {
    /// Returns the identity.
    #[must_use]
    pub fn key(&self) -> &PermissionTargetKey {
        &self.key
    }

    /// Returns the declaration.
    #[must_use]
    pub fn spec(&self) -> &PermissionTargetSpec {
        &self.spec
    }
}

/// Assigns identities to a validated list in submission order.
#[must_use]
pub fn key_permission_targets(specs: Vec<PermissionTargetSpec>) -> Vec<KeyedPermissionTarget> {
    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| KeyedPermissionTarget {
            key: spec.key_at(index),
            spec,
        })
        .collect()
}
