use std::collections::BTreeMap;

use keyward_application::PermissionTargetDefinition;
use keyward_core::{AppError, AppResult};
use keyward_domain::{Operation, PermissionScope, PermissionTargetSpec, Principal};
use serde::Serialize;
use serde_json::{Value, json};

/// Operations per user and group, encoded for one API version.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub(super) struct Principals {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    users: BTreeMap<String, Vec<&'static str>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    groups: BTreeMap<String, Vec<&'static str>>,
}

impl Principals {
    fn from_scope<F>(scope: &PermissionScope, role_group: &str, encode: F) -> AppResult<Self>
    where
        F: Fn(&Operation) -> Option<&'static str>,
    {
        let mut principals = Self::default();

        for grant in scope.grants() {
            let codes = grant
                .operations()
                .iter()
                .map(|operation| {
                    encode(operation).ok_or_else(|| unsupported_operation(*operation))
                })
                .collect::<AppResult<Vec<_>>>()?;

            let (entries, name) = match grant.principal() {
                Principal::Role => (&mut principals.groups, role_group),
                Principal::Group(name) => (&mut principals.groups, name.as_str()),
                Principal::User(name) => (&mut principals.users, name.as_str()),
            };
            let granted = entries.entry(name.to_owned()).or_default();
            for code in codes {
                if !granted.contains(&code) {
                    granted.push(code);
                }
            }
        }

        Ok(principals)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LegacyPermissionTarget<'a> {
    name: &'a str,
    includes_pattern: String,
    excludes_pattern: String,
    repositories: &'a [String],
    principals: Principals,
}

#[derive(Debug, Serialize)]
pub(super) struct V2PermissionTarget<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<V2Resource<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<V2Resource<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(super) struct V2Resource<'a> {
    include_patterns: &'a [String],
    exclude_patterns: &'a [String],
    repositories: &'a [String],
    actions: Principals,
}

/// Rejects specs the legacy permission API cannot express.
pub(super) fn check_legacy_compatibility(spec: &PermissionTargetSpec) -> AppResult<()> {
    if spec.build().is_some() {
        return Err(AppError::Validation(
            "the legacy permission API does not support 'build' scopes".to_owned(),
        ));
    }

    if spec.repo().is_none() {
        return Err(AppError::Validation(
            "the legacy permission API requires a 'repo' scope".to_owned(),
        ));
    }

    if let Some(operation) = spec
        .operations()
        .into_iter()
        .find(|operation| operation.legacy_code().is_none())
    {
        return Err(unsupported_operation(operation));
    }

    Ok(())
}

pub(super) fn legacy_permission_target(
    definition: &PermissionTargetDefinition,
) -> AppResult<LegacyPermissionTarget<'_>> {
    check_legacy_compatibility(&definition.spec)?;
    let scope = definition.spec.repo().ok_or_else(|| {
        AppError::Validation("the legacy permission API requires a 'repo' scope".to_owned())
    })?;

    Ok(LegacyPermissionTarget {
        name: definition.name.as_str(),
        includes_pattern: scope.include_patterns().join(","),
        excludes_pattern: scope.exclude_patterns().join(","),
        repositories: scope.repositories(),
        principals: Principals::from_scope(
            scope,
            definition.group_name.as_str(),
            Operation::legacy_code,
        )?,
    })
}

pub(super) fn v2_permission_target(
    definition: &PermissionTargetDefinition,
) -> AppResult<V2PermissionTarget<'_>> {
    let role_group = definition.group_name.as_str();

    Ok(V2PermissionTarget {
        name: definition.name.as_str(),
        repo: definition
            .spec
            .repo()
            .map(|scope| v2_resource(scope, role_group))
            .transpose()?,
        build: definition
            .spec
            .build()
            .map(|scope| v2_resource(scope, role_group))
            .transpose()?,
    })
}

fn v2_resource<'a>(scope: &'a PermissionScope, role_group: &str) -> AppResult<V2Resource<'a>> {
    Ok(V2Resource {
        include_patterns: scope.include_patterns(),
        exclude_patterns: scope.exclude_patterns(),
        repositories: scope.repositories(),
        actions: Principals::from_scope(scope, role_group, |operation| Some(operation.as_str()))?,
    })
}

pub(super) fn legacy_group(group_name: &str, description: &str) -> Value {
    json!({
        "name": group_name,
        "description": description,
        "autoJoin": false,
    })
}

pub(super) fn v2_group(group_name: &str, description: &str) -> Value {
    json!({
        "name": group_name,
        "description": description,
        "auto_join": false,
    })
}

pub(super) fn v2_group_update(description: &str) -> Value {
    json!({
        "description": description,
        "auto_join": false,
    })
}

fn unsupported_operation(operation: Operation) -> AppError {
    AppError::Validation(format!(
        "operation '{operation}' is not supported by the legacy permission API"
    ))
}
