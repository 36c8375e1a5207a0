//! Selection of related entities to attach to or detach from a resource.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::client::{CliError, CliResult};
use crate::models::Role;
use crate::prompt::{Prompt, select_blocking};

/// Anything with a stable identifier and a display name.
pub(crate) trait NamedEntity {
    /// Server identifier.
    fn id(&self) -> &str;
    /// Human-readable name.
    fn name(&self) -> &str;
}

impl NamedEntity for Role {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Names used in prompts and messages for one kind of related entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityKind {
    /// Singular noun, e.g. `role`.
    pub(crate) singular: &'static str,
    /// Plural noun, e.g. `roles`.
    pub(crate) plural: &'static str,
    /// Prompt title, e.g. `Roles`.
    pub(crate) title: &'static str,
}

/// Roles attached to users.
pub(crate) const ROLES: EntityKind = EntityKind {
    singular: "role",
    plural: "roles",
    title: "Roles",
};

/// Entry presented in a multi-select prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectionOption {
    id: String,
    name: String,
}

impl SelectionOption {
    /// Build an option, rejecting identifiers that cannot round-trip
    /// through a label.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty identifiers or identifiers
    /// containing whitespace.
    pub(crate) fn new(id: impl Into<String>, name: impl Into<String>) -> CliResult<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self {
            id,
            name: name.into(),
        })
    }

    /// Option for a named entity.
    ///
    /// # Errors
    ///
    /// See [`SelectionOption::new`].
    pub(crate) fn from_entity<E: NamedEntity>(entity: &E) -> CliResult<Self> {
        Self::new(entity.id(), entity.name())
    }

    /// Identifier carried by this option.
    #[must_use]
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Consume the option, keeping only its identifier.
    #[must_use]
    pub(crate) fn into_id(self) -> String {
        self.id
    }
}

impl Display for SelectionOption {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} (Name: {})", self.id, self.name)
    }
}

fn validate_identifier(id: &str) -> CliResult<()> {
    if id.is_empty() {
        return Err(CliError::validation("identifier must not be empty"));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(CliError::validation(format!(
            "identifier '{id}' contains whitespace and cannot be selected"
        )));
    }
    Ok(())
}

/// Recover the identifier from a label such as `rol_123 (Name: Admin)`.
///
/// A bare identifier is returned unchanged.
///
/// # Errors
///
/// Returns a validation error when the label has no identifier.
pub(crate) fn parse_selection_label(label: &str) -> CliResult<String> {
    let label = label.trim();
    let id = label.split_once(' ').map_or(label, |(id, _)| id);
    validate_identifier(id)?;
    Ok(id.to_string())
}

/// Options for entities in `universe` that are not yet in `current`.
///
/// # Errors
///
/// Returns a validation error when everything is already assigned, or when
/// an identifier cannot be represented as an option.
pub(crate) fn options_to_add<E: NamedEntity>(
    kind: EntityKind,
    owner: &str,
    universe: &[E],
    current: &[E],
) -> CliResult<Vec<SelectionOption>> {
    let assigned: HashSet<&str> = current.iter().map(NamedEntity::id).collect();
    let options = universe
        .iter()
        .filter(|entity| !assigned.contains(entity.id()))
        .map(SelectionOption::from_entity)
        .collect::<CliResult<Vec<_>>>()?;

    if options.is_empty() {
        return Err(CliError::validation(format!(
            "the {owner} has all {} assigned already",
            kind.plural
        )));
    }
    Ok(options)
}

/// Options for every entity in `current`.
///
/// # Errors
///
/// Returns a validation error when nothing is assigned.
pub(crate) fn options_to_remove<E: NamedEntity>(
    kind: EntityKind,
    owner: &str,
    current: &[E],
) -> CliResult<Vec<SelectionOption>> {
    if current.is_empty() {
        return Err(CliError::validation(format!(
            "the {owner} has no {} assigned",
            kind.plural
        )));
    }
    current.iter().map(SelectionOption::from_entity).collect()
}

/// Ask the operator to choose among `options` and return the chosen ids.
///
/// # Errors
///
/// Returns [`CliError::Aborted`] when nothing is selected.
pub(crate) async fn pick(
    prompt: &Arc<dyn Prompt>,
    kind: EntityKind,
    options: Vec<SelectionOption>,
) -> CliResult<Vec<String>> {
    let selected = select_blocking(Arc::clone(prompt), kind.title.to_string(), options).await?;
    if selected.is_empty() {
        return Err(CliError::aborted(format!(
            "required to select at least one {}",
            kind.singular
        )));
    }
    tracing::debug!(
        kind = kind.plural,
        selected = ?selected.iter().map(SelectionOption::id).collect::<Vec<_>>(),
        "selection made"
    );
    Ok(selected.into_iter().map(SelectionOption::into_id).collect())
}
