//! Authentication templates and the template-to-environment adapter.
//!
//! A template is the declarative package describing how to lock and unlock
//! a transaction: named entities owning variables, and named scripts in the
//! template language. The adapter flattens a template into the script,
//! variable, and entity-ownership maps of a compilation environment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::environment::Variable;

/// An entity: a named principal owning a set of variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationTemplateEntity {
    /// A human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The entity's variables, by id.
    #[serde(default)]
    pub variables: HashMap<String, Variable>,
}

/// A named script in the template language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationTemplateScript {
    /// A human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The script source.
    pub script: String,
}

/// A declarative package of scripts, entities, and variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationTemplate {
    /// A human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The template's entities, by id.
    #[serde(default)]
    pub entities: HashMap<String, AuthenticationTemplateEntity>,
    /// The template's scripts, by id.
    #[serde(default)]
    pub scripts: HashMap<String, AuthenticationTemplateScript>,
}

/// The environment fields produced by flattening a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateEnvironmentParts {
    /// Script id to source.
    pub scripts: HashMap<String, String>,
    /// Variable id to variable.
    pub variables: HashMap<String, Variable>,
    /// Variable id to owning entity id.
    pub entity_ownership: HashMap<String, String>,
}

/// Flatten a template's entities and scripts into environment maps.
///
/// Each variable id is expected to appear in exactly one entity's variable
/// set; when two entities declare the same id, the last write wins
/// (templates are assumed unambiguous and validated upstream).
pub fn flatten_template(template: &AuthenticationTemplate) -> TemplateEnvironmentParts {
    let scripts = template
        .scripts
        .iter()
        .map(|(id, script)| (id.clone(), script.script.clone()))
        .collect();

    let mut variables = HashMap::new();
    let mut entity_ownership = HashMap::new();
    for (entity_id, entity) in &template.entities {
        for (variable_id, variable) in &entity.variables {
            variables.insert(variable_id.clone(), variable.clone());
            entity_ownership.insert(variable_id.clone(), entity_id.clone());
        }
    }

    TemplateEnvironmentParts {
        scripts,
        variables,
        entity_ownership,
    }
}
