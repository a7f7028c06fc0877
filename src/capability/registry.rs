//! The capability registry.
//!
//! [`CapabilitySet::build`] turns a [`ServerSpec`]'s factories into the
//! filtered, ordered set of live capabilities for one session or request.
//! Skipped definitions are registered nowhere; duplicate names within a
//! category are a configuration error surfaced here, not at call time.
//! Registration order is the declaration order, so capability listings are
//! deterministic.

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ProcessFlags;
use crate::flags::{Category, FeatureFlags};

use super::def::{
    match_uri_template, PromptDef, PromptResult, ResourceContents, ResourceDef, ResourceRequest,
    ResourceUri, ServerSpec, ToolCallResult, ToolDef,
};
use super::wrapper;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate {category} name: {name}")]
    DuplicateName { category: Category, name: String },

    #[error("Invalid input schema for tool '{name}': {message}")]
    InvalidSchema { name: String, message: String },
}

/// A visible tool bound to its instrumented invocation path. Tools with a
/// REST route also carry their compiled input validator.
pub struct RegisteredTool {
    pub def: ToolDef,
    validator: Option<jsonschema::Validator>,
}

impl RegisteredTool {
    /// Invoke through the wrapper: never fails, tool errors come back as an
    /// error-flagged result.
    pub async fn invoke(&self, args: Value) -> ToolCallResult {
        wrapper::invoke_tool(&self.def.name, &self.def.handler, args).await
    }

    /// Validate a REST input object against the declared schema.
    pub fn validate_input(&self, input: &Value) -> Result<(), Vec<String>> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let issues: Vec<String> = validator
            .iter_errors(input)
            .map(|error| format!("{}: {}", error.instance_path, error))
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// The filtered, ordered capability set exposed to one session or request.
pub struct CapabilitySet {
    pub server_name: String,
    pub server_version: String,
    pub instructions: Option<String>,
    tools: Vec<RegisteredTool>,
    prompts: Vec<PromptDef>,
    resources: Vec<ResourceDef>,
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("server_name", &self.server_name)
            .field("server_version", &self.server_version)
            .field("instructions", &self.instructions)
            .field("tools", &self.tools.len())
            .field("prompts", &self.prompts.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl CapabilitySet {
    /// Evaluate every factory against the shared context and resolved
    /// flags, keep what the visibility policy admits, and bind it.
    pub fn build<C>(
        context: &C,
        process: &ProcessFlags,
        flags: &FeatureFlags,
        spec: &ServerSpec<C>,
    ) -> Result<Self, RegistryError> {
        let mut tools = Vec::new();
        for factory in &spec.tools {
            let def = factory(context, flags);
            if !flags.visible(process, Category::Tool, &def.name, def.disabled) {
                continue;
            }
            if tools.iter().any(|t: &RegisteredTool| t.def.name == def.name) {
                return Err(RegistryError::DuplicateName {
                    category: Category::Tool,
                    name: def.name,
                });
            }
            // Only REST-routed tools need a compiled validator; protocol
            // callers validate upstream.
            let validator = if def.method.is_some() && def.route.is_some() {
                Some(jsonschema::validator_for(&def.input_schema).map_err(|error| {
                    RegistryError::InvalidSchema {
                        name: def.name.clone(),
                        message: error.to_string(),
                    }
                })?)
            } else {
                None
            };
            tools.push(RegisteredTool { def, validator });
        }

        let mut prompts: Vec<PromptDef> = Vec::new();
        for factory in &spec.prompts {
            let def = factory(context, flags);
            if !flags.visible(process, Category::Prompt, &def.name, def.disabled) {
                continue;
            }
            if prompts.iter().any(|p| p.name == def.name) {
                return Err(RegistryError::DuplicateName {
                    category: Category::Prompt,
                    name: def.name,
                });
            }
            prompts.push(def);
        }

        let mut resources: Vec<ResourceDef> = Vec::new();
        for factory in &spec.resources {
            let def = factory(context, flags);
            if !flags.visible(process, Category::Resource, &def.name, def.disabled) {
                continue;
            }
            if resources.iter().any(|r| r.name == def.name) {
                return Err(RegistryError::DuplicateName {
                    category: Category::Resource,
                    name: def.name,
                });
            }
            resources.push(def);
        }

        Ok(CapabilitySet {
            server_name: spec.name.clone(),
            server_version: spec.version.clone(),
            instructions: spec.instructions.clone(),
            tools,
            prompts,
            resources,
        })
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }

    pub fn tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.def.name == name)
    }

    pub fn prompt(&self, name: &str) -> Option<&PromptDef> {
        self.prompts.iter().find(|p| p.name == name)
    }

    /// Tools that declared a REST exposure, in registration order.
    pub fn rest_tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools
            .iter()
            .filter(|t| t.def.method.is_some() && t.def.route.is_some())
    }

    pub fn list_tools(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.def.descriptor()).collect()
    }

    pub fn list_prompts(&self) -> Vec<Value> {
        self.prompts.iter().map(PromptDef::descriptor).collect()
    }

    /// Static resources plus whatever the templated definitions' list
    /// callbacks enumerate.
    pub async fn list_resources(&self) -> anyhow::Result<Vec<Value>> {
        let mut out = Vec::new();
        for resource in &self.resources {
            match &resource.uri {
                ResourceUri::Fixed(_) => out.push(resource.descriptor()),
                ResourceUri::Template(_) => {
                    if let Some(list) = &resource.list {
                        let entries =
                            wrapper::invoke_resource_list(&resource.name, list).await?;
                        for entry in entries {
                            out.push(serde_json::to_value(entry)?);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn list_resource_templates(&self) -> Vec<Value> {
        self.resources
            .iter()
            .filter(|r| matches!(r.uri, ResourceUri::Template(_)))
            .map(ResourceDef::descriptor)
            .collect()
    }

    /// Read a resource by concrete URI, resolving templates as needed.
    pub async fn read_resource(
        &self,
        uri: &str,
    ) -> Option<anyhow::Result<Vec<ResourceContents>>> {
        for resource in &self.resources {
            let variables = match &resource.uri {
                ResourceUri::Fixed(fixed) if fixed == uri => json!({}),
                ResourceUri::Template(template) => match match_uri_template(template, uri) {
                    Some(vars) => vars,
                    None => continue,
                },
                _ => continue,
            };
            let request = ResourceRequest {
                uri: uri.to_string(),
                variables,
            };
            return Some(wrapper::invoke_resource_read(&resource.name, &resource.read, request).await);
        }
        None
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        args: Value,
    ) -> Option<anyhow::Result<PromptResult>> {
        let prompt = self.prompt(name)?;
        Some(wrapper::invoke_prompt(&prompt.name, &prompt.handler, args).await)
    }
}
