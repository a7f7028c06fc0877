//! Capability definition types.
//!
//! Definitions are type-erased for heterogeneous storage (boxed handlers
//! over `serde_json::Value`), while the constructors stay strongly typed at
//! the call site: a tool handler is any `Fn(Value) -> Future<Result<Value>>`
//! closure. Schemas are opaque JSON Schema documents; this crate only cares
//! about their presence, validation itself happens at the REST boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::flags::FeatureFlags;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<anyhow::Result<Value>> + Send + Sync>;
pub type PromptHandler = Arc<dyn Fn(Value) -> BoxFuture<anyhow::Result<PromptResult>> + Send + Sync>;
pub type ReadHandler =
    Arc<dyn Fn(ResourceRequest) -> BoxFuture<anyhow::Result<Vec<ResourceContents>>> + Send + Sync>;
pub type ListHandler =
    Arc<dyn Fn() -> BoxFuture<anyhow::Result<Vec<ResourceDescriptor>>> + Send + Sync>;
pub type PickFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A single block of tool/prompt content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Dual-shaped tool result: a serialized text block for agents that read
/// prose, plus the structured form for consumers that want the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: ContentBlock,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        PromptMessage {
            role: "user".to_string(),
            content: ContentBlock::text(text),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        PromptMessage {
            role: "assistant".to_string(),
            content: ContentBlock::text(text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

/// One piece of resource content returned from a read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

/// A listable resource entry, as produced by templated-resource list
/// callbacks and by static definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The concrete URI a read was addressed to, plus any variables captured
/// from the owning template (empty object for static resources).
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub uri: String,
    pub variables: Value,
}

/// HTTP methods a tool may be mounted under on the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// A declared tool: protocol-callable, and additionally REST-mounted when
/// both `method` and `route` are set.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub annotations: Option<Value>,
    pub method: Option<RestMethod>,
    pub route: Option<String>,
    pub disabled: bool,
    pub handler: ToolHandler,
    pub pick_result: Option<PickFn>,
}

impl ToolDef {
    pub fn new<F, Fut>(name: impl Into<String>, input_schema: Value, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args| Box::pin(handler(args)));
        ToolDef {
            name: name.into(),
            title: None,
            description: None,
            input_schema,
            output_schema: None,
            annotations: None,
            method: None,
            route: None,
            disabled: false,
            handler,
            pick_result: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn annotations(mut self, annotations: Value) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Mount this tool on the REST surface at `route` (axum path syntax,
    /// e.g. `/things/{id}`).
    pub fn rest_route(mut self, method: RestMethod, route: impl Into<String>) -> Self {
        self.method = Some(method);
        self.route = Some(route.into());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Project the structured result before serializing it as the REST
    /// response body.
    pub fn pick_result<F>(mut self, pick: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.pick_result = Some(Arc::new(pick));
        self
    }

    /// The descriptor advertised by `tools/list`.
    pub fn descriptor(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.name));
        if let Some(title) = &self.title {
            out.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &self.description {
            out.insert("description".to_string(), json!(description));
        }
        out.insert("inputSchema".to_string(), self.input_schema.clone());
        if let Some(schema) = &self.output_schema {
            out.insert("outputSchema".to_string(), schema.clone());
        }
        if let Some(annotations) = &self.annotations {
            // Clients that predate top-level titles look for it here.
            let mut annotations = annotations.clone();
            if let (Some(obj), Some(title)) = (annotations.as_object_mut(), &self.title) {
                obj.entry("title").or_insert_with(|| json!(title));
            }
            out.insert("annotations".to_string(), annotations);
        } else if let Some(title) = &self.title {
            out.insert("annotations".to_string(), json!({ "title": title }));
        }
        Value::Object(out)
    }
}

/// A declared prompt.
#[derive(Clone)]
pub struct PromptDef {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Argument declarations as advertised by `prompts/list`.
    pub arguments: Value,
    pub disabled: bool,
    pub handler: PromptHandler,
}

impl PromptDef {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PromptResult>> + Send + 'static,
    {
        let handler: PromptHandler = Arc::new(move |args| Box::pin(handler(args)));
        PromptDef {
            name: name.into(),
            title: None,
            description: None,
            arguments: json!([]),
            disabled: false,
            handler,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn descriptor(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.name));
        if let Some(title) = &self.title {
            out.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &self.description {
            out.insert("description".to_string(), json!(description));
        }
        out.insert("arguments".to_string(), self.arguments.clone());
        Value::Object(out)
    }
}

/// Where a resource lives: a fixed URI, or a URI template whose `{var}`
/// segments are captured and handed to the read handler.
#[derive(Debug, Clone)]
pub enum ResourceUri {
    Fixed(String),
    Template(String),
}

/// A declared resource, static or templated.
#[derive(Clone)]
pub struct ResourceDef {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub uri: ResourceUri,
    /// Optional enumeration callback for templated resources.
    pub list: Option<ListHandler>,
    pub disabled: bool,
    pub read: ReadHandler,
}

impl ResourceDef {
    pub fn fixed<F, Fut>(name: impl Into<String>, uri: impl Into<String>, read: F) -> Self
    where
        F: Fn(ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<ResourceContents>>> + Send + 'static,
    {
        Self::with_uri(name, ResourceUri::Fixed(uri.into()), read)
    }

    pub fn templated<F, Fut>(name: impl Into<String>, template: impl Into<String>, read: F) -> Self
    where
        F: Fn(ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<ResourceContents>>> + Send + 'static,
    {
        Self::with_uri(name, ResourceUri::Template(template.into()), read)
    }

    fn with_uri<F, Fut>(name: impl Into<String>, uri: ResourceUri, read: F) -> Self
    where
        F: Fn(ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<ResourceContents>>> + Send + 'static,
    {
        let read: ReadHandler = Arc::new(move |request| Box::pin(read(request)));
        ResourceDef {
            name: name.into(),
            title: None,
            description: None,
            mime_type: None,
            uri,
            list: None,
            disabled: false,
            read,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Enumeration callback used by `resources/list` for templated
    /// resources.
    pub fn list<F, Fut>(mut self, list: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<ResourceDescriptor>>> + Send + 'static,
    {
        let list: ListHandler = Arc::new(move || Box::pin(list()));
        self.list = Some(list);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn descriptor(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.name));
        match &self.uri {
            ResourceUri::Fixed(uri) => {
                out.insert("uri".to_string(), json!(uri));
            }
            ResourceUri::Template(template) => {
                out.insert("uriTemplate".to_string(), json!(template));
            }
        }
        if let Some(title) = &self.title {
            out.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &self.description {
            out.insert("description".to_string(), json!(description));
        }
        if let Some(mime_type) = &self.mime_type {
            out.insert("mimeType".to_string(), json!(mime_type));
        }
        Value::Object(out)
    }
}

/// Match a concrete URI against a `{var}` template, capturing variables.
///
/// Matching is segment-wise on `/`; a `{name}` segment captures the
/// corresponding URI segment verbatim. Returns `None` when the shapes
/// differ.
pub fn match_uri_template(template: &str, uri: &str) -> Option<Value> {
    let template_parts: Vec<&str> = template.split('/').collect();
    let uri_parts: Vec<&str> = uri.split('/').collect();
    if template_parts.len() != uri_parts.len() {
        return None;
    }

    let mut variables = Map::new();
    for (pattern, actual) in template_parts.iter().zip(uri_parts.iter()) {
        if let Some(name) = pattern
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            if actual.is_empty() {
                return None;
            }
            variables.insert(name.to_string(), json!(actual));
        } else if pattern != actual {
            return None;
        }
    }
    Some(Value::Object(variables))
}

pub type ToolFactory<C> = Arc<dyn Fn(&C, &FeatureFlags) -> ToolDef + Send + Sync>;
pub type PromptFactory<C> = Arc<dyn Fn(&C, &FeatureFlags) -> PromptDef + Send + Sync>;
pub type ResourceFactory<C> = Arc<dyn Fn(&C, &FeatureFlags) -> ResourceDef + Send + Sync>;

/// The declarative description of a server: identity plus capability
/// factories. Factories run once per session (stateful mode) or once per
/// request (stateless mode), receiving the shared context and that
/// request's resolved feature flags.
pub struct ServerSpec<C> {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
    pub tools: Vec<ToolFactory<C>>,
    pub prompts: Vec<PromptFactory<C>>,
    pub resources: Vec<ResourceFactory<C>>,
}

impl<C> ServerSpec<C> {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        ServerSpec {
            name: name.into(),
            version: version.into(),
            instructions: None,
            tools: Vec::new(),
            prompts: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool<F>(mut self, factory: F) -> Self
    where
        F: Fn(&C, &FeatureFlags) -> ToolDef + Send + Sync + 'static,
    {
        self.tools.push(Arc::new(factory));
        self
    }

    pub fn prompt<F>(mut self, factory: F) -> Self
    where
        F: Fn(&C, &FeatureFlags) -> PromptDef + Send + Sync + 'static,
    {
        self.prompts.push(Arc::new(factory));
        self
    }

    pub fn resource<F>(mut self, factory: F) -> Self
    where
        F: Fn(&C, &FeatureFlags) -> ResourceDef + Send + Sync + 'static,
    {
        self.resources.push(Arc::new(factory));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_matching_captures_variables() {
        let vars = match_uri_template("docs://guides/{topic}", "docs://guides/routing").unwrap();
        assert_eq!(vars["topic"], "routing");
    }

    #[test]
    fn template_matching_rejects_shape_mismatch() {
        assert!(match_uri_template("docs://guides/{topic}", "docs://other/routing").is_none());
        assert!(match_uri_template("docs://guides/{topic}", "docs://guides/a/b").is_none());
        assert!(match_uri_template("docs://guides/{topic}", "docs://guides/").is_none());
    }

    #[test]
    fn tool_descriptor_includes_schema_and_title() {
        let tool = ToolDef::new("echo", json!({"type": "object"}), |args| async move {
            Ok(args)
        })
        .title("Echo")
        .description("Echoes its input");

        let descriptor = tool.descriptor();
        assert_eq!(descriptor["name"], "echo");
        assert_eq!(descriptor["title"], "Echo");
        assert_eq!(descriptor["inputSchema"]["type"], "object");
        assert_eq!(descriptor["annotations"]["title"], "Echo");
    }

    #[test]
    fn tool_error_result_serializes_is_error() {
        let result = ToolCallResult {
            content: vec![ContentBlock::text("Error: boom")],
            structured_content: None,
            is_error: true,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
    }

    #[test]
    fn success_result_omits_is_error() {
        let result = ToolCallResult {
            content: vec![ContentBlock::text("{}")],
            structured_content: Some(json!({})),
            is_error: false,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("isError").is_none());
        assert!(value.get("structuredContent").is_some());
    }
}
