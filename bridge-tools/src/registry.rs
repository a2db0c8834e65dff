//! Runtime registry for tool descriptors and execution.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Declarative parameter shape advertised to discovery consumers.
///
/// The schema documents the expected arguments; it is not enforced before a
/// handler runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ToolSchema(Value);

impl ToolSchema {
    /// Wraps an existing JSON schema document.
    #[must_use]
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Schema for a tool that takes no arguments.
    #[must_use]
    pub fn empty_object() -> Self {
        Self(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))
    }

    /// Returns the raw schema document.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::empty_object()
    }
}

/// Name, description, and parameter schema of a registered tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: ToolSchema,
}

impl ToolDescriptor {
    /// Creates a descriptor for the supplied name and description.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDescriptor`] if the name is empty.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> ToolResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidDescriptor {
                reason: "tool name cannot be empty".into(),
            });
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters: ToolSchema::default(),
        })
    }

    /// Sets the advertised parameter schema.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ToolSchema) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the advertised parameter schema.
    #[must_use]
    pub fn parameters(&self) -> &ToolSchema {
        &self.parameters
    }
}

/// Trait implemented by tool handlers.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given JSON arguments, returning JSON output.
    async fn invoke(&self, input: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        (self)(input).await
    }
}

/// Handle returned by the registry for direct invocation.
#[derive(Clone)]
pub struct ToolHandle {
    descriptor: ToolDescriptor,
    executor: Arc<dyn Tool>,
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    /// Returns the associated descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Executes the underlying handler.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the handler.
    pub async fn invoke(&self, input: Value) -> ToolResult<Value> {
        self.executor.invoke(input).await
    }
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolHandle>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.tools.iter().map(|t| t.descriptor.name()).collect();
        f.debug_struct("ToolRegistryBuilder")
            .field("registered", &names)
            .finish()
    }
}

impl ToolRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool handler.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present.
    pub fn register_tool<T>(&mut self, descriptor: ToolDescriptor, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        let name = descriptor.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        self.index.insert(name, self.tools.len());
        self.tools.push(ToolHandle {
            descriptor,
            executor: Arc::new(tool),
        });

        Ok(())
    }

    /// Chaining variant of [`register_tool`](Self::register_tool).
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present.
    pub fn with_tool<T>(mut self, descriptor: ToolDescriptor, tool: T) -> ToolResult<Self>
    where
        T: Tool + 'static,
    {
        self.register_tool(descriptor, tool)?;
        Ok(self)
    }

    /// Moves every tool collected by `other` into this builder, after the
    /// tools already registered.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] on the first name present in both;
    /// tools merged before the collision stay registered.
    pub fn merge(&mut self, other: Self) -> ToolResult<()> {
        for handle in other.tools {
            let name = handle.descriptor.name().to_owned();
            if self.index.contains_key(&name) {
                return Err(ToolError::DuplicateTool { name });
            }
            self.index.insert(name, self.tools.len());
            self.tools.push(handle);
        }
        Ok(())
    }

    /// Freezes the collected tools into an immutable registry.
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            index: self.index,
        }
    }
}

/// Immutable mapping from tool name to handler, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolHandle>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Returns a handle to the tool matching the supplied name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    /// Returns `true` when a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Invokes a registered tool directly.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not found or
    /// propagates the handler's own error.
    pub async fn invoke(&self, name: &str, input: Value) -> ToolResult<Value> {
        let handle = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        handle.invoke(input).await
    }

    /// Lists the descriptors of all registered tools.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|handle| handle.descriptor.clone())
            .collect()
    }

    /// Lists registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|handle| handle.descriptor.name().to_owned())
            .collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Decodes handler arguments into a typed structure.
///
/// A `null` input is read as an empty object.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the input does not match `T`.
pub fn parse_arguments<T>(input: Value) -> ToolResult<T>
where
    T: DeserializeOwned,
{
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input).map_err(|err| ToolError::InvalidArguments {
        reason: err.to_string(),
    })
}

/// Errors produced by tool registration and invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Tool descriptor failed validation.
    #[error("invalid tool descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },

    /// Arguments could not be decoded or failed the handler's own checks.
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates an argument error from the supplied reason.
    #[must_use]
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    /// Returns the bare failure reason, without the variant prefix.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidDescriptor { reason }
            | Self::InvalidArguments { reason }
            | Self::Execution { reason } => reason.clone(),
            Self::DuplicateTool { .. } | Self::UnknownTool { .. } => self.to_string(),
        }
    }
}
