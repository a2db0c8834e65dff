//! Tool descriptors, handlers, and the registry that maps names to them.
//!
//! A registry is assembled once with [`registry::ToolRegistryBuilder`] and is
//! read-only afterwards; dispatchers share it behind an `Arc`.

#![warn(missing_docs, clippy::pedantic)]

pub mod registry;

pub use registry::{
    parse_arguments, Tool, ToolDescriptor, ToolError, ToolHandle, ToolRegistry,
    ToolRegistryBuilder, ToolResult, ToolSchema,
};
