use serde_json::Value;
use slackforce_core::{FunctionDeclaration, ParameterSchema, ToolDescriptor};
use thiserror::Error;

use crate::llm::ToolConfig;
use crate::schema::sanitize_schema;
use crate::tools::ToolProtocolError;

pub const DEFAULT_TOOL_DESCRIPTION: &str = "No description available";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not list tools: {0}")]
    Listing(#[from] ToolProtocolError),
    #[error("parameter schema for tool `{tool}` is not valid JSON: {source}")]
    SchemaParse { tool: String, source: serde_json::Error },
}

/// Projects one tool descriptor into the declaration Gemini accepts.
pub fn to_function_declaration(
    descriptor: &ToolDescriptor,
) -> Result<FunctionDeclaration, CatalogError> {
    let parsed;
    let schema = match &descriptor.parameter_schema {
        ParameterSchema::Structured(value) => value,
        ParameterSchema::Serialized(raw) => {
            parsed = serde_json::from_str::<Value>(raw).map_err(|source| {
                CatalogError::SchemaParse { tool: descriptor.name.clone(), source }
            })?;
            &parsed
        }
    };

    let description = descriptor
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .unwrap_or(DEFAULT_TOOL_DESCRIPTION)
        .to_string();

    Ok(FunctionDeclaration {
        name: descriptor.name.clone(),
        description,
        parameters: sanitize_schema(schema),
    })
}

/// Converts the whole catalog, preserving order. The first malformed schema aborts.
pub fn build_declarations(
    descriptors: &[ToolDescriptor],
) -> Result<Vec<FunctionDeclaration>, CatalogError> {
    descriptors.iter().map(to_function_declaration).collect()
}

pub fn build_tool_config(descriptors: &[ToolDescriptor]) -> Result<Option<ToolConfig>, CatalogError> {
    build_declarations(descriptors).map(ToolConfig::from_declarations)
}
