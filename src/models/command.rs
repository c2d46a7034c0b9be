//! Command request models.

use super::parameter::Parameter;
use serde::{Deserialize, Serialize};

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Plain SQL text
    #[default]
    Text,
    /// Name of a stored procedure (or function) to call
    StoredProcedure,
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::StoredProcedure => write!(f, "stored_procedure"),
        }
    }
}

/// Command text, command type and parameters for one execution call.
///
/// Any `&str` or `String` converts into a text-mode request, so
/// `db.execute_non_query("DELETE FROM users")` works without ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    #[serde(default)]
    pub command_type: CommandType,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl CommandRequest {
    /// Create a request with an explicit command type.
    pub fn new(text: impl Into<String>, command_type: CommandType) -> Self {
        Self {
            text: text.into(),
            command_type,
            parameters: Vec::new(),
        }
    }

    /// Create a plain SQL text request.
    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, CommandType::Text)
    }

    /// Create a stored procedure request.
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self::new(name, CommandType::StoredProcedure)
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Append a parameter set.
    pub fn with_parameters(mut self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(params);
        self
    }
}

impl From<&str> for CommandRequest {
    fn from(sql: &str) -> Self {
        Self::text(sql)
    }
}

impl From<String> for CommandRequest {
    fn from(sql: String) -> Self {
        Self::text(sql)
    }
}

impl From<&CommandRequest> for CommandRequest {
    fn from(request: &CommandRequest) -> Self {
        request.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_default_command_type() {
        let req: CommandRequest = "SELECT 1".into();
        assert_eq!(req.command_type, CommandType::Text);
        assert_eq!(req.text, "SELECT 1");
        assert!(req.parameters.is_empty());
    }

    #[test]
    fn test_stored_procedure_request() {
        let req = CommandRequest::stored_procedure("InsertUser")
            .with_param(Parameter::new("Username", "A"))
            .with_parameters([Parameter::new("Id", 1)]);
        assert_eq!(req.command_type, CommandType::StoredProcedure);
        assert_eq!(req.parameters.len(), 2);
        assert_eq!(req.parameters[1].name(), "Id");
    }

    #[test]
    fn test_command_type_display() {
        assert_eq!(CommandType::Text.to_string(), "text");
        assert_eq!(CommandType::StoredProcedure.to_string(), "stored_procedure");
    }
}
