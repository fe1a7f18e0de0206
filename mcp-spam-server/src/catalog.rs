//! Tool catalog served by `tools/list`

use serde::Serialize;

/// A tool exposed to MCP clients
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Tool name (e.g., "scan_email")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Input parameters
    pub parameters: Vec<ToolParameter>,
}

impl Tool {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// MCP `tools/list` entry with a JSON schema for the arguments
    pub fn to_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = serde_json::json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(items) = param.items {
                schema["items"] = serde_json::json!({ "type": items });
            }
            if param.param_type == "object" {
                schema["additionalProperties"] = serde_json::json!({ "type": "string" });
            }
            properties.insert(param.name.clone(), schema);

            if param.required {
                required.push(param.name.clone());
            }
        }

        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// Tool parameter definition
#[derive(Debug, Clone, Serialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    /// Element type for arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<&'static str>,
    pub required: bool,
}

impl ToolParameter {
    fn new(name: &str, description: &str, param_type: &'static str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            items: None,
            required,
        }
    }

    pub fn string(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "string", required)
    }

    pub fn boolean(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "boolean", required)
    }

    /// String-to-string map
    pub fn string_map(name: &str, description: &str, required: bool) -> Self {
        Self::new(name, description, "object", required)
    }

    pub fn string_list(name: &str, description: &str, required: bool) -> Self {
        Self {
            items: Some("string"),
            ..Self::new(name, description, "array", required)
        }
    }
}

/// Every tool this server answers
pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "scan_email",
            "Analyze email content for spam probability and rule matches",
        )
        .with_parameter(ToolParameter::string(
            "content",
            "Raw email content including headers",
            true,
        ))
        .with_parameter(ToolParameter::string_map(
            "headers",
            "Additional headers to analyze",
            false,
        ))
        .with_parameter(ToolParameter::boolean(
            "check_bayes",
            "Include Bayesian analysis",
            false,
        ))
        .with_parameter(ToolParameter::boolean(
            "verbose",
            "Return detailed rule explanations",
            false,
        )),
        Tool::new(
            "check_reputation",
            "Check sender reputation against configured allow and block lists",
        )
        .with_parameter(ToolParameter::string("sender", "Email sender address", true))
        .with_parameter(ToolParameter::string(
            "domain",
            "Sender domain (default: taken from the sender address)",
            false,
        ))
        .with_parameter(ToolParameter::string("ip", "Sender IPv4 address", false)),
        Tool::new("explain_score", "Explain how a spam score was calculated").with_parameter(
            ToolParameter::string("email_content", "Email to analyze", true),
        ),
        Tool::new("get_config", "Retrieve current SpamAssassin configuration"),
        Tool::new("update_rules", "Request an update of SpamAssassin rule definitions")
            .with_parameter(ToolParameter::string(
                "source",
                "Rule source: official (default) or custom",
                false,
            ))
            .with_parameter(ToolParameter::boolean(
                "force",
                "Force update even if recent",
                false,
            )),
        Tool::new("test_rules", "Test custom rules against sample emails")
            .with_parameter(ToolParameter::string("rules", "Custom rule definitions", true))
            .with_parameter(ToolParameter::string_list(
                "test_emails",
                "Sample emails to test against",
                true,
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names() {
        let names: Vec<String> = tools().into_iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            [
                "scan_email",
                "check_reputation",
                "explain_score",
                "get_config",
                "update_rules",
                "test_rules"
            ]
        );
    }

    #[test]
    fn test_tool_schema() {
        let scan = &tools()[0];
        let schema = scan.to_schema();

        assert_eq!(schema["name"], "scan_email");
        assert_eq!(schema["inputSchema"]["type"], "object");
        assert_eq!(schema["inputSchema"]["required"], serde_json::json!(["content"]));
        assert_eq!(
            schema["inputSchema"]["properties"]["headers"]["additionalProperties"]["type"],
            "string"
        );
    }

    #[test]
    fn test_array_parameter_schema() {
        let test_rules = tools().into_iter().find(|t| t.name == "test_rules").unwrap();
        let schema = test_rules.to_schema();
        assert_eq!(
            schema["inputSchema"]["properties"]["test_emails"]["items"]["type"],
            "string"
        );
    }
}
