use serde::{Deserialize, Serialize};

/// Credential fields a source adapter understands.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SourceConfigSchema {
    pub fields: Vec<Field>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Field {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    /// Environment variable consulted when the config file omits the field.
    pub env: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub enum FieldType {
    Text,
    Secret, // API keys, passwords
}

impl Field {
    pub fn secret(name: &str, label: &str, env: &str) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: FieldType::Secret,
            required: true,
            description: Some(format!("Set {} or provide here", env)),
            env: Some(env.into()),
        }
    }

    pub fn text(name: &str, label: &str, env: &str) -> Self {
        Self {
            field_type: FieldType::Text,
            ..Self::secret(name, label, env)
        }
    }
}
