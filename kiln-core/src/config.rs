//! Code generation settings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INIT_FUNCTION_NAME: &str = "__kiln_init";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Export every public function under its global name.
    pub export_public: bool,
    /// Run the multifile facade pass.
    pub generate_facades: bool,
    /// Name of the generated routine that evaluates field initializers.
    pub init_function_name: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            export_public: true,
            generate_facades: true,
            init_function_name: DEFAULT_INIT_FUNCTION_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: CodegenConfig =
            serde_json::from_str(r#"{"generate_facades": false}"#).expect("decode");
        assert!(!config.generate_facades);
        assert!(config.export_public);
        assert_eq!(config.init_function_name, DEFAULT_INIT_FUNCTION_NAME);
    }
}
