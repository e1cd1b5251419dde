use serde::Deserialize;
use qwire_core::error::{QwireError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub version: u32,

    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub codecs: CodecsSection,
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(QwireError::UnsupportedVersion);
        }

        self.logging.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl LoggingSection {
    pub fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            return Err(QwireError::BadRequest(
                "logging.filter must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_filter() -> String {
    "info".into()
}

/// Wire format a codec decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecFormat {
    #[default]
    Json,
    Yaml,
}

impl CodecFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            CodecFormat::Json => "json",
            CodecFormat::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CodecConfig {
    #[serde(default)]
    pub format: CodecFormat,

    /// Decode unregistered type names into the format's dynamic value.
    #[serde(default)]
    pub dynamic_fallback: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodecsSection {
    #[serde(default = "default_payload_codec")]
    pub payload: CodecConfig,

    #[serde(default)]
    pub shape: CodecConfig,
}

impl Default for CodecsSection {
    fn default() -> Self {
        Self {
            payload: default_payload_codec(),
            shape: CodecConfig::default(),
        }
    }
}

fn default_payload_codec() -> CodecConfig {
    CodecConfig {
        format: CodecFormat::Json,
        dynamic_fallback: true,
    }
}
