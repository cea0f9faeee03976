use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

/// Environment variable holding the Gemini credential. Never read from the
/// config file.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EpicforgeConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub generation: GenerationSettings,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://feature_requests.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
    #[serde(deserialize_with = "feature_preset")]
    pub feature: GenerationPreset,
    #[serde(deserialize_with = "ideas_preset")]
    pub ideas: GenerationPreset,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_seconds: 120,
            feature: GenerationPreset::feature(),
            ideas: GenerationPreset::ideas(),
        }
    }
}

/// Fixed sampling parameters and system prompt for one adapter instance.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPreset {
    pub prompt_file: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl GenerationPreset {
    /// Preset for `/api/generate`: full epic documents.
    pub fn feature() -> Self {
        Self {
            prompt_file: "prompts/feature_main_system_prompt.txt".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            response_mime_type: "application/json".to_string(),
        }
    }

    /// Preset for `/api/generate-ideas`: short idea lists.
    pub fn ideas() -> Self {
        Self {
            prompt_file: "prompts/ideas_system_prompt.txt".to_string(),
            temperature: 0.6,
            top_p: 0.9,
            top_k: 50,
            max_output_tokens: 4096,
            response_mime_type: "application/json".to_string(),
        }
    }
}

/// Keys present in a `[generation.feature]` or `[generation.ideas]` table.
/// Absent keys keep the built-in preset's value.
#[derive(Debug, Default, Deserialize)]
struct PresetOverrides {
    prompt_file: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    max_output_tokens: Option<u32>,
    response_mime_type: Option<String>,
}

impl PresetOverrides {
    fn apply(self, base: GenerationPreset) -> GenerationPreset {
        GenerationPreset {
            prompt_file: self.prompt_file.unwrap_or(base.prompt_file),
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            top_k: self.top_k.unwrap_or(base.top_k),
            max_output_tokens: self.max_output_tokens.unwrap_or(base.max_output_tokens),
            response_mime_type: self.response_mime_type.unwrap_or(base.response_mime_type),
        }
    }
}

fn feature_preset<'de, D: Deserializer<'de>>(d: D) -> Result<GenerationPreset, D::Error> {
    Ok(PresetOverrides::deserialize(d)?.apply(GenerationPreset::feature()))
}

fn ideas_preset<'de, D: Deserializer<'de>>(d: D) -> Result<GenerationPreset, D::Error> {
    Ok(PresetOverrides::deserialize(d)?.apply(GenerationPreset::ideas()))
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: "static".to_string(),
        }
    }
}

impl EpicforgeConfig {
    /// Load from a TOML file (optional) layered with `EPICFORGE__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("EPICFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = EpicforgeConfig::load("/nonexistent/epicforge-test.toml")
            .expect("missing config file should not be an error");

        assert_eq!(config.http.port, 8000);
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert_eq!(config.generation.feature.top_k, 40);
        assert_eq!(config.generation.ideas.max_output_tokens, 4096);
        assert_eq!(config.database.url, "sqlite://feature_requests.db");
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epicforge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
port = 9100

[generation.ideas]
prompt_file = "custom/ideas.txt"
temperature = 0.2
top_p = 0.5
top_k = 10
max_output_tokens = 256
response_mime_type = "text/plain"
"#
        )
        .unwrap();

        let config = EpicforgeConfig::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.http.port, 9100);
        assert_eq!(config.http.host, "0.0.0.0", "untouched keys keep defaults");
        assert_eq!(config.generation.ideas.prompt_file, "custom/ideas.txt");
        assert_eq!(config.generation.ideas.top_k, 10);
        assert_eq!(
            config.generation.feature.prompt_file,
            "prompts/feature_main_system_prompt.txt"
        );
    }

    #[test]
    fn test_single_preset_key_keeps_other_preset_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epicforge.toml");
        std::fs::write(&path, "[generation.feature]\ntemperature = 0.2\n").unwrap();

        let config = EpicforgeConfig::load(path.to_str().unwrap()).unwrap();

        let feature = &config.generation.feature;
        assert!((feature.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(feature.prompt_file, "prompts/feature_main_system_prompt.txt");
        assert_eq!(feature.top_k, 40);
        assert_eq!(feature.max_output_tokens, 8192);
        assert_eq!(config.generation.ideas, GenerationPreset::ideas());
    }

    #[test]
    fn test_ideas_table_falls_back_to_ideas_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epicforge.toml");
        std::fs::write(&path, "[generation.ideas]\nmax_output_tokens = 512\n").unwrap();

        let config = EpicforgeConfig::load(path.to_str().unwrap()).unwrap();

        let ideas = &config.generation.ideas;
        assert_eq!(ideas.max_output_tokens, 512);
        assert_eq!(ideas.prompt_file, "prompts/ideas_system_prompt.txt");
        assert_eq!(ideas.top_k, 50);
        assert_eq!(config.generation.feature, GenerationPreset::feature());
    }

    #[test]
    fn test_presets_differ() {
        let feature = GenerationPreset::feature();
        let ideas = GenerationPreset::ideas();
        assert!(feature.max_output_tokens > ideas.max_output_tokens);
        assert_ne!(feature.prompt_file, ideas.prompt_file);
        assert_eq!(feature.response_mime_type, "application/json");
    }
}
