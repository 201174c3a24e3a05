use serde::Deserialize;
use std::path::{Path, PathBuf};

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub preload: bool,
}

fn default_model_instances() -> usize {
    1
}

fn default_intra_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

impl Validatable for ModelConfig {
    fn validate(&self) -> Result<(), String> {
        if self.onnx_file.trim().is_empty() {
            return Err("model.onnx_file must not be empty".to_string());
        }
        if self.num_instances == 0 {
            return Err("model.num_instances must be at least 1".to_string());
        }
        if self.intra_threads == 0 {
            return Err("model.intra_threads must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_file: String,
    pub labels_dir: PathBuf,
}

impl LabelsConfig {
    pub fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}

impl Validatable for LabelsConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Labels file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    load_configuration(&base_path.join("configuration"), &environment)
}

/// Layers `base.yaml`, the environment file and `APP_*` variables.
pub fn load_configuration(
    configuration_directory: &Path,
    environment: &Environment,
) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config = settings.try_deserialize::<Config>()?;

    config
        .model
        .validate()
        .and_then(|_| config.labels.validate())
        .map_err(|e| {
            tracing::error!("Configuration validation failed: {}", e);
            config::ConfigError::Message(e)
        })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn model_config() -> ModelConfig {
        ModelConfig {
            onnx_file: "disease.onnx".to_string(),
            model_dir: PathBuf::from("./models"),
            num_instances: 2,
            intra_threads: 1,
            output_name: None,
            preload: false,
        }
    }

    #[test]
    fn test_model_path_joins_dir_and_file() {
        assert_eq!(
            model_config().get_path(),
            PathBuf::from("./models/disease.onnx")
        );
    }

    #[test]
    fn test_model_validation_does_not_require_artifact() {
        assert!(model_config().validate().is_ok());

        let mut config = model_config();
        config.num_instances = 0;
        assert!(config.validate().is_err());

        let mut config = model_config();
        config.onnx_file = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_labels_validation_requires_file() {
        let labels = LabelsConfig {
            labels_file: "missing.txt".to_string(),
            labels_dir: PathBuf::from("./nowhere"),
        };
        assert!(labels.validate().is_err());
    }

    #[test]
    fn test_environment_and_log_level_parsing() {
        assert!(matches!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        ));
        assert!(Environment::try_from("staging".to_string()).is_err());
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }

    #[test]
    fn test_load_configuration_layers_files() {
        let dir = tempfile::tempdir().unwrap();
        let labels_path = dir.path().join("labels.txt");
        fs::write(&labels_path, "Healthy\nRust\n").unwrap();

        fs::write(
            dir.path().join("base.yaml"),
            format!(
                "log_level: info\nmodel:\n  onnx_file: disease.onnx\n  model_dir: models\n  intra_threads: 2\nlabels:\n  labels_file: labels.txt\n  labels_dir: {}\n",
                dir.path().display()
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("production.yaml"),
            "log_level: debug\nmodel:\n  num_instances: 3\n  preload: true\n",
        )
        .unwrap();

        let config = load_configuration(dir.path(), &Environment::Production).unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.model.num_instances, 3);
        assert_eq!(config.model.intra_threads, 2);
        assert!(config.model.preload);
        assert_eq!(config.model.get_path(), PathBuf::from("models/disease.onnx"));
        assert_eq!(config.labels.get_path(), labels_path);

        let config = load_configuration(dir.path(), &Environment::Local).unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.model.num_instances, 1);
        assert!(!config.model.preload);
    }

    #[test]
    fn test_load_configuration_rejects_missing_labels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "log_level: info\nmodel:\n  onnx_file: disease.onnx\n  model_dir: models\nlabels:\n  labels_file: nope.txt\n  labels_dir: nowhere\n",
        )
        .unwrap();

        assert!(load_configuration(dir.path(), &Environment::Local).is_err());
    }
}
