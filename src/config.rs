use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_upload_filename")]
    pub upload_filename: String,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploaded_images")
}

fn default_upload_filename() -> String {
    "image_to_predict.png".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            upload_filename: default_upload_filename(),
        }
    }
}

impl StorageConfig {
    pub fn get_upload_path(&self) -> PathBuf {
        self.upload_dir.join(&self.upload_filename)
    }
}

/// Command line of the external detection tool. The defaults reproduce the
/// hyperparameters the model was trained and validated with.
#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_script")]
    pub script: PathBuf,
    #[serde(default = "default_weights")]
    pub weights: PathBuf,
    #[serde(default = "default_img_size")]
    pub img_size: u32,
    #[serde(default = "default_conf_thres")]
    pub conf_thres: f32,
    #[serde(default = "default_iou_thres")]
    pub iou_thres: f32,
    #[serde(default = "default_true")]
    pub save_txt: bool,
    #[serde(default = "default_true")]
    pub save_conf: bool,
    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> String {
    "python".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("yolov5/detect.py")
}

fn default_weights() -> PathBuf {
    PathBuf::from("yolov5/runs/train/exp/weights/best.pt")
}

fn default_img_size() -> u32 {
    640
}

fn default_conf_thres() -> f32 {
    0.4
}

fn default_iou_thres() -> f32 {
    0.45
}

fn default_true() -> bool {
    true
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("yolov5/runs/detect/exp")
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_script(),
            weights: default_weights(),
            img_size: default_img_size(),
            conf_thres: default_conf_thres(),
            iou_thres: default_iou_thres(),
            save_txt: true,
            save_conf: true,
            result_dir: default_result_dir(),
            extra_args: Vec::new(),
        }
    }
}

impl DetectorConfig {
    /// The detection tool writes its annotated copy under the run directory
    /// using the source file name.
    pub fn get_result_path(&self, source: &Path) -> PathBuf {
        match source.file_name() {
            Some(name) => self.result_dir.join(name),
            None => self.result_dir.clone(),
        }
    }

    /// Lists the artifacts the external tool needs but that are missing.
    pub fn missing_artifacts(&self) -> Vec<PathBuf> {
        [&self.script, &self.weights]
            .into_iter()
            .filter(|path| !path.exists())
            .cloned()
            .collect()
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
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
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
            config::Environment::with_prefix("TS")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
