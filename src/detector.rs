use crate::config::DetectorConfig;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::process::Command;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// What was observed while running the detection tool. The exit code is
/// reported, never acted upon.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub result_path: PathBuf,
}

#[async_trait]
pub trait Detector: Send + Sync + 'static {
    /// Runs detection on `source` to completion and returns where the
    /// annotated image is expected to appear.
    async fn detect(&self, source: &Path) -> Result<DetectionRun, DetectorError>;
}

/// Command line for the external detection script.
#[derive(Debug, Clone)]
pub struct DetectionCommand {
    program: String,
    script: PathBuf,
    weights: PathBuf,
    source: PathBuf,
    img_size: u32,
    conf_thres: f32,
    iou_thres: f32,
    save_txt: bool,
    save_conf: bool,
    extra_args: Vec<String>,
}

impl DetectionCommand {
    pub fn new(config: &DetectorConfig, source: impl AsRef<Path>) -> Self {
        Self {
            program: config.program.clone(),
            script: config.script.clone(),
            weights: config.weights.clone(),
            source: source.as_ref().to_path_buf(),
            img_size: config.img_size,
            conf_thres: config.conf_thres,
            iou_thres: config.iou_thres,
            save_txt: config.save_txt,
            save_conf: config.save_conf,
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            self.script.to_string_lossy().to_string(),
            "--weights".to_string(),
            self.weights.to_string_lossy().to_string(),
            "--img".to_string(),
            self.img_size.to_string(),
            "--conf".to_string(),
            self.conf_thres.to_string(),
            "--iou-thres".to_string(),
            self.iou_thres.to_string(),
            "--source".to_string(),
            self.source.to_string_lossy().to_string(),
        ];

        if self.save_txt {
            args.push("--save-txt".to_string());
        }
        if self.save_conf {
            args.push("--save-conf".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Runs the detection script as a child process and waits for it, however
/// long inference takes.
#[derive(Debug, Clone)]
pub struct ProcessDetector {
    config: DetectorConfig,
}

impl ProcessDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        let missing = config.missing_artifacts();
        if !missing.is_empty() {
            tracing::warn!(
                "Detection artifacts not found, detections will fail: {:?}",
                missing
            );
        }

        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Detector for ProcessDetector {
    #[instrument(skip(self))]
    async fn detect(&self, source: &Path) -> Result<DetectionRun, DetectorError> {
        let command = DetectionCommand::new(&self.config, source);
        let args = command.build_args();
        tracing::debug!("Running detection: {} {}", command.program(), args.join(" "));

        let start = Instant::now();
        let status = Command::new(command.program())
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| DetectorError::Spawn {
                program: command.program().to_string(),
                source,
            })?;
        let elapsed = start.elapsed();

        if !status.success() {
            tracing::warn!("Detection exited with {}, continuing anyway", status);
        }
        tracing::info!(
            "Detection finished in {} ms with exit code {:?}",
            elapsed.as_millis(),
            status.code()
        );

        Ok(DetectionRun {
            exit_code: status.code(),
            elapsed,
            result_path: self.config.get_result_path(source),
        })
    }
}
