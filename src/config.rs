use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiConfig, DEFAULT_API_ADDR, DEFAULT_MAX_UPLOAD_BYTES};
use crate::classify::{
    ClassifierRegistry, OccupancyClassifier, TextureClassifier, DEFAULT_TEXTURE_THRESHOLD,
};
use crate::ingest::FileVideoOpener;
use crate::mask::MaskImageExtractor;
use crate::pipeline::{
    PipelineConfig, DEFAULT_ENQUEUE_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY,
};
use crate::schedule::{SchedulerConfig, DEFAULT_STEP, DEFAULT_THRESHOLD};
use crate::render::{LogRenderer, Renderer, SnapshotRenderer};
use crate::session::{Collaborators, SessionConfig};

const DEFAULT_CLASSIFIER: &str = "texture";
const DEFAULT_MODEL_INPUT: u32 = 64;

#[derive(Debug, Deserialize, Default)]
struct ParkwatchConfigFile {
    api: Option<ApiConfigFile>,
    scheduler: Option<SchedulerConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    render: Option<RenderConfigFile>,
    ingest: Option<IngestConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SchedulerConfigFile {
    step: Option<u64>,
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    queue_capacity: Option<usize>,
    poll_interval_ms: Option<u64>,
    enqueue_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    texture_threshold: Option<f64>,
    model_path: Option<PathBuf>,
    model_input: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct IngestConfigFile {
    allow_synthetic_uploads: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ParkwatchConfig {
    pub api_addr: String,
    pub max_upload_bytes: usize,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    pub classifier: ClassifierSettings,
    pub snapshot_dir: Option<PathBuf>,
    /// Honour `stub://` locators uploaded as video bytes. Off by default.
    pub allow_synthetic_uploads: bool,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: String,
    pub texture_threshold: f64,
    pub model_path: Option<PathBuf>,
    /// Square model input edge, in pixels.
    pub model_input: u32,
}

impl Default for ParkwatchConfig {
    fn default() -> Self {
        // Defaults cannot fail validation.
        Self::from_file(ParkwatchConfigFile::default())
    }
}

impl ParkwatchConfig {
    /// File (`PARKWATCH_CONFIG`), then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkwatchConfigFile) -> Self {
        let api = file.api.unwrap_or_default();
        let scheduler = file.scheduler.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        Self {
            api_addr: api.addr.unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_upload_bytes: api.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            scheduler: SchedulerConfig {
                step: scheduler.step.unwrap_or(DEFAULT_STEP),
                threshold: scheduler.threshold.unwrap_or(DEFAULT_THRESHOLD),
            },
            pipeline: PipelineConfig {
                queue_capacity: pipeline.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
                poll_interval: pipeline
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_POLL_INTERVAL),
                enqueue_timeout: pipeline
                    .enqueue_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_ENQUEUE_TIMEOUT),
            },
            classifier: ClassifierSettings {
                backend: classifier
                    .backend
                    .unwrap_or_else(|| DEFAULT_CLASSIFIER.to_string()),
                texture_threshold: classifier
                    .texture_threshold
                    .unwrap_or(DEFAULT_TEXTURE_THRESHOLD),
                model_path: classifier.model_path,
                model_input: classifier.model_input.unwrap_or(DEFAULT_MODEL_INPUT),
            },
            snapshot_dir: file.render.and_then(|render| render.snapshot_dir),
            allow_synthetic_uploads: file
                .ingest
                .and_then(|ingest| ingest.allow_synthetic_uploads)
                .unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = env_string("PARKWATCH_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(step) = env_parse::<u64>("PARKWATCH_STEP", "an integer frame count")? {
            self.scheduler.step = step;
        }
        if let Some(threshold) = env_parse::<f64>("PARKWATCH_THRESHOLD", "a number")? {
            self.scheduler.threshold = threshold;
        }
        if let Some(capacity) = env_parse::<usize>("PARKWATCH_QUEUE_CAPACITY", "an integer")? {
            self.pipeline.queue_capacity = capacity;
        }
        if let Some(ms) = env_parse::<u64>("PARKWATCH_POLL_MS", "an integer number of milliseconds")? {
            self.pipeline.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>(
            "PARKWATCH_ENQUEUE_TIMEOUT_MS",
            "an integer number of milliseconds",
        )? {
            self.pipeline.enqueue_timeout = Duration::from_millis(ms);
        }
        if let Some(backend) = env_string("PARKWATCH_CLASSIFIER") {
            self.classifier.backend = backend;
        }
        if let Some(path) = env_string("PARKWATCH_MODEL_PATH") {
            self.classifier.model_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = env_string("PARKWATCH_SNAPSHOT_DIR") {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }
        if let Some(allow) =
            env_parse::<bool>("PARKWATCH_ALLOW_SYNTHETIC_UPLOADS", "true or false")?
        {
            self.allow_synthetic_uploads = allow;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.scheduler.step == 0 {
            return Err(anyhow!("scheduler.step must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.scheduler.threshold) {
            return Err(anyhow!(
                "scheduler.threshold must be in [0, 1), got {}",
                self.scheduler.threshold
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(anyhow!("pipeline.queue_capacity must be greater than zero"));
        }
        if self.pipeline.poll_interval.is_zero() {
            return Err(anyhow!("pipeline.poll_interval_ms must be greater than zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("api.max_upload_bytes must be greater than zero"));
        }
        if !self.classifier.texture_threshold.is_finite() || self.classifier.texture_threshold < 0.0 {
            return Err(anyhow!("classifier.texture_threshold must be a non-negative number"));
        }
        self.classifier.backend = self.classifier.backend.trim().to_lowercase();
        if self.classifier.backend == "tract" && self.classifier.model_path.is_none() {
            return Err(anyhow!(
                "classifier.backend 'tract' requires classifier.model_path (or PARKWATCH_MODEL_PATH)"
            ));
        }
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            addr: self.api_addr.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            scheduler: self.scheduler,
            pipeline: self.pipeline,
        }
    }

    /// Registry of the classifier backends this build and config can offer,
    /// with the configured backend as default.
    pub fn classifier_registry(&self) -> Result<ClassifierRegistry> {
        let mut registry = ClassifierRegistry::new();
        registry.register(
            TextureClassifier::new().with_threshold(self.classifier.texture_threshold),
        );

        #[cfg(feature = "backend-tract")]
        if let Some(path) = &self.classifier.model_path {
            let edge = self.classifier.model_input;
            registry.register(crate::classify::TractClassifier::new(path, edge, edge)?);
        }

        registry.set_default(&self.classifier.backend)?;
        Ok(registry)
    }

    /// The configured classifier, warmed up.
    pub fn classifier(&self) -> Result<Arc<dyn OccupancyClassifier>> {
        self.classifier_registry()?
            .select(Some(&self.classifier.backend))
            .with_context(|| format!("classifier backend '{}'", self.classifier.backend))
    }

    /// Production collaborators: local video files, image masks, the
    /// configured classifier and a snapshot or log renderer per session.
    pub fn collaborators(&self) -> Result<Collaborators> {
        let snapshot_dir = self.snapshot_dir.clone();
        let renderer = move || -> Result<Box<dyn Renderer>> {
            match &snapshot_dir {
                Some(dir) => Ok(Box::new(SnapshotRenderer::new(dir)?)),
                None => Ok(Box::new(LogRenderer::new())),
            }
        };
        Ok(Collaborators {
            video: Arc::new(
                FileVideoOpener::new().with_synthetic_uploads(self.allow_synthetic_uploads),
            ),
            regions: Arc::new(MaskImageExtractor::new()),
            classifier: self.classifier()?,
            renderer: Arc::new(renderer),
        })
    }
}

fn read_config_file(path: &Path) -> Result<ParkwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        None => Ok(None),
    }
}
