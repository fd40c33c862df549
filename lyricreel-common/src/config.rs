//! Configuration loading, root folder resolution and storage layout

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "LYRICREEL_ROOT";

/// Config file looked up inside the root folder when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "lyricreel.toml";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, config_file: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    let config_path = config_file.map(Path::to_path_buf).or_else(user_config_file);
    if let Some(config_path) = config_path {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// `~/.config/lyricreel/config.toml` (platform equivalent), if it exists
fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("lyricreel").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lyricreel"))
        .unwrap_or_else(|| PathBuf::from("./lyricreel_data"))
}

/// Queue worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// LLM and diffusion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Base URL of the LLM completion service (`/api/generate`)
    pub llm_url: String,
    /// Base URL of the diffusion service (`/api/zimage/generate`)
    pub image_url: String,
    pub llm_model: String,
    pub image_model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    /// Style text prepended to every LLM prompt
    pub master_style: String,
    pub negative_prompt: String,
    pub llm_timeout_secs: u64,
    /// Image request timeout used before any latency samples exist
    pub initial_image_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            llm_url: "http://localhost:11434".to_string(),
            image_url: "http://localhost:8000".to_string(),
            llm_model: "qwen2.5:7b".to_string(),
            image_model: "z-image-nsfw".to_string(),
            width: 1920,
            height: 1024,
            steps: 25,
            master_style: "do not render any text or letters in the image, ultra wide cinematic \
                           composition, photorealistic, 4k quality, professional photography"
                .to_string(),
            negative_prompt: "text, letters, words, watermark, signature, logo, blurry".to_string(),
            llm_timeout_secs: 60,
            initial_image_timeout_secs: 300,
        }
    }
}

/// Video composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crossfade_secs: f64,
    pub ffmpeg_path: String,
    /// Upper bound for any single renderer invocation
    pub stage_timeout_secs: u64,
    pub copyright_text: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1024,
            fps: 30,
            crossfade_secs: 2.0,
            ffmpeg_path: "ffmpeg".to_string(),
            stage_timeout_secs: 3600,
            copyright_text: String::new(),
        }
    }
}

/// External audio analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub python_path: String,
    pub script_path: String,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            python_path: "python3".to_string(),
            script_path: "scripts/analyzer.py".to_string(),
            timeout_secs: 600,
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
        }
    }
}

/// Complete orchestrator configuration (`lyricreel.toml`)
///
/// Every section is optional; missing keys fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub root_folder: Option<String>,
    pub worker: WorkerConfig,
    pub image: ImageConfig,
    pub render: RenderConfig,
    pub analysis: AnalysisConfig,
    pub server: ServerConfig,
}

impl OrchestratorConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a file
    ///
    /// A missing file yields defaults; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Audio file extensions probed for conventional stem lookup
const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "flac", "m4a"];

/// Directory layout under the root folder
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("lyricreel.db")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub fn branding_dir(&self) -> PathBuf {
        self.root.join("branding")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Generated images for one song
    pub fn song_images_dir(&self, song_id: i64) -> PathBuf {
        self.images_dir().join(format!("song_{}", song_id))
    }

    /// Create every directory of the layout
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.images_dir(),
            self.videos_dir(),
            self.audio_dir(),
            self.temp_dir(),
            self.branding_dir(),
            self.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Conventional stem path: `audio/song_<id>/<stem>.{wav,mp3,flac,m4a}`
    pub fn conventional_stem(&self, song_id: i64, stem: &str) -> Option<PathBuf> {
        let dir = self.audio_dir().join(format!("song_{}", song_id));
        AUDIO_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", stem, ext)))
            .find(|p| p.is_file())
    }
}

/// Resolved audio stems for one song
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStems {
    pub vocal: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub mixed: Option<PathBuf>,
}

impl AudioStems {
    /// Resolve stems from the song's stored paths, falling back to storage conventions
    pub fn resolve(paths: &StoragePaths, song: &crate::models::Song) -> Self {
        let pick = |stored: &str, stem: &str| -> Option<PathBuf> {
            let stored = stored.trim();
            if !stored.is_empty() {
                let path = PathBuf::from(stored);
                if path.is_file() {
                    return Some(path);
                }
                warn!(song_id = song.id, path = %path.display(), "Stored {} path missing on disk", stem);
            }
            paths.conventional_stem(song.id, stem)
        };

        Self {
            vocal: pick(&song.vocals_stem_path, "vocal"),
            music: pick(&song.music_stem_path, "music"),
            mixed: pick(&song.mixed_audio_path, "mixed"),
        }
    }

    /// Best single track for analysis or playback: music, then vocal, then mixed
    pub fn best_available(&self) -> Option<&Path> {
        self.music
            .as_deref()
            .or(self.vocal.as_deref())
            .or(self.mixed.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Song;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_wins_over_environment() {
        std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
        assert_eq!(
            resolve_root_folder(Some("/from/cli"), None),
            PathBuf::from("/from/cli")
        );
        assert_eq!(resolve_root_folder(None, None), PathBuf::from("/from/env"));
        std::env::remove_var(ROOT_FOLDER_ENV);
    }

    #[test]
    #[serial]
    fn config_file_root_folder_used_without_env() {
        std::env::remove_var(ROOT_FOLDER_ENV);
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "root_folder = \"/from/toml\"\n").unwrap();

        assert_eq!(
            resolve_root_folder(None, Some(&config)),
            PathBuf::from("/from/toml")
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [worker]
            poll_interval_secs = 10

            [render]
            crossfade_secs = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.worker.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.render.crossfade_secs, 1.5);
        assert_eq!(config.render.width, 1920);
        assert_eq!(config.image.steps, 25);
        assert_eq!(config.image.llm_model, "qwen2.5:7b");
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = OrchestratorConfig::from_toml_str("worker = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.worker.poll_interval_secs, 5);
    }

    #[test]
    fn stems_fall_back_to_conventional_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        paths.ensure_directories().unwrap();

        let song_dir = paths.audio_dir().join("song_4");
        std::fs::create_dir_all(&song_dir).unwrap();
        std::fs::write(song_dir.join("vocal.mp3"), b"v").unwrap();

        let song = Song {
            id: 4,
            music_stem_path: "/nowhere/music.wav".into(),
            ..Default::default()
        };
        let stems = AudioStems::resolve(&paths, &song);

        assert_eq!(stems.vocal, Some(song_dir.join("vocal.mp3")));
        assert_eq!(stems.music, None);
        assert_eq!(stems.best_available(), Some(song_dir.join("vocal.mp3").as_path()));
    }
}
