//! Background image generation client
//!
//! Two HTTP services per image: an LLM turns section lyrics into an image
//! prompt (`POST {llm_url}/api/generate`), then a diffusion service renders it
//! (`POST {image_url}/api/zimage/generate`, base64 PNG in the response).
//!
//! Images are cached on disk by a deterministic filename, so re-running a
//! job (or repeating a chorus) never regenerates an existing file.

use async_trait::async_trait;
use base64::Engine;
use lyricreel_common::config::ImageConfig;
use lyricreel_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const LLM_SERVICE: &str = "llm";
const IMAGE_SERVICE: &str = "image generator";

/// Rolling window size for latency samples
const MAX_TIMING_SAMPLES: usize = 10;
/// Floor for any adaptive image timeout
const MIN_IMAGE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LLM_ESTIMATE: Duration = Duration::from_secs(5);
const DEFAULT_IMAGE_ESTIMATE: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct LlmRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ZImageRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    model: &'a str,
    width: u32,
    height: u32,
    steps: u32,
}

#[derive(Debug, Deserialize)]
struct ZImageResponse {
    #[serde(default)]
    image: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    steps: u32,
    #[serde(default)]
    generation_time: f64,
    #[serde(default)]
    error: Option<String>,
}

/// Rolling LLM and image latency statistics
#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    llm: VecDeque<Duration>,
    image: VecDeque<Duration>,
}

fn push_sample(window: &mut VecDeque<Duration>, sample: Duration) {
    window.push_back(sample);
    while window.len() > MAX_TIMING_SAMPLES {
        window.pop_front();
    }
}

fn average(window: &VecDeque<Duration>) -> Option<Duration> {
    if window.is_empty() {
        return None;
    }
    let total: Duration = window.iter().sum();
    Some(total / window.len() as u32)
}

impl TimingStats {
    pub fn record_llm(&mut self, sample: Duration) {
        push_sample(&mut self.llm, sample);
    }

    pub fn record_image(&mut self, sample: Duration) {
        push_sample(&mut self.image, sample);
    }

    pub fn average_llm(&self) -> Option<Duration> {
        average(&self.llm)
    }

    pub fn average_image(&self) -> Option<Duration> {
        average(&self.image)
    }

    /// Image request timeout: 1.2x the average latency once samples exist,
    /// otherwise `initial`; never below 60s
    pub fn image_timeout(&self, initial: Duration) -> Duration {
        let timeout = match self.average_image() {
            Some(avg) => avg.mul_f64(1.2),
            None => initial,
        };
        timeout.max(MIN_IMAGE_TIMEOUT)
    }

    /// Expected time to produce `remaining` more images
    pub fn estimate_remaining(&self, remaining: usize) -> Duration {
        let per_image = self.average_llm().unwrap_or(DEFAULT_LLM_ESTIMATE)
            + self.average_image().unwrap_or(DEFAULT_IMAGE_ESTIMATE);
        per_image * remaining as u32
    }

    pub fn summary(&self) -> String {
        if self.llm.is_empty() && self.image.is_empty() {
            return "No timing data yet".to_string();
        }
        format!(
            "Avg LLM: {:.1}s, Avg Image: {:.1}s (samples: {} LLM, {} Image)",
            self.average_llm().unwrap_or_default().as_secs_f64(),
            self.average_image().unwrap_or_default().as_secs_f64(),
            self.llm.len(),
            self.image.len()
        )
    }
}

/// Deterministic cache filename for a section's background image
///
/// All choruses share one image; each verse gets its own.
pub fn image_filename(section_type: &str, number: u32) -> String {
    match section_type {
        "verse" => format!("bg-verse-{}.png", number),
        "chorus" => "bg-chorus.png".to_string(),
        "bridge" | "intro" | "outro" => format!("bg-{}.png", section_type),
        other => format!("bg-{}-{}.png", other, number),
    }
}

/// Comma-separated style keywords from genre and background style
pub fn build_style_keywords(genre: &str, background_style: &str) -> String {
    let mut keywords: Vec<&str> = Vec::new();
    if !background_style.trim().is_empty() {
        keywords.push(background_style.trim());
    }
    keywords.extend(["cinematic", "professional photography"]);

    let genre_keywords: &[&str] = match genre.trim().to_lowercase().as_str() {
        "romantic pop" | "romantic" | "pop" => &["romantic lighting", "warm tones", "intimate atmosphere"],
        "electronic" | "edm" => &["vibrant colors", "neon lights", "futuristic"],
        "rock" | "metal" => &["dramatic lighting", "high contrast", "intense"],
        "hip hop" | "rap" => &["urban setting", "street photography", "bold"],
        "country" => &["natural lighting", "outdoor scenery", "authentic"],
        _ => &["beautiful composition", "artistic"],
    };
    keywords.extend_from_slice(genre_keywords);
    keywords.join(", ")
}

/// Section image seam used by the processor
#[async_trait]
pub trait SectionImageGenerator: Send + Sync {
    /// Image for one section, written into `output_dir`; an existing file is reused
    async fn generate_for_section(
        &self,
        output_dir: &Path,
        section_type: &str,
        number: u32,
        lyrics: &str,
        style_keywords: &str,
    ) -> Result<PathBuf>;

    /// Expected time for `remaining` more images (for progress logs)
    fn estimate_remaining(&self, remaining: usize) -> Duration {
        TimingStats::default().estimate_remaining(remaining)
    }
}

/// HTTP client for the LLM and diffusion services
pub struct ImageGenerationClient {
    http_client: reqwest::Client,
    config: ImageConfig,
    stats: Mutex<TimingStats>,
}

impl ImageGenerationClient {
    pub fn new(config: ImageConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            stats: Mutex::new(TimingStats::default()),
        })
    }

    /// Snapshot of the latency statistics
    pub fn timing_stats(&self) -> TimingStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut TimingStats) -> R) -> R {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats)
    }

    /// Ask the LLM for an image prompt describing one lyrics section
    pub async fn enhance_prompt(&self, section_type: &str, lyrics: &str, style_keywords: &str) -> Result<String> {
        let prompt = format!(
            "{}\n\nSong Section: {}\nAdditional Style Keywords: {}\n\nLyrics:\n{}\n\n\
             Based on the master art style and these lyrics, create a detailed image generation \
             prompt that captures the mood and visuals of this section. Return ONLY the image \
             prompt, nothing else.",
            self.config.master_style, section_type, style_keywords, lyrics
        );
        let request = LlmRequest {
            model: &self.config.llm_model,
            prompt: &prompt,
            stream: false,
        };

        let started = Instant::now();
        let response = self
            .http_client
            .post(format!("{}/api/generate", self.config.llm_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(self.config.llm_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external(LLM_SERVICE, format!("LLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::external(
                LLM_SERVICE,
                format!("LLM API error {}: {}", status.as_u16(), body),
            ));
        }

        let body: LlmResponse = response
            .json()
            .await
            .map_err(|e| Error::external(LLM_SERVICE, format!("failed to decode LLM response: {}", e)))?;

        self.with_stats(|s| s.record_llm(started.elapsed()));
        Ok(body.response.trim().to_string())
    }

    /// Render `prompt` and write the PNG to `output_dir/filename`
    pub async fn generate_image(&self, prompt: &str, output_dir: &Path, filename: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;

        let prompt = format!(
            "{}, cinematic composition, photorealistic, 4k quality, professional photography",
            prompt
        );
        let request = ZImageRequest {
            prompt: &prompt,
            negative_prompt: &self.config.negative_prompt,
            model: &self.config.image_model,
            width: self.config.width,
            height: self.config.height,
            steps: self.config.steps,
        };
        let timeout = self.with_stats(|s| {
            s.image_timeout(Duration::from_secs(self.config.initial_image_timeout_secs))
        });

        let started = Instant::now();
        let response = self
            .http_client
            .post(format!("{}/api/zimage/generate", self.config.image_url.trim_end_matches('/')))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external(IMAGE_SERVICE, format!("image generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::external(
                IMAGE_SERVICE,
                format!("image API error {}: {}", status.as_u16(), body),
            ));
        }

        let body: ZImageResponse = response
            .json()
            .await
            .map_err(|e| Error::external(IMAGE_SERVICE, format!("failed to decode image response: {}", e)))?;

        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            return Err(Error::external(IMAGE_SERVICE, format!("image generation error: {}", error)));
        }
        if body.image.is_empty() {
            return Err(Error::external(IMAGE_SERVICE, "no image data returned from API"));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.image.as_bytes())
            .map_err(|e| Error::external(IMAGE_SERVICE, format!("failed to decode base64 image: {}", e)))?;

        let output_path = output_dir.join(filename);
        tokio::fs::write(&output_path, &bytes).await?;
        self.with_stats(|s| s.record_image(started.elapsed()));

        tracing::info!(
            path = %output_path.display(),
            width = body.width,
            height = body.height,
            steps = body.steps,
            generation_time = body.generation_time,
            "Image generated"
        );
        Ok(output_path)
    }
}

#[async_trait]
impl SectionImageGenerator for ImageGenerationClient {
    async fn generate_for_section(
        &self,
        output_dir: &Path,
        section_type: &str,
        number: u32,
        lyrics: &str,
        style_keywords: &str,
    ) -> Result<PathBuf> {
        let filename = image_filename(section_type, number);
        let output_path = output_dir.join(&filename);
        if output_path.is_file() {
            tracing::debug!(path = %output_path.display(), "Reusing existing image");
            return Ok(output_path);
        }

        let prompt = self.enhance_prompt(section_type, lyrics, style_keywords).await?;
        let preview: String = prompt.chars().take(100).collect();
        tracing::debug!(section_type, number, prompt = %preview, "Enhanced image prompt");

        self.generate_image(&prompt, output_dir, &filename).await
    }

    fn estimate_remaining(&self, remaining: usize) -> Duration {
        self.with_stats(|s| s.estimate_remaining(remaining))
    }
}
