//! Clients for the external tools and services used by the pipeline

pub mod audio_analyzer;
pub mod image_client;
pub mod process;

pub use audio_analyzer::{AudioAnalysis, AudioAnalyzer, ScriptAudioAnalyzer};
pub use image_client::{
    build_style_keywords, image_filename, ImageGenerationClient, SectionImageGenerator, TimingStats,
};
pub use process::{CommandOutput, CommandRunner, ProcessError, SystemCommandRunner};
