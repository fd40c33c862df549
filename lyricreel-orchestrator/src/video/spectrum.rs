//! Audio spectrum visualizer overlay

use std::fmt;

const DEFAULT_OPACITY: f64 = 0.3;
const DEFAULT_MONO_HEX: &str = "0x00FFFF";
const RAINBOW: &str = "red|orange|yellow|green|cyan|blue|violet";
/// How far stereo bars reach in from each edge
const STEREO_BAR_WIDTH: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumStyle {
    Stereo,
    ShowFreqs,
    ShowSpectrum,
    ShowCqt,
    ShowWaves,
    ShowVolume,
    AVectorScope,
}

impl SpectrumStyle {
    /// Normalize a stored style name; unknown or empty names use `Stereo`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "showfreqs" | "bars" | "equalizer" => SpectrumStyle::ShowFreqs,
            "showspectrum" | "spectrum" => SpectrumStyle::ShowSpectrum,
            "showcqt" | "cqt" => SpectrumStyle::ShowCqt,
            "showwaves" | "waves" | "waveform" => SpectrumStyle::ShowWaves,
            "showvolume" | "volume" => SpectrumStyle::ShowVolume,
            "avectorscope" | "vectorscope" => SpectrumStyle::AVectorScope,
            _ => SpectrumStyle::Stereo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpectrumStyle::Stereo => "stereo",
            SpectrumStyle::ShowFreqs => "showfreqs",
            SpectrumStyle::ShowSpectrum => "showspectrum",
            SpectrumStyle::ShowCqt => "showcqt",
            SpectrumStyle::ShowWaves => "showwaves",
            SpectrumStyle::ShowVolume => "showvolume",
            SpectrumStyle::AVectorScope => "avectorscope",
        }
    }
}

impl fmt::Display for SpectrumStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rainbow gradient, or one color as an ffmpeg hex literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpectrumColor {
    Rainbow,
    Mono(String),
}

impl SpectrumColor {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        let hex = match name.as_str() {
            "" | "rainbow" => return SpectrumColor::Rainbow,
            "charcoal" => "0x808080",
            "cyan" => "0x00FFFF",
            "blue" => "0x0080FF",
            "red" => "0xFF0000",
            "green" => "0x00FF00",
            "yellow" => "0xFFFF00",
            "magenta" | "pink" => "0xFF00FF",
            "white" => "0xFFFFFF",
            "orange" => "0xFF8000",
            "purple" => "0x8000FF",
            "gold" => "0xFFD700",
            _ => DEFAULT_MONO_HEX,
        };
        SpectrumColor::Mono(hex.to_string())
    }

    fn colors_param(&self) -> &str {
        match self {
            SpectrumColor::Rainbow => RAINBOW,
            SpectrumColor::Mono(hex) => hex,
        }
    }
}

/// Opacity in (0, 1], anything else falls back to 0.3
pub fn normalize_opacity(opacity: f64) -> f64 {
    if opacity > 0.0 && opacity <= 1.0 {
        opacity
    } else {
        DEFAULT_OPACITY
    }
}

/// Full `-filter_complex` graph: video is input 0, audio input 1, output `[outv]`
pub fn spectrum_filter(style: SpectrumStyle, color: &SpectrumColor, opacity: f64, width: u32, height: u32) -> String {
    let rainbow = matches!(color, SpectrumColor::Rainbow);
    let colors = color.colors_param();

    let visual = match style {
        SpectrumStyle::Stereo => return stereo_filter(rainbow, opacity, height),
        SpectrumStyle::ShowWaves => format!(
            "[1:a]showwaves=s={}x{}:mode=cline:colors={}:scale=sqrt,format=rgba,colorchannelmixer=aa={:.2}[spectrum]",
            width, height, colors, opacity
        ),
        SpectrumStyle::ShowFreqs => {
            let bar_height = height / 4;
            let visual = format!(
                "[1:a]showfreqs=s={}x{}:mode=bar:fscale=log:ascale=sqrt:win_size=4096:colors={},format=rgba,colorchannelmixer=aa={:.2}[spectrum]",
                width, bar_height, colors, opacity
            );
            // Bars sit along the bottom edge
            return format!("{};[0:v][spectrum]overlay=0:{}[outv]", visual, height - bar_height);
        }
        SpectrumStyle::ShowSpectrum => format!(
            "[1:a]showspectrum=s={}x{}:slide=replace:color={}:scale=sqrt{},format=rgba,colorchannelmixer=aa={:.2}[spectrum]",
            width,
            height,
            if rainbow { "rainbow" } else { "intensity" },
            if rainbow { ":saturation=3" } else { "" },
            opacity
        ),
        SpectrumStyle::ShowCqt => format!(
            "[1:a]showcqt=s={}x{}:fps=30:bar_h={}:sono_h=0:bar_t={:.2}:basefreq=50:endfreq=20000,format=rgba[spectrum]",
            width,
            height,
            height / 3,
            opacity
        ),
        SpectrumStyle::ShowVolume => format!(
            "[1:a]showvolume=w={}:h={}:b=4:f={:.2},format=rgba,colorchannelmixer=aa={:.2}[spectrum]",
            width / 4,
            height / 10,
            opacity,
            opacity
        ),
        SpectrumStyle::AVectorScope => format!(
            "[1:a]avectorscope=s={}x{}:zoom=1.5:draw=line,format=rgba,colorchannelmixer=aa={:.2}[spectrum]",
            width, height, opacity
        ),
    };

    format!("{};[0:v][spectrum]overlay=0:0[outv]", visual)
}

/// Left/right channel bars on the screen edges, growing inward
fn stereo_filter(rainbow: bool, opacity: f64, height: u32) -> String {
    let colors = if rainbow {
        format!(":colors={}", RAINBOW)
    } else {
        ":colors=white".to_string()
    };
    let mono = if rainbow { "" } else { ",eq=saturation=0" };

    let left = format!(
        "s={}x{}:mode=bar:fscale=log:ascale=log{},transpose=2,hflip,format=yuva420p,colorchannelmixer=aa={:.2}{}",
        height, STEREO_BAR_WIDTH, colors, opacity, mono
    );
    let right = format!(
        "s={}x{}:mode=bar:fscale=log:ascale=log{},transpose=1,hflip,vflip,format=yuva420p,colorchannelmixer=aa={:.2}{}",
        height, STEREO_BAR_WIDTH, colors, opacity, mono
    );

    format!(
        "[1:a]channelsplit=channel_layout=stereo[L][R];\
         [L]showfreqs={}[left_vis];\
         [R]showfreqs={}[right_vis];\
         [0:v][left_vis]overlay=0:0[v1];\
         [v1][right_vis]overlay=W-w:0[outv]",
        left, right
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_aliases_normalize() {
        assert_eq!(SpectrumStyle::from_name("bars"), SpectrumStyle::ShowFreqs);
        assert_eq!(SpectrumStyle::from_name("Equalizer"), SpectrumStyle::ShowFreqs);
        assert_eq!(SpectrumStyle::from_name("cqt"), SpectrumStyle::ShowCqt);
        assert_eq!(SpectrumStyle::from_name("spectrum"), SpectrumStyle::ShowSpectrum);
        assert_eq!(SpectrumStyle::from_name(""), SpectrumStyle::Stereo);
        assert_eq!(SpectrumStyle::from_name("laser-show"), SpectrumStyle::Stereo);
    }

    #[test]
    fn colors_map_to_hex() {
        assert_eq!(SpectrumColor::from_name(""), SpectrumColor::Rainbow);
        assert_eq!(SpectrumColor::from_name("Gold"), SpectrumColor::Mono("0xFFD700".into()));
        assert_eq!(SpectrumColor::from_name("teal"), SpectrumColor::Mono("0x00FFFF".into()));
    }

    #[test]
    fn opacity_outside_unit_interval_defaults() {
        assert_eq!(normalize_opacity(0.0), 0.3);
        assert_eq!(normalize_opacity(1.5), 0.3);
        assert_eq!(normalize_opacity(-0.2), 0.3);
        assert_eq!(normalize_opacity(1.0), 1.0);
        assert_eq!(normalize_opacity(0.45), 0.45);
    }

    #[test]
    fn stereo_graph_overlays_both_edges() {
        let graph = spectrum_filter(SpectrumStyle::Stereo, &SpectrumColor::Rainbow, 0.3, 1920, 1024);

        assert!(graph.starts_with("[1:a]channelsplit=channel_layout=stereo[L][R];"));
        assert!(graph.contains("[L]showfreqs=s=1024x300:mode=bar"));
        assert!(graph.contains("transpose=1,hflip,vflip"));
        assert!(graph.ends_with("[v1][right_vis]overlay=W-w:0[outv]"));
        assert!(!graph.contains("eq=saturation=0"));
    }

    #[test]
    fn bars_sit_at_bottom_quarter() {
        let graph = spectrum_filter(
            SpectrumStyle::ShowFreqs,
            &SpectrumColor::Mono("0xFF0000".into()),
            0.5,
            1920,
            1024,
        );
        assert!(graph.contains("showfreqs=s=1920x256"));
        assert!(graph.contains("colors=0xFF0000"));
        assert!(graph.ends_with("[0:v][spectrum]overlay=0:768[outv]"));
    }
}
