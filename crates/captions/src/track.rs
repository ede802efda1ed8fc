//! Caption tracks and ASS serialization.
//!
//! Cues arrive from the transcription collaborator in arbitrary shape:
//! possibly overlapping, possibly empty, possibly out of order. The track
//! owns normalization (sort, drop empties, clamp overlaps) and knows how
//! to render itself as a styled ASS file the `subtitles=` filter burns in.

use std::path::Path;

use serde::{Deserialize, Serialize};

use reelcut_common::ReelcutResult;
use reelcut_job_model::CaptionStyle;

/// One timed caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    /// Cue start in milliseconds.
    pub start_ms: u64,
    /// Cue end in milliseconds.
    pub end_ms: u64,
    /// Display text.
    pub text: String,
    /// Optional per-cue style tag (e.g. a highlight marker).
    #[serde(default)]
    pub style_tag: Option<String>,
}

/// An ordered, non-overlapping caption track with its rendering style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub style: CaptionStyle,
    pub cues: Vec<CaptionCue>,
}

impl CaptionTrack {
    /// Build a track from raw collaborator cues, normalizing as we go:
    /// empty text is dropped, cues are sorted by start, each cue ends no
    /// later than the next begins, and degenerate spans are removed.
    pub fn new(style: CaptionStyle, mut cues: Vec<CaptionCue>) -> Self {
        cues.retain(|cue| !cue.text.trim().is_empty());
        cues.sort_by_key(|cue| cue.start_ms);

        let mut normalized: Vec<CaptionCue> = Vec::with_capacity(cues.len());
        for mut cue in cues {
            cue.text = cue.text.trim().to_string();
            // Clamp the previous cue against this one's start.
            if let Some(prev) = normalized.last_mut() {
                if prev.end_ms > cue.start_ms {
                    prev.end_ms = cue.start_ms;
                }
            }
            normalized.push(cue);
        }
        normalized.retain(|cue| cue.end_ms > cue.start_ms);

        Self {
            style,
            cues: normalized,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Serialize the track as an ASS document.
    pub fn to_ass(&self, play_width: u32, play_height: u32) -> String {
        let style = StyleSpec::for_style(self.style, play_height);
        let mut out = String::new();

        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str(&format!("PlayResX: {play_width}\n"));
        out.push_str(&format!("PlayResY: {play_height}\n"));
        out.push_str("WrapStyle: 0\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BackColour, \
             Bold, Outline, Shadow, Alignment, MarginL, MarginR, MarginV\n",
        );
        out.push_str(&format!(
            "Style: Default,{font},{size},{primary},{outline_color},&H80000000,{bold},{outline},0,2,60,60,{margin}\n\n",
            font = style.font,
            size = style.font_size,
            primary = style.primary_color,
            outline_color = style.outline_color,
            bold = if style.bold { -1 } else { 0 },
            outline = style.outline,
            margin = style.margin_v,
        ));

        out.push_str("[Events]\n");
        out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Text\n");
        for cue in &self.cues {
            let text = escape_ass_text(&wrap_display_lines(&cue.text, style.max_line_chars));
            let text = match (&cue.style_tag, self.style) {
                (Some(tag), CaptionStyle::Highlight) if tag == "highlight" => {
                    format!("{{\\c&H00D7FF&}}{text}")
                }
                _ => text,
            };
            out.push_str(&format!(
                "Dialogue: 0,{},{},Default,,0,0,0,{}\n",
                format_ass_time(cue.start_ms),
                format_ass_time(cue.end_ms),
                text,
            ));
        }
        out
    }

    /// Write the ASS file to disk (under the job scratch directory).
    pub fn write_ass(&self, path: &Path, play_width: u32, play_height: u32) -> ReelcutResult<()> {
        std::fs::write(path, self.to_ass(play_width, play_height))?;
        Ok(())
    }
}

/// Resolved rendering parameters for one caption style.
struct StyleSpec {
    font: &'static str,
    font_size: u32,
    primary_color: &'static str,
    outline_color: &'static str,
    bold: bool,
    outline: u32,
    margin_v: u32,
    max_line_chars: usize,
}

impl StyleSpec {
    fn for_style(style: CaptionStyle, play_height: u32) -> Self {
        // Sizes scale with the output height so 1080x1920 and smaller
        // previews render proportionally.
        let base = play_height.max(320);
        match style {
            CaptionStyle::None | CaptionStyle::Clean => Self {
                font: "Arial",
                font_size: base / 24,
                primary_color: "&H00FFFFFF",
                outline_color: "&H00000000",
                bold: false,
                outline: 2,
                margin_v: base / 12,
                max_line_chars: 38,
            },
            CaptionStyle::Bold => Self {
                font: "Arial Black",
                font_size: base / 18,
                primary_color: "&H00FFFFFF",
                outline_color: "&H00000000",
                bold: true,
                outline: 3,
                margin_v: base / 10,
                max_line_chars: 22,
            },
            CaptionStyle::Highlight => Self {
                font: "Arial Black",
                font_size: base / 18,
                primary_color: "&H00FFFFFF",
                outline_color: "&H00000000",
                bold: true,
                outline: 3,
                margin_v: base / 10,
                max_line_chars: 22,
            },
        }
    }
}

/// Greedy word wrap into display lines of at most `max_chars` each. A
/// single word longer than the budget stays on its own line unbroken.
fn wrap_display_lines(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Format milliseconds as an ASS timestamp: `H:MM:SS.cc`.
fn format_ass_time(ms: u64) -> String {
    let cs = (ms / 10) % 100;
    let seconds = (ms / 1000) % 60;
    let minutes = (ms / 60_000) % 60;
    let hours = ms / 3_600_000;
    format!("{hours}:{minutes:02}:{seconds:02}.{cs:02}")
}

/// Newlines become ASS line breaks; braces would open override blocks.
fn escape_ass_text(text: &str) -> String {
    text.replace('{', r"\{")
        .replace('}', r"\}")
        .replace('\n', r"\N")
}
