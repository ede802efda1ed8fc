//! Explicit labeled filter graphs.
//!
//! A graph is an ordered list of stages, each consuming named input pads
//! and producing named output pads. Raw demuxer pads are `N:v` / `N:a`.
//! The graph is validated structurally: a stage may only consume a pad
//! that a raw input or an earlier stage produced, every produced pad is
//! consumed at most once, and the terminal video/audio pads are queryable
//! facts rather than string-matching guesses. The `-filter_complex`
//! string is rendered only at invocation time.

use reelcut_common::{ReelcutError, ReelcutResult};

/// Whether a pad carries video or audio samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// A named output pad produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pad {
    pub label: String,
    pub kind: MediaKind,
}

impl Pad {
    pub fn video(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: MediaKind::Video,
        }
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: MediaKind::Audio,
        }
    }
}

/// One filter stage: `[in...]filter[out...]`.
#[derive(Debug, Clone)]
pub struct FilterStage {
    /// Pad labels consumed, in order.
    pub inputs: Vec<String>,
    /// Filter expression, e.g. `crop=606:1080:656:0,scale=1080:1920`.
    pub filter: String,
    /// Pads produced, in order.
    pub outputs: Vec<Pad>,
}

/// An ordered, validated sequence of filter stages.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    stages: Vec<FilterStage>,
    /// Number of demuxer inputs (`0:v` .. `N-1:v`).
    input_count: usize,
}

impl FilterGraph {
    /// Create an empty graph over `input_count` demuxer inputs.
    pub fn new(input_count: usize) -> Self {
        Self {
            stages: Vec::new(),
            input_count,
        }
    }

    /// Raw video pad label for input `index`.
    pub fn raw_video(index: usize) -> String {
        format!("{index}:v")
    }

    /// Raw audio pad label for input `index`.
    pub fn raw_audio(index: usize) -> String {
        format!("{index}:a")
    }

    /// Append a stage, checking that every consumed pad exists.
    pub fn add_stage(
        &mut self,
        inputs: Vec<String>,
        filter: impl Into<String>,
        outputs: Vec<Pad>,
    ) -> ReelcutResult<()> {
        let filter = filter.into();
        if inputs.is_empty() || outputs.is_empty() {
            return Err(ReelcutError::graph(format!(
                "stage '{filter}' must have at least one input and one output pad"
            )));
        }
        for input in &inputs {
            if !self.pad_available(input) {
                return Err(ReelcutError::graph(format!(
                    "stage '{filter}' consumes pad [{input}] which no earlier stage or raw input produces"
                )));
            }
        }
        for output in &outputs {
            if self.pad_produced(&output.label).is_some() || self.raw_pad_kind(&output.label).is_some() {
                return Err(ReelcutError::graph(format!(
                    "stage '{filter}' redefines pad [{}]",
                    output.label
                )));
            }
        }
        self.stages.push(FilterStage {
            inputs,
            filter,
            outputs,
        });
        Ok(())
    }

    /// The terminal pad of the given kind: produced, never consumed.
    ///
    /// When several stages leave pads dangling the most recently produced
    /// one wins, which matches "the final stage's output is the one mapped
    /// to the muxed output".
    pub fn terminal_pad(&self, kind: MediaKind) -> Option<&str> {
        self.stages
            .iter()
            .rev()
            .flat_map(|stage| stage.outputs.iter().rev())
            .find(|pad| pad.kind == kind && !self.pad_consumed(&pad.label))
            .map(|pad| pad.label.as_str())
    }

    /// Terminal video pad, required for mapping the muxed output.
    pub fn terminal_video_pad(&self) -> ReelcutResult<&str> {
        self.terminal_pad(MediaKind::Video)
            .ok_or_else(|| ReelcutError::graph("graph has no terminal video pad"))
    }

    /// Terminal audio pad, if the graph processes audio at all.
    pub fn terminal_audio_pad(&self) -> Option<&str> {
        self.terminal_pad(MediaKind::Audio)
    }

    /// Attach a filter to the current terminal pad of `kind`, producing a
    /// new pad labeled `output`. This is the structural "append to the
    /// final output" operation used for caption overlays.
    pub fn attach_terminal(
        &mut self,
        kind: MediaKind,
        filter: impl Into<String>,
        output: impl Into<String>,
    ) -> ReelcutResult<()> {
        let terminal = self
            .terminal_pad(kind)
            .ok_or_else(|| ReelcutError::graph("cannot attach to a graph with no terminal pad"))?
            .to_string();
        let output = output.into();
        self.add_stage(
            vec![terminal],
            filter,
            vec![Pad {
                label: output,
                kind,
            }],
        )
    }

    /// Full structural validation.
    ///
    /// `add_stage` already rejects unproduced inputs; this additionally
    /// checks that no produced pad is consumed twice and that a terminal
    /// video pad exists.
    pub fn validate(&self) -> ReelcutResult<()> {
        for stage in &self.stages {
            for input in &stage.inputs {
                let consumers = self
                    .stages
                    .iter()
                    .flat_map(|s| s.inputs.iter())
                    .filter(|i| *i == input)
                    .count();
                if consumers > 1 && self.raw_pad_kind(input).is_none() {
                    return Err(ReelcutError::graph(format!(
                        "pad [{input}] is consumed {consumers} times; split it explicitly"
                    )));
                }
            }
        }
        self.terminal_video_pad()?;
        Ok(())
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in order.
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Render the graph to one `-filter_complex` string.
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(|stage| {
                let inputs: String = stage
                    .inputs
                    .iter()
                    .map(|label| format!("[{label}]"))
                    .collect();
                let outputs: String = stage
                    .outputs
                    .iter()
                    .map(|pad| format!("[{}]", pad.label))
                    .collect();
                format!("{inputs}{}{outputs}", stage.filter)
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    fn pad_available(&self, label: &str) -> bool {
        self.raw_pad_kind(label).is_some() || self.pad_produced(label).is_some()
    }

    fn pad_produced(&self, label: &str) -> Option<MediaKind> {
        self.stages
            .iter()
            .flat_map(|s| s.outputs.iter())
            .find(|pad| pad.label == label)
            .map(|pad| pad.kind)
    }

    fn pad_consumed(&self, label: &str) -> bool {
        self.stages
            .iter()
            .flat_map(|s| s.inputs.iter())
            .any(|input| input == label)
    }

    fn raw_pad_kind(&self, label: &str) -> Option<MediaKind> {
        let (index, kind) = label.split_once(':')?;
        let index: usize = index.parse().ok()?;
        if index >= self.input_count {
            return None;
        }
        match kind {
            "v" => Some(MediaKind::Video),
            "a" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_graph() -> FilterGraph {
        let mut graph = FilterGraph::new(1);
        graph
            .add_stage(
                vec![FilterGraph::raw_video(0)],
                "crop=606:1080:656:0,scale=1080:1920",
                vec![Pad::video("vout")],
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_terminal_pad_of_simple_graph() {
        let graph = simple_graph();
        assert_eq!(graph.terminal_video_pad().unwrap(), "vout");
        assert!(graph.terminal_audio_pad().is_none());
        graph.validate().unwrap();
    }

    #[test]
    fn test_unproduced_pad_is_rejected() {
        let mut graph = FilterGraph::new(1);
        let err = graph
            .add_stage(
                vec!["ghost".to_string()],
                "scale=1080:1920",
                vec![Pad::video("vout")],
            )
            .unwrap_err();
        assert!(err.to_string().contains("[ghost]"));
    }

    #[test]
    fn test_raw_pads_respect_input_count() {
        let mut graph = FilterGraph::new(1);
        let err = graph
            .add_stage(
                vec![FilterGraph::raw_video(1)],
                "scale=1080:1920",
                vec![Pad::video("vout")],
            )
            .unwrap_err();
        assert!(err.to_string().contains("[1:v]"));
    }

    #[test]
    fn test_attach_terminal_moves_the_terminal() {
        let mut graph = simple_graph();
        graph
            .attach_terminal(MediaKind::Video, "subtitles='captions.ass'", "vcap")
            .unwrap();
        assert_eq!(graph.terminal_video_pad().unwrap(), "vcap");
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]crop=606:1080:656:0,scale=1080:1920[vout];[vout]subtitles='captions.ass'[vcap]"
        );
    }

    #[test]
    fn test_attach_terminal_on_multi_output_stack() {
        // The bug class this exists for: after a stack, "the last pad
        // mentioned" is not the output; the terminal pad is.
        let mut graph = FilterGraph::new(2);
        graph
            .add_stage(
                vec![FilterGraph::raw_video(0)],
                "crop=960:852:163:114,scale=1080:960",
                vec![Pad::video("p0")],
            )
            .unwrap();
        graph
            .add_stage(
                vec![FilterGraph::raw_video(1)],
                "crop=640:568:109:76,scale=1080:960",
                vec![Pad::video("p1")],
            )
            .unwrap();
        graph
            .add_stage(
                vec!["p0".to_string(), "p1".to_string()],
                "vstack=inputs=2",
                vec![Pad::video("stacked")],
            )
            .unwrap();
        graph
            .add_stage(
                vec![FilterGraph::raw_audio(0), FilterGraph::raw_audio(1)],
                "amix=inputs=2:duration=first",
                vec![Pad::audio("aout")],
            )
            .unwrap();

        graph
            .attach_terminal(MediaKind::Video, "subtitles='captions.ass'", "vcap")
            .unwrap();

        // Captions landed on the stacked video, not on the audio mix.
        assert_eq!(graph.terminal_video_pad().unwrap(), "vcap");
        assert_eq!(graph.terminal_audio_pad(), Some("aout"));
        assert!(graph
            .to_filter_complex()
            .contains("[stacked]subtitles='captions.ass'[vcap]"));
        graph.validate().unwrap();
    }

    #[test]
    fn test_double_consumption_is_rejected() {
        let mut graph = FilterGraph::new(1);
        graph
            .add_stage(
                vec![FilterGraph::raw_video(0)],
                "scale=1080:960",
                vec![Pad::video("half")],
            )
            .unwrap();
        graph
            .add_stage(
                vec!["half".to_string()],
                "hflip",
                vec![Pad::video("a")],
            )
            .unwrap();
        graph
            .add_stage(
                vec!["half".to_string()],
                "vflip",
                vec![Pad::video("b")],
            )
            .unwrap();
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("consumed 2 times"));
    }

    #[test]
    fn test_redefining_a_pad_is_rejected() {
        let mut graph = simple_graph();
        let err = graph
            .add_stage(
                vec![FilterGraph::raw_video(0)],
                "null",
                vec![Pad::video("vout")],
            )
            .unwrap_err();
        assert!(err.to_string().contains("redefines"));
    }
}
