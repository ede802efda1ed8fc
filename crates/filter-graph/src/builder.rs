//! Graph assembly per reframe mode.
//!
//! The builder consumes the job's resolved panel plan: every mode is "one
//! crop per panel, then compose", so there is no mode-specific crop logic
//! here, only mode-specific composition (single panel, vertical stack, or
//! grid). Video timing corrections from the normalizer (legacy PTS rescale,
//! per-source start offsets) are applied as each source's first video
//! stage, before any crop or scale. The caption overlay, when present, is
//! always attached to the graph's terminal video pad.

use std::path::Path;

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_job_model::{Job, NormalizedSource, ReframeMode, ThreePersonLayout};

use crate::crop::panel_crop;
use crate::graph::{FilterGraph, MediaKind, Pad};

/// Canonical internal sample rate both audio branches are resampled to
/// before mixing.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Build the filter graph for a job.
///
/// `sources` is parallel to `job.sources`; `caption_file` is an ASS file
/// already written to the job scratch directory.
pub fn build(
    job: &Job,
    sources: &[NormalizedSource],
    caption_file: Option<&Path>,
) -> ReelcutResult<FilterGraph> {
    if sources.is_empty() || sources.len() != job.sources.len() {
        return Err(ReelcutError::graph(format!(
            "job has {} sources but {} were normalized",
            job.sources.len(),
            sources.len()
        )));
    }
    if job.panels.is_empty() {
        return Err(ReelcutError::graph("job resolved to zero panels"));
    }

    let panel_dims = panel_dimensions(job)?;
    let mut graph = FilterGraph::new(sources.len());

    add_video_stages(&mut graph, job, sources, &panel_dims)?;
    add_audio_stages(&mut graph, job, sources)?;

    if let Some(path) = caption_file {
        graph.attach_terminal(
            MediaKind::Video,
            format!("subtitles={}", escape_subtitles_path(path)),
            "vcap",
        )?;
    }

    graph.validate()?;
    tracing::debug!(
        stages = graph.len(),
        terminal = graph.terminal_video_pad()?,
        "Filter graph built"
    );
    Ok(graph)
}

/// Target dimensions for each panel, in render order.
///
/// Heights are split evenly (even-rounded) and the remainder goes to the
/// last panel so the composed frame is exactly the output size.
fn panel_dimensions(job: &Job) -> ReelcutResult<Vec<(u32, u32)>> {
    let out_w = job.output.width;
    let out_h = job.output.height;
    let count = job.panels.len();

    let dims = match (job.reframe_mode, count) {
        (ReframeMode::AutoCenter, 1) => vec![(out_w, out_h)],
        (ReframeMode::SplitScreen, 2) => split_heights(out_h, 2)
            .into_iter()
            .map(|h| (out_w, h))
            .collect(),
        (ReframeMode::ThreePerson, 3) => match job.three_person_layout {
            ThreePersonLayout::Stack => split_heights(out_h, 3)
                .into_iter()
                .map(|h| (out_w, h))
                .collect(),
            ThreePersonLayout::Grid => {
                let heights = split_heights(out_h, 2);
                let left_w = (out_w / 2) & !1;
                vec![
                    (out_w, heights[0]),
                    (left_w, heights[1]),
                    (out_w - left_w, heights[1]),
                ]
            }
        },
        (mode, n) => {
            return Err(ReelcutError::graph(format!(
                "mode {mode:?} cannot render {n} panels"
            )))
        }
    };
    Ok(dims)
}

fn split_heights(total: u32, count: u32) -> Vec<u32> {
    let each = (total / count) & !1;
    let mut heights = vec![each; count as usize];
    if let Some(last) = heights.last_mut() {
        *last = total - each * (count - 1);
    }
    heights
}

fn add_video_stages(
    graph: &mut FilterGraph,
    job: &Job,
    sources: &[NormalizedSource],
    panel_dims: &[(u32, u32)],
) -> ReelcutResult<()> {
    // Per-source feed pads: timing correction first, then a split when the
    // source feeds more than one panel.
    let mut feeds: Vec<Vec<String>> = vec![Vec::new(); sources.len()];
    for (index, source) in sources.iter().enumerate() {
        let uses = job
            .panels
            .iter()
            .filter(|p| p.source_index == index)
            .count();
        if uses == 0 {
            continue;
        }

        let timing = timing_filter(source, job.sources[index].time_offset_secs);
        let pads: Vec<String> = (0..uses).map(|k| format!("s{index}_{k}")).collect();

        if uses == 1 && timing.is_none() {
            feeds[index] = vec![FilterGraph::raw_video(index)];
            continue;
        }

        let filter = match (&timing, uses) {
            (Some(t), 1) => t.clone(),
            (Some(t), n) => format!("{t},split={n}"),
            (None, n) => format!("split={n}"),
        };
        graph.add_stage(
            vec![FilterGraph::raw_video(index)],
            filter,
            pads.iter().map(Pad::video).collect(),
        )?;
        feeds[index] = pads;
    }

    // One crop/scale chain per panel, each using its own source's probed
    // dimensions.
    let single_panel = job.panels.len() == 1;
    let mut taken: Vec<usize> = vec![0; sources.len()];
    for (j, (panel, &(pw, ph))) in job.panels.iter().zip(panel_dims).enumerate() {
        let i = panel.source_index;
        let probe = &sources[i].probe;
        let crop = panel_crop(
            probe.width,
            probe.height,
            pw,
            ph,
            panel.crop_width_percent,
            panel.crop_position,
        );
        let input = feeds[i][taken[i]].clone();
        taken[i] += 1;

        let label = if single_panel {
            "vout".to_string()
        } else {
            format!("p{j}")
        };
        graph.add_stage(
            vec![input],
            format!(
                "{},scale={pw}:{ph}:flags=lanczos,setsar=1,format=yuv420p",
                crop.to_filter()
            ),
            vec![Pad::video(label)],
        )?;
    }

    if single_panel {
        return Ok(());
    }

    // Composition.
    match (job.reframe_mode, job.three_person_layout) {
        (ReframeMode::ThreePerson, ThreePersonLayout::Grid) => {
            graph.add_stage(
                vec!["p1".to_string(), "p2".to_string()],
                "hstack=inputs=2",
                vec![Pad::video("bottom")],
            )?;
            graph.add_stage(
                vec!["p0".to_string(), "bottom".to_string()],
                "vstack=inputs=2",
                vec![Pad::video("vout")],
            )?;
        }
        _ => {
            let inputs: Vec<String> = (0..job.panels.len()).map(|j| format!("p{j}")).collect();
            graph.add_stage(
                inputs,
                format!("vstack=inputs={}", job.panels.len()),
                vec![Pad::video("vout")],
            )?;
        }
    }
    Ok(())
}

/// The source's first video filter: legacy PTS rescale and/or start
/// offset, combined into one `setpts`. Audio never gets a matching tempo
/// filter; offsets are handled with `adelay` in the audio path.
fn timing_filter(source: &NormalizedSource, offset_secs: f64) -> Option<String> {
    let mut expr = String::from("PTS");
    let mut needed = false;
    if let Some(scale) = source.video_pts_scale {
        expr = format!("PTS*{scale:.6}");
        needed = true;
    }
    if offset_secs > 0.0 {
        expr = format!("{expr}+{offset_secs:.3}/TB");
        needed = true;
    }
    needed.then(|| format!("setpts={expr}"))
}

fn add_audio_stages(
    graph: &mut FilterGraph,
    job: &Job,
    sources: &[NormalizedSource],
) -> ReelcutResult<()> {
    let primary_audio = sources[0].probe.has_audio;
    let secondary_audio = sources.get(1).map(|s| s.probe.has_audio).unwrap_or(false);

    if !primary_audio && !secondary_audio {
        return Ok(());
    }

    if primary_audio && secondary_audio {
        // Two independently leveled branches mixed with the primary's
        // duration; the secondary never extends the output.
        for (index, volume) in [
            (0usize, job.audio_mix.primary_volume),
            (1usize, job.audio_mix.secondary_volume),
        ] {
            let filter = audio_branch_filter(
                volume,
                job.sources[index].time_offset_secs,
                true,
            );
            graph.add_stage(
                vec![FilterGraph::raw_audio(index)],
                filter,
                vec![Pad::audio(format!("a{index}"))],
            )?;
        }
        graph.add_stage(
            vec!["a0".to_string(), "a1".to_string()],
            "amix=inputs=2:duration=first:normalize=0",
            vec![Pad::audio("aout")],
        )?;
        return Ok(());
    }

    // Single audible source (whichever it is).
    let index = if primary_audio { 0 } else { 1 };
    let volume = if index == 0 {
        job.audio_mix.primary_volume
    } else {
        job.audio_mix.secondary_volume
    };
    let filter = audio_branch_filter(volume, job.sources[index].time_offset_secs, false);
    graph.add_stage(
        vec![FilterGraph::raw_audio(index)],
        filter,
        vec![Pad::audio("aout")],
    )?;
    Ok(())
}

/// One audio branch: optional start delay, optional level change, and a
/// resample to the canonical mix rate when feeding `amix`.
fn audio_branch_filter(volume_percent: f64, offset_secs: f64, for_mix: bool) -> String {
    let mut filters = Vec::new();
    if offset_secs > 0.0 {
        let ms = (offset_secs * 1000.0).round() as u64;
        filters.push(format!("adelay={ms}:all=1"));
    }
    if (volume_percent - 100.0).abs() > 1e-9 {
        filters.push(format!("volume={:.2}", volume_percent / 100.0));
    }
    if for_mix {
        filters.push(format!("aresample={MIX_SAMPLE_RATE}"));
    }
    if filters.is_empty() {
        // Keep the chain labeled so output mapping is uniform.
        filters.push("anull".to_string());
    }
    filters.join(",")
}

/// Escape a path for the `subtitles=` filter (colons separate filter
/// options, quotes and backslashes nest inside the graph string).
fn escape_subtitles_path(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', r"\\")
        .replace(':', r"\:")
        .replace('\'', r"\'");
    format!("'{escaped}'")
}
