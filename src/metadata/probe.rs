use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{AppError, Result};
use crate::runner::CommandLine;

const TITLE_KEYS: &[&str] = &["title", "TITLE"];
const ARTIST_KEYS: &[&str] = &["artist", "ARTIST", "uploader", "UPLOADER"];

/// `ffprobe -v quiet -print_format json -show_format <file>`
pub fn probe_command(file: &Path) -> CommandLine {
    CommandLine::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(file.to_string_lossy())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

/// ffprobe reports numbers inside the `format` object as strings.
#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Tags and stream facts read from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<f64>,
    pub bitrate_kbps: Option<u64>,
}

fn first_tag(tags: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| tags.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parses ffprobe's JSON. Missing fields stay `None`; malformed JSON is an error.
pub fn parse_probe_output(json: &str) -> Result<ProbedTags> {
    let output: ProbeOutput = serde_json::from_str(json)?;
    let format = output
        .format
        .ok_or_else(|| AppError::Probe("ffprobe output has no format section".to_string()))?;

    Ok(ProbedTags {
        title: first_tag(&format.tags, TITLE_KEYS),
        artist: first_tag(&format.tags, ARTIST_KEYS),
        duration_seconds: format.duration.and_then(|d| d.trim().parse::<f64>().ok()),
        bitrate_kbps: format
            .bit_rate
            .and_then(|b| b.trim().parse::<u64>().ok())
            .map(|bps| bps / 1000),
    })
}
