//! Timeline artifacts anchored to absolute times: background audio layers,
//! visual effects and transitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_volume() -> f64 {
    1.0
}

/// One background audio layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub track_id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub start_time: f64,
    pub duration: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

/// Background music / ambience mixed under the narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTrack {
    #[serde(default = "default_volume")]
    pub master_volume: f64,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
}

impl Default for BackgroundTrack {
    fn default() -> Self {
        Self {
            master_volume: default_volume(),
            audio_tracks: Vec::new(),
        }
    }
}

/// A visual effect applied over part of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEffect {
    pub effect_id: String,
    pub effect_type: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl VisualEffect {
    pub fn new(
        effect_id: impl Into<String>,
        effect_type: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            effect_id: effect_id.into(),
            effect_type: effect_type.into(),
            start_time,
            duration,
            parameters: serde_json::Map::new(),
        }
    }
}

/// A transition between two consecutive clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub transition_id: String,
    pub transition_type: String,
    pub start_time: f64,
    pub duration: f64,
}

impl Transition {
    pub fn new(
        transition_id: impl Into<String>,
        transition_type: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            transition_id: transition_id.into(),
            transition_type: transition_type.into(),
            start_time,
            duration,
        }
    }
}

/// Effects and transitions layered over the composed video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositionPlan {
    #[serde(default)]
    pub effects: Vec<VisualEffect>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}
