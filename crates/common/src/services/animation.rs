//! # Animation Service
//!
//! Engine-agnostic clip state for one model instance. The Bevy side
//! (`plugins::animation_plugin`) reads weights out of here every frame and pushes them into the
//! instance's `AnimationPlayer`.
//!
//! ## Architecture
//!
//! ```text
//!              set_clip(name)                      advance(dt) >= fade
//!   ┌──────┐ ─────────────────▶ ┌──────────────┐ ───────────────────▶ ┌─────────────┐
//!   │ Idle │                    │ CrossFading  │                      │ Playing(to) │
//!   └──────┘                    │ (from?, to)  │ ◀─────────────────── └─────────────┘
//!                               └──────────────┘    set_clip(other)
//! ```
//!
//! - At most two clips carry weight (one fading in, one fading out).
//! - A request for a clip that already has weight is a no-op.
//! - The catalog always contains the rest clip, prepended when the source lacks it.

use crate::error::AvatarError;

/// Default crossfade duration for clip transitions
pub const DEFAULT_FADE_SECS: f32 = 0.2;

/// Default rest clip name
pub const IDLE_CLIP: &str = "Idle";

// ============================================================================
// Clip State
// ============================================================================

/// Playback state of a single instance
#[derive(Debug, Clone, PartialEq)]
pub enum ClipState {
    /// Nothing weighted yet
    Idle,
    /// One clip at full weight
    Playing(String),
    /// `to` rising, `from` (with its weight at fade start) falling
    CrossFading {
        from: Option<(String, f32)>,
        to: String,
        elapsed: f32,
    },
}

/// Cross-fading clip selector over a fixed catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ClipBlender {
    catalog: Vec<String>,
    fade_secs: f32,
    state: ClipState,
}

impl ClipBlender {
    /// Build from the source clip names in asset order
    pub fn new(source_clips: &[String], idle_clip: &str, fade_secs: f32) -> Self {
        let mut catalog = source_clips.to_vec();
        if !catalog.iter().any(|c| c == idle_clip) {
            catalog.insert(0, idle_clip.to_string());
        }

        Self {
            catalog,
            fade_secs: fade_secs.max(0.0),
            state: ClipState::Idle,
        }
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn state(&self) -> &ClipState {
        &self.state
    }

    /// Clip fading in or playing
    pub fn active_clip(&self) -> Option<&str> {
        match &self.state {
            ClipState::Idle => None,
            ClipState::Playing(clip) => Some(clip),
            ClipState::CrossFading { to, .. } => Some(to),
        }
    }

    pub fn fading_out_clip(&self) -> Option<&str> {
        match &self.state {
            ClipState::CrossFading { from: Some((clip, _)), .. } => Some(clip),
            _ => None,
        }
    }

    /// Normalized fade progress in [0, 1]
    fn progress(&self, elapsed: f32) -> f32 {
        if self.fade_secs <= 0.0 {
            1.0
        } else {
            (elapsed / self.fade_secs).clamp(0.0, 1.0)
        }
    }

    /// Current weight of a clip, 0 when not weighted
    pub fn weight(&self, name: &str) -> f32 {
        match &self.state {
            ClipState::Idle => 0.0,
            ClipState::Playing(clip) => {
                if clip == name {
                    1.0
                } else {
                    0.0
                }
            }
            ClipState::CrossFading { from, to, elapsed } => {
                let t = self.progress(*elapsed);
                let outgoing = from.as_ref().map(|(_, w0)| w0 * (1.0 - t));

                if to == name {
                    match outgoing {
                        Some(out) => 1.0 - out,
                        None => t,
                    }
                } else {
                    match (from, outgoing) {
                        (Some((clip, _)), Some(out)) if clip == name => out,
                        _ => 0.0,
                    }
                }
            }
        }
    }

    /// Every clip with a place in the weighted set, with its weight
    pub fn weights(&self) -> Vec<(String, f32)> {
        match &self.state {
            ClipState::Idle => Vec::new(),
            ClipState::Playing(clip) => vec![(clip.clone(), 1.0)],
            ClipState::CrossFading { from, to, .. } => {
                let mut out = Vec::with_capacity(2);
                if let Some((clip, _)) = from {
                    out.push((clip.clone(), self.weight(clip)));
                }
                out.push((to.clone(), self.weight(to)));
                out
            }
        }
    }

    /// Request a clip. Returns `Ok(true)` when a new fade started.
    pub fn set_clip(&mut self, name: &str) -> Result<bool, AvatarError> {
        if !self.catalog.iter().any(|c| c == name) {
            return Err(AvatarError::UnknownClip(name.to_string()));
        }

        // Already the target, or still audible
        if self.active_clip() == Some(name) || self.weight(name) > 0.0 {
            return Ok(false);
        }

        // The heavier of the current pair becomes the outgoing clip; the other is dropped.
        let from = match &self.state {
            ClipState::Idle => None,
            ClipState::Playing(clip) => Some((clip.clone(), 1.0)),
            ClipState::CrossFading { .. } => self
                .weights()
                .into_iter()
                .filter(|(_, w)| *w > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1)),
        };

        self.state = ClipState::CrossFading {
            from,
            to: name.to_string(),
            elapsed: 0.0,
        };
        Ok(true)
    }

    /// Step the fade. Completes into `Playing` once the window elapses.
    pub fn advance(&mut self, delta: f32) {
        if let ClipState::CrossFading { to, elapsed, .. } = &mut self.state {
            *elapsed += delta.max(0.0);
            if *elapsed >= self.fade_secs {
                self.state = ClipState::Playing(std::mem::take(to));
            }
        }
    }
}

// ============================================================================
// Catalog Notification
// ============================================================================

/// Deduplicates catalog publications by value
#[derive(Debug, Clone, Default)]
pub struct CatalogNotifier {
    last: Option<Vec<String>>,
}

impl CatalogNotifier {
    /// Returns the catalog when it is non-empty and differs from the last one published
    pub fn offer(&mut self, catalog: &[String]) -> Option<Vec<String>> {
        if catalog.is_empty() || self.last.as_deref() == Some(catalog) {
            return None;
        }
        self.last = Some(catalog.to_vec());
        self.last.clone()
    }
}

// ============================================================================
// Clip Picker
// ============================================================================

/// User-facing clip selection. The selected clip is what plays while moving.
#[derive(bevy::prelude::Resource, Debug, Clone, Default, PartialEq)]
pub struct ClipPicker {
    catalog: Vec<String>,
    selected: Option<String>,
    idle_clip: String,
}

impl ClipPicker {
    pub fn new(idle_clip: impl Into<String>) -> Self {
        Self {
            idle_clip: idle_clip.into(),
            ..Default::default()
        }
    }

    /// Replace the catalog. Keeps the selection if it survives, else picks the first
    /// non-rest clip, else the rest clip.
    pub fn set_catalog(&mut self, catalog: Vec<String>) {
        let keep = self
            .selected
            .as_ref()
            .is_some_and(|s| catalog.contains(s));

        if !keep {
            self.selected = catalog
                .iter()
                .find(|c| **c != self.idle_clip)
                .or_else(|| catalog.first())
                .cloned();
        }
        self.catalog = catalog;
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select_index(&mut self, index: usize) -> Option<&str> {
        let clip = self.catalog.get(index)?.clone();
        self.selected = Some(clip);
        self.selected()
    }

    /// Move the selection by `step`, wrapping around
    pub fn cycle(&mut self, step: isize) -> Option<&str> {
        if self.catalog.is_empty() {
            return None;
        }
        let len = self.catalog.len() as isize;
        let current = self
            .selected
            .as_ref()
            .and_then(|s| self.catalog.iter().position(|c| c == s))
            .unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len) as usize;
        self.select_index(next)
    }
}

// ============================================================================
// Display Names
// ============================================================================

const NATURAL_NAMES: &[(&str, &[&str])] = &[
    ("Walk", &["walk", "walking"]),
    ("Run", &["run", "running"]),
    ("Jump", &["jump", "jumping"]),
    ("Rest", &["idle", "t-pose", "tpose", "static", "rest"]),
    ("Dance", &["dance", "dancing", "samba"]),
    ("Backward", &["backward"]),
    ("Left", &["left"]),
    ("Right", &["right"]),
];

/// Human-readable label for a raw clip name
pub fn natural_name(raw: &str) -> String {
    let lower = raw.to_lowercase();

    for (natural, keywords) in NATURAL_NAMES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return natural.to_string();
        }
    }

    let tail = raw.rsplit('|').next().unwrap_or(raw).replace('_', " ");
    let mut clean = String::with_capacity(tail.len() + 4);
    let mut prev_lower = false;
    for ch in tail.chars() {
        if prev_lower && ch.is_ascii_uppercase() {
            clean.push(' ');
        }
        prev_lower = ch.is_ascii_lowercase();
        clean.push(ch);
    }

    if clean.to_lowercase() != lower && clean.chars().count() > 1 {
        let mut chars = clean.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => clean,
        };
    }

    if lower.contains("armature") || lower.contains("mixamo") {
        return "Generic Animation".to_string();
    }

    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn blender(list: &[&str]) -> ClipBlender {
        ClipBlender::new(&names(list), IDLE_CLIP, DEFAULT_FADE_SECS)
    }

    #[test]
    fn test_idle_is_prepended_once() {
        assert_eq!(blender(&["Walking", "TPose"]).catalog(), names(&["Idle", "Walking", "TPose"]));
        assert_eq!(blender(&["Walking", "Idle"]).catalog(), names(&["Walking", "Idle"]));
        assert_eq!(blender(&[]).catalog(), names(&["Idle"]));
    }

    #[test]
    fn test_walking_scenario_settles_at_full_weight() {
        let mut b = blender(&["Walking", "TPose"]);
        assert_eq!(b.set_clip("Walking"), Ok(true));

        for _ in 0..30 {
            b.advance(1.0 / 60.0);
        }

        assert_eq!(b.state(), &ClipState::Playing("Walking".to_string()));
        assert_eq!(b.weight("Walking"), 1.0);
        assert_eq!(b.weight("TPose"), 0.0);
        assert_eq!(b.weight("Idle"), 0.0);
    }

    #[test]
    fn test_repeated_request_is_noop() {
        let mut b = blender(&["Walking"]);
        b.set_clip("Walking").unwrap();
        b.advance(0.05);
        let after_first = b.clone();

        assert_eq!(b.set_clip("Walking"), Ok(false));
        assert_eq!(b, after_first);
    }

    #[test]
    fn test_request_for_fade_target_before_first_advance_is_noop() {
        // From rest: the incoming weight is still 0 until time passes
        let mut b = blender(&["Walking"]);
        assert_eq!(b.set_clip("Walking"), Ok(true));
        assert_eq!(b.weight("Walking"), 0.0);
        let after_first = b.clone();

        assert_eq!(b.set_clip("Walking"), Ok(false));
        assert_eq!(b, after_first);

        // From a playing clip: same at the start of the window
        let mut b = blender(&["Walking", "Running"]);
        b.set_clip("Walking").unwrap();
        b.advance(1.0);
        assert_eq!(b.set_clip("Running"), Ok(true));
        assert_eq!(b.set_clip("Running"), Ok(false));
        assert_eq!(b.fading_out_clip(), Some("Walking"));
    }

    #[test]
    fn test_unknown_clip_leaves_state_alone() {
        let mut b = blender(&["Walking"]);
        b.set_clip("Walking").unwrap();
        let before = b.clone();

        assert_eq!(b.set_clip("Backflip"), Err(AvatarError::UnknownClip("Backflip".into())));
        assert_eq!(b, before);
    }

    #[test]
    fn test_crossfade_weights_sum_to_one() {
        let mut b = blender(&["Walking", "Running"]);
        b.set_clip("Walking").unwrap();
        b.advance(1.0);
        b.set_clip("Running").unwrap();

        let steps = 20;
        for _ in 0..steps {
            let walk = b.weight("Walking");
            let run = b.weight("Running");
            assert!((0.0..=1.0).contains(&walk));
            assert!((0.0..=1.0).contains(&run));
            assert!((walk + run - 1.0).abs() < 1e-6);
            assert!(b.weights().len() <= 2);
            b.advance(DEFAULT_FADE_SECS / steps as f32);
        }
        b.advance(DEFAULT_FADE_SECS);

        assert_eq!(b.weights(), vec![("Running".to_string(), 1.0)]);
    }

    #[test]
    fn test_interrupted_fade_keeps_heavier_clip_outgoing() {
        let mut b = blender(&["Walking", "Running"]);
        b.set_clip("Walking").unwrap();
        b.advance(1.0);
        b.set_clip("Running").unwrap();
        b.advance(0.15);

        let running = b.weight("Running");
        b.set_clip("Idle").unwrap();

        assert_eq!(b.fading_out_clip(), Some("Running"));
        assert_eq!(b.active_clip(), Some("Idle"));
        assert!((b.weight("Running") - running).abs() < 1e-6);
        assert!((b.weight("Idle") + b.weight("Running") - 1.0).abs() < 1e-6);
        assert_eq!(b.weight("Walking"), 0.0);
    }

    #[test]
    fn test_catalog_notifier_dedups_by_value() {
        let mut n = CatalogNotifier::default();
        let catalog = names(&["Idle", "Walking"]);

        assert_eq!(n.offer(&[]), None);
        assert_eq!(n.offer(&catalog), Some(catalog.clone()));
        assert_eq!(n.offer(&catalog.clone()), None);
        assert_eq!(n.offer(&names(&["Idle"])), Some(names(&["Idle"])));
    }

    #[test]
    fn test_picker_defaults_to_first_real_clip() {
        let mut picker = ClipPicker::new(IDLE_CLIP);
        picker.set_catalog(names(&["Idle", "Walking", "TPose"]));
        assert_eq!(picker.selected(), Some("Walking"));

        picker.cycle(1);
        assert_eq!(picker.selected(), Some("TPose"));
        picker.cycle(1);
        assert_eq!(picker.selected(), Some("Idle"));
        picker.cycle(-1);
        assert_eq!(picker.selected(), Some("TPose"));

        // Selection survives a catalog that still contains it
        picker.set_catalog(names(&["Idle", "TPose"]));
        assert_eq!(picker.selected(), Some("TPose"));

        picker.set_catalog(names(&["Idle"]));
        assert_eq!(picker.selected(), Some("Idle"));
        assert_eq!(picker.select_index(4), None);
    }

    #[test]
    fn test_natural_names() {
        assert_eq!(natural_name("Walking"), "Walk");
        assert_eq!(natural_name("mixamo.com|Samba"), "Dance");
        assert_eq!(natural_name("T-Pose"), "Rest");
        assert_eq!(natural_name("Armature|wave_hello"), "Wave hello");
        assert_eq!(natural_name("waveHello"), "Wave Hello");
        assert_eq!(natural_name("Armature"), "Generic Animation");
        assert_eq!(natural_name("Wave"), "Wave");
    }
}
