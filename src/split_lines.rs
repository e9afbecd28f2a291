//! Split-line registry
//!
//! Owns the horizontal cuts placed on the page. Lines are kept sorted by
//! position, except while a drag is in progress: re-sorting is deferred to
//! the end of the drag so a line being dragged past a neighbour does not
//! jump around in the list.

use std::fmt;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::geometry::pixel_y_to_ratio;

/// Stable identifier of a split line, assigned from a monotonic counter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SplitLine {
    pub id: LineId,
    /// Ratio down the page, 0.0 = top, 1.0 = bottom
    pub position: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresetError {
    #[error("a preset needs at least one part")]
    ZeroParts,

    #[error("a preset can have at most {max} parts")]
    TooManyParts { max: usize },
}

#[derive(Debug, Default)]
pub struct SplitLineRegistry {
    lines: Vec<SplitLine>,
    last_id: u32,
    dragging: Option<LineId>,
}

impl SplitLineRegistry {
    /// Closest two lines are allowed to sit before an insert gets nudged
    pub const MIN_SPACING: f64 = 0.05;
    /// Distance an inserted line is pushed away from a conflicting one
    pub const NUDGE: f64 = 0.10;
    /// Valid range for inserted lines
    pub const MIN_POSITION: f64 = 0.05;
    pub const MAX_POSITION: f64 = 0.95;
    /// Looser range used while dragging so feedback reaches nearer the edges
    pub const DRAG_MIN_POSITION: f64 = 0.02;
    pub const DRAG_MAX_POSITION: f64 = 0.98;
    /// Largest preset whose even spacing stays wider than `MIN_SPACING`.
    /// At 20 parts rounding puts neighbours just under it and the nudge
    /// stacks them.
    pub const MAX_PRESET_PARTS: usize = 19;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[SplitLine] {
        &self.lines
    }

    #[must_use]
    pub fn positions(&self) -> Vec<f64> {
        self.lines.iter().map(|line| line.position).collect()
    }

    #[must_use]
    pub fn get(&self, id: LineId) -> Option<&SplitLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    #[must_use]
    pub fn dragging(&self) -> Option<LineId> {
        self.dragging
    }

    /// Insert a new line near `raw_position`.
    ///
    /// The position is clamped into the insert range, then pushed away from
    /// every existing line closer than [`Self::MIN_SPACING`]. Conflicts are
    /// resolved in a single pass over the current lines, so dense layouts
    /// can still end up with two lines closer than the minimum spacing.
    pub fn add_line(&mut self, raw_position: f64) -> SplitLine {
        let mut position = clamp_position(raw_position, Self::MIN_POSITION, Self::MAX_POSITION);

        for line in &self.lines {
            if (line.position - position).abs() < Self::MIN_SPACING {
                position = line.position + Self::NUDGE;
                if position > Self::MAX_POSITION {
                    position = line.position - Self::NUDGE;
                }
            }
        }

        self.last_id += 1;
        let line = SplitLine {
            id: LineId(self.last_id),
            position,
        };
        debug!(
            "Adding split line {} at {:.4} (requested {:.4})",
            line.id, position, raw_position
        );

        self.lines.push(line);
        self.sort();
        line
    }

    /// Remove a line. Unknown ids are ignored.
    pub fn delete_line(&mut self, id: LineId) -> bool {
        let Some(index) = self.lines.iter().position(|line| line.id == id) else {
            debug!("Delete ignored, no split line {id}");
            return false;
        };

        self.lines.remove(index);
        if self.dragging == Some(id) {
            self.dragging = None;
        }
        debug!("Deleted split line {id}");
        true
    }

    /// Start dragging a line. Returns false if the line does not exist.
    pub fn begin_drag(&mut self, id: LineId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if let Some(previous) = self.dragging.replace(id) {
            if previous != id {
                debug!("Drag of {previous} superseded by {id}");
                self.sort();
            }
        }
        true
    }

    /// Update the dragged line's position in place without re-sorting.
    ///
    /// Returns the clamped position, or `None` if `id` is not the line
    /// being dragged.
    pub fn drag_to(&mut self, id: LineId, raw_position: f64) -> Option<f64> {
        if self.dragging != Some(id) {
            debug!("Drag update ignored, {id} is not being dragged");
            return None;
        }
        let position = clamp_position(
            raw_position,
            Self::DRAG_MIN_POSITION,
            Self::DRAG_MAX_POSITION,
        );
        let line = self.lines.iter_mut().find(|line| line.id == id)?;
        line.position = position;
        Some(position)
    }

    /// Same as [`Self::drag_to`], with the target given as a preview pixel offset
    pub fn drag_to_pixel(&mut self, id: LineId, y: f64, height_pixels: f64) -> Option<f64> {
        self.drag_to(id, pixel_y_to_ratio(y, height_pixels))
    }

    /// Finish the current drag and restore ordering
    pub fn end_drag(&mut self) -> Option<LineId> {
        let finished = self.dragging.take();
        self.sort();
        if let Some(id) = finished {
            debug!("Finished dragging split line {id}");
        }
        finished
    }

    /// One-shot move: begin, update and end a drag
    pub fn move_line(&mut self, id: LineId, raw_position: f64) -> Option<f64> {
        if !self.begin_drag(id) {
            return None;
        }
        let position = self.drag_to(id, raw_position);
        self.end_drag();
        position
    }

    /// Replace all lines with `parts - 1` evenly spaced ones
    pub fn apply_preset(&mut self, parts: usize) -> Result<(), PresetError> {
        if parts == 0 {
            return Err(PresetError::ZeroParts);
        }
        if parts > Self::MAX_PRESET_PARTS {
            return Err(PresetError::TooManyParts {
                max: Self::MAX_PRESET_PARTS,
            });
        }

        self.clear();
        for i in 1..parts {
            self.add_line(i as f64 / parts as f64);
        }
        debug!("Applied preset of {parts} parts");
        Ok(())
    }

    /// Remove all lines. The id counter keeps counting.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.dragging = None;
    }

    /// Remove all lines and restart ids from 1
    pub fn reset(&mut self) {
        self.clear();
        self.last_id = 0;
    }

    fn sort(&mut self) {
        self.lines.sort_by(|a, b| a.position.total_cmp(&b.position));
    }
}

fn clamp_position(raw: f64, min: f64, max: f64) -> f64 {
    if raw.is_nan() {
        return min;
    }
    raw.clamp(min, max)
}
