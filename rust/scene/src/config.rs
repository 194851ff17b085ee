// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration.
//!
//! Every field has a default, so hosts only pass what they override. Field
//! names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::picking::SelectionFilter;
use crate::registry::Alignment;
use crate::resources::{Color, StatePalette};
use crate::spatial::{DEFAULT_FIT_MARGIN, DEFAULT_FIT_MIN_DISTANCE};

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Highlight color for hovered elements, `0xRRGGBB`.
    pub hover_color: u32,
    /// Highlight color for the selected element, `0xRRGGBB`.
    pub selected_color: u32,
    /// Opacity of ghosted elements in transparent view mode.
    pub transparent_opacity: f32,
    /// Multiplier applied to the camera framing distance.
    pub fit_margin: f32,
    /// Lower bound on the camera framing distance.
    pub fit_min_distance: f32,
    /// Pointer travel before hover is resolved again.
    pub pointer_move_threshold_px: f32,
    /// Maximum travel between press and release for a click.
    pub click_threshold_px: f32,
    pub selection_filter: SelectionFilter,
    pub enable_selection: bool,
    pub enable_hover: bool,
    /// Camera position restored by `reset_view`.
    pub reset_camera_position: [f32; 3],
    /// Capacity of newly created instance buffers.
    pub initial_buffer_capacity: u32,
    /// Elements per progress report while processing property data.
    pub process_batch_size: usize,
    /// Per-axis placement applied once a model is loaded.
    pub align_on_load: [Alignment; 3],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            hover_color: 0xff9800,
            selected_color: 0x00b4d8,
            transparent_opacity: 0.3,
            fit_margin: DEFAULT_FIT_MARGIN,
            fit_min_distance: DEFAULT_FIT_MIN_DISTANCE,
            pointer_move_threshold_px: 2.0,
            click_threshold_px: 8.0,
            selection_filter: SelectionFilter::Everything,
            enable_selection: true,
            enable_hover: true,
            reset_camera_position: [10.0, 20.0, 20.0],
            initial_buffer_capacity: 1,
            process_batch_size: ifc_lite_data::DEFAULT_BATCH_SIZE,
            align_on_load: [Alignment::Center, Alignment::Min, Alignment::Center],
        }
    }
}

impl ViewerConfig {
    /// Parses a JSON object, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Colors and opacity for state materials.
    pub fn palette(&self) -> StatePalette {
        StatePalette {
            hover_color: Color::from_hex(self.hover_color),
            selected_color: Color::from_hex(self.selected_color),
            transparent_opacity: self.transparent_opacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ViewerConfig::from_json(r#"{"selectedColor": 16711680, "selectionFilter": "selectableOnly"}"#)
            .unwrap();
        assert_eq!(config.selected_color, 0xff0000);
        assert_eq!(config.selection_filter, SelectionFilter::SelectableOnly);
        assert_eq!(config.fit_margin, 1.1);
        assert_eq!(config.click_threshold_px, 8.0);
        assert_eq!(config.reset_camera_position, [10.0, 20.0, 20.0]);
        assert_eq!(config.process_batch_size, 100);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(ViewerConfig::from_json("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        assert!(matches!(
            ViewerConfig::from_json(r#"{"fitMargin": "wide"}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn palette_from_hex() {
        let palette = ViewerConfig::default().palette();
        assert_eq!(palette.selected_color.to_hex(), 0x00b4d8);
        assert_eq!(palette.transparent_opacity, 0.3);
    }
}
