//! Drawable configuration.

/// Settings applied when a [`crate::SkeletonDrawable`] is created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct DrawableConfig {
    /// Keep track entries alive after their `Dispose` event until they are explicitly disposed.
    pub manual_track_entry_disposal: bool,
    /// Cross-fade duration for animation pairs without an explicit mix.
    pub default_mix: f32,
    /// Global animation state time scale.
    pub time_scale: f32,
}

impl Default for DrawableConfig {
    fn default() -> Self {
        Self {
            manual_track_entry_disposal: true,
            default_mix: 0.0,
            time_scale: 1.0,
        }
    }
}

#[cfg(feature = "json")]
impl DrawableConfig {
    pub fn from_json_str(input: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(input).map_err(|e| crate::Error::JsonParse {
            message: e.to_string(),
        })
    }
}
