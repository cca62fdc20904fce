// SPDX-License-Identifier: MPL-2.0-only

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NAME: &str = "vaapi-vo";
pub const SETTINGS_FILE: &str = "settings.ron";

/// Largest OSD override accepted from the settings file.
pub const MAX_OSD_OVERRIDE: u32 = 8192;

/// Tunables of the hardware video output.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(deny_unknown_fields, default)]
#[must_use]
pub struct Settings {
    /// present through an OpenGL texture instead of a direct surface blit
    pub render_via_opengl: bool,
    /// prefer binding the texture to the pixmap the hardware renders into
    pub use_zero_copy_texture: bool,
    /// rebuild the hardware context whenever the stream format changes
    pub reinit_on_format_change: bool,
    /// field handling for interlaced frames
    pub deinterlace_mode: DeinterlaceMode,
    /// minimum width of the OSD bitmap, 0 when unset
    pub force_osd_min_width: u32,
    /// minimum height of the OSD bitmap, 0 when unset
    pub force_osd_min_height: u32,
    /// ask the driver whether a surface is ready before presenting it
    pub poll_surface_ready: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_via_opengl: false,
            use_zero_copy_texture: false,
            reinit_on_format_change: true,
            deinterlace_mode: DeinterlaceMode::default(),
            force_osd_min_width: 0,
            force_osd_min_height: 0,
            poll_surface_ready: true,
        }
    }
}

/// Deinterlacing policy
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeinterlaceMode {
    // present the whole frame in one pass
    #[default]
    Off,
    // present the first field only
    TopField,
    // present each field as its own pass
    Bob,
}

impl DeinterlaceMode {
    /// Numeric level used in logs, 0 to 2.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            DeinterlaceMode::Off => 0,
            DeinterlaceMode::TopField => 1,
            DeinterlaceMode::Bob => 2,
        }
    }
}

/// Errors raised while reading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl Settings {
    /// Location of the settings file under the user's config directory.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(NAME).join(SETTINGS_FILE))
    }

    /// Load the settings from the user's config directory.
    ///
    /// A missing file or config directory yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, Error> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no config directory, using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Load the settings from the given file.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(why) if why.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file missing, using defaults");
                return Ok(Self::default());
            }
            Err(why) => return Err(why.into()),
        };

        Self::from_ron(&text)
    }

    /// Parse settings from RON text and sanitize them.
    ///
    /// # Errors
    ///
    /// Fails on malformed RON or unknown fields.
    pub fn from_ron(text: &str) -> Result<Self, Error> {
        Ok(ron::from_str::<Self>(text)?.sanitized())
    }

    /// Applies the coupling rules between the individual tunables.
    pub fn sanitized(mut self) -> Self {
        if !self.reinit_on_format_change && self.deinterlace_mode != DeinterlaceMode::Off {
            tracing::info!("reinit disabled, turning deinterlacing off");
            self.deinterlace_mode = DeinterlaceMode::Off;
        }

        self.force_osd_min_width = self.force_osd_min_width.min(MAX_OSD_OVERRIDE);
        self.force_osd_min_height = self.force_osd_min_height.min(MAX_OSD_OVERRIDE);
        self
    }

    /// Serialize the settings as pretty RON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}
