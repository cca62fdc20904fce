// SPDX-License-Identifier: MPL-2.0

//! Hardware accelerated video output.
//!
//! Frames arrive either decoded straight into hardware surfaces or as
//! YV12/YUY2 planes that are uploaded into output surfaces. They are scaled
//! into the window, optionally overlaid with a composited OSD bitmap and
//! presented through a direct blit or one of two GL paths.

pub mod context;
pub mod convert;
pub mod driver;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod present;
pub mod scaler;
pub mod sim;
pub mod surface_pool;
pub mod va;
pub mod window;

pub use driver::{Driver, DriverStats, GuiData, Property, VoCapabilities};
pub use error::{Result, VoError};
pub use frame::{Accelerator, Frame, PixelFormat};
pub use vaapi_vo_config::{DeinterlaceMode, Settings};
