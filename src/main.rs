// SPDX-License-Identifier: MPL-2.0

//! Drives the video output against the in-memory driver.
//!
//! Plays a short synthetic clip: software YV12 frames with a subtitle
//! overlay, then a switch to hardware decoded H.264 surfaces. Stops at the
//! end of the clip or on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use calloop::signals::{Signal, Signals};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopSignal};
use eyre::eyre;
use tracing_subscriber::EnvFilter;
use vaapi_vo::frame::{CodecId, DecoderPixFmt};
use vaapi_vo::overlay::{
    ArgbLayer, Highlight, LayerContent, OverlayLayer, Palette, RleElem, RleImage, Ycbcr,
};
use vaapi_vo::sim::{SimDisplay, SimWindow};
use vaapi_vo::va::Drawable;
use vaapi_vo::{Accelerator, Driver, PixelFormat, Settings};

const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const SOFTWARE_FRAMES: u64 = 50;
const CLIP_FRAMES: u64 = 100;

struct Player {
    driver: Driver,
    frame: u64,
    signal: LoopSignal,
}

impl Player {
    fn tick(&mut self) -> TimeoutAction {
        if self.frame >= CLIP_FRAMES {
            self.signal.stop();
            return TimeoutAction::Drop;
        }

        let result = if self.frame < SOFTWARE_FRAMES {
            self.software_frame()
        } else {
            self.hardware_frame()
        };
        if let Err(why) = result {
            tracing::error!(%why, frame = self.frame, "frame dropped");
        }

        self.frame += 1;
        TimeoutAction::ToDuration(FRAME_INTERVAL)
    }

    fn software_frame(&mut self) -> vaapi_vo::Result<()> {
        let format = if self.frame < SOFTWARE_FRAMES / 2 {
            PixelFormat::Yv12
        } else {
            PixelFormat::Yuy2
        };
        let mut frame = self.driver.alloc_frame()?;
        self.driver
            .update_frame_format(&mut frame, 720, 576, 4.0 / 3.0, format, 0);

        let shade = (self.frame * 4 % 220) as u8 + 16;
        if let Some(buffers) = frame.buffers.as_mut() {
            match format {
                PixelFormat::Yuy2 => {
                    for pair in buffers.planes[0].chunks_exact_mut(2) {
                        pair.copy_from_slice(&[shade, 128]);
                    }
                }
                _ => {
                    buffers.planes[0].fill(shade);
                    buffers.planes[1].fill(128);
                    buffers.planes[2].fill(128);
                }
            }
        }

        // subtitle changes once a second
        if self.driver.overlay_begin(self.frame % 25 == 0) {
            self.driver.overlay_blend(subtitle(self.frame / 25));
            self.driver.overlay_blend(OverlayLayer {
                x: 16,
                y: 16,
                width: 96,
                height: 32,
                unscaled: true,
                content: LayerContent::Argb(Arc::new(ArgbLayer::new(vec![0xc0ff_ffff; 96 * 32]))),
            });
        }
        self.driver.overlay_end(&frame);

        self.driver.display_frame(frame);
        Ok(())
    }

    fn hardware_frame(&mut self) -> vaapi_vo::Result<()> {
        let mut frame = self.driver.alloc_frame()?;
        let profile = frame
            .accel
            .accelerator
            .profile_from_imgfmt(DecoderPixFmt::VaapiVld, CodecId::H264, false)
            .ok_or(vaapi_vo::VoError::Unsupported("no H.264 decode profile"))?;
        frame.accel.accelerator.init(profile, 1920, 1080)?;

        self.driver.update_frame_format(
            &mut frame,
            1920,
            1080,
            16.0 / 9.0,
            PixelFormat::HwSurface,
            0,
        );
        frame.progressive = false;
        frame.top_field_first = true;

        self.driver.display_frame(frame);
        Ok(())
    }
}

/// A striped caption bar, one stripe per second of playback.
fn subtitle(second: u64) -> OverlayLayer {
    let (width, height) = (600, 48);
    let stripe = 40 + (second % 10) as u16 * 20;
    let runs = (0..height)
        .flat_map(|_| {
            [
                RleElem { len: stripe, color: 1 },
                RleElem {
                    len: width as u16 - stripe,
                    color: 2,
                },
            ]
        })
        .collect();
    let colors = Palette::Ycbcr(vec![
        Ycbcr::default(),
        Ycbcr {
            y: 235,
            cb: 128,
            cr: 128,
        },
        Ycbcr {
            y: 16,
            cb: 128,
            cr: 128,
        },
    ]);

    OverlayLayer {
        x: 60,
        y: 480,
        width,
        height,
        unscaled: false,
        content: LayerContent::Rle(RleImage {
            rle: runs,
            colors: colors.clone(),
            trans: vec![0, 15, 8],
            hili_colors: colors,
            hili_trans: vec![0, 15, 8],
            hili: Highlight {
                left: -1,
                top: -1,
                right: -1,
                bottom: -1,
            },
        }),
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(why) => {
            tracing::warn!(%why, "settings file error, falling back to defaults");
            Settings::default()
        }
    };

    let mut event_loop: EventLoop<Player> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    let driver = Driver::open(
        Box::new(SimDisplay::new()),
        Box::new(SimWindow::new()),
        Drawable(0x0320_0001),
        settings,
    )?;

    handle
        .insert_source(
            Signals::new(&[Signal::SIGINT, Signal::SIGTERM])?,
            |event, _, player| {
                tracing::info!(signal = ?event.signal(), "shutting down");
                player.signal.stop();
            },
        )
        .map_err(|why| eyre!(why.error))?;

    handle
        .insert_source(Timer::immediate(), |_, _, player| player.tick())
        .map_err(|why| eyre!(why.error))?;

    let mut player = Player {
        driver,
        frame: 0,
        signal: event_loop.get_signal(),
    };
    event_loop.run(None, &mut player, |_| {})?;

    let stats = player.driver.stats();
    tracing::info!(
        displayed = stats.frames_displayed,
        released = stats.frames_released,
        skipped = stats.skipped_not_ready,
        unsupported = stats.unsupported,
        rebuilds = stats.context_rebuilds,
        slow = stats.slow_presents,
        "playback finished"
    );
    player.driver.dispose();

    Ok(())
}
