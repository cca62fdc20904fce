// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;

use vaapi_vo_config::{DeinterlaceMode, Settings};

use super::*;
use crate::overlay::{ArgbLayer, LayerContent};
use crate::sim::{SimDisplay, SimWindow};
use crate::surface_pool::OUTPUT_SURFACES;
use crate::va::{FieldFlags, PutTarget};

const DRAWABLE: Drawable = Drawable(0x0320_0001);

struct Harness {
    driver: Driver,
    display: SimDisplay,
    window: SimWindow,
}

fn open(settings: Settings) -> Harness {
    open_with(SimDisplay::new(), SimWindow::new(), settings)
}

fn open_with(display: SimDisplay, window: SimWindow, settings: Settings) -> Harness {
    let driver = Driver::open(
        Box::new(display.clone()),
        Box::new(window.clone()),
        DRAWABLE,
        settings,
    )
    .unwrap();
    Harness {
        driver,
        display,
        window,
    }
}

fn software_frame(driver: &Driver, width: u32, height: u32, format: PixelFormat) -> Frame {
    let mut frame = driver.alloc_frame().unwrap();
    driver.update_frame_format(&mut frame, width, height, 4.0 / 3.0, format, 0);
    frame
}

/// Negotiate H.264 and hand out a frame decoded into its surface.
fn hardware_frame(driver: &Driver) -> Frame {
    let mut frame = driver.alloc_frame().unwrap();
    let accel = frame.accel.accelerator.clone();
    let profile = accel
        .profile_from_imgfmt(DecoderPixFmt::VaapiVld, CodecId::H264, false)
        .unwrap();
    accel.init(profile, 1920, 1080).unwrap();
    driver.update_frame_format(&mut frame, 1920, 1080, 16.0 / 9.0, PixelFormat::HwSurface, 0);
    frame
}

fn argb_layer(x: i32, y: i32, width: i32, height: i32) -> OverlayLayer {
    OverlayLayer {
        x,
        y,
        width,
        height,
        unscaled: false,
        content: LayerContent::Argb(Arc::new(ArgbLayer::new(vec![
            0xff00_ff00;
            (width * height) as usize
        ]))),
    }
}

#[test]
fn test_software_frame_is_uploaded_and_presented() {
    let h = open(Settings::default());
    let mut frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    if let Some(buffers) = frame.buffers.as_mut() {
        buffers.planes[0].fill(77);
    }
    h.driver.display_frame(frame);

    let state = h.display.state();
    assert_eq!(state.puts.len(), 1);
    let put = state.puts[0];
    assert_eq!(put.target, PutTarget::Drawable(DRAWABLE));
    assert_eq!(put.src, Rect::sized(720, 576));
    assert_eq!(put.dst, Rect::new(160, 0, 960, 720));
    assert_eq!(put.field, FieldFlags::Frame);
    assert!(!h.driver.context_info().decode_surfaces.contains(&put.surface));

    // derived image, no explicit put back
    assert_eq!(state.derived_bytes(put.surface).unwrap()[0], 77);
    assert_eq!(state.put_images, 0);
    drop(state);

    let stats = h.driver.stats();
    assert_eq!(stats.frames_displayed, 1);
    assert_eq!(stats.frames_released, 1);
    assert_eq!(stats.context_rebuilds, 1);
    assert_eq!(h.window.state().syncs, 1);
}

#[test]
fn test_created_images_are_put_back() {
    let display = SimDisplay::new();
    display.state().derive_supported = false;
    let h = open_with(display, SimWindow::new(), Settings::default());

    let frame = software_frame(&h.driver, 352, 288, PixelFormat::Yuy2);
    h.driver.display_frame(frame);

    assert_eq!(h.display.state().put_images, 1);
    assert_eq!(h.display.state().puts.len(), 1);
}

#[test]
fn test_output_surfaces_alternate() {
    let h = open(Settings::default());
    for _ in 0..3 {
        let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
        h.driver.display_frame(frame);
    }

    let state = h.display.state();
    assert_eq!(state.puts.len(), 3);
    assert_ne!(state.puts[0].surface, state.puts[1].surface);
    assert_eq!(state.puts[0].surface, state.puts[2].surface);
    assert_eq!(h.driver.stats().context_rebuilds, 1);
}

#[test]
fn test_frame_slots_are_capped() {
    let h = open(Settings::default());
    let mut frames: Vec<Frame> = (0..RENDER_SURFACES)
        .map(|_| h.driver.alloc_frame().unwrap())
        .collect();

    assert!(matches!(
        h.driver.alloc_frame(),
        Err(VoError::ResourceExhausted {
            call: "alloc_frame",
            ..
        })
    ));

    let Some(frame) = frames.pop() else {
        panic!("no frame handed out");
    };
    let slot = frame.slot();
    h.driver.release_frame(frame);
    assert_eq!(h.driver.alloc_frame().unwrap().slot(), slot);
}

#[test]
fn test_hardware_frame_shows_its_decode_surface() {
    let h = open(Settings::default());
    let frame = hardware_frame(&h.driver);

    let info = h.driver.context_info();
    assert_eq!(info.state, crate::context::ContextState::Ready);
    assert_eq!(info.profile, Some(Profile::H264High));
    assert_eq!(info.decode_surfaces.len(), RENDER_SURFACES);
    assert!(info.context.is_some());

    let surface = info.decode_surfaces[frame.slot().0];
    assert_eq!(frame.accel.surface(), Some(surface));
    h.driver.display_frame(frame);

    let put = h.display.state().puts[0];
    assert_eq!(put.surface, surface);
    assert_eq!(put.src, Rect::sized(1920, 1080));
    assert_eq!(put.dst, Rect::new(0, 0, 1280, 720));
    assert_eq!(h.driver.stats().frames_displayed, 1);
}

#[test]
fn test_profile_negotiation() {
    let h = open(Settings::default());
    let accel = h.driver.accelerator();

    assert_eq!(
        accel.profile_from_imgfmt(DecoderPixFmt::VaapiVld, CodecId::Mpeg2Video, false),
        Some(Profile::Mpeg2Main)
    );
    assert_eq!(
        accel.profile_from_imgfmt(DecoderPixFmt::VaapiVld, CodecId::Mpeg2Video, true),
        None
    );
    assert_eq!(
        accel.profile_from_imgfmt(DecoderPixFmt::VaapiIdct, CodecId::H264, false),
        None
    );

    // the simulated driver has no MPEG-4 part 2 support
    assert_eq!(
        accel.profile_from_imgfmt(DecoderPixFmt::VaapiVld, CodecId::Mpeg4, false),
        None
    );
}

#[test]
fn test_surface_not_ready_is_skipped() {
    let h = open(Settings::default());
    let frame = hardware_frame(&h.driver);
    let surface = h.driver.context_info().decode_surfaces[frame.slot().0];
    h.display.state().not_ready.insert(surface);

    h.driver.display_frame(frame);

    assert!(h.display.state().puts.is_empty());
    let stats = h.driver.stats();
    assert_eq!(stats.skipped_not_ready, 1);
    assert_eq!(stats.frames_displayed, 0);
    assert_eq!(stats.frames_released, 1);
}

#[test]
fn test_vdpau_backend_is_never_polled() {
    let display = SimDisplay::new();
    display.state().vendor = String::from("Splitted-Desktop Systems VDPAU backend for VA-API");
    let h = open_with(display, SimWindow::new(), Settings::default());

    let frame = hardware_frame(&h.driver);
    let surface = h.driver.context_info().decode_surfaces[frame.slot().0];
    h.display.state().not_ready.insert(surface);
    h.driver.display_frame(frame);

    let state = h.display.state();
    assert_eq!(state.status_queries, 0);
    assert_eq!(state.puts.len(), 1);
}

#[test]
fn test_hardware_frame_without_context_is_unsupported() {
    let h = open(Settings::default());
    let mut frame = h.driver.alloc_frame().unwrap();
    h.driver
        .update_frame_format(&mut frame, 1920, 1080, 0.0, PixelFormat::HwSurface, 0);
    h.driver.display_frame(frame);

    assert!(h.display.state().puts.is_empty());
    let stats = h.driver.stats();
    assert_eq!(stats.unsupported, 1);
    assert_eq!(stats.frames_released, 1);
}

#[test]
fn test_format_change_rebuilds_context() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    let frame = software_frame(&h.driver, 1280, 720, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let info = h.driver.context_info();
    assert_eq!((info.width, info.height), (1280, 720));
    assert_eq!(info.generation, 2);
    assert_eq!(h.driver.stats().context_rebuilds, 2);

    let state = h.display.state();
    assert_eq!(state.terminate_calls, 1);
    assert_eq!(state.initialize_calls, 2);
    assert_eq!(state.live_surfaces(), RENDER_SURFACES + OUTPUT_SURFACES);
    assert_eq!(state.live_images(), OUTPUT_SURFACES);
    assert_eq!(state.puts[1].src, Rect::sized(1280, 720));
}

#[test]
fn test_context_frozen_without_reinit() {
    let h = open(Settings::default().reinit_on_format_change(false));
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    let frame = software_frame(&h.driver, 1280, 720, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let info = h.driver.context_info();
    assert_eq!((info.width, info.height), (720, 576));
    assert_eq!(info.generation, 1);
    assert_eq!(h.driver.stats().context_rebuilds, 1);
    assert_eq!(h.display.state().terminate_calls, 0);
}

#[test]
fn test_context_failure_and_recovery() {
    let h = open(Settings::default());
    h.display.state().fail_context = true;

    let accel = h.driver.accelerator();
    assert!(matches!(
        accel.init(Profile::H264High, 1920, 1080),
        Err(VoError::ResourceExhausted {
            call: "vaCreateContext",
            ..
        })
    ));
    assert_eq!(
        h.driver.context_info().state,
        crate::context::ContextState::Failed
    );
    assert_eq!(h.display.state().live_surfaces(), 0);

    let mut frame = h.driver.alloc_frame().unwrap();
    h.driver
        .update_frame_format(&mut frame, 1920, 1080, 0.0, PixelFormat::HwSurface, 0);
    h.driver.display_frame(frame);
    assert_eq!(h.driver.stats().unsupported, 1);

    h.display.state().fail_context = false;
    accel.init(Profile::H264High, 1920, 1080).unwrap();
    assert_eq!(
        h.driver.context_info().state,
        crate::context::ContextState::Ready
    );
}

#[test]
fn test_failed_context_leaves_gl_alone() {
    let h = open(Settings::default().render_via_opengl(true));
    h.display.state().fail_context = true;

    for _ in 0..3 {
        let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
        h.driver.display_frame(frame);
    }
    assert_eq!(h.driver.stats().unsupported, 3);
    assert_eq!(h.driver.backend(), Backend::DirectBlit);
    assert_eq!(h.window.state().gl_context, None);
    assert_eq!(h.window.state().live_gl_resources(), 0);

    h.display.state().fail_context = false;
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    assert!(matches!(h.driver.backend(), Backend::GlSurfaceCopy { .. }));
    assert_eq!(h.window.state().gl_context, Some(DRAWABLE));
    assert_eq!(h.window.state().swaps, 1);
}

#[test]
fn test_bob_presents_both_fields() {
    let h = open(Settings::default().deinterlace_mode(DeinterlaceMode::Bob));
    let mut frame = hardware_frame(&h.driver);
    frame.progressive = false;
    frame.top_field_first = true;
    h.driver.display_frame(frame);

    let fields: Vec<_> = h.display.state().puts.iter().map(|put| put.field).collect();
    assert_eq!(fields, vec![FieldFlags::TopField, FieldFlags::BottomField]);
    assert_eq!(h.driver.stats().frames_displayed, 1);
}

#[test]
fn test_deinterlacing_needs_reinit() {
    let settings = Settings::default()
        .deinterlace_mode(DeinterlaceMode::Bob)
        .reinit_on_format_change(false);
    let h = open(settings);
    let mut frame = hardware_frame(&h.driver);
    frame.progressive = false;
    h.driver.display_frame(frame);

    let fields: Vec<_> = h.display.state().puts.iter().map(|put| put.field).collect();
    assert_eq!(fields, vec![FieldFlags::Frame]);
}

#[test]
fn test_opengl_copies_into_texture() {
    let h = open(Settings::default().render_via_opengl(true));
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    assert!(matches!(h.driver.backend(), Backend::GlSurfaceCopy { .. }));
    assert_eq!(h.display.state().glx_copies.len(), 1);
    assert!(h.display.state().puts.is_empty());

    let window = h.window.state();
    assert_eq!(window.gl_context, Some(DRAWABLE));
    assert_eq!(window.viewport, Some((1280, 720)));
    assert_eq!(window.quads.len(), 1);
    assert_eq!(window.quads[0].dst, Rect::new(160, 0, 960, 720));
    assert_eq!(window.swaps, 1);
}

#[test]
fn test_zero_copy_renders_into_pixmap() {
    let settings = Settings::default()
        .render_via_opengl(true)
        .use_zero_copy_texture(true);
    let h = open(settings);
    let frame = hardware_frame(&h.driver);
    h.driver.display_frame(frame);

    assert!(matches!(
        h.driver.backend(),
        Backend::GlTextureFromPixmap { .. }
    ));
    assert!(matches!(
        h.display.state().puts[0].target,
        PutTarget::Pixmap(_)
    ));
    assert_eq!(h.window.state().swaps, 1);
}

#[test]
fn test_opengl_needs_direct_rendering() {
    let window = SimWindow::new();
    if let Some(renderer) = window.state().renderer.as_mut() {
        renderer.renderer = String::from("Software Rasterizer");
    }
    let h = open_with(
        SimDisplay::new(),
        window,
        Settings::default().render_via_opengl(true),
    );

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    assert_eq!(h.driver.backend(), Backend::DirectBlit);
    assert_eq!(h.window.state().gl_context, None);
    assert_eq!(h.display.state().puts.len(), 1);
}

#[test]
fn test_drawable_change_rebuilds_gl() {
    let h = open(Settings::default().render_via_opengl(true));
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let next = Drawable(0x0320_0002);
    assert!(h.driver.gui_data_exchange(GuiData::DrawableChanged(next)));
    assert_eq!(h.window.state().gl_context, None);
    assert_eq!(h.window.state().live_gl_resources(), 0);
    assert_eq!(h.display.state().live_gl_surfaces(), 0);

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    assert_eq!(h.window.state().gl_context, Some(next));
    assert!(h.driver.backend().is_gl());
    assert_eq!(h.window.state().swaps, 2);
}

#[test]
fn test_gui_data_exchange() {
    let h = open(Settings::default());

    assert!(h.driver.gui_data_exchange(GuiData::Expose { count: 2 }));
    assert_eq!(h.window.state().syncs, 0);
    assert!(h.driver.gui_data_exchange(GuiData::Expose { count: 0 }));
    assert_eq!(h.window.state().syncs, 1);
    assert!(h.driver.gui_data_exchange(GuiData::Completion));
    assert!(!h.driver.gui_data_exchange(GuiData::Other(42)));

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let mut rect = Rect::new(640, 360, 480, 360);
    assert!(h.driver.gui_data_exchange(GuiData::TranslateGuiToVideo(&mut rect)));
    assert_eq!(rect, Rect::new(360, 288, 360, 288));
}

#[test]
fn test_properties() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let get = |property| h.driver.get_property(property);
    assert_eq!(get(Property::WindowWidth), 1280);
    assert_eq!(get(Property::WindowHeight), 720);
    assert_eq!(get(Property::OutputWidth), 960);
    assert_eq!(get(Property::OutputHeight), 720);
    assert_eq!(get(Property::OutputXOffset), 160);
    assert_eq!(get(Property::OutputYOffset), 0);
    assert_eq!(get(Property::ZoomX), 100);
    assert_eq!(get(Property::ZoomY), 100);
    assert_eq!(get(Property::AspectRatio), 0);
    assert_eq!(get(Property::MaxNumFrames), 21);
    assert_eq!(h.driver.get_property_min_max(Property::ZoomX), (0, 0));

    assert_eq!(h.driver.set_property(Property::AspectRatio, 9), 0);
    assert_eq!(h.driver.set_property(Property::AspectRatio, 3), 3);
    assert_eq!(h.driver.set_property(Property::ZoomX, 500), 500);
    assert_eq!(get(Property::ZoomX), 100);
    assert_eq!(h.driver.set_property(Property::ZoomY, 150), 150);
    assert_eq!(get(Property::ZoomY), 150);
    assert_eq!(h.driver.set_property(Property::ZoomY, 100), 100);

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    assert_eq!(get(Property::AspectRatio), 3);
    assert_eq!(get(Property::OutputWidth), 1280);
    assert_eq!(get(Property::OutputXOffset), 0);
}

#[test]
fn test_overlay_attached_to_output_surfaces() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    assert!(h.driver.overlay_begin(true));
    assert!(h.driver.overlay_blend(argb_layer(10, 500, 200, 40)));
    h.driver.overlay_end(&frame);
    assert_eq!(h.display.state().live_subpictures(), 1);
    assert_eq!(h.display.state().associated_surfaces().len(), OUTPUT_SURFACES);

    // unchanged overlay keeps the association
    assert!(!h.driver.overlay_begin(false));
    h.driver.overlay_end(&frame);
    assert_eq!(h.display.state().live_subpictures(), 1);

    h.driver.overlay_begin(true);
    assert!(h.display.state().associated_surfaces().is_empty());
    assert_eq!(h.display.state().live_subpictures(), 0);
    h.driver.overlay_end(&frame);
    assert_eq!(h.display.state().live_subpictures(), 0);

    h.driver.display_frame(frame);
    assert_eq!(h.driver.stats().association_failures, 0);
}

#[test]
fn test_overlay_on_decode_surfaces() {
    let h = open(Settings::default());
    let frame = hardware_frame(&h.driver);

    h.driver.overlay_begin(true);
    h.driver.overlay_blend(argb_layer(0, 900, 1920, 100));
    h.driver.overlay_end(&frame);

    let mut associated = h.display.state().associated_surfaces();
    let mut decode = h.driver.context_info().decode_surfaces;
    associated.sort();
    decode.sort();
    assert_eq!(associated, decode);
    h.driver.display_frame(frame);
}

#[test]
fn test_overlay_association_failure_is_counted() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    h.display.state().fail_associate = true;

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.overlay_begin(true);
    h.driver.overlay_blend(argb_layer(0, 0, 64, 64));
    h.driver.overlay_end(&frame);
    h.driver.display_frame(frame);

    let stats = h.driver.stats();
    assert_eq!(stats.association_failures, 1);
    assert_eq!(stats.frames_displayed, 2);
}

#[test]
fn test_overlay_without_context_is_ignored() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);

    h.driver.overlay_begin(true);
    h.driver.overlay_blend(argb_layer(0, 0, 64, 64));
    h.driver.overlay_end(&frame);

    assert_eq!(h.display.state().live_subpictures(), 0);
    assert_eq!(h.driver.stats().association_failures, 0);
    h.driver.release_frame(frame);
}

#[test]
fn test_mapping_failure_drops_presentation() {
    let display = SimDisplay::new();
    display.state().fail_map = true;
    let h = open_with(display, SimWindow::new(), Settings::default());

    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);

    assert!(h.display.state().puts.is_empty());
    let stats = h.driver.stats();
    assert_eq!(stats.conversion_failures, 1);
    assert_eq!(stats.frames_released, 1);
    // the destination images stay owned by the output ring
    assert_eq!(h.display.state().live_images(), OUTPUT_SURFACES);

    h.driver.dispose();
    assert_eq!(h.display.state().live_images(), 0);
}

#[test]
fn test_update_frame_format_reallocates_on_change() {
    let h = open(Settings::default());
    let mut frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    assert_eq!(
        frame.buffers.as_ref().map(|b| b.pitches.clone()),
        Some(vec![720, 360, 360])
    );
    if let Some(buffers) = frame.buffers.as_mut() {
        buffers.planes[0][0] = 5;
    }

    h.driver
        .update_frame_format(&mut frame, 720, 576, 16.0 / 9.0, PixelFormat::Yv12, 0);
    assert_eq!(frame.buffers.as_ref().map(|b| b.planes[0][0]), Some(5));
    assert!((frame.ratio - 16.0 / 9.0).abs() < f64::EPSILON);

    h.driver
        .update_frame_format(&mut frame, 720, 576, 16.0 / 9.0, PixelFormat::Yuy2, 0);
    assert_eq!(
        frame.buffers.as_ref().map(|b| b.pitches.clone()),
        Some(vec![1440])
    );

    h.driver
        .update_frame_format(&mut frame, 720, 576, 16.0 / 9.0, PixelFormat::HwSurface, 0);
    assert!(frame.buffers.is_none());
    h.driver.release_frame(frame);
}

#[test]
fn test_update_settings_switches_backend() {
    let h = open(Settings::default());
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    assert_eq!(h.driver.backend(), Backend::DirectBlit);

    h.driver
        .update_settings(Settings::default().render_via_opengl(true));
    let frame = software_frame(&h.driver, 720, 576, PixelFormat::Yv12);
    h.driver.display_frame(frame);
    assert!(matches!(h.driver.backend(), Backend::GlSurfaceCopy { .. }));
}

#[test]
fn test_dispose_releases_everything() {
    let h = open(Settings::default().render_via_opengl(true));
    let frame = hardware_frame(&h.driver);
    h.driver.overlay_begin(true);
    h.driver.overlay_blend(argb_layer(0, 0, 128, 32));
    h.driver.overlay_end(&frame);
    h.driver.display_frame(frame);

    h.driver.dispose();
    h.driver.dispose();

    let state = h.display.state();
    assert_eq!(state.live_surfaces(), 0);
    assert_eq!(state.live_images(), 0);
    assert_eq!(state.live_contexts(), 0);
    assert_eq!(state.live_configs(), 0);
    assert_eq!(state.live_subpictures(), 0);
    assert_eq!(state.live_gl_surfaces(), 0);
    assert_eq!(state.terminate_calls, 1);
    assert!(!state.initialized);
    drop(state);

    let window = h.window.state();
    assert_eq!(window.live_gl_resources(), 0);
    assert_eq!(window.gl_context, None);
    drop(window);

    let accel = h.driver.accelerator();
    assert!(accel.init(Profile::H264High, 1920, 1080).is_err());
}

#[test]
fn test_capabilities() {
    let h = open(Settings::default());
    let caps = h.driver.capabilities();
    assert!(caps.contains(VoCapabilities::YV12));
    assert!(caps.contains(VoCapabilities::YUY2.union(VoCapabilities::VAAPI)));
    assert!(caps.contains(VoCapabilities::ARGB_LAYER_OVERLAY));
}
