// SPDX-License-Identifier: MPL-2.0

//! Fixed-capacity hardware surface pools.
//!
//! Two pools live side by side and share the lifetime of one hardware
//! context:
//!
//! ```text
//! decode  [ s0 | s1 | s2 | ... | s20 ]   slot i of the frame table ⇄ surface i
//! output  [ o0 | o1 ]  + one image each   round-robin for software frames
//! ```
//!
//! Frames never hold a surface handle directly. They keep their
//! [`FrameSlot`] and resolve it through the pool, so a rebuilt context can
//! never leave a frame pointing at a destroyed surface. Surfaces are only
//! destroyed as a batch in [`SurfacePool::release`].

use tracing::{debug, warn};

use crate::error::{Result, VoError};
use crate::va::{RT_FORMAT_YUV420, SurfaceId, VaDisplay, VaImage};

/// Number of decode surfaces, and frames the driver hands out.
pub const RENDER_SURFACES: usize = 21;

/// Number of output surfaces used by software-decoded frames.
pub const OUTPUT_SURFACES: usize = 2;

/// Index of a frame in the driver's frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameSlot(pub usize);

/// An output surface and the image used to upload pixels into it.
#[derive(Debug, Clone)]
pub struct OutputSurface {
    pub surface: SurfaceId,
    pub image: Option<VaImage>,
}

#[derive(Debug, Default)]
pub struct SurfacePool {
    decode: Vec<SurfaceId>,
    bindings: Vec<Option<FrameSlot>>,
    output: Vec<OutputSurface>,
    output_head: usize,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` decode surfaces and bind the given frame slots.
    ///
    /// A slot is bound to the surface with the same index, so the frame
    /// table and the pool line up one to one. Slots past `count` stay
    /// unbound.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the display cannot provide all surfaces; no
    /// surface of the failed batch is kept.
    pub fn allocate_decode(
        &mut self,
        display: &mut dyn VaDisplay,
        width: u32,
        height: u32,
        count: usize,
        frames: &[FrameSlot],
    ) -> Result<&[SurfaceId]> {
        if !self.decode.is_empty() {
            return Err(VoError::InvalidInput("decode pool already allocated"));
        }

        self.decode = create_batch(display, width, height, count, "decode surfaces")?;
        self.bindings = vec![None; count];
        let bound = frames
            .iter()
            .filter(|slot| self.bind(**slot).is_some())
            .count();

        debug!(width, height, count, bound, "decode pool allocated");
        Ok(&self.decode)
    }

    /// Allocate the output ring. Images are attached afterwards.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the display cannot provide all surfaces.
    pub fn allocate_output(
        &mut self,
        display: &mut dyn VaDisplay,
        width: u32,
        height: u32,
        count: usize,
    ) -> Result<()> {
        if !self.output.is_empty() {
            return Err(VoError::InvalidInput("output pool already allocated"));
        }

        self.output = create_batch(display, width, height, count, "output surfaces")?
            .into_iter()
            .map(|surface| OutputSurface {
                surface,
                image: None,
            })
            .collect();
        self.output_head = 0;
        Ok(())
    }

    /// Bind a frame slot to the decode surface with the same index.
    pub fn bind(&mut self, slot: FrameSlot) -> Option<SurfaceId> {
        let binding = self.bindings.get_mut(slot.0)?;
        *binding = Some(slot);
        self.decode.get(slot.0).copied()
    }

    /// Decode surface bound to the frame slot, if any.
    #[must_use]
    pub fn surface_for(&self, slot: FrameSlot) -> Option<SurfaceId> {
        match self.bindings.get(slot.0) {
            Some(Some(bound)) if *bound == slot => self.decode.get(slot.0).copied(),
            _ => None,
        }
    }

    /// Frame slot currently bound to a decode surface.
    #[must_use]
    pub fn frame_for(&self, surface: SurfaceId) -> Option<FrameSlot> {
        let index = self.decode.iter().position(|s| *s == surface)?;
        self.bindings.get(index).copied().flatten()
    }

    pub fn set_output_image(&mut self, index: usize, image: VaImage) {
        if let Some(output) = self.output.get_mut(index) {
            output.image = Some(image);
        }
    }

    /// Take the next output surface of the ring and advance the head.
    pub fn next_output(&mut self) -> Option<&OutputSurface> {
        if self.output.is_empty() {
            return None;
        }

        let index = self.output_head;
        self.output_head = (self.output_head + 1) % self.output.len();
        self.output.get(index)
    }

    #[must_use]
    pub fn decode_surfaces(&self) -> &[SurfaceId] {
        &self.decode
    }

    #[must_use]
    pub fn output_surfaces(&self) -> Vec<SurfaceId> {
        self.output.iter().map(|o| o.surface).collect()
    }

    #[must_use]
    pub fn outputs(&self) -> &[OutputSurface] {
        &self.output
    }

    /// Surfaces currently owned by both pools.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.decode.len() + self.output.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Destroy every image and surface of both pools. Safe on an empty pool.
    pub fn release(&mut self, display: &mut dyn VaDisplay) {
        for output in &mut self.output {
            if let Some(image) = output.image.take() {
                display.destroy_image(image.id);
            }
        }

        if !self.decode.is_empty() {
            display.destroy_surfaces(&self.decode);
        }

        let output = self.output_surfaces();
        if !output.is_empty() {
            display.destroy_surfaces(&output);
        }

        if !self.is_empty() {
            debug!(
                decode = self.decode.len(),
                output = self.output.len(),
                "surface pools released"
            );
        }

        self.decode.clear();
        self.bindings.clear();
        self.output.clear();
        self.output_head = 0;
    }
}

fn create_batch(
    display: &mut dyn VaDisplay,
    width: u32,
    height: u32,
    count: usize,
    what: &'static str,
) -> Result<Vec<SurfaceId>> {
    let surfaces = display
        .create_surfaces(width, height, RT_FORMAT_YUV420, count)
        .map_err(|why| {
            warn!(width, height, count, %why, "vaCreateSurfaces failed");
            VoError::ResourceExhausted {
                call: "vaCreateSurfaces",
                what,
            }
        })?;

    if surfaces.len() != count {
        warn!(requested = count, got = surfaces.len(), "short surface batch");
        display.destroy_surfaces(&surfaces);
        return Err(VoError::ResourceExhausted {
            call: "vaCreateSurfaces",
            what,
        });
    }

    Ok(surfaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDisplay;

    fn slots(n: usize) -> Vec<FrameSlot> {
        (0..n).map(FrameSlot).collect()
    }

    #[test]
    fn test_allocate_binds_in_order() {
        let mut display = SimDisplay::new();
        let mut pool = SurfacePool::new();
        let surfaces = pool
            .allocate_decode(&mut display, 720, 576, RENDER_SURFACES, &slots(3))
            .unwrap()
            .to_vec();

        assert_eq!(surfaces.len(), RENDER_SURFACES);
        for i in 0..3 {
            assert_eq!(pool.surface_for(FrameSlot(i)), Some(surfaces[i]));
            assert_eq!(pool.frame_for(surfaces[i]), Some(FrameSlot(i)));
        }
        assert_eq!(pool.surface_for(FrameSlot(3)), None);
        assert_eq!(pool.frame_for(surfaces[3]), None);
    }

    #[test]
    fn test_slots_past_capacity_stay_unbound() {
        let mut display = SimDisplay::new();
        let mut pool = SurfacePool::new();
        pool.allocate_decode(&mut display, 64, 64, 4, &slots(6))
            .unwrap();

        assert!(pool.surface_for(FrameSlot(3)).is_some());
        assert_eq!(pool.surface_for(FrameSlot(4)), None);
        assert_eq!(pool.bind(FrameSlot(5)), None);
    }

    #[test]
    fn test_exhausted_allocation_keeps_nothing() {
        let mut display = SimDisplay::new();
        display.state().surface_budget = Some(10);
        let mut pool = SurfacePool::new();

        let err = pool
            .allocate_decode(&mut display, 1920, 1080, RENDER_SURFACES, &[])
            .unwrap_err();
        assert!(matches!(err, VoError::ResourceExhausted { .. }));
        assert!(pool.is_empty());
        assert_eq!(display.state().live_surfaces(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut display = SimDisplay::new();
        let mut pool = SurfacePool::new();
        pool.allocate_decode(&mut display, 320, 240, RENDER_SURFACES, &[])
            .unwrap();
        pool.allocate_output(&mut display, 320, 240, OUTPUT_SURFACES)
            .unwrap();
        assert_eq!(pool.live_count(), RENDER_SURFACES + OUTPUT_SURFACES);
        assert_eq!(
            display.state().live_surfaces(),
            RENDER_SURFACES + OUTPUT_SURFACES
        );

        pool.release(&mut display);
        pool.release(&mut display);
        assert!(pool.is_empty());
        assert_eq!(display.state().live_surfaces(), 0);
    }

    #[test]
    fn test_output_ring_round_robin() {
        let mut display = SimDisplay::new();
        let mut pool = SurfacePool::new();
        pool.allocate_output(&mut display, 16, 16, OUTPUT_SURFACES)
            .unwrap();
        let ring = pool.output_surfaces();

        let picks: Vec<_> = (0..5)
            .filter_map(|_| pool.next_output().map(|o| o.surface))
            .collect();
        assert_eq!(picks, vec![ring[0], ring[1], ring[0], ring[1], ring[0]]);
    }
}
