//! GPU timestamps around each pass, read back without stalling.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const PASS_COUNT: u32 = 3;
const QUERY_COUNT: u32 = PASS_COUNT * 2;
const QUERY_BYTES: u64 = QUERY_COUNT as u64 * std::mem::size_of::<u64>() as u64;
// Frames a readback may stay in flight before its slot is reused.
const RING_SIZE: usize = 3;

const SLOT_FREE: u8 = 0;
const SLOT_COPIED: u8 = 1;
const SLOT_MAPPING: u8 = 2;
const SLOT_READY: u8 = 3;
const SLOT_FAILED: u8 = 4;

/// Ring indices from the oldest submission to the newest. `next` is the slot
/// the next frame fills, which makes it the oldest one in flight.
fn oldest_first(next: usize) -> impl Iterator<Item = usize> {
    (0..RING_SIZE).map(move |offset| (next + offset) % RING_SIZE)
}

struct Readback {
    buffer: wgpu::Buffer,
    state: Arc<AtomicU8>,
}

/// Timestamp queries for the three passes. Only created when the device
/// supports [`wgpu::Features::TIMESTAMP_QUERY`].
pub(crate) struct GpuTimer {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    ring: Vec<Readback>,
    next: usize,
    period_ns: f32,
}

impl GpuTimer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Self> {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            log::debug!("timestamp queries unavailable, mlaa timings stay at zero");
            return None;
        }

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("mlaa_timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mlaa_timestamp_resolve"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let ring = (0..RING_SIZE)
            .map(|_| Readback {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("mlaa_timestamp_readback"),
                    size: QUERY_BYTES,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                state: Arc::new(AtomicU8::new(SLOT_FREE)),
            })
            .collect();

        Some(Self {
            query_set,
            resolve_buffer,
            ring,
            next: 0,
            period_ns: queue.get_timestamp_period(),
        })
    }

    /// Timestamp writes bracketing pass `index`.
    pub fn pass_writes(&self, index: usize) -> wgpu::RenderPassTimestampWrites<'_> {
        let base = index as u32 * 2;
        wgpu::RenderPassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(base),
            end_of_pass_write_index: Some(base + 1),
        }
    }

    /// Copy this frame's timestamps into a free readback slot. The frame goes
    /// untimed when every slot is still in flight.
    pub fn resolve(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let slot = &self.ring[self.next];
        if slot.state.load(Ordering::Acquire) != SLOT_FREE {
            return;
        }
        encoder.resolve_query_set(&self.query_set, 0..QUERY_COUNT, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&self.resolve_buffer, 0, &slot.buffer, 0, QUERY_BYTES);
        slot.state.store(SLOT_COPIED, Ordering::Release);
    }

    /// Start mapping the slot filled by [`resolve`](Self::resolve). Must be
    /// called after the command buffer has been submitted.
    pub fn after_submit(&mut self) {
        let slot = &self.ring[self.next];
        if slot.state.load(Ordering::Acquire) != SLOT_COPIED {
            return;
        }
        slot.state.store(SLOT_MAPPING, Ordering::Release);
        let state = slot.state.clone();
        slot.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let next = if result.is_ok() { SLOT_READY } else { SLOT_FAILED };
                state.store(next, Ordering::Release);
            });
        self.next = (self.next + 1) % RING_SIZE;
    }

    /// Release a slot that was filled by an encoder that never got submitted.
    pub fn cancel(&mut self) {
        let slot = &self.ring[self.next];
        let _ = slot.state.compare_exchange(
            SLOT_COPIED,
            SLOT_FREE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// The oldest finished readback in milliseconds per pass, if any.
    pub fn collect(&mut self, device: &wgpu::Device) -> Option<[f32; 3]> {
        device.poll(wgpu::Maintain::Poll);

        let mut sample = None;
        for index in oldest_first(self.next) {
            let slot = &self.ring[index];
            match slot.state.load(Ordering::Acquire) {
                SLOT_READY if sample.is_none() => {
                    sample = Some(self.read(&slot.buffer));
                    slot.buffer.unmap();
                    slot.state.store(SLOT_FREE, Ordering::Release);
                }
                SLOT_FAILED => {
                    log::warn!("mlaa timestamp readback failed");
                    slot.state.store(SLOT_FREE, Ordering::Release);
                }
                _ => {}
            }
        }
        sample
    }

    fn read(&self, buffer: &wgpu::Buffer) -> [f32; 3] {
        let data = buffer.slice(..).get_mapped_range();
        let ticks: &[u64] = bytemuck::cast_slice(&data);
        let mut millis = [0.0; 3];
        for (pass, ms) in millis.iter_mut().enumerate() {
            let elapsed = ticks[pass * 2 + 1].saturating_sub(ticks[pass * 2]);
            *ms = elapsed as f32 * self.period_ns / 1_000_000.0;
        }
        millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_starts_at_the_oldest_slot() {
        assert_eq!(oldest_first(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        // After wrapping, slot 2 was submitted before slots 0 and 1.
        assert_eq!(oldest_first(2).collect::<Vec<_>>(), vec![2, 0, 1]);
    }
}
