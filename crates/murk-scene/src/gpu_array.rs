//! Storage buffer holding a packed record array.

use std::marker::PhantomData;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// A storage buffer reallocated only when its element count changes.
///
/// An empty upload drops the buffer: `buffer()` returns `None` and `len()`
/// is 0, which consumers treat as "nothing to inject".
#[derive(Debug)]
pub struct GpuArray<T: Pod> {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    len: u32,
    allocations: u32,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuArray<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            len: 0,
            allocations: 0,
            _marker: PhantomData,
        }
    }

    /// Upload `records`, reusing the existing buffer when the count is unchanged.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, records: &[T]) {
        let len = records.len() as u32;
        if len == 0 {
            if self.buffer.take().is_some() {
                log::debug!("Released {} (now empty)", self.label);
            }
            self.len = 0;
            return;
        }

        match &self.buffer {
            Some(buffer) if self.len == len => {
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(records));
            }
            _ => {
                self.buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(self.label),
                    contents: bytemuck::cast_slice(records),
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                }));
                self.allocations += 1;
                log::debug!("Allocated {} for {len} records", self.label);
            }
        }
        self.len = len;
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// How many times a buffer has been created.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    pub fn release(&mut self) {
        self.buffer = None;
        self.len = 0;
    }
}
