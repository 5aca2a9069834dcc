//! Growable flat staging buffers handed to the GPU dispatch stage.

use bytemuck::Pod;

use crate::error::{CoreError, CoreResult};

/// Chunked growth rule shared by every buffer: grow when `required` reaches
/// the current length, shrink when more than one chunk is unused. Returns the
/// new length, or `None` when the buffer can stay as it is.
pub fn required_buffer_size(current: usize, required: usize, chunk: usize) -> Option<usize> {
    let chunk = chunk.max(1);
    if current <= required || current - required > chunk {
        let size = (required / chunk + 1) * chunk;
        (size != current).then_some(size)
    } else {
        None
    }
}

/// Named CPU-side copy of a GPU buffer.
#[derive(Clone, Debug)]
pub struct GpuBuffer<T: Pod> {
    name: &'static str,
    data: Vec<T>,
    generation: u32,
}

impl<T: Pod> GpuBuffer<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            data: Vec::new(),
            generation: 0,
        }
    }

    pub fn with_len(name: &'static str, len: usize) -> Self {
        Self {
            name,
            data: vec![T::zeroed(); len],
            generation: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bumped on every reallocation; consumers rebind when it changes.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Reallocate to `len` elements. With `copy` the common prefix survives;
    /// otherwise the whole buffer is zeroed.
    pub fn resize(&mut self, len: usize, copy: bool) {
        if copy {
            self.data.resize(len, T::zeroed());
        } else {
            self.data.clear();
            self.data.resize(len, T::zeroed());
        }
        self.generation = self.generation.wrapping_add(1);
        log::debug!("buffer '{}' resized to {} (copy={})", self.name, len, copy);
    }

    /// Apply [`required_buffer_size`]. Returns true when the buffer was reallocated.
    pub fn resize_if_required(&mut self, required: usize, chunk: usize, copy: bool) -> bool {
        match required_buffer_size(self.len(), required, chunk) {
            Some(len) => {
                self.resize(len, copy);
                true
            }
            None => false,
        }
    }

    pub fn set_data(&mut self, src: &[T], start: usize) -> CoreResult<()> {
        let end = start
            .checked_add(src.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(CoreError::BufferOverflow {
                buffer: self.name,
                start,
                len: src.len(),
                capacity: self.data.len(),
            })?;
        self.data[start..end].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_rule() {
        assert_eq!(required_buffer_size(0, 0, 16), Some(16));
        assert_eq!(required_buffer_size(16, 10, 16), None);
        assert_eq!(required_buffer_size(16, 16, 16), Some(32));
        assert_eq!(required_buffer_size(64, 10, 16), Some(16));
        assert_eq!(required_buffer_size(32, 16, 16), None);
    }

    #[test]
    fn resize_copies_prefix_only_when_asked() {
        let mut b: GpuBuffer<u32> = GpuBuffer::with_len("t", 4);
        b.set_data(&[1, 2, 3, 4], 0).unwrap();
        b.resize(6, true);
        assert_eq!(b.as_slice(), &[1, 2, 3, 4, 0, 0]);
        b.resize(2, false);
        assert_eq!(b.as_slice(), &[0, 0]);
        assert_eq!(b.generation(), 2);
        assert!(b.set_data(&[9, 9, 9], 0).is_err());
        assert_eq!(b.as_bytes().len(), 8);
    }
}
