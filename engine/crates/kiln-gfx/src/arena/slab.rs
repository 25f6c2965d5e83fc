use ash::vk;

use super::{AllocError, ContiguousAllocation, ContiguousAllocator};

/// 固定大小块的分配器
///
/// 构造时把所有块的 offset `{0, slab_size, 2 * slab_size, ...}` 放入空闲栈，
/// alloc/free 都是 O(1)，没有碎片，但只支持一种分配粒度。
pub struct SlabAllocator {
    slab_size: vk::DeviceSize,
    num_blocks: usize,

    /// 栈顶是下一个被分配的块
    free: Vec<vk::DeviceSize>,
    in_use: Vec<bool>,
}

impl SlabAllocator {
    pub fn new(num_blocks: usize, slab_size: vk::DeviceSize) -> Self {
        assert!(slab_size > 0, "SlabAllocator: slab_size must be non-zero");

        Self {
            slab_size,
            num_blocks,
            free: (0..num_blocks as vk::DeviceSize).rev().map(|i| i * slab_size).collect(),
            in_use: vec![false; num_blocks],
        }
    }

    #[inline]
    pub fn slab_size(&self) -> vk::DeviceSize {
        self.slab_size
    }

    #[inline]
    pub fn free_slabs(&self) -> usize {
        self.free.len()
    }

    fn slab_index(&self, allocation: &ContiguousAllocation) -> Option<usize> {
        if allocation.size != self.slab_size || allocation.offset % self.slab_size != 0 {
            return None;
        }
        let idx = (allocation.offset / self.slab_size) as usize;
        (idx < self.num_blocks).then_some(idx)
    }
}

impl ContiguousAllocator for SlabAllocator {
    /// 返回的大小总是 `slab_size`
    fn alloc(&mut self, size: vk::DeviceSize) -> Result<ContiguousAllocation, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if size > self.slab_size {
            log::warn!("SlabAllocator: request of {size} bytes exceeds slab size {}", self.slab_size);
            return Err(AllocError::ExceedsSlabSize {
                requested: size,
                slab_size: self.slab_size,
            });
        }

        let offset = self.free.pop().ok_or(AllocError::OutOfMemory {
            requested: size,
            largest_free: 0,
        })?;
        self.in_use[(offset / self.slab_size) as usize] = true;

        Ok(ContiguousAllocation::new(offset, self.slab_size))
    }

    fn free(&mut self, allocation: ContiguousAllocation) -> Result<(), AllocError> {
        let idx = self.slab_index(&allocation).filter(|&idx| self.in_use[idx]).ok_or(AllocError::InvalidFree {
            offset: allocation.offset,
            size: allocation.size,
        })?;

        self.in_use[idx] = false;
        self.free.push(allocation.offset);
        Ok(())
    }

    #[inline]
    fn size_hint(&self) -> vk::DeviceSize {
        self.num_blocks as vk::DeviceSize * self.slab_size
    }

    #[inline]
    fn live_allocations(&self) -> usize {
        self.num_blocks - self.free.len()
    }
}
