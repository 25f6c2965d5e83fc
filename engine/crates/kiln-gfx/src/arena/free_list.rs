use std::collections::{BTreeMap, BTreeSet};

use ash::vk;

use super::{AllocError, ContiguousAllocation, ContiguousAllocator};

/// 任意大小的 best-fit 分配器
///
/// 空闲块同时按 offset 和 (size, offset) 索引：
/// - 按 (size, offset) 升序找到第一个 `>= size` 的块，即最小的足够大的块，同样大小时取 offset 较小的
/// - 按 offset 索引用于释放时合并相邻的空闲块
///
/// 分配总是从空闲块的头部切出，剩余部分作为新的空闲块留下。
/// 已分配的块按 offset 记录，`free` 必须与其中某一块完全一致。
pub struct FreeListAllocator {
    size: vk::DeviceSize,

    by_offset: BTreeMap<vk::DeviceSize, vk::DeviceSize>,
    by_size: BTreeSet<(vk::DeviceSize, vk::DeviceSize)>,

    /// offset -> size
    live: BTreeMap<vk::DeviceSize, vk::DeviceSize>,
}

// new & init
impl FreeListAllocator {
    /// 整个 `[0, size)` 初始为一个空闲块
    pub fn new(size: vk::DeviceSize) -> Self {
        let mut allocator = Self {
            size,
            by_offset: BTreeMap::new(),
            by_size: BTreeSet::new(),
            live: BTreeMap::new(),
        };
        if size > 0 {
            allocator.insert_block(0, size);
        }
        allocator
    }
}

// getters
impl FreeListAllocator {
    /// 按 offset 升序遍历当前的空闲块
    pub fn free_blocks(&self) -> impl Iterator<Item = ContiguousAllocation> + '_ {
        self.by_offset.iter().map(|(&offset, &size)| ContiguousAllocation::new(offset, size))
    }

    #[inline]
    pub fn free_block_count(&self) -> usize {
        self.by_offset.len()
    }

    pub fn free_bytes(&self) -> vk::DeviceSize {
        self.by_offset.values().sum()
    }

    pub fn largest_free_block(&self) -> vk::DeviceSize {
        self.by_size.last().map(|&(size, _)| size).unwrap_or(0)
    }
}

// 空闲块索引的维护
impl FreeListAllocator {
    fn insert_block(&mut self, offset: vk::DeviceSize, size: vk::DeviceSize) {
        self.by_offset.insert(offset, size);
        self.by_size.insert((size, offset));
    }

    fn remove_block(&mut self, offset: vk::DeviceSize, size: vk::DeviceSize) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(size, offset));
    }
}

impl ContiguousAllocator for FreeListAllocator {
    fn alloc(&mut self, size: vk::DeviceSize) -> Result<ContiguousAllocation, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let Some(&(block_size, offset)) = self.by_size.range((size, 0)..).next() else {
            return Err(AllocError::OutOfMemory {
                requested: size,
                largest_free: self.largest_free_block(),
            });
        };

        self.remove_block(offset, block_size);
        if block_size > size {
            self.insert_block(offset + size, block_size - size);
        }
        self.live.insert(offset, size);

        Ok(ContiguousAllocation::new(offset, size))
    }

    fn free(&mut self, allocation: ContiguousAllocation) -> Result<(), AllocError> {
        if self.live.get(&allocation.offset) != Some(&allocation.size) {
            return Err(AllocError::InvalidFree {
                offset: allocation.offset,
                size: allocation.size,
            });
        }
        self.live.remove(&allocation.offset);

        let mut start = allocation.offset;
        let mut end = allocation.end();
        let prev = self.by_offset.range(..start).next_back().map(|(&o, &s)| (o, s));
        if let Some((o, s)) = prev.filter(|&(o, s)| o + s == start) {
            self.remove_block(o, s);
            start = o;
        }
        if let Some(s) = self.by_offset.get(&end).copied() {
            self.remove_block(end, s);
            end += s;
        }
        self.insert_block(start, end - start);

        Ok(())
    }

    #[inline]
    fn size_hint(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    fn live_allocations(&self) -> usize {
        self.live.len()
    }
}
