use ash::vk;

/// 线性地址空间中的一段连续区域
///
/// 由调用 `alloc` 的一方持有，直到调用对应的 `free`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContiguousAllocation {
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl ContiguousAllocation {
    #[inline]
    pub const fn new(offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self { offset, size }
    }

    /// 区域末尾（不包含），溢出时取 `DeviceSize::MAX`
    #[inline]
    pub const fn end(&self) -> vk::DeviceSize {
        self.offset.saturating_add(self.size)
    }

    #[inline]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// 分配失败的原因
///
/// 分为两类：
/// - 调用方违反约定（零大小分配、释放未分配的区域等），见 [`AllocError::is_contract_violation`]
/// - 空间耗尽，调用方可以扩容 arena 或者淘汰旧数据后重试，见 [`AllocError::is_exhaustion`]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("allocation of zero bytes")]
    ZeroSize,

    #[error("out of memory: requested {requested} bytes, largest free block is {largest_free} bytes")]
    OutOfMemory {
        requested: vk::DeviceSize,
        largest_free: vk::DeviceSize,
    },

    #[error("free of range [{offset}, {offset} + {size}) which is not currently allocated")]
    InvalidFree {
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },

    #[error("requested {requested} bytes from a slab allocator with {slab_size} byte slabs")]
    ExceedsSlabSize {
        requested: vk::DeviceSize,
        slab_size: vk::DeviceSize,
    },

    #[error("backing buffer of {buffer_size} bytes is smaller than the strategy size hint {size_hint}")]
    BackingTooSmall {
        buffer_size: vk::DeviceSize,
        size_hint: vk::DeviceSize,
    },

    #[error("allocation owned by arena #{owner} was returned to arena #{arena}")]
    ForeignAllocation { arena: u64, owner: u64 },
}

impl AllocError {
    /// 调用方违反了分配器的使用约定，不应该尝试恢复
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        !self.is_exhaustion()
    }

    /// 空间不足，调用方可以自行处理
    #[inline]
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// 线性地址空间的分配策略
///
/// 只负责 offset/size 的记账，不接触任何 GPU 对象。
pub trait ContiguousAllocator {
    /// 分配至少 `size` 字节；返回的区域可能比请求的更大
    fn alloc(&mut self, size: vk::DeviceSize) -> Result<ContiguousAllocation, AllocError>;

    /// 归还之前由 `alloc` 返回的区域，必须原样传回
    fn free(&mut self, allocation: ContiguousAllocation) -> Result<(), AllocError>;

    /// 整个地址空间的大小，用于决定 backing buffer 的大小
    fn size_hint(&self) -> vk::DeviceSize;

    /// 当前尚未归还的分配数量
    fn live_allocations(&self) -> usize;
}
