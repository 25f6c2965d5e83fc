use std::{
    ops::Deref,
    sync::atomic::{AtomicU64, Ordering},
};

use ash::vk;

use super::{AllocError, ContiguousAllocation, ContiguousAllocator};
use crate::resources::buffer::{GfxBuffer, GfxBufferView};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// [`BufferArena::alloc`] 的结果
///
/// - `buffer`: 调用方使用的切片，`size` 是请求的逻辑大小，`actual_size` 是策略实际给出的块大小
/// - `block`: 策略返回的原始块，`free` 时原样归还
///
/// 没有实现 Clone，避免同一个分配被释放两次。
#[derive(Debug)]
pub struct BufferAllocation {
    pub buffer: GfxBufferView,
    pub block: ContiguousAllocation,
    arena_id: u64,
}

impl BufferAllocation {
    #[inline]
    pub fn arena_id(&self) -> u64 {
        self.arena_id
    }
}

impl Deref for BufferAllocation {
    type Target = GfxBufferView;
    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

/// 把一个物理 buffer 和一个分配策略绑定在一起
///
/// 策略只负责 offset/size 的记账，arena 负责把逻辑分配翻译成 buffer 上的切片。
/// backing buffer 由 [`crate::resources::allocator::GfxAllocator::create_arena`] 创建时归 arena 所有，
/// 通过 [`BufferArena::from_view`] 创建时只是借用外部 buffer 的一段区域。
pub struct BufferArena<A: ContiguousAllocator> {
    id: u64,
    view: GfxBufferView,
    backing: Option<GfxBuffer>,
    strategy: A,

    debug_name: String,
}

// new & init
impl<A: ContiguousAllocator> BufferArena<A> {
    /// 在已有 buffer 的一段区域上建立 arena
    ///
    /// `view.size` 必须不小于 `strategy.size_hint()`
    pub fn from_view(view: GfxBufferView, strategy: A, debug_name: impl AsRef<str>) -> Result<Self, AllocError> {
        Self::check_backing(view.size, &strategy)?;
        Ok(Self::new_internal(view, None, strategy, debug_name.as_ref()))
    }

    /// 由 allocator 调用，调用前已经检查过大小
    pub(crate) fn with_backing(buffer: GfxBuffer, strategy: A, debug_name: &str) -> Self {
        let view = buffer.view();
        Self::new_internal(view, Some(buffer), strategy, debug_name)
    }

    pub(crate) fn check_backing(buffer_size: vk::DeviceSize, strategy: &A) -> Result<(), AllocError> {
        let size_hint = strategy.size_hint();
        if buffer_size < size_hint {
            return Err(AllocError::BackingTooSmall { buffer_size, size_hint });
        }
        Ok(())
    }

    fn new_internal(view: GfxBufferView, backing: Option<GfxBuffer>, strategy: A, debug_name: &str) -> Self {
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "BufferArena #{id} \"{debug_name}\": {} bytes at offset {}, owned: {}",
            strategy.size_hint(),
            view.offset,
            backing.is_some()
        );

        Self {
            id,
            view,
            backing,
            strategy,
            debug_name: debug_name.to_string(),
        }
    }

    /// 拆出 backing buffer，交给 allocator 销毁
    pub(crate) fn into_backing(self) -> Option<GfxBuffer> {
        let live = self.strategy.live_allocations();
        if live > 0 {
            log::warn!("BufferArena #{} \"{}\" destroyed with {} live allocations", self.id, self.debug_name, live);
        }
        self.backing
    }
}

// getters
impl<A: ContiguousAllocator> BufferArena<A> {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// arena 覆盖的整段 buffer 区域
    #[inline]
    pub fn buffer(&self) -> &GfxBufferView {
        &self.view
    }

    #[inline]
    pub fn strategy(&self) -> &A {
        &self.strategy
    }

    #[inline]
    pub fn live_allocations(&self) -> usize {
        self.strategy.live_allocations()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

// tools
impl<A: ContiguousAllocator> BufferArena<A> {
    /// 分配 `size` 字节
    ///
    /// 返回的切片 offset 为 `arena.buffer.offset + block.offset`，大小为 `size`，
    /// 而 `actual_size` 为策略实际分配的块大小
    pub fn alloc(&mut self, size: vk::DeviceSize) -> Result<BufferAllocation, AllocError> {
        let block = self.strategy.alloc(size)?;
        Ok(BufferAllocation {
            buffer: self.view.sub_view(block.offset, size, block.size),
            block,
            arena_id: self.id,
        })
    }

    /// 归还分配，策略收到的是实际的块而不是逻辑大小
    pub fn free(&mut self, allocation: BufferAllocation) -> Result<(), AllocError> {
        if allocation.arena_id != self.id {
            return Err(AllocError::ForeignAllocation {
                arena: self.id,
                owner: allocation.arena_id,
            });
        }
        self.strategy.free(allocation.block)
    }
}
