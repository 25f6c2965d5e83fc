//! GPU buffer 子分配
//!
//! 持久的大 buffer（顶点、索引、材质数据）只创建一次，之后通过分配策略在其线性地址空间中切片，
//! 避免为每个对象单独创建 buffer。
//!
//! - [`ContiguousAllocator`]: 纯粹的 offset/size 记账，和 GPU 无关
//! - [`FreeListAllocator`]: 任意大小的 best-fit 分配
//! - [`SlabAllocator`]: 固定大小块的 O(1) 分配
//! - [`BufferArena`]: 把一个策略绑定到一个物理 buffer 上
//!
//! 分配器内部没有加锁，调用方需要自行串行化访问。

mod allocation;
mod buffer_arena;
mod free_list;
mod slab;

pub use allocation::{AllocError, ContiguousAllocation, ContiguousAllocator};
pub use buffer_arena::{BufferAllocation, BufferArena};
pub use free_list::FreeListAllocator;
pub use slab::SlabAllocator;
