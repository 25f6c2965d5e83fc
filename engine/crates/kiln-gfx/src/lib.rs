//! Vulkan GFX 抽象层
//!
//! 提供 Kiln 渲染器所需的最底层封装：
//!
//! - `foundation`: 逻辑设备封装与错误类型
//! - `arena`: 与 GPU 无关的线性地址空间子分配策略，以及把策略绑定到一个物理 buffer 上的 [`arena::BufferArena`]
//! - `resources`: 基于 vk-mem 的 buffer / image / texture 创建与销毁，以及按名字缓存的 render target
//! - `commands`: command buffer、command pool 以及渲染图录制命令所依赖的 [`commands::encoder::GfxCommandEncoder`]
//! - `frame_context`: 单帧命令录制、提交与延迟销毁
//!
//! 所有对象都通过显式的上下文传递，不存在进程级别的单例。

pub mod arena;
pub mod basic;
pub mod commands;
pub mod foundation;
pub mod frame_context;
pub mod resources;
pub mod utilities;
