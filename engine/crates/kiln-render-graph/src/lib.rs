//! Kiln 声明式渲染图
//!
//! 每帧声明资源和 pass，由图决定执行顺序、生成 barrier，并从缓存中取得 RenderPass/Framebuffer。
//!
//! # 核心概念
//!
//! - **Name**: 资源的名字，同一个图内唯一
//! - **PassAttachment / PassBuffer**: 图可以同步的资源，由外部持有
//! - **RenderPass**: 一个 pass 的资源用法声明以及执行回调
//! - **RenderGraph**: 每帧一个，`exec` 之后即被消耗
//! - **RenderGraphCache**: 跨帧复用的 RenderPass/Framebuffer 缓存
//! - **GfxPass**: 渲染功能模块的统一接口
//!
//! # 使用示例
//!
//! ```ignore
//! let mut rg = RenderGraph::new();
//! rg.push_attachment("gbuffer.albedo", PassAttachment::new(albedo.view()));
//! rg.push_attachment("swapchain", PassAttachment::new(swapchain_view));
//!
//! rg.push_pass(
//!     RenderPass::new("composite")
//!         .extent(width, height)
//!         .push_texture_input("gbuffer.albedo")
//!         .push_color_output("swapchain", Some(CLEAR_BLACK))
//!         .set_exec(|cx| cx.cmd.cmd_draw(3, 1, 0, 0)),
//! );
//! rg.push_pass(RenderPass::new("gbuffer").extent(width, height).push_color_output("gbuffer.albedo", Some(CLEAR_BLACK)));
//!
//! rg.set_output("swapchain", vk::ImageLayout::PRESENT_SRC_KHR);
//! let stats = rg.exec(frame.cmd(), &mut cache)?;
//! ```

pub mod barrier;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod gfx_pass;
pub mod graph;
pub mod name;
pub mod pass;
pub mod resource;
pub mod resource_state;

#[cfg(test)]
mod test_utils;

pub use cache::{RenderGraphCache, RgObjectFactory};
pub use config::{RgConfig, RgFailurePolicy};
pub use error::{RgError, RgObjectKind};
pub use executor::RgFrameStats;
pub use gfx_pass::{GfxPass, GfxPassSet};
pub use graph::RenderGraph;
pub use name::Name;
pub use pass::{RenderPass, RgPassContext};
pub use resource::{PassAttachment, PassBuffer, RgResources};
pub use resource_state::RgImageState;
