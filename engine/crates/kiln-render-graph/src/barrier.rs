//! Barrier 计算
//!
//! 每个 pass 的所有资源转换被合并成一条 `vkCmdPipelineBarrier`。

use ash::vk;
use kiln_gfx::commands::barrier::GfxImageBarrier;

use crate::{name::Name, resource::PassAttachment, resource_state::RgImageState};

/// 图像 Barrier 描述
#[derive(Clone, Debug)]
pub struct RgImageBarrierDesc {
    pub name: Name,
    /// 源状态
    pub src_state: RgImageState,
    /// 目标状态
    pub dst_state: RgImageState,
}

impl RgImageBarrierDesc {
    pub fn new(name: Name, src_state: RgImageState, dst_state: RgImageState) -> Self {
        Self {
            name,
            src_state,
            dst_state,
        }
    }

    /// 检查是否需要 barrier
    ///
    /// 如果 layout 相同且两边都是只读，跳过
    ///
    /// 不只比较 layout：layout 不变但任一方有写入时也需要 barrier，否则写入对下一个使用者不可见
    pub fn needs_barrier(&self) -> bool {
        // Layout 不同一定需要 barrier
        if self.src_state.layout != self.dst_state.layout {
            return true;
        }

        // 有写操作需要 barrier（确保可见性）
        self.src_state.is_write() || self.dst_state.is_write()
    }

    /// 转换为 vk barrier
    pub fn to_vk_barrier(&self, attachment: &PassAttachment) -> vk::ImageMemoryBarrier<'static> {
        GfxImageBarrier::new()
            .image(attachment.texture.image)
            .subresource_range(attachment.subresource)
            .layout_transfer(self.src_state.layout, self.dst_state.layout)
            .access_mask(self.src_state.src_access(), self.dst_state.access)
            .build()
    }
}

/// Pass 执行前需要的 Barrier 集合
///
/// `src_stages` 累积所有旧状态的 stage，`dst_stages` 累积所有新状态的 stage
#[derive(Clone, Debug, Default)]
pub struct PassBarriers {
    pub image_barriers: Vec<RgImageBarrierDesc>,
    pub src_stages: vk::PipelineStageFlags,
    pub dst_stages: vk::PipelineStageFlags,
}

impl PassBarriers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件加入 barrier
    pub fn push(&mut self, barrier: RgImageBarrierDesc) {
        self.src_stages |= barrier.src_state.stage;
        self.dst_stages |= barrier.dst_state.stage;
        self.image_barriers.push(barrier);
    }

    /// 只有状态确实需要转换时才加入，返回是否加入
    pub fn push_if_needed(&mut self, barrier: RgImageBarrierDesc) -> bool {
        let needed = barrier.needs_barrier();
        if needed {
            self.push(barrier);
        }
        needed
    }

    #[inline]
    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image_barriers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty()
    }

    /// 实际提交用的 stage mask，空的 mask 在 Vulkan 中不合法
    pub fn stage_masks(&self) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
        let or_all = |stages: vk::PipelineStageFlags| {
            if stages.is_empty() { vk::PipelineStageFlags::ALL_COMMANDS } else { stages }
        };
        (or_all(self.src_stages), or_all(self.dst_stages))
    }
}
