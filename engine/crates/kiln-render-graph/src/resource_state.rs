//! 资源状态定义
//!
//! 封装 Vulkan 的 pipeline stage、access mask 和 image layout，
//! 每一种资源用法对应一个预定义的状态。

use ash::vk;

/// 图像资源状态
///
/// 既用来描述 pass 对资源的需求，也用来描述资源当前被跟踪的状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgImageState {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags,
    /// Access mask
    pub access: vk::AccessFlags,
    /// Image layout
    pub layout: vk::ImageLayout,
}

impl Default for RgImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl RgImageState {
    /// 创建自定义状态
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags, access: vk::AccessFlags, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    // ============ 预定义状态常量 ============

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty(), vk::ImageLayout::UNDEFINED);

    /// input attachment 读取
    pub const INPUT_ATTACHMENT: Self = Self::new(
        vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::VERTEX_SHADER.as_raw() | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw(),
        ),
        vk::AccessFlags::INPUT_ATTACHMENT_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 同一个 pass 中既是 input attachment 又是 color attachment（读-改-写）
    pub const INPUT_ATTACHMENT_FEEDBACK: Self = Self::new(
        vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::VERTEX_SHADER.as_raw()
                | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw()
                | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw(),
        ),
        vk::AccessFlags::from_raw(
            vk::AccessFlags::INPUT_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::GENERAL,
    );

    /// 着色器采样
    pub const TEXTURE_INPUT: Self = Self::new(
        vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::VERTEX_SHADER.as_raw() | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw(),
        ),
        vk::AccessFlags::SHADER_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 深度只读（depth test 但不写入）
    pub const DEPTH_STENCIL_READ: Self = Self::new(
        vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    /// 深度读写
    pub const DEPTH_STENCIL_WRITE: Self = Self::new(
        vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        vk::AccessFlags::from_raw(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// 颜色附件读写（包括 blend 和 LOAD_OP_LOAD）
    pub const COLOR_OUTPUT: Self = Self::new(
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags::from_raw(
            vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw() | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// multisample resolve 目标，resolve 发生在 color attachment output 阶段
    pub const RESOLVE_OUTPUT: Self = Self::new(
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    // ============ 辅助方法 ============

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags = vk::AccessFlags::from_raw(
        vk::AccessFlags::SHADER_WRITE.as_raw()
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags::HOST_WRITE.as_raw()
            | vk::AccessFlags::MEMORY_WRITE.as_raw(),
    );

    /// 检查是否为写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 获取用于 barrier src 的 access（只有写操作需要 make available）
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags {
        self.access & Self::WRITE_ACCESS
    }

    /// 保持 stage/access，只换 layout
    #[inline]
    pub const fn with_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.layout = layout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_classification() {
        assert!(RgImageState::COLOR_OUTPUT.is_write());
        assert!(RgImageState::DEPTH_STENCIL_WRITE.is_write());
        assert!(RgImageState::INPUT_ATTACHMENT_FEEDBACK.is_write());
        assert!(RgImageState::RESOLVE_OUTPUT.is_write());

        assert!(!RgImageState::TEXTURE_INPUT.is_write());
        assert!(!RgImageState::DEPTH_STENCIL_READ.is_write());
        assert!(!RgImageState::UNDEFINED.is_write());
    }

    #[test]
    fn test_src_access_drops_reads() {
        assert_eq!(RgImageState::COLOR_OUTPUT.src_access(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(RgImageState::TEXTURE_INPUT.src_access(), vk::AccessFlags::empty());
    }
}
