use ash::vk;

use crate::arena::AllocError;

/// GFX 层的错误
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// Vulkan / vk-mem 调用失败
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    /// 子分配失败
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl GfxError {
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Vulkan(_) => false,
            Self::Alloc(err) => err.is_contract_violation(),
        }
    }
}
