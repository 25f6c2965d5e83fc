use std::fmt;

use ash::vk;

use crate::name::Name;

/// 创建失败的对象类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgObjectKind {
    RenderPass,
    Framebuffer,
}

impl fmt::Display for RgObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderPass => f.write_str("render pass"),
            Self::Framebuffer => f.write_str("framebuffer"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RgError {
    #[error("pass \"{pass}\" references undeclared attachment {resource:?}")]
    UndeclaredResource { pass: String, resource: Name },

    #[error("output {0:?} is not a declared attachment")]
    UndeclaredOutput(Name),

    #[error("no output was set on the render graph")]
    NoOutput,

    #[error("pass \"{pass}\" has {resolve} resolve outputs for {color} color attachments")]
    ResolveCountMismatch { pass: String, color: usize, resolve: usize },

    #[error("failed to create {object} for pass \"{pass}\": {result}")]
    ObjectCreation {
        object: RgObjectKind,
        pass: String,
        result: vk::Result,
    },
}

impl RgError {
    /// 图的声明本身有误，属于调用方的编程错误
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::ObjectCreation { .. })
    }
}
