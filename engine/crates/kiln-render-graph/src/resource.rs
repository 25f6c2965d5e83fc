use std::collections::HashMap;

use ash::vk;
use kiln_gfx::resources::{buffer::GfxBufferView, texture::GfxTextureView};

use crate::name::Name;

/// 渲染图可以同步的 image 资源：texture 加上一段 subresource range
///
/// texture 由外部（render target cache 或 swapchain）持有，渲染图只在一帧内借用
#[derive(Clone, Copy, Debug)]
pub struct PassAttachment {
    pub texture: GfxTextureView,
    pub subresource: vk::ImageSubresourceRange,
}

impl PassAttachment {
    /// 覆盖整个 image
    pub fn new(texture: GfxTextureView) -> Self {
        Self {
            texture,
            subresource: texture.full_subresource_range(),
        }
    }

    pub fn with_subresource(texture: GfxTextureView, subresource: vk::ImageSubresourceRange) -> Self {
        Self { texture, subresource }
    }
}

// vk::ImageSubresourceRange 没有实现 PartialEq，按字段比较
impl PartialEq for PassAttachment {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.subresource, &other.subresource);
        self.texture == other.texture
            && a.aspect_mask == b.aspect_mask
            && a.base_mip_level == b.base_mip_level
            && a.level_count == b.level_count
            && a.base_array_layer == b.base_array_layer
            && a.layer_count == b.layer_count
    }
}

impl Eq for PassAttachment {}

/// 在 pass 之间传递的 buffer，例如一个 pass 生成、另一个 pass 读取的 uniform buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassBuffer {
    pub buffer: GfxBufferView,
}

impl PassBuffer {
    #[inline]
    pub fn new(buffer: GfxBufferView) -> Self {
        Self { buffer }
    }
}

/// 一帧内声明的所有资源
///
/// pass 的回调通过它按名字取回其他 pass 生成的资源
#[derive(Default)]
pub struct RgResources {
    pub(crate) attachments: HashMap<Name, PassAttachment>,
    pub(crate) buffers: HashMap<Name, PassBuffer>,
}

impl RgResources {
    /// # Panics
    /// 名字没有声明过时 panic，这是调用方的编程错误
    pub fn attachment(&self, name: &str) -> PassAttachment {
        match self.attachments.get(name) {
            Some(attachment) => *attachment,
            None => panic!("render graph: attachment \"{name}\" is not declared"),
        }
    }

    #[inline]
    pub fn try_attachment(&self, name: &str) -> Option<PassAttachment> {
        self.attachments.get(name).copied()
    }

    /// # Panics
    /// 名字没有声明过时 panic
    pub fn buffer(&self, name: &str) -> PassBuffer {
        match self.buffers.get(name) {
            Some(buffer) => *buffer,
            None => panic!("render graph: buffer \"{name}\" is not declared"),
        }
    }

    #[inline]
    pub fn try_buffer(&self, name: &str) -> Option<PassBuffer> {
        self.buffers.get(name).copied()
    }

    #[inline]
    pub fn contains_attachment(&self, name: &str) -> bool {
        self.attachments.contains_key(name)
    }
}
