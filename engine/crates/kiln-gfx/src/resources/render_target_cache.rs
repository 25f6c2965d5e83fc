use std::collections::HashMap;

use crate::{
    foundation::error::GfxError,
    resources::{
        allocator::GfxAllocator,
        texture::{GfxTexture, GfxTextureDesc, GfxTextureView},
    },
};

/// 按逻辑名字缓存 render target
///
/// pass 在 `add_resources` 阶段通过名字获取 texture，描述不变时复用上一帧的 texture，
/// 描述改变（例如窗口大小变化）时销毁旧的并重建。
///
/// 由渲染器持有，显式 `reset` 释放，不是全局单例。
#[derive(Default)]
pub struct RenderTargetCache {
    targets: HashMap<String, GfxTexture>,
}

impl RenderTargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或创建名为 `name` 的 texture
    ///
    /// 旧 texture 被替换时立即销毁，调用方需要保证 GPU 已经不再使用它
    pub fn get(&mut self, allocator: &GfxAllocator, name: &str, desc: &GfxTextureDesc) -> Result<GfxTextureView, GfxError> {
        if let Some(texture) = self.targets.get(name) {
            if texture.desc() == desc {
                return Ok(texture.view());
            }
            log::info!("render target \"{}\" changed: {:?} -> {:?}", name, texture.desc(), desc);
            if let Some(old) = self.targets.remove(name) {
                allocator.destroy_texture(old);
            }
        }

        let texture = allocator.create_texture(desc, name)?;
        let view = texture.view();
        self.targets.insert(name.to_string(), texture);
        Ok(view)
    }

    /// 只查询，不创建
    pub fn find(&self, name: &str) -> Option<GfxTextureView> {
        self.targets.get(name).map(GfxTexture::view)
    }

    pub fn remove(&mut self, allocator: &GfxAllocator, name: &str) -> bool {
        match self.targets.remove(name) {
            Some(texture) => {
                allocator.destroy_texture(texture);
                true
            }
            None => false,
        }
    }

    /// 销毁所有缓存的 texture
    pub fn reset(&mut self, allocator: &GfxAllocator) {
        for (_, texture) in self.targets.drain() {
            allocator.destroy_texture(texture);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Drop for RenderTargetCache {
    fn drop(&mut self) {
        if !self.targets.is_empty() {
            log::warn!("RenderTargetCache dropped with {} live render targets, call reset() first", self.targets.len());
        }
    }
}
