//! RenderPass / Framebuffer 对象缓存
//!
//! key 是创建参数本身，而不是它们的 hash 值，因此不会因为 hash 冲突返回错误的对象。

use std::{collections::HashMap, rc::Rc};

use ash::vk;
use kiln_gfx::foundation::device::GfxDevice;

/// 单个 attachment 的描述，对应 `vk::AttachmentDescription`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgAttachmentDesc {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    /// initial 和 final layout 相同，layout 转换全部由 pass 之前的 barrier 完成
    pub layout: vk::ImageLayout,
}

impl RgAttachmentDesc {
    pub fn to_vk(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription {
            format: self.format,
            samples: self.samples,
            load_op: self.load_op,
            store_op: self.store_op,
            stencil_load_op: self.stencil_load_op,
            stencil_store_op: self.stencil_store_op,
            initial_layout: self.layout,
            final_layout: self.layout,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgAttachmentRef {
    pub attachment: u32,
    pub layout: vk::ImageLayout,
}

impl RgAttachmentRef {
    #[inline]
    pub fn to_vk(&self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: self.attachment,
            layout: self.layout,
        }
    }
}

/// 单 subpass 的 render pass 创建参数
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgRenderPassKey {
    pub attachments: Vec<RgAttachmentDesc>,
    pub input_refs: Vec<RgAttachmentRef>,
    pub color_refs: Vec<RgAttachmentRef>,
    /// 为空表示没有 resolve，否则数量和 `color_refs` 相同
    pub resolve_refs: Vec<RgAttachmentRef>,
    pub depth_stencil_ref: Option<RgAttachmentRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RgFramebufferKey {
    pub render_pass: vk::RenderPass,
    pub attachments: Vec<vk::ImageView>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

/// 真正创建 Vulkan 对象的一方
///
/// [`GfxDevice`] 是正式实现，测试中使用计数的 mock
pub trait RgObjectFactory {
    fn create_render_pass(&self, key: &RgRenderPassKey, debug_name: &str) -> Result<vk::RenderPass, vk::Result>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(&self, key: &RgFramebufferKey, debug_name: &str) -> Result<vk::Framebuffer, vk::Result>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
}

impl RgObjectFactory for GfxDevice {
    fn create_render_pass(&self, key: &RgRenderPassKey, debug_name: &str) -> Result<vk::RenderPass, vk::Result> {
        let attachments = key.attachments.iter().map(RgAttachmentDesc::to_vk).collect::<Vec<_>>();
        let input_refs = key.input_refs.iter().map(RgAttachmentRef::to_vk).collect::<Vec<_>>();
        let color_refs = key.color_refs.iter().map(RgAttachmentRef::to_vk).collect::<Vec<_>>();
        let resolve_refs = key.resolve_refs.iter().map(RgAttachmentRef::to_vk).collect::<Vec<_>>();
        let depth_ref = key.depth_stencil_ref.map(|r| r.to_vk());

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .input_attachments(&input_refs)
            .color_attachments(&color_refs);
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let rpci = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass));
        let render_pass = unsafe { self.ash_handle().create_render_pass(&rpci, None)? };
        self.set_object_debug_name(render_pass, format!("RenderPass::{debug_name}"));
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.ash_handle().destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(&self, key: &RgFramebufferKey, debug_name: &str) -> Result<vk::Framebuffer, vk::Result> {
        let fbci = vk::FramebufferCreateInfo::default()
            .render_pass(key.render_pass)
            .attachments(&key.attachments)
            .width(key.width)
            .height(key.height)
            .layers(key.layers);
        let framebuffer = unsafe { self.ash_handle().create_framebuffer(&fbci, None)? };
        self.set_object_debug_name(framebuffer, format!("Framebuffer::{debug_name}"));
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.ash_handle().destroy_framebuffer(framebuffer, None) }
    }
}

impl<T: RgObjectFactory + ?Sized> RgObjectFactory for Rc<T> {
    fn create_render_pass(&self, key: &RgRenderPassKey, debug_name: &str) -> Result<vk::RenderPass, vk::Result> {
        (**self).create_render_pass(key, debug_name)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        (**self).destroy_render_pass(render_pass)
    }

    fn create_framebuffer(&self, key: &RgFramebufferKey, debug_name: &str) -> Result<vk::Framebuffer, vk::Result> {
        (**self).create_framebuffer(key, debug_name)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        (**self).destroy_framebuffer(framebuffer)
    }
}

/// 以创建参数为 key 的 RenderPass / Framebuffer 缓存
///
/// 由渲染器持有，跨帧复用；drop 或者 `clear` 时释放所有对象
pub struct RenderGraphCache<F: RgObjectFactory> {
    factory: F,

    passes: HashMap<RgRenderPassKey, vk::RenderPass>,
    framebuffers: HashMap<RgFramebufferKey, vk::Framebuffer>,

    /// 累计创建的对象数量，用于统计 cache miss
    created_passes: u64,
    created_framebuffers: u64,
}

// new & init
impl<F: RgObjectFactory> RenderGraphCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            passes: HashMap::new(),
            framebuffers: HashMap::new(),
            created_passes: 0,
            created_framebuffers: 0,
        }
    }
}

// getters
impl<F: RgObjectFactory> RenderGraphCache<F> {
    #[inline]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    #[inline]
    pub fn len_passes(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn len_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn created_passes(&self) -> u64 {
        self.created_passes
    }

    #[inline]
    pub fn created_framebuffers(&self) -> u64 {
        self.created_framebuffers
    }
}

// tools
impl<F: RgObjectFactory> RenderGraphCache<F> {
    /// get-or-create
    pub fn create_pass(&mut self, key: &RgRenderPassKey, debug_name: &str) -> Result<vk::RenderPass, vk::Result> {
        if let Some(&render_pass) = self.passes.get(key) {
            log::trace!("render pass cache hit: {debug_name}");
            return Ok(render_pass);
        }

        let render_pass = self.factory.create_render_pass(key, debug_name)?;
        log::trace!("render pass cache miss: {debug_name}, {} attachments", key.attachments.len());
        self.passes.insert(key.clone(), render_pass);
        self.created_passes += 1;
        Ok(render_pass)
    }

    /// get-or-create
    pub fn create_framebuffer(
        &mut self,
        key: &RgFramebufferKey,
        debug_name: &str,
    ) -> Result<vk::Framebuffer, vk::Result> {
        if let Some(&framebuffer) = self.framebuffers.get(key) {
            log::trace!("framebuffer cache hit: {debug_name}");
            return Ok(framebuffer);
        }

        let framebuffer = self.factory.create_framebuffer(key, debug_name)?;
        log::trace!("framebuffer cache miss: {debug_name}, {}x{}x{}", key.width, key.height, key.layers);
        self.framebuffers.insert(key.clone(), framebuffer);
        self.created_framebuffers += 1;
        Ok(framebuffer)
    }

    /// 释放引用了 `view` 的 framebuffer
    ///
    /// render target 重建之后调用，旧的 image view 句柄值可能被驱动复用
    pub fn evict_image_view(&mut self, view: vk::ImageView) {
        let factory = &self.factory;
        self.framebuffers.retain(|key, framebuffer| {
            let keep = !key.attachments.contains(&view);
            if !keep {
                factory.destroy_framebuffer(*framebuffer);
            }
            keep
        });
    }

    /// 释放所有缓存的对象，调用方需要保证 GPU 已经不再使用它们
    pub fn clear(&mut self) {
        if !self.passes.is_empty() || !self.framebuffers.is_empty() {
            log::debug!(
                "RenderGraphCache: destroying {} render passes, {} framebuffers",
                self.passes.len(),
                self.framebuffers.len()
            );
        }
        for (_, framebuffer) in self.framebuffers.drain() {
            self.factory.destroy_framebuffer(framebuffer);
        }
        for (_, render_pass) in self.passes.drain() {
            self.factory.destroy_render_pass(render_pass);
        }
    }
}

impl<F: RgObjectFactory> Drop for RenderGraphCache<F> {
    fn drop(&mut self) {
        self.clear();
    }
}
