//! 测试用的 mock：记录命令的 encoder 和计数的对象工厂

use std::cell::{Cell, RefCell};

use ash::vk::{self, Handle};
use kiln_gfx::{commands::encoder::GfxCommandEncoder, resources::texture::GfxTextureView};

use crate::{
    cache::{RgFramebufferKey, RgObjectFactory, RgRenderPassKey},
    pass::RenderPass,
    resource::PassAttachment,
};

/// 回调中需要调用 `cx.cmd` 的方法时，encoder 类型必须在构造 pass 时已知
pub type MockPass<'a> = RenderPass<'a, MockEncoder>;

pub fn attachment(id: u64) -> PassAttachment {
    attachment_with_format(id, vk::Format::R8G8B8A8_UNORM)
}

/// image 和 image view 的句柄都等于 `id`
pub fn attachment_with_format(id: u64, format: vk::Format) -> PassAttachment {
    PassAttachment::new(GfxTextureView {
        image: vk::Image::from_raw(id),
        image_view: vk::ImageView::from_raw(id),
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        extent: vk::Extent2D { width: 64, height: 64 },
        layers: 1,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Barrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        images: Vec<RecordedBarrier>,
    },
    BeginPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: u32,
    },
    EndPass,
    BeginLabel(String),
    EndLabel,
    /// pass 回调中写入的标记
    Marker(String),
}

#[derive(Default)]
pub struct MockEncoder {
    pub commands: Vec<Recorded>,
}

impl MockEncoder {
    pub fn mark(&mut self, marker: impl Into<String>) {
        self.commands.push(Recorded::Marker(marker.into()));
    }

    pub fn markers(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Recorded::Marker(marker) => Some(marker.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn barriers(&self) -> Vec<&[RecordedBarrier]> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Recorded::Barrier { images, .. } => Some(images.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn begin_passes(&self) -> usize {
        self.commands.iter().filter(|cmd| matches!(cmd, Recorded::BeginPass { .. })).count()
    }
}

impl GfxCommandEncoder for MockEncoder {
    fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        let images = image_barriers
            .iter()
            .map(|b| RecordedBarrier {
                image: b.image,
                old_layout: b.old_layout,
                new_layout: b.new_layout,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
            })
            .collect();
        self.commands.push(Recorded::Barrier {
            src_stage,
            dst_stage,
            images,
        });
    }

    fn begin_render_pass(&mut self, begin_info: &vk::RenderPassBeginInfo<'_>) {
        self.commands.push(Recorded::BeginPass {
            render_pass: begin_info.render_pass,
            framebuffer: begin_info.framebuffer,
            extent: begin_info.render_area.extent,
            clear_values: begin_info.clear_value_count,
        });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(Recorded::EndPass);
    }

    fn begin_label(&mut self, name: &str, _color: [f32; 4]) {
        self.commands.push(Recorded::BeginLabel(name.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(Recorded::EndLabel);
    }
}

/// 记录所有创建请求，句柄从 1 开始递增
#[derive(Default)]
pub struct MockFactory {
    next_handle: Cell<u64>,
    pub render_passes: RefCell<Vec<RgRenderPassKey>>,
    pub framebuffers: RefCell<Vec<RgFramebufferKey>>,
    pub destroyed_render_passes: Cell<usize>,
    pub destroyed_framebuffers: Cell<usize>,
    /// 设置之后 render pass 创建返回这个错误
    pub fail_render_pass: Cell<Option<vk::Result>>,
}

impl MockFactory {
    fn next(&self) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        handle
    }
}

impl RgObjectFactory for MockFactory {
    fn create_render_pass(&self, key: &RgRenderPassKey, _debug_name: &str) -> Result<vk::RenderPass, vk::Result> {
        if let Some(err) = self.fail_render_pass.get() {
            return Err(err);
        }
        self.render_passes.borrow_mut().push(key.clone());
        Ok(vk::RenderPass::from_raw(self.next()))
    }

    fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.destroyed_render_passes.set(self.destroyed_render_passes.get() + 1);
    }

    fn create_framebuffer(&self, key: &RgFramebufferKey, _debug_name: &str) -> Result<vk::Framebuffer, vk::Result> {
        self.framebuffers.borrow_mut().push(key.clone());
        Ok(vk::Framebuffer::from_raw(self.next()))
    }

    fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.destroyed_framebuffers.set(self.destroyed_framebuffers.get() + 1);
    }
}
