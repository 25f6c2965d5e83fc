use std::ffi::CString;

use ash::vk;

use crate::{
    basic::color::LabelColor, commands::encoder::GfxCommandEncoder, foundation::error::GfxError,
    resources::buffer::GfxBufferView,
};

/// 命令缓冲封装
///
/// 由 [`super::command_pool::GfxCommandPool`] 分配和回收，只持有设备函数指针的副本，
/// 因此可以在线程之间移动。
///
/// # 使用示例
/// ```ignore
/// let mut cmd = pool.take()?;
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "frame")?;
/// graph.exec(&mut cmd, &mut cache)?;
/// cmd.end()?;
/// ```
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,

    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
}
// new & init
impl GfxCommandBuffer {
    pub(crate) fn new(
        vk_handle: vk::CommandBuffer,
        device: ash::Device,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> Self {
        Self {
            vk_handle,
            device,
            debug_utils,
        }
    }
}
// Basic 命令
impl GfxCommandBuffer {
    /// 开始录制 command
    ///
    /// 自动设置 debug label
    pub fn begin(&mut self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> Result<(), GfxError> {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))?;
        }
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 结束录制 command
    ///
    /// 结束 debug label
    pub fn end(&mut self) -> Result<(), GfxError> {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.vk_handle)? };
        Ok(())
    }
}
// getters
impl GfxCommandBuffer {
    /// getter
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}
// 数据传输类型
impl GfxCommandBuffer {
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer(&mut self, src: &GfxBufferView, dst: &GfxBufferView) {
        let region = vk::BufferCopy {
            src_offset: src.offset,
            dst_offset: dst.offset,
            size: src.size.min(dst.size),
        };
        unsafe {
            self.device.cmd_copy_buffer(self.vk_handle, src.handle, dst.handle, std::slice::from_ref(&region));
        }
    }

    /// - command type: state
    /// - 支持的 queue: graphics, compute
    #[inline]
    pub fn cmd_push_constants(
        &mut self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data);
        }
    }
}
// 绑定与绘制
impl GfxCommandBuffer {
    /// - command type: state
    #[inline]
    pub fn cmd_bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline) }
    }

    /// - command type: state
    #[inline]
    pub fn cmd_bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.vk_handle, bind_point, layout, first_set, descriptor_sets, &[]);
        }
    }

    /// 顶点数据通常来自 arena 的切片，offset 直接取自 view
    ///
    /// - command type: state
    #[inline]
    pub fn cmd_bind_vertex_buffer(&mut self, binding: u32, buffer: &GfxBufferView) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.vk_handle, binding, &[buffer.handle], &[buffer.offset]);
        }
    }

    /// - command type: state
    #[inline]
    pub fn cmd_bind_index_buffer(&mut self, buffer: &GfxBufferView, index_type: vk::IndexType) {
        unsafe { self.device.cmd_bind_index_buffer(self.vk_handle, buffer.handle, buffer.offset, index_type) }
    }

    /// - command type: state
    #[inline]
    pub fn cmd_set_viewport_scissor(&mut self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        unsafe {
            self.device.cmd_set_viewport(self.vk_handle, 0, &[viewport]);
            self.device.cmd_set_scissor(self.vk_handle, 0, &[scissor]);
        }
    }

    /// - command type: action
    #[inline]
    pub fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe { self.device.cmd_draw(self.vk_handle, vertex_count, instance_count, first_vertex, first_instance) }
    }

    /// - command type: action
    #[inline]
    pub fn cmd_draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.vk_handle,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    /// - command type: action
    /// - 支持的 queue: compute
    #[inline]
    pub fn cmd_dispatch(&mut self, group_count: [u32; 3]) {
        unsafe { self.device.cmd_dispatch(self.vk_handle, group_count[0], group_count[1], group_count[2]) }
    }
}

impl GfxCommandEncoder for GfxCommandBuffer {
    fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.vk_handle,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }

    fn begin_render_pass(&mut self, begin_info: &vk::RenderPassBeginInfo<'_>) {
        unsafe { self.device.cmd_begin_render_pass(self.vk_handle, begin_info, vk::SubpassContents::INLINE) }
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.vk_handle) }
    }

    fn begin_label(&mut self, name: &str, color: [f32; 4]) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        // 和 end_label 成对出现，名字非法时也要压入 label
        let name = CString::new(name.replace('\0', " ")).unwrap_or_default();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color);
        unsafe { debug_utils.cmd_begin_debug_utils_label(self.vk_handle, &label) }
    }

    fn end_label(&mut self) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(self.vk_handle) }
        }
    }
}
