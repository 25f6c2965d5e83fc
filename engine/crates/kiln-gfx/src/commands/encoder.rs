use ash::vk;

/// 渲染图录制命令所需的最小接口
///
/// 渲染图只关心资源状态转换和 pass 边界，不解释任何 draw 语义。
/// [`super::command_buffer::GfxCommandBuffer`] 是真正的实现，测试中可以用记录型的 mock 代替。
pub trait GfxCommandEncoder {
    /// 一次提交一组 image barrier
    ///
    /// - command type: sync
    fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );

    /// - command type: action
    /// - subpass contents 固定为 INLINE
    fn begin_render_pass(&mut self, begin_info: &vk::RenderPassBeginInfo<'_>);

    fn end_render_pass(&mut self);

    /// debug label，默认什么都不做
    fn begin_label(&mut self, _name: &str, _color: [f32; 4]) {}

    fn end_label(&mut self) {}
}
