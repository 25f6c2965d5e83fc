//! RenderGraph 执行器
//!
//! 按 [`RenderGraph::resolve_execution_order`] 得到的顺序逐个执行 pass：
//! 跟踪每个资源的状态、合并 barrier、从缓存中取得 RenderPass/Framebuffer，最后调用 pass 的回调。

use std::collections::HashMap;

use ash::vk;
use itertools::Itertools;
use kiln_gfx::{basic::color::LabelColor, commands::encoder::GfxCommandEncoder};

use crate::{
    barrier::{PassBarriers, RgImageBarrierDesc},
    cache::{RenderGraphCache, RgAttachmentDesc, RgAttachmentRef, RgFramebufferKey, RgObjectFactory, RgRenderPassKey},
    config::RgFailurePolicy,
    error::{RgError, RgObjectKind},
    graph::RenderGraph,
    name::Name,
    pass::{RenderPass, RgExplicitState, RgPassContext},
    resource::{PassAttachment, RgResources},
    resource_state::RgImageState,
};

/// 一帧执行的统计信息
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgFrameStats {
    pub executed_passes: usize,
    /// 所有 pipeline barrier 中的 image barrier 数量，包括最后对输出资源的转换
    pub barriers: usize,
    pub render_pass_cache_misses: u64,
    pub framebuffer_cache_misses: u64,
}

/// 资源状态转换是否发出 barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RgEmit {
    /// layout 变化或者任意一方有写入时
    IfNeeded,
    Always,
    /// 只更新跟踪状态
    Never,
}

impl From<RgExplicitState> for RgEmit {
    fn from(explicit: RgExplicitState) -> Self {
        if explicit.is_virtual { Self::Never } else { Self::Always }
    }
}

/// 一个 pass 执行前计算出的所有内容
struct PassPlan {
    barriers: PassBarriers,
    key: RgRenderPassKey,
    views: Vec<vk::ImageView>,
    /// 和 `key.attachments` 一一对应
    clear_values: Vec<vk::ClearValue>,
    /// (资源, 用法, 需要的状态)，只用于打印执行计划
    usages: Vec<(Name, &'static str, RgImageState)>,
}

impl PassPlan {
    /// 按固定的类别顺序遍历 pass 的资源用法，同时更新 `states`
    ///
    /// input attachment → texture input → dependency → depth → color → resolve → dependent
    fn build<E>(
        pass: &RenderPass<'_, E>,
        resources: &RgResources,
        states: &mut HashMap<Name, RgImageState>,
    ) -> Self {
        let mut plan = Self {
            barriers: PassBarriers::new(),
            key: RgRenderPassKey::default(),
            views: Vec::new(),
            clear_values: Vec::new(),
            usages: Vec::new(),
        };

        for (name, is_self, clear) in &pass.input_attachments {
            let (state, usage) = if *is_self {
                (RgImageState::INPUT_ATTACHMENT_FEEDBACK, "input attachment (self)")
            } else {
                (RgImageState::INPUT_ATTACHMENT, "input attachment")
            };
            plan.transition(states, name, state, usage, RgEmit::IfNeeded);

            let load_op = if *is_self && clear.is_some() {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::LOAD
            };
            let attachment_ref =
                plan.push_attachment(&resources.attachment(name), state.layout, load_op, color_clear(*clear));
            plan.key.input_refs.push(attachment_ref);
            if *is_self {
                plan.key.color_refs.push(attachment_ref);
            }
        }

        for name in &pass.texture_inputs {
            plan.transition(states, name, RgImageState::TEXTURE_INPUT, "texture input", RgEmit::IfNeeded);
        }

        for (name, explicit) in &pass.dependencies {
            plan.transition(states, name, explicit.state, "dependency", (*explicit).into());
        }

        if let Some((name, clear)) = &pass.depth_stencil {
            let (state, load_op, usage) = match clear {
                Some(_) => (RgImageState::DEPTH_STENCIL_WRITE, vk::AttachmentLoadOp::CLEAR, "depth stencil (clear)"),
                None => (RgImageState::DEPTH_STENCIL_READ, vk::AttachmentLoadOp::LOAD, "depth stencil"),
            };
            plan.transition(states, name, state, usage, RgEmit::IfNeeded);

            let clear_value = vk::ClearValue {
                depth_stencil: clear.unwrap_or_default(),
            };
            let attachment_ref = plan.push_attachment(&resources.attachment(name), state.layout, load_op, clear_value);
            plan.key.depth_stencil_ref = Some(attachment_ref);
        }

        for (name, clear) in &pass.color_outputs {
            plan.transition(states, name, RgImageState::COLOR_OUTPUT, "color output", RgEmit::IfNeeded);

            let attachment_ref = plan.push_attachment(
                &resources.attachment(name),
                RgImageState::COLOR_OUTPUT.layout,
                load_op_of(clear),
                color_clear(*clear),
            );
            plan.key.color_refs.push(attachment_ref);
        }

        for (name, clear) in &pass.resolve_outputs {
            plan.transition(states, name, RgImageState::RESOLVE_OUTPUT, "resolve output", RgEmit::IfNeeded);

            let attachment_ref = plan.push_attachment(
                &resources.attachment(name),
                RgImageState::RESOLVE_OUTPUT.layout,
                load_op_of(clear),
                color_clear(*clear),
            );
            plan.key.resolve_refs.push(attachment_ref);
        }

        for (name, explicit) in &pass.dependents {
            plan.transition(states, name, explicit.state, "dependent", (*explicit).into());
        }

        plan
    }

    fn transition(
        &mut self,
        states: &mut HashMap<Name, RgImageState>,
        name: &Name,
        dst_state: RgImageState,
        usage: &'static str,
        emit: RgEmit,
    ) {
        let src_state = states.get(name).copied().unwrap_or_default();
        let desc = RgImageBarrierDesc::new(name.clone(), src_state, dst_state);
        match emit {
            RgEmit::IfNeeded => {
                self.barriers.push_if_needed(desc);
            }
            RgEmit::Always => self.barriers.push(desc),
            RgEmit::Never => {}
        }

        states.insert(name.clone(), dst_state);
        self.usages.push((name.clone(), usage, dst_state));
    }

    /// 加入一个 attachment，返回它在 render pass 中的引用
    fn push_attachment(
        &mut self,
        attachment: &PassAttachment,
        layout: vk::ImageLayout,
        load_op: vk::AttachmentLoadOp,
        clear_value: vk::ClearValue,
    ) -> RgAttachmentRef {
        let texture = &attachment.texture;
        // 只有带 stencil 的格式才保留 stencil 内容
        let (stencil_load_op, stencil_store_op) = if texture.aspect_mask().contains(vk::ImageAspectFlags::STENCIL) {
            (load_op, vk::AttachmentStoreOp::STORE)
        } else {
            (vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::DONT_CARE)
        };

        let index = self.key.attachments.len() as u32;
        self.key.attachments.push(RgAttachmentDesc {
            format: texture.format,
            samples: texture.samples,
            load_op,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op,
            stencil_store_op,
            layout,
        });
        self.views.push(texture.image_view);
        self.clear_values.push(clear_value);

        RgAttachmentRef {
            attachment: index,
            layout,
        }
    }
}

fn load_op_of(clear: &Option<vk::ClearColorValue>) -> vk::AttachmentLoadOp {
    if clear.is_some() { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD }
}

/// 不 clear 的 attachment 也占一个位置，保证 clear value 的下标和 attachment 对齐
fn color_clear(clear: Option<vk::ClearColorValue>) -> vk::ClearValue {
    vk::ClearValue {
        color: clear.unwrap_or(vk::ClearColorValue { float32: [0.0; 4] }),
    }
}

fn creation_failure(policy: RgFailurePolicy, object: RgObjectKind, pass: &str, result: vk::Result) -> RgError {
    let err = RgError::ObjectCreation {
        object,
        pass: pass.to_string(),
        result,
    };
    log::error!("render graph: {err}");
    match policy {
        RgFailurePolicy::Propagate => err,
        RgFailurePolicy::Fatal => panic!("render graph: {err}"),
    }
}

fn record_barriers<E: GfxCommandEncoder>(cmd: &mut E, resources: &RgResources, barriers: &PassBarriers) {
    let (src_stage, dst_stage) = barriers.stage_masks();
    let image_barriers = barriers
        .image_barriers
        .iter()
        .map(|desc| desc.to_vk_barrier(&resources.attachment(&desc.name)))
        .collect_vec();
    cmd.pipeline_barrier(src_stage, dst_stage, &image_barriers);
}

impl<'a, E: GfxCommandEncoder> RenderGraph<'a, E> {
    /// 录制整个图，消耗掉本帧的图
    ///
    /// `cmd` 需要已经 begin。返回错误时已经录制的命令保持原样，调用方应当放弃这一帧。
    pub fn exec<F: RgObjectFactory>(
        self,
        cmd: &mut E,
        cache: &mut RenderGraphCache<F>,
    ) -> Result<RgFrameStats, RgError> {
        let order = self.resolve_execution_order()?;

        let Self {
            resources,
            initial_layouts,
            passes,
            output,
            config,
        } = self;
        let (output, output_layout) = output.ok_or(RgError::NoOutput)?;

        let mut states: HashMap<Name, RgImageState> = resources
            .attachments
            .keys()
            .map(|name| {
                let state = initial_layouts
                    .get(name)
                    .map_or(RgImageState::UNDEFINED, |&layout| RgImageState::UNDEFINED.with_layout(layout));
                (name.clone(), state)
            })
            .collect();

        if config.log_execution_plan {
            log::info!("╔══════════════════════════════════════════════════════════════════╗");
            log::info!("║              RenderGraph Execution Plan                          ║");
            log::info!("╠══════════════════════════════════════════════════════════════════╣");
            log::info!(
                "║ Total Passes: {}  |  Execution Order: [{}]",
                passes.len(),
                order.iter().map(|&i| passes[i].name()).join(" → ")
            );
            log::info!("╚══════════════════════════════════════════════════════════════════╝");
        }

        let mut stats = RgFrameStats::default();
        let created_passes = cache.created_passes();
        let created_framebuffers = cache.created_framebuffers();

        let mut passes = passes.into_iter().map(Some).collect_vec();
        for (step, &index) in order.iter().enumerate() {
            let Some(mut pass) = passes[index].take() else {
                continue;
            };

            let plan = PassPlan::build(&pass, &resources, &mut states);
            if config.log_execution_plan {
                print_pass_plan(step, order.len(), pass.name(), &plan);
            }

            let render_pass = cache
                .create_pass(&plan.key, pass.name())
                .map_err(|result| creation_failure(config.creation_failure, RgObjectKind::RenderPass, pass.name(), result))?;
            let framebuffer_key = RgFramebufferKey {
                render_pass,
                attachments: plan.views,
                width: pass.width,
                height: pass.height,
                layers: pass.layers,
            };
            let framebuffer = cache.create_framebuffer(&framebuffer_key, pass.name()).map_err(|result| {
                creation_failure(config.creation_failure, RgObjectKind::Framebuffer, pass.name(), result)
            })?;

            if config.debug_labels {
                cmd.begin_label(pass.name(), LabelColor::COLOR_PASS);
            }

            if plan.barriers.has_barriers() {
                record_barriers(cmd, &resources, &plan.barriers);
                stats.barriers += plan.barriers.len();
            }

            let pre_exec = pass.pre_exec.take();
            let exec = pass.exec.take();
            let extent = pass.extent_2d();

            let mut cx = RgPassContext {
                cmd: &mut *cmd,
                resources: &resources,
                render_pass,
                framebuffer,
                extent,
                pass_name: pass.name(),
            };
            if let Some(pre_exec) = pre_exec {
                pre_exec(&mut cx);
            }

            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                })
                .clear_values(&plan.clear_values);
            cx.cmd.begin_render_pass(&begin_info);
            if let Some(exec) = exec {
                exec(&mut cx);
            }
            cx.cmd.end_render_pass();

            if config.debug_labels {
                cmd.end_label();
            }
            stats.executed_passes += 1;
        }

        // 输出资源转换到调用方要求的 layout，之后的使用者通过 semaphore 同步
        let mut trailing = PassBarriers::new();
        trailing.push(RgImageBarrierDesc::new(
            output.clone(),
            states.get(&output).copied().unwrap_or_default(),
            RgImageState::UNDEFINED.with_layout(output_layout),
        ));
        record_barriers(cmd, &resources, &trailing);
        stats.barriers += trailing.len();

        stats.render_pass_cache_misses = cache.created_passes() - created_passes;
        stats.framebuffer_cache_misses = cache.created_framebuffers() - created_framebuffers;
        log::debug!(
            "render graph: {} passes, {} barriers, {} render pass misses, {} framebuffer misses",
            stats.executed_passes,
            stats.barriers,
            stats.render_pass_cache_misses,
            stats.framebuffer_cache_misses
        );
        if config.log_execution_plan {
            log::info!("");
            log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
        }

        Ok(stats)
    }
}

// 调试输出
fn print_pass_plan(step: usize, total: usize, pass_name: &str, plan: &PassPlan) {
    log::info!("");
    log::info!("┌─────────────────────────────────────────────────────────────────┐");
    log::info!("│ [{}/{}] Pass: \"{}\"", step + 1, total, pass_name);
    log::info!("├─────────────────────────────────────────────────────────────────┤");

    for (name, usage, state) in &plan.usages {
        log::info!(
            "│   {} {:?} @ {:?} (stage: {}, access: {})",
            usage,
            name,
            state.layout,
            format_pipeline_stage(state.stage),
            format_access_flags(state.access)
        );
    }

    if plan.barriers.has_barriers() {
        log::info!("├─────────────────────────────────────────────────────────────────┤");
        log::info!("│ Barriers: {} image", plan.barriers.len());
        for barrier in &plan.barriers.image_barriers {
            let layout_change = if barrier.src_state.layout != barrier.dst_state.layout {
                format!("{:?} → {:?}", barrier.src_state.layout, barrier.dst_state.layout)
            } else {
                format!("{:?} (no layout change)", barrier.src_state.layout)
            };
            log::info!("│   🔒 Image {:?}:", barrier.name);
            log::info!("│       Layout: {}", layout_change);
            log::info!(
                "│       Stage:  {} → {}",
                format_pipeline_stage(barrier.src_state.stage),
                format_pipeline_stage(barrier.dst_state.stage)
            );
            log::info!(
                "│       Access: {} → {}",
                format_access_flags(barrier.src_state.src_access()),
                format_access_flags(barrier.dst_state.access)
            );
        }
    } else {
        log::info!("│ No barriers required");
    }

    log::info!("└─────────────────────────────────────────────────────────────────┘");
}

/// 格式化 PipelineStageFlags 为可读字符串
fn format_pipeline_stage(stage: vk::PipelineStageFlags) -> String {
    const NAMES: &[(vk::PipelineStageFlags, &str)] = &[
        (vk::PipelineStageFlags::TOP_OF_PIPE, "TOP_OF_PIPE"),
        (vk::PipelineStageFlags::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
        (vk::PipelineStageFlags::VERTEX_INPUT, "VERTEX_INPUT"),
        (vk::PipelineStageFlags::VERTEX_SHADER, "VERTEX_SHADER"),
        (vk::PipelineStageFlags::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
        (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
        (vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags::COMPUTE_SHADER, "COMPUTE_SHADER"),
        (vk::PipelineStageFlags::TRANSFER, "TRANSFER"),
        (vk::PipelineStageFlags::ALL_GRAPHICS, "ALL_GRAPHICS"),
        (vk::PipelineStageFlags::ALL_COMMANDS, "ALL_COMMANDS"),
    ];

    let stages = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if stages.is_empty() { format!("{:?}", stage) } else { stages.join(" | ") }
}

/// 格式化 AccessFlags 为可读字符串
fn format_access_flags(access: vk::AccessFlags) -> String {
    if access.is_empty() {
        return "NONE".to_string();
    }

    const NAMES: &[(vk::AccessFlags, &str)] = &[
        (vk::AccessFlags::INPUT_ATTACHMENT_READ, "INPUT_ATTACH_READ"),
        (vk::AccessFlags::UNIFORM_READ, "UNIFORM_READ"),
        (vk::AccessFlags::SHADER_READ, "SHADER_READ"),
        (vk::AccessFlags::SHADER_WRITE, "SHADER_WRITE"),
        (vk::AccessFlags::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
        (vk::AccessFlags::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
        (vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
        (vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
        (vk::AccessFlags::TRANSFER_READ, "TRANSFER_READ"),
        (vk::AccessFlags::TRANSFER_WRITE, "TRANSFER_WRITE"),
        (vk::AccessFlags::MEMORY_READ, "MEMORY_READ"),
        (vk::AccessFlags::MEMORY_WRITE, "MEMORY_WRITE"),
    ];

    let flags = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if flags.is_empty() { format!("{:?}", access) } else { flags.join(" | ") }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use kiln_crate_tools::init_log::take_captured_logs;

    use super::*;
    use crate::{
        config::RgConfig,
        test_utils::{MockEncoder, MockFactory, MockPass, Recorded, RecordedBarrier, attachment, attachment_with_format},
    };

    const CLEAR: Option<vk::ClearColorValue> = Some(vk::ClearColorValue { float32: [0.0; 4] });
    const PRESENT: vk::ImageLayout = vk::ImageLayout::PRESENT_SRC_KHR;

    fn image(id: u64) -> vk::Image {
        attachment(id).texture.image
    }

    fn cache() -> RenderGraphCache<Rc<MockFactory>> {
        let _ = kiln_crate_tools::init_log::try_init_log();
        RenderGraphCache::new(Rc::new(MockFactory::default()))
    }

    /// a 清除 x，b 采样 x 并写入 y
    fn simple_graph<'a>() -> RenderGraph<'a, MockEncoder> {
        let mut rg = RenderGraph::new();
        rg.push_attachment("x", attachment(1));
        rg.push_attachment("y", attachment(2));
        rg.push_pass(
            MockPass::new("b")
                .extent(64, 64)
                .push_texture_input("x")
                .push_color_output("y", CLEAR)
                .set_exec(|cx| cx.cmd.mark("b")),
        );
        rg.push_pass(
            MockPass::new("a").extent(64, 64).push_color_output("x", CLEAR).set_exec(|cx| cx.cmd.mark("a")),
        );
        rg.set_output("y", PRESENT);
        rg
    }

    #[test]
    fn test_commands_follow_dependency_order() {
        let mut cache = cache();
        let mut cmd = MockEncoder::default();

        let stats = simple_graph().exec(&mut cmd, &mut cache).unwrap();
        assert_eq!(cmd.markers(), ["a", "b"]);
        assert_eq!(stats.executed_passes, 2);
        // a: x，b: x 和 y，最后: y
        assert_eq!(stats.barriers, 4);

        let barriers = cmd.barriers();
        assert_eq!(barriers.len(), 3);
        assert_eq!(barriers[0].len(), 1);
        assert_eq!(barriers[0][0].image, image(1));
        assert_eq!(barriers[0][0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barriers[0][0].new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        assert_eq!(
            barriers[1].iter().map(|b| (b.image, b.old_layout, b.new_layout)).collect_vec(),
            [
                (image(1), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                (image(2), vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            ]
        );
        // 写后读需要 make available
        assert_eq!(barriers[1][0].src_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(barriers[1][0].dst_access, vk::AccessFlags::SHADER_READ);

        // 每个 pass: label, barrier, begin, exec, end, label
        assert!(matches!(&cmd.commands[0], Recorded::BeginLabel(name) if name == "a"));
        assert!(matches!(cmd.commands[1], Recorded::Barrier { .. }));
        assert!(matches!(cmd.commands[2], Recorded::BeginPass { clear_values: 1, .. }));
        assert_eq!(cmd.commands[3], Recorded::Marker("a".to_string()));
        assert_eq!(cmd.commands[4], Recorded::EndPass);
        assert_eq!(cmd.commands[5], Recorded::EndLabel);
    }

    #[test]
    fn test_trailing_output_transition() {
        let mut cache = cache();
        let mut cmd = MockEncoder::default();
        simple_graph().exec(&mut cmd, &mut cache).unwrap();

        let Some(Recorded::Barrier {
            src_stage,
            dst_stage,
            images,
        }) = cmd.commands.last()
        else {
            panic!("last command must be the output barrier");
        };
        assert_eq!(*src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(*dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert_eq!(
            images.as_slice(),
            [RecordedBarrier {
                image: image(2),
                old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                new_layout: PRESENT,
                src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access: vk::AccessFlags::empty(),
            }]
        );
    }

    #[test]
    fn test_second_reader_needs_no_barrier() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("x", attachment(1));
        rg.push_attachment("y", attachment(2));
        rg.push_pass(MockPass::new("a").extent(64, 64).push_color_output("x", CLEAR));
        rg.push_pass(MockPass::new("b").extent(64, 64).push_texture_input("x").push_color_output("y", CLEAR));
        rg.push_pass(MockPass::new("c").extent(64, 64).push_texture_input("x").push_color_output("y", None));
        rg.set_output("y", PRESENT);

        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache()).unwrap();

        let barriers = cmd.barriers();
        // a, b, c, 最后
        assert_eq!(barriers.len(), 4);
        // c 只需要等待 b 对 y 的写入
        assert_eq!(barriers[2].len(), 1);
        assert_eq!(barriers[2][0].image, image(2));
        assert_eq!(barriers[2][0].old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barriers[2][0].new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_pass_without_barriers_skips_barrier_command() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("history", attachment(1));
        rg.push_attachment("out", attachment(2));
        rg.push_initial_layout("history", vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        rg.push_initial_layout("out", vk::ImageLayout::PRESENT_SRC_KHR);
        rg.push_pass(
            MockPass::new("taa")
                .extent(64, 64)
                .push_texture_input("history")
                .push_virtual_dependent("out", RgImageState::COLOR_OUTPUT),
        );
        rg.set_output("out", PRESENT);

        let mut cmd = MockEncoder::default();
        let stats = rg.exec(&mut cmd, &mut cache()).unwrap();

        // 只剩下最后对输出的转换
        assert_eq!(stats.barriers, 1);
        assert_eq!(cmd.barriers().len(), 1);
        assert_eq!(cmd.barriers()[0][0].old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_initial_layout_seeds_tracked_state() {
        let build = |seed: bool| {
            let mut rg: RenderGraph<'_, MockEncoder> = RenderGraph::new();
            rg.push_attachment("history", attachment(1));
            rg.push_attachment("out", attachment(2));
            if seed {
                rg.push_initial_layout("history", vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            }
            rg.push_pass(
                MockPass::new("resolve").extent(64, 64).push_texture_input("history").push_color_output("out", CLEAR),
            );
            rg.set_output("out", PRESENT);
            rg
        };

        let mut cmd = MockEncoder::default();
        build(false).exec(&mut cmd, &mut cache()).unwrap();
        assert_eq!(cmd.barriers()[0].len(), 2);
        assert_eq!(cmd.barriers()[0][0].old_layout, vk::ImageLayout::UNDEFINED);

        let mut cmd = MockEncoder::default();
        build(true).exec(&mut cmd, &mut cache()).unwrap();
        assert_eq!(cmd.barriers()[0].len(), 1);
        assert_eq!(cmd.barriers()[0][0].image, image(2));
    }

    #[test]
    fn test_virtual_dependency_only_updates_state() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("swapchain", attachment(1));
        rg.push_pass(
            MockPass::new("ui")
                .extent(64, 64)
                .push_virtual_dependency("swapchain", RgImageState::COLOR_OUTPUT)
                .push_color_output("swapchain", None),
        );
        rg.set_output("swapchain", PRESENT);

        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache()).unwrap();

        let barriers = cmd.barriers();
        assert_eq!(barriers[0].len(), 1);
        assert_eq!(barriers[0][0].old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_explicit_dependency_always_emits() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("x", attachment(1));
        rg.push_attachment("y", attachment(2));
        rg.push_pass(MockPass::new("a").extent(64, 64).push_color_output("x", CLEAR));
        rg.push_pass(
            MockPass::new("b")
                .extent(64, 64)
                .push_texture_input("x")
                .push_dependency("x", RgImageState::TEXTURE_INPUT)
                .push_color_output("y", CLEAR),
        );
        rg.set_output("y", PRESENT);

        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache()).unwrap();

        let x_barriers = cmd.barriers()[1].iter().filter(|b| b.image == image(1)).count();
        assert_eq!(x_barriers, 2);
    }

    #[test]
    fn test_unreached_pass_runs_once_at_end() {
        let mut rg = simple_graph();
        rg.push_attachment("accum", attachment(3));
        rg.push_pass(
            MockPass::new("accumulate")
                .extent(64, 64)
                .push_texture_input("y")
                .set_exec(|cx| cx.cmd.mark("accumulate")),
        );

        let mut cmd = MockEncoder::default();
        let stats = rg.exec(&mut cmd, &mut cache()).unwrap();
        assert_eq!(cmd.markers(), ["a", "b", "accumulate"]);
        assert_eq!(stats.executed_passes, 3);
    }

    #[test]
    fn test_callbacks_receive_pass_context() {
        let seen = RefCell::new(Vec::new());

        let mut rg = RenderGraph::new();
        rg.push_attachment("out", attachment(7));
        rg.push_pass(
            MockPass::new("blit")
                .extent(32, 16)
                .push_color_output("out", CLEAR)
                .set_pre_exec(|cx| cx.cmd.mark("pre"))
                .set_exec(|cx| {
                    cx.cmd.mark("exec");
                    seen.borrow_mut().push((cx.pass_name.to_string(), cx.extent, cx.attachment("out")));
                }),
        );
        rg.set_output("out", PRESENT);

        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache()).unwrap();

        assert_eq!(
            seen.into_inner(),
            [(
                "blit".to_string(),
                vk::Extent2D {
                    width: 32,
                    height: 16
                },
                attachment(7)
            )]
        );
        let pre = cmd.commands.iter().position(|c| *c == Recorded::Marker("pre".to_string())).unwrap();
        let begin = cmd.commands.iter().position(|c| matches!(c, Recorded::BeginPass { .. })).unwrap();
        let exec = cmd.commands.iter().position(|c| *c == Recorded::Marker("exec".to_string())).unwrap();
        assert!(pre < begin && begin < exec);
    }

    #[test]
    fn test_render_pass_key_layout() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("feedback", attachment(1));
        rg.push_attachment("depth", attachment_with_format(2, vk::Format::D24_UNORM_S8_UINT));
        rg.push_attachment("color", attachment(3));
        rg.push_attachment("resolve0", attachment(4));
        rg.push_attachment("resolve1", attachment(5));
        rg.push_pass(
            MockPass::new("forward")
                .extent(64, 64)
                .push_input_attachment("feedback", true, CLEAR)
                .set_depth_stencil("depth", Some(vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 }))
                .push_color_output("color", None)
                .push_resolve_output("resolve0", None)
                .push_resolve_output("resolve1", None),
        );
        rg.set_output("resolve1", PRESENT);

        let mut cache = cache();
        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache).unwrap();

        let keys = cache.factory().render_passes.borrow();
        let key = &keys[0];
        let layouts = key.attachments.iter().map(|a| a.layout).collect_vec();
        assert_eq!(
            layouts,
            [
                vk::ImageLayout::GENERAL,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ]
        );
        assert_eq!(key.input_refs.iter().map(|r| r.attachment).collect_vec(), [0]);
        assert_eq!(key.color_refs.iter().map(|r| r.attachment).collect_vec(), [0, 2]);
        assert_eq!(key.resolve_refs.iter().map(|r| r.attachment).collect_vec(), [3, 4]);
        assert_eq!(key.depth_stencil_ref.map(|r| r.attachment), Some(1));

        assert_eq!(key.attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(key.attachments[1].stencil_load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(key.attachments[2].load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(key.attachments[2].stencil_load_op, vk::AttachmentLoadOp::DONT_CARE);

        assert!(matches!(cmd.commands[2], Recorded::BeginPass { clear_values: 5, .. }));

        let framebuffers = cache.factory().framebuffers.borrow();
        assert_eq!(framebuffers[0].attachments.len(), 5);
        assert_eq!(framebuffers[0].attachments[1], attachment(2).texture.image_view);
    }

    #[test]
    fn test_cache_reused_across_frames() {
        let mut cache = cache();

        let mut cmd = MockEncoder::default();
        let first = simple_graph().exec(&mut cmd, &mut cache).unwrap();
        // a 和 b 的 attachment 描述相同，共享一个 render pass
        assert_eq!(first.render_pass_cache_misses, 1);
        assert_eq!(first.framebuffer_cache_misses, 2);

        let mut cmd = MockEncoder::default();
        let second = simple_graph().exec(&mut cmd, &mut cache).unwrap();
        assert_eq!(second.render_pass_cache_misses, 0);
        assert_eq!(second.framebuffer_cache_misses, 0);
        assert_eq!(cache.len_passes(), 1);
        assert_eq!(cache.len_framebuffers(), 2);

        let factory = Rc::clone(cache.factory());
        drop(cache);
        assert_eq!(factory.destroyed_render_passes.get(), 1);
        assert_eq!(factory.destroyed_framebuffers.get(), 2);
    }

    #[test]
    fn test_undeclared_resource_records_nothing() {
        let mut rg = RenderGraph::new();
        rg.push_attachment("y", attachment(1));
        rg.push_pass(MockPass::new("p").push_texture_input("ghost").push_color_output("y", CLEAR));
        rg.set_output("y", PRESENT);

        let mut cache = cache();
        let mut cmd = MockEncoder::default();
        let err = rg.exec(&mut cmd, &mut cache).unwrap_err();
        assert!(matches!(err, RgError::UndeclaredResource { .. }));
        assert!(cmd.commands.is_empty());
        assert_eq!(cache.len_passes(), 0);
    }

    #[test]
    fn test_creation_failure_propagates() {
        let mut cache = cache();
        cache.factory().fail_render_pass.set(Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        take_captured_logs();

        let mut cmd = MockEncoder::default();
        let err = simple_graph().exec(&mut cmd, &mut cache).unwrap_err();
        assert!(!err.is_contract_violation());
        assert!(matches!(
            err,
            RgError::ObjectCreation {
                object: RgObjectKind::RenderPass,
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
                ..
            }
        ));
        assert_eq!(cmd.begin_passes(), 0);

        let errors = take_captured_logs().into_iter().filter(|(level, _)| *level == log::Level::Error).collect_vec();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("failed to create render pass for pass \"a\""));
    }

    #[test]
    #[should_panic(expected = "failed to create render pass")]
    fn test_fatal_policy_panics() {
        let mut cache = cache();
        cache.factory().fail_render_pass.set(Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY));

        let mut rg = simple_graph();
        rg.config = RgConfig::default().creation_failure(RgFailurePolicy::Fatal);
        let _ = rg.exec(&mut MockEncoder::default(), &mut cache);
    }

    #[test]
    fn test_labels_can_be_disabled() {
        let mut rg = RenderGraph::with_config(RgConfig::default().debug_labels(false).log_execution_plan(true));
        rg.push_attachment("out", attachment(1));
        rg.push_pass(MockPass::new("p").extent(64, 64).push_color_output("out", CLEAR));
        rg.set_output("out", PRESENT);

        let mut cmd = MockEncoder::default();
        rg.exec(&mut cmd, &mut cache()).unwrap();
        assert!(!cmd.commands.iter().any(|c| matches!(c, Recorded::BeginLabel(_) | Recorded::EndLabel)));
    }

    #[test]
    fn test_format_flags() {
        assert_eq!(format_access_flags(vk::AccessFlags::empty()), "NONE");
        assert_eq!(
            format_pipeline_stage(RgImageState::DEPTH_STENCIL_WRITE.stage),
            "EARLY_FRAGMENT_TESTS | LATE_FRAGMENT_TESTS"
        );
        assert_eq!(
            format_access_flags(RgImageState::COLOR_OUTPUT.access),
            "COLOR_ATTACH_READ | COLOR_ATTACH_WRITE"
        );
    }
}
