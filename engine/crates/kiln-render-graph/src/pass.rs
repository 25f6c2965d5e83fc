//! RenderPass 描述
//!
//! pass 通过 builder 声明它使用的资源以及每种用法，推入 [`crate::graph::RenderGraph`] 之后由图决定执行顺序和 barrier。

use ash::vk;
use kiln_gfx::commands::{command_buffer::GfxCommandBuffer, encoder::GfxCommandEncoder};

use crate::{
    name::Name,
    resource::{PassAttachment, PassBuffer, RgResources},
    resource_state::RgImageState,
};

/// pass 回调的执行上下文
///
/// 回调执行时 layout 已经全部转换完毕，RenderPass/Framebuffer 对象已经创建。
pub struct RgPassContext<'c, E = GfxCommandBuffer> {
    /// 录制命令
    pub cmd: &'c mut E,
    /// 本帧声明的所有资源
    pub resources: &'c RgResources,
    /// 当前 pass 对应的 VkRenderPass，用于创建或查找 pipeline
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pass_name: &'c str,
}

impl<E> RgPassContext<'_, E> {
    /// # Panics
    /// 名字没有声明过时 panic
    #[inline]
    pub fn attachment(&self, name: &str) -> PassAttachment {
        self.resources.attachment(name)
    }

    /// # Panics
    /// 名字没有声明过时 panic
    #[inline]
    pub fn buffer(&self, name: &str) -> PassBuffer {
        self.resources.buffer(name)
    }
}

/// pass 回调，每帧最多执行一次
pub type RgPassCallback<'a, E> = Box<dyn FnOnce(&mut RgPassContext<'_, E>) + 'a>;

/// 显式声明的状态要求
///
/// `is_virtual` 表示只更新跟踪状态、不发出 barrier，用于转换已经由其他机制保证的情况
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgExplicitState {
    pub state: RgImageState,
    pub is_virtual: bool,
}

/// 一个 pass 的声明
///
/// # 使用示例
/// ```ignore
/// let pass = RenderPass::new("composite")
///     .extent(width, height)
///     .push_texture_input("pbr.out")
///     .push_color_output("composite.out", Some(CLEAR_BLACK))
///     .set_exec(move |cx| {
///         cx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
///         cx.cmd.cmd_draw(3, 1, 0, 0);
///     });
/// rg.push_pass(pass);
/// ```
pub struct RenderPass<'a, E = GfxCommandBuffer> {
    pub(crate) name: String,

    pub width: u32,
    pub height: u32,
    pub layers: u32,

    /// clear 值存在表示这个 pass 写入（清除）深度，否则只读
    pub(crate) depth_stencil: Option<(Name, Option<vk::ClearDepthStencilValue>)>,
    pub(crate) color_outputs: Vec<(Name, Option<vk::ClearColorValue>)>,
    pub(crate) resolve_outputs: Vec<(Name, Option<vk::ClearColorValue>)>,
    /// (name, self, clear)
    pub(crate) input_attachments: Vec<(Name, bool, Option<vk::ClearColorValue>)>,
    pub(crate) texture_inputs: Vec<Name>,
    pub(crate) dependencies: Vec<(Name, RgExplicitState)>,
    pub(crate) dependents: Vec<(Name, RgExplicitState)>,

    pub(crate) pre_exec: Option<RgPassCallback<'a, E>>,
    pub(crate) exec: Option<RgPassCallback<'a, E>>,
}

// new & builder
impl<'a, E: GfxCommandEncoder> RenderPass<'a, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 0,
            height: 0,
            layers: 1,
            depth_stencil: None,
            color_outputs: Vec::new(),
            resolve_outputs: Vec::new(),
            input_attachments: Vec::new(),
            texture_inputs: Vec::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            pre_exec: None,
            exec: None,
        }
    }

    /// builder
    #[inline]
    pub fn extent(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// builder
    #[inline]
    pub fn layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    /// builder
    ///
    /// 带 clear 值时这个 pass 被视为深度的写入者
    pub fn set_depth_stencil(mut self, name: impl Into<Name>, clear: Option<vk::ClearDepthStencilValue>) -> Self {
        self.depth_stencil = Some((name.into(), clear));
        self
    }

    /// builder
    ///
    /// 不带 clear 时会 LOAD 之前的内容，因此也依赖之前的写入者
    pub fn push_color_output(mut self, name: impl Into<Name>, clear: Option<vk::ClearColorValue>) -> Self {
        self.color_outputs.push((name.into(), clear));
        self
    }

    /// builder
    pub fn push_resolve_output(mut self, name: impl Into<Name>, clear: Option<vk::ClearColorValue>) -> Self {
        self.resolve_outputs.push((name.into(), clear));
        self
    }

    /// builder
    ///
    /// `is_self` 表示这个资源同时也是本 pass 的 color attachment（读-改-写）
    pub fn push_input_attachment(
        mut self,
        name: impl Into<Name>,
        is_self: bool,
        clear: Option<vk::ClearColorValue>,
    ) -> Self {
        self.input_attachments.push((name.into(), is_self, clear));
        self
    }

    /// builder
    pub fn push_texture_input(mut self, name: impl Into<Name>) -> Self {
        self.texture_inputs.push(name.into());
        self
    }

    /// builder
    ///
    /// pass 开始前资源必须处于 `state`
    pub fn push_dependency(mut self, name: impl Into<Name>, state: RgImageState) -> Self {
        self.dependencies.push((
            name.into(),
            RgExplicitState {
                state,
                is_virtual: false,
            },
        ));
        self
    }

    /// builder
    pub fn push_virtual_dependency(mut self, name: impl Into<Name>, state: RgImageState) -> Self {
        self.dependencies.push((
            name.into(),
            RgExplicitState {
                state,
                is_virtual: true,
            },
        ));
        self
    }

    /// builder
    ///
    /// pass 结束后资源处于 `state`，同时这个 pass 被视为资源的写入者
    pub fn push_dependent(mut self, name: impl Into<Name>, state: RgImageState) -> Self {
        self.dependents.push((
            name.into(),
            RgExplicitState {
                state,
                is_virtual: false,
            },
        ));
        self
    }

    /// builder
    pub fn push_virtual_dependent(mut self, name: impl Into<Name>, state: RgImageState) -> Self {
        self.dependents.push((
            name.into(),
            RgExplicitState {
                state,
                is_virtual: true,
            },
        ));
        self
    }

    /// builder
    ///
    /// 在 render pass 内部执行
    pub fn set_exec(mut self, exec: impl FnOnce(&mut RgPassContext<'_, E>) + 'a) -> Self {
        self.exec = Some(Box::new(exec));
        self
    }

    /// builder
    ///
    /// 在 render pass 开始之前执行，用于必须在 pass 外部录制的命令（例如 buffer 更新）
    pub fn set_pre_exec(mut self, pre_exec: impl FnOnce(&mut RgPassContext<'_, E>) + 'a) -> Self {
        self.pre_exec = Some(Box::new(pre_exec));
        self
    }
}

// getters
impl<E> RenderPass<'_, E> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// render area
    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

// 依赖分析
impl<E> RenderPass<'_, E> {
    /// 这个 pass 是否写入 `res`
    ///
    /// color output、resolve output、dependent，以及带 clear 的深度都算写入
    pub(crate) fn writes(&self, res: &Name) -> bool {
        self.color_outputs.iter().any(|(name, _)| name == res)
            || self.resolve_outputs.iter().any(|(name, _)| name == res)
            || self.dependents.iter().any(|(name, _)| name == res)
            || self.depth_stencil.as_ref().is_some_and(|(name, clear)| clear.is_some() && name == res)
    }

    /// 这个 pass 执行前需要其他 pass 先写入的资源
    ///
    /// 不带 clear 的深度、不带 clear 的 color output、非 self 的 input attachment、texture input 以及显式依赖
    pub(crate) fn reads(&self) -> impl Iterator<Item = &Name> + '_ {
        let depth = self.depth_stencil.iter().filter(|(_, clear)| clear.is_none()).map(|(name, _)| name);
        let colors = self.color_outputs.iter().filter(|(_, clear)| clear.is_none()).map(|(name, _)| name);
        let inputs = self.input_attachments.iter().filter(|(_, is_self, _)| !is_self).map(|(name, _, _)| name);

        depth
            .chain(colors)
            .chain(inputs)
            .chain(self.texture_inputs.iter())
            .chain(self.dependencies.iter().map(|(name, _)| name))
    }

    /// pass 引用的所有资源名，用于校验
    pub(crate) fn referenced(&self) -> impl Iterator<Item = &Name> + '_ {
        self.depth_stencil
            .iter()
            .map(|(name, _)| name)
            .chain(self.color_outputs.iter().map(|(name, _)| name))
            .chain(self.resolve_outputs.iter().map(|(name, _)| name))
            .chain(self.input_attachments.iter().map(|(name, _, _)| name))
            .chain(self.texture_inputs.iter())
            .chain(self.dependencies.iter().map(|(name, _)| name))
            .chain(self.dependents.iter().map(|(name, _)| name))
    }

    /// subpass 中 color attachment 的数量：self input attachment 加上 color output
    pub(crate) fn color_attachment_count(&self) -> usize {
        self.input_attachments.iter().filter(|(_, is_self, _)| *is_self).count() + self.color_outputs.len()
    }
}
