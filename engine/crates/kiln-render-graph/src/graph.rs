//! 渲染图的声明部分
//!
//! 每帧创建一个新的 [`RenderGraph`]：声明资源、推入 pass、指定输出，然后调用 `exec`。
//! 跨帧的状态（ping-pong 资源的 layout）只能通过 `push_initial_layout` 传入。

use std::collections::{HashMap, HashSet};

use ash::vk;
use itertools::Itertools;
use kiln_gfx::commands::command_buffer::GfxCommandBuffer;

use crate::{
    config::RgConfig,
    error::RgError,
    name::Name,
    pass::RenderPass,
    resource::{PassAttachment, PassBuffer, RgResources},
};

pub struct RenderGraph<'a, E = GfxCommandBuffer> {
    pub(crate) resources: RgResources,
    pub(crate) initial_layouts: HashMap<Name, vk::ImageLayout>,
    pub(crate) passes: Vec<RenderPass<'a, E>>,
    pub(crate) output: Option<(Name, vk::ImageLayout)>,

    pub(crate) config: RgConfig,
}

impl<E> Default for RenderGraph<'_, E> {
    fn default() -> Self {
        Self::with_config(RgConfig::default())
    }
}

// new & init
impl<'a, E> RenderGraph<'a, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RgConfig) -> Self {
        Self {
            resources: RgResources::default(),
            initial_layouts: HashMap::new(),
            passes: Vec::new(),
            output: None,
            config,
        }
    }
}

// 资源声明
impl<'a, E> RenderGraph<'a, E> {
    /// 注册 image 资源，同名时覆盖
    pub fn push_attachment(&mut self, name: impl Into<Name>, attachment: PassAttachment) {
        self.resources.attachments.insert(name.into(), attachment);
    }

    /// 注册 buffer 资源，同名时覆盖
    pub fn push_buffer(&mut self, name: impl Into<Name>, buffer: PassBuffer) {
        self.resources.buffers.insert(name.into(), buffer);
    }

    /// 资源在本帧开始时的 layout，例如上一帧写入的 history buffer
    pub fn push_initial_layout(&mut self, name: impl Into<Name>, layout: vk::ImageLayout) {
        self.initial_layouts.insert(name.into(), layout);
    }

    /// 推入的顺序只是候选顺序，实际执行顺序由依赖关系决定
    pub fn push_pass(&mut self, pass: RenderPass<'a, E>) {
        self.passes.push(pass);
    }

    /// 指定本帧对外可见的结果以及它最终需要处于的 layout
    pub fn set_output(&mut self, name: impl Into<Name>, final_layout: vk::ImageLayout) {
        self.output = Some((name.into(), final_layout));
    }
}

// getters
impl<'a, E> RenderGraph<'a, E> {
    /// # Panics
    /// 名字没有声明过时 panic
    #[inline]
    pub fn attachment(&self, name: &str) -> PassAttachment {
        self.resources.attachment(name)
    }

    #[inline]
    pub fn try_attachment(&self, name: &str) -> Option<PassAttachment> {
        self.resources.try_attachment(name)
    }

    /// # Panics
    /// 名字没有声明过时 panic
    #[inline]
    pub fn buffer(&self, name: &str) -> PassBuffer {
        self.resources.buffer(name)
    }

    #[inline]
    pub fn try_buffer(&self, name: &str) -> Option<PassBuffer> {
        self.resources.try_buffer(name)
    }

    #[inline]
    pub fn resources(&self) -> &RgResources {
        &self.resources
    }

    #[inline]
    pub fn config(&self) -> &RgConfig {
        &self.config
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn pass_name(&self, index: usize) -> &str {
        self.passes[index].name()
    }
}

// 校验与排序
impl<'a, E> RenderGraph<'a, E> {
    /// 所有 pass 引用的资源都必须已经声明
    pub(crate) fn validate(&self) -> Result<(&Name, vk::ImageLayout), RgError> {
        let (output, output_layout) = self.output.as_ref().ok_or(RgError::NoOutput)?;
        if !self.resources.contains_attachment(output) {
            return Err(RgError::UndeclaredOutput(output.clone()));
        }

        for pass in &self.passes {
            if let Some(res) = pass.referenced().find(|res| !self.resources.contains_attachment(res)) {
                return Err(RgError::UndeclaredResource {
                    pass: pass.name.clone(),
                    resource: res.clone(),
                });
            }

            let color = pass.color_attachment_count();
            let resolve = pass.resolve_outputs.len();
            if resolve != 0 && resolve != color {
                return Err(RgError::ResolveCountMismatch {
                    pass: pass.name.clone(),
                    color,
                    resolve,
                });
            }
        }

        Ok((output, *output_layout))
    }

    /// 计算执行顺序，返回 pass 在推入顺序中的下标
    ///
    /// 1. 从输出资源开始反向搜索所有写入者，再递归搜索写入者读取的资源
    /// 2. 反转之后去重（保留第一次出现），生产者排在消费者之前
    /// 3. 没有被搜索到的 pass（没有可追踪的写入目标）按推入顺序追加在最后
    pub fn resolve_execution_order(&self) -> Result<Vec<usize>, RgError> {
        let (output, _) = self.validate()?;

        let mut writers = Vec::new();
        let mut active = Vec::new();
        self.push_writers(output, &mut writers, &mut active);

        let mut seen = HashSet::with_capacity(self.passes.len());
        let mut order = writers.into_iter().rev().filter(|i| seen.insert(*i)).collect_vec();
        order.extend((0..self.passes.len()).filter(|i| !seen.contains(i)));

        log::debug!("render graph execution order: [{}]", order.iter().map(|&i| self.passes[i].name()).join(" → "));
        Ok(order)
    }

    /// 把 `res` 的所有写入者追加到 `all_writers`，然后递归它们的读取
    ///
    /// 同一个资源的多个写入者按推入顺序的逆序追加，反转后保持推入顺序。
    /// `active` 是当前递归路径上的资源，pass 读取自己写入的资源（不带 clear 的 color output）时不再重复进入。
    /// 不在 `active` 中的资源每次遇到都要重新展开：反转去重后由最后一次出现决定位置。
    fn push_writers(&self, res: &Name, all_writers: &mut Vec<usize>, active: &mut Vec<Name>) {
        if active.contains(res) {
            return;
        }

        let writers = self.passes.iter().positions(|pass| pass.writes(res)).collect_vec();
        if writers.is_empty() {
            return;
        }
        all_writers.extend(writers.iter().rev());

        active.push(res.clone());
        for &i in &writers {
            for read in self.passes[i].reads() {
                self.push_writers(read, all_writers, active);
            }
        }
        active.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resource_state::RgImageState,
        test_utils::{MockEncoder, attachment},
    };

    fn graph_with(names: &[&str]) -> RenderGraph<'static, MockEncoder> {
        let mut rg = RenderGraph::new();
        for (i, name) in names.iter().enumerate() {
            rg.push_attachment(*name, attachment(i as u64 + 1));
        }
        rg
    }

    const CLEAR: Option<vk::ClearColorValue> = Some(vk::ClearColorValue { float32: [0.0; 4] });

    fn names(rg: &RenderGraph<'_, MockEncoder>) -> Vec<String> {
        rg.resolve_execution_order().unwrap().into_iter().map(|i| rg.pass_name(i).to_string()).collect()
    }

    #[test]
    fn test_producer_before_consumer() {
        let mut rg = graph_with(&["x", "y"]);
        rg.push_pass(RenderPass::new("b").push_texture_input("x").push_color_output("y", CLEAR));
        rg.push_pass(RenderPass::new("a").push_color_output("x", CLEAR));
        rg.set_output("y", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["a", "b"]);
    }

    #[test]
    fn test_shared_producer_appears_once() {
        // p 生成 x，q 和 r 都读取 x，s 读取 q、r 的结果
        let mut rg = graph_with(&["x", "qx", "rx", "out"]);
        rg.push_pass(RenderPass::new("p").push_color_output("x", CLEAR));
        rg.push_pass(RenderPass::new("q").push_texture_input("x").push_color_output("qx", CLEAR));
        rg.push_pass(RenderPass::new("r").push_texture_input("x").push_color_output("rx", CLEAR));
        rg.push_pass(
            RenderPass::new("s").push_texture_input("qx").push_texture_input("rx").push_color_output("out", CLEAR),
        );
        rg.set_output("out", vk::ImageLayout::PRESENT_SRC_KHR);

        let order = names(&rg);
        assert_eq!(order.iter().filter(|n| *n == "p").count(), 1);
        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(pos("p") < pos("q"));
        assert!(pos("p") < pos("r"));
        assert!(pos("q") < pos("s"));
        assert!(pos("r") < pos("s"));
    }

    #[test]
    fn test_diamond_keeps_transitive_order() {
        // c 读取 a 和 b，b 也读取 a
        let mut rg = graph_with(&["a", "b", "c"]);
        rg.push_pass(RenderPass::new("c").push_texture_input("a").push_texture_input("b").push_color_output("c", CLEAR));
        rg.push_pass(RenderPass::new("b").push_texture_input("a").push_color_output("b", CLEAR));
        rg.push_pass(RenderPass::new("a").push_color_output("a", CLEAR));
        rg.set_output("c", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["a", "b", "c"]);
    }

    #[test]
    fn test_unreached_passes_run_last() {
        let mut rg = graph_with(&["x", "y", "accum"]);
        rg.push_pass(RenderPass::new("accumulate").push_texture_input("y"));
        rg.push_pass(RenderPass::new("b").push_texture_input("x").push_color_output("y", CLEAR));
        rg.push_pass(RenderPass::new("a").push_color_output("x", CLEAR));
        rg.push_pass(RenderPass::new("debug").push_texture_input("x"));
        rg.set_output("y", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["a", "b", "accumulate", "debug"]);
    }

    #[test]
    fn test_depth_read_recurses_to_writer() {
        let mut rg = graph_with(&["depth", "color"]);
        rg.push_pass(
            RenderPass::new("forward").set_depth_stencil("depth", None).push_color_output("color", CLEAR),
        );
        rg.push_pass(RenderPass::new("prepass").set_depth_stencil(
            "depth",
            Some(vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 }),
        ));
        rg.set_output("color", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["prepass", "forward"]);
    }

    #[test]
    fn test_load_of_own_output_keeps_declaration_order() {
        // clear 之后 overlay 在同一个目标上叠加绘制
        let mut rg = graph_with(&["scene", "out"]);
        rg.push_pass(RenderPass::new("scene").push_color_output("scene", CLEAR));
        rg.push_pass(RenderPass::new("clear").push_texture_input("scene").push_color_output("out", CLEAR));
        rg.push_pass(RenderPass::new("overlay").push_color_output("out", None));
        rg.set_output("out", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["scene", "clear", "overlay"]);
    }

    #[test]
    fn test_dependent_counts_as_writer() {
        let mut rg = graph_with(&["shadow", "out"]);
        rg.push_pass(RenderPass::new("light").push_dependency("shadow", RgImageState::TEXTURE_INPUT).push_color_output(
            "out",
            CLEAR,
        ));
        rg.push_pass(RenderPass::new("shadow").push_dependent("shadow", RgImageState::DEPTH_STENCIL_WRITE));
        rg.set_output("out", vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(names(&rg), ["shadow", "light"]);
    }

    #[test]
    fn test_validation_errors() {
        let mut rg = graph_with(&["y"]);
        assert!(matches!(rg.resolve_execution_order(), Err(RgError::NoOutput)));

        rg.set_output("missing", vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(matches!(rg.resolve_execution_order(), Err(RgError::UndeclaredOutput(_))));

        rg.set_output("y", vk::ImageLayout::PRESENT_SRC_KHR);
        rg.push_pass(RenderPass::new("p").push_texture_input("ghost").push_color_output("y", CLEAR));
        let err = rg.resolve_execution_order().unwrap_err();
        assert!(err.is_contract_violation());
        match err {
            RgError::UndeclaredResource { pass, resource } => {
                assert_eq!(pass, "p");
                assert_eq!(resource.as_str(), "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_count_must_match() {
        let mut rg = graph_with(&["msaa0", "msaa1", "resolved"]);
        rg.push_pass(
            RenderPass::new("p")
                .push_color_output("msaa0", CLEAR)
                .push_color_output("msaa1", CLEAR)
                .push_resolve_output("resolved", None),
        );
        rg.set_output("resolved", vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(matches!(
            rg.resolve_execution_order(),
            Err(RgError::ResolveCountMismatch { color: 2, resolve: 1, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "not declared")]
    fn test_lookup_of_undeclared_panics() {
        let rg = graph_with(&["y"]);
        let _ = rg.attachment("nope");
    }
}
