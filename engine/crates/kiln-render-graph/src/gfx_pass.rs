//! 渲染功能模块的统一接口
//!
//! 每个功能模块（阴影、延迟光照、后处理……）持有自己的 pipeline 等长期资源，
//! 每帧向渲染图声明资源并提供若干个 [`RenderPass`]。

use kiln_gfx::{
    commands::{command_buffer::GfxCommandBuffer, encoder::GfxCommandEncoder},
    foundation::error::GfxError,
};

use crate::{graph::RenderGraph, pass::RenderPass};

/// 渲染功能模块
///
/// `Cx` 是渲染器提供的上下文（设备、分配器、render target cache 等），由调用方决定。
///
/// # 调用顺序
/// 1. `init`：创建长期资源，只调用一次
/// 2. 每帧：`add_resources` → `build_passes`
/// 3. `cleanup`：销毁长期资源
pub trait GfxPass<Cx, E: GfxCommandEncoder = GfxCommandBuffer> {
    fn name(&self) -> &str;

    fn init(&mut self, _cx: &mut Cx) -> Result<(), GfxError> {
        Ok(())
    }

    fn cleanup(&mut self, _cx: &mut Cx) {}

    /// 向本帧的图声明这个模块拥有的资源，例如 render target
    fn add_resources(&mut self, cx: &mut Cx, graph: &mut RenderGraph<'_, E>) -> Result<(), GfxError>;

    /// 返回的 pass 可以借用 `self` 和 `cx`
    fn build_passes<'a>(&'a self, cx: &'a Cx) -> Vec<RenderPass<'a, E>>;
}

/// 按注册顺序管理一组 [`GfxPass`]
pub struct GfxPassSet<Cx, E: GfxCommandEncoder = GfxCommandBuffer> {
    passes: Vec<Box<dyn GfxPass<Cx, E>>>,
    /// 已经 init 成功的数量
    initialized: usize,
}

impl<Cx, E: GfxCommandEncoder> Default for GfxPassSet<Cx, E> {
    fn default() -> Self {
        Self {
            passes: Vec::new(),
            initialized: 0,
        }
    }
}

impl<Cx, E: GfxCommandEncoder> GfxPassSet<Cx, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pass: impl GfxPass<Cx, E> + 'static) {
        self.passes.push(Box::new(pass));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// 按注册顺序 init 所有模块
    ///
    /// 某个模块失败时，已经 init 的模块按相反顺序 cleanup，然后返回错误
    pub fn init_all(&mut self, cx: &mut Cx) -> Result<(), GfxError> {
        while self.initialized < self.passes.len() {
            let pass = &mut self.passes[self.initialized];
            if let Err(err) = pass.init(cx) {
                log::error!("GfxPass \"{}\" init failed: {err}", pass.name());
                self.cleanup_all(cx);
                return Err(err);
            }
            log::debug!("GfxPass \"{}\" initialized", pass.name());
            self.initialized += 1;
        }
        Ok(())
    }

    /// 按注册的相反顺序 cleanup 所有已经 init 的模块
    pub fn cleanup_all(&mut self, cx: &mut Cx) {
        for pass in self.passes[..self.initialized].iter_mut().rev() {
            pass.cleanup(cx);
        }
        self.initialized = 0;
    }

    /// 每帧调用：先让所有模块声明资源，再按注册顺序推入它们的 pass
    pub fn build_graph<'a>(&'a mut self, cx: &'a mut Cx, graph: &mut RenderGraph<'a, E>) -> Result<(), GfxError> {
        for pass in &mut self.passes {
            pass.add_resources(cx, graph)?;
        }

        let this: &'a Self = self;
        let cx: &'a Cx = cx;
        for pass in &this.passes {
            for render_pass in pass.build_passes(cx) {
                graph.push_pass(render_pass);
            }
        }
        Ok(())
    }
}

impl<Cx, E: GfxCommandEncoder> Drop for GfxPassSet<Cx, E> {
    fn drop(&mut self) {
        if self.initialized != 0 {
            log::warn!("GfxPassSet dropped with {} passes not cleaned up", self.initialized);
        }
    }
}
