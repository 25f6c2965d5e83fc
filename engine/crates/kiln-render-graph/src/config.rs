/// RenderPass / Framebuffer 创建失败时的处理方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RgFailurePolicy {
    /// 返回 `RgError::ObjectCreation`，调用方放弃这一帧
    #[default]
    Propagate,
    /// 记录日志后 panic
    Fatal,
}

/// 渲染图的运行配置
#[derive(Clone, Debug)]
pub struct RgConfig {
    pub creation_failure: RgFailurePolicy,
    /// 执行时以 info 级别打印每个 pass 的资源用法和 barrier
    pub log_execution_plan: bool,
    /// 每个 pass 包裹在一个 debug label 中
    pub debug_labels: bool,
}

impl Default for RgConfig {
    fn default() -> Self {
        Self {
            creation_failure: RgFailurePolicy::Propagate,
            log_execution_plan: false,
            debug_labels: true,
        }
    }
}

impl RgConfig {
    /// builder
    #[inline]
    pub fn creation_failure(mut self, policy: RgFailurePolicy) -> Self {
        self.creation_failure = policy;
        self
    }

    /// builder
    #[inline]
    pub fn log_execution_plan(mut self, enable: bool) -> Self {
        self.log_execution_plan = enable;
        self
    }

    /// builder
    #[inline]
    pub fn debug_labels(mut self, enable: bool) -> Self {
        self.debug_labels = enable;
        self
    }
}
