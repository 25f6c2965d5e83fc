/// 延迟执行的清理回调
///
/// `flush` 按插入的逆序执行，后创建的资源先销毁。
/// 只有持有者确认 GPU 已经不再使用这些资源时才能调用 `flush`；
/// drop 时仍未执行的回调会被丢弃而不执行，对应的资源泄漏。
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<Box<dyn FnOnce()>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, deletor: impl FnOnce() + 'static) {
        self.deletors.push(Box::new(deletor));
    }

    pub fn flush(&mut self) {
        while let Some(deletor) = self.deletors.pop() {
            deletor();
        }
    }

    /// 丢弃所有回调而不执行
    ///
    /// 用于无法确认 GPU 是否完成的情况（例如 device lost），宁可泄漏也不销毁可能还在使用的资源
    pub fn discard(&mut self) {
        if !self.deletors.is_empty() {
            log::error!("DeletionQueue: leaking {} deletors", self.deletors.len());
            self.deletors.clear();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        if !self.deletors.is_empty() {
            log::warn!("DeletionQueue dropped with {} pending deletors, leaking", self.deletors.len());
            self.discard();
        }
    }
}
