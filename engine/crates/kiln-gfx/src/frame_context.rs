//! 单帧命令录制与资源生命周期
//!
//! 一帧的流程：
//! 1. [`GfxFrameContext::new`] 从 pool 中取出 command buffer
//! 2. 录制命令，期间可以把只在本帧使用的 buffer / texture / 回调绑定到帧上
//! 3. [`GfxFrameContext::submit`] 提交并返回 [`GfxPendingFrame`]
//! 4. [`GfxPendingFrame::wait`] 等待 fence，然后归还 command buffer 并执行所有绑定的清理
//!
//! 无法确认 GPU 已经完成时，绑定的清理永远不会执行。

use std::{rc::Rc, sync::Arc};

use ash::vk;

use crate::{
    commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool},
    foundation::error::GfxError,
    resources::{allocator::GfxAllocator, buffer::GfxBuffer, texture::GfxTexture},
    utilities::deletion_queue::DeletionQueue,
};

pub struct GfxFrameContext {
    cmd: GfxCommandBuffer,
    pool: Arc<GfxCommandPool>,
    device: ash::Device,

    deletion_queue: DeletionQueue,
    debug_name: String,
}

// new & init
impl GfxFrameContext {
    pub fn new(pool: Arc<GfxCommandPool>, device: &ash::Device, debug_name: impl Into<String>) -> Result<Self, GfxError> {
        let cmd = pool.take()?;
        Ok(Self {
            cmd,
            pool,
            device: device.clone(),
            deletion_queue: DeletionQueue::new(),
            debug_name: debug_name.into(),
        })
    }
}

// getters
impl GfxFrameContext {
    #[inline]
    pub fn cmd(&mut self) -> &mut GfxCommandBuffer {
        &mut self.cmd
    }
}

// 绑定到帧上的资源，在 GPU 执行完本帧之后销毁
impl GfxFrameContext {
    pub fn bind_buffer(&mut self, allocator: &Rc<GfxAllocator>, buffer: GfxBuffer) {
        let allocator = allocator.clone();
        self.deletion_queue.push(move || allocator.destroy_buffer(buffer));
    }

    pub fn bind_texture(&mut self, allocator: &Rc<GfxAllocator>, texture: GfxTexture) {
        let allocator = allocator.clone();
        self.deletion_queue.push(move || allocator.destroy_texture(texture));
    }

    pub fn bind_fn(&mut self, f: impl FnOnce() + 'static) {
        self.deletion_queue.push(f);
    }
}

// 录制与提交
impl GfxFrameContext {
    pub fn begin(&mut self) -> Result<(), GfxError> {
        self.cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &self.debug_name)
    }

    pub fn end(&mut self) -> Result<(), GfxError> {
        self.cmd.end()
    }

    /// 提交到 `queue`，本帧的 fence 在 GPU 执行完毕后 signal
    ///
    /// 提交失败时本帧没有任何工作进入 GPU：command buffer 归还给 pool，绑定的清理立即执行
    pub fn submit(
        self,
        queue: vk::Queue,
        wait_semaphores: &[(vk::Semaphore, vk::PipelineStageFlags)],
        signal_semaphores: &[vk::Semaphore],
    ) -> Result<GfxPendingFrame, GfxError> {
        let fence = match unsafe { self.device.create_fence(&vk::FenceCreateInfo::default(), None) } {
            Ok(fence) => fence,
            Err(err) => {
                self.abandon();
                return Err(err.into());
            }
        };

        let (wait_handles, wait_stages): (Vec<_>, Vec<_>) = wait_semaphores.iter().copied().unzip();
        let command_buffers = [self.cmd.vk_handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_handles)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(signal_semaphores);

        if let Err(err) = unsafe { self.device.queue_submit(queue, std::slice::from_ref(&submit_info), fence) } {
            log::error!("frame \"{}\" submit failed: {err}", self.debug_name);
            unsafe { self.device.destroy_fence(fence, None) };
            self.abandon();
            return Err(err.into());
        }

        let sync = GfxFenceSync {
            device: self.device,
            fence,
            cmd: Some(self.cmd),
            pool: self.pool,
        };
        Ok(GfxPendingFrame::new(sync, self.deletion_queue, self.debug_name))
    }

    /// 放弃一帧没有提交的录制：归还 command buffer 并执行绑定的清理
    pub fn abandon(mut self) {
        self.pool.give_back(self.cmd);
        self.deletion_queue.flush();
    }
}

/// 一帧提交之后的同步对象
///
/// `release` 只会在 GPU 不再使用本帧的对象之后调用一次
pub trait GfxFrameSync {
    fn is_signaled(&self) -> Result<bool, vk::Result>;

    fn wait(&self) -> Result<(), vk::Result>;

    fn release(&mut self);
}

/// 基于 fence 的 [`GfxFrameSync`]，完成后销毁 fence 并把 command buffer 还给 pool
pub struct GfxFenceSync {
    device: ash::Device,
    fence: vk::Fence,
    cmd: Option<GfxCommandBuffer>,
    pool: Arc<GfxCommandPool>,
}

impl GfxFrameSync for GfxFenceSync {
    fn is_signaled(&self) -> Result<bool, vk::Result> {
        unsafe { self.device.get_fence_status(self.fence) }
    }

    fn wait(&self) -> Result<(), vk::Result> {
        unsafe { self.device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX) }
    }

    fn release(&mut self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
        if let Some(cmd) = self.cmd.take() {
            self.pool.give_back(cmd);
        }
    }
}

/// 已经提交、等待 GPU 完成的帧
///
/// 没有调用 [`GfxPendingFrame::wait`] 就 drop 时会在 drop 中等待。
/// 等待失败时绑定的清理不会执行，资源泄漏；只有 device lost 时才释放 fence 和 command buffer。
pub struct GfxPendingFrame<S: GfxFrameSync = GfxFenceSync> {
    sync: S,
    deletion_queue: DeletionQueue,
    debug_name: String,
    retired: bool,
}

impl<S: GfxFrameSync> GfxPendingFrame<S> {
    pub fn new(sync: S, deletion_queue: DeletionQueue, debug_name: impl Into<String>) -> Self {
        Self {
            sync,
            deletion_queue,
            debug_name: debug_name.into(),
            retired: false,
        }
    }

    /// 非阻塞查询
    pub fn is_complete(&self) -> Result<bool, GfxError> {
        Ok(self.sync.is_signaled()?)
    }

    /// 阻塞等待 GPU 执行完本帧，然后释放同步对象并执行清理
    pub fn wait(mut self) -> Result<(), GfxError> {
        self.retire()
    }

    fn retire(&mut self) -> Result<(), GfxError> {
        self.retired = true;

        if let Err(err) = self.sync.wait() {
            log::error!("frame \"{}\" wait failed: {err}", self.debug_name);
            // device lost 之后可以销毁对象，其它错误下 GPU 可能仍在执行
            if err == vk::Result::ERROR_DEVICE_LOST {
                self.sync.release();
            }
            self.deletion_queue.discard();
            return Err(err.into());
        }

        log::trace!("frame \"{}\" completed, running {} deletors", self.debug_name, self.deletion_queue.len());
        self.sync.release();
        self.deletion_queue.flush();
        Ok(())
    }
}

impl<S: GfxFrameSync> Drop for GfxPendingFrame<S> {
    fn drop(&mut self) {
        if !self.retired {
            log::warn!("frame \"{}\" dropped without wait, waiting now", self.debug_name);
            // 错误已经记录
            let _ = self.retire();
        }
    }
}
