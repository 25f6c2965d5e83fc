use ash::vk;
use parking_lot::Mutex;

use crate::{commands::command_buffer::GfxCommandBuffer, foundation::device::GfxDevice, foundation::error::GfxError};

/// command buffer 池
///
/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的。
/// `take` / `give_back` 可能同时来自渲染主循环和帧完成的回调，因此空闲列表由 mutex 保护。
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,

    inner: Mutex<PoolState>,

    debug_name: String,
}

#[derive(Default)]
struct PoolState {
    free: Vec<vk::CommandBuffer>,
    allocated: usize,
}

// init & destroy
impl GfxCommandPool {
    pub fn new(device: &GfxDevice, queue_family_index: u32, debug_name: &str) -> Result<Self, GfxError> {
        let handle = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(queue_family_index)
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                None,
            )?
        };
        device.set_object_debug_name(handle, debug_name);

        Ok(Self {
            handle,
            device: device.ash_handle().clone(),
            debug_utils: device.debug_utils().cloned(),
            inner: Mutex::new(PoolState::default()),
            debug_name: debug_name.to_string(),
        })
    }

    /// 还没有归还的 command buffer 会随 pool 一起释放
    pub fn destroy(self) {
        let state = self.inner.lock();
        let outstanding = state.allocated - state.free.len();
        if outstanding > 0 {
            log::warn!("CommandPool \"{}\" destroyed with {} command buffers not given back", self.debug_name, outstanding);
        }
        log::info!("Destroying CommandPool: {}", self.debug_name);
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    /// 已经分配出去、还没有归还的数量
    pub fn outstanding(&self) -> usize {
        let state = self.inner.lock();
        state.allocated - state.free.len()
    }
}

// tools
impl GfxCommandPool {
    /// 取出一个处于 initial 状态的 command buffer，没有空闲的就新分配一个
    pub fn take(&self) -> Result<GfxCommandBuffer, GfxError> {
        let mut state = self.inner.lock();
        let vk_handle = match state.free.pop() {
            Some(cmd) => {
                unsafe { self.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())? };
                cmd
            }
            None => {
                let info = vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.handle)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1);
                let cmd = unsafe { self.device.allocate_command_buffers(&info)?[0] };
                state.allocated += 1;
                log::debug!("CommandPool \"{}\" allocated command buffer #{}", self.debug_name, state.allocated);
                cmd
            }
        };

        Ok(GfxCommandBuffer::new(vk_handle, self.device.clone(), self.debug_utils.clone()))
    }

    /// 归还 command buffer，调用方需要保证 GPU 已经执行完毕
    pub fn give_back(&self, cmd: GfxCommandBuffer) {
        self.inner.lock().free.push(cmd.vk_handle());
    }
}
