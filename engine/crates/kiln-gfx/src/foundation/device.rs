use std::{ffi::CString, ops::Deref};

use ash::vk;

/// Vulkan 逻辑设备封装
///
/// Instance、Device 的创建属于窗口/交换链层，这里只接收已经创建好的 `ash::Device`，
/// 并附带可选的 debug utils 扩展函数指针。
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 调试工具扩展 API，未开启 validation 时为 None
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(instance: &ash::Instance, device: ash::Device, enable_debug_utils: bool) -> Self {
        let debug_utils = enable_debug_utils.then(|| ash::ext::debug_utils::Device::new(instance, &device));
        log::info!("GfxDevice created, debug utils: {}", debug_utils.is_some());

        Self { device, debug_utils }
    }

    /// 调用前需要确保所有从该设备创建的对象都已经销毁
    pub fn destroy(self) {
        log::info!("destroying device");
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn ash_handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_utils.as_ref()
    }
}

// tools
impl GfxDevice {
    /// 为 Vulkan 对象设置 debug name，在 RenderDoc 等工具中可见
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            log::warn!("debug name contains interior nul: {}", name.as_ref());
            return;
        };

        let name_info = vk::DebugUtilsObjectNameInfoEXT::default().object_handle(handle).object_name(name.as_c_str());
        unsafe {
            if let Err(err) = debug_utils.set_debug_utils_object_name(&name_info) {
                log::warn!("failed to set debug name {:?}: {:?}", name, err);
            }
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
