use std::ptr::NonNull;

use ash::vk;

/// 由 [`crate::resources::allocator::GfxAllocator`] 创建的 buffer
///
/// # Destroy
/// 不实现 Drop，需要通过 `GfxAllocator::destroy_buffer` 手动销毁
pub struct GfxBuffer {
    pub(crate) handle: vk::Buffer,
    pub(crate) allocation: vk_mem::Allocation,

    pub(crate) size: vk::DeviceSize,

    /// 在创建时写死，HostVisible 的 buffer 常驻映射
    pub(crate) map_ptr: Option<NonNull<u8>>,

    pub(crate) debug_name: String,
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    #[inline]
    pub fn mapped_ptr(&self) -> Option<NonNull<u8>> {
        self.map_ptr
    }

    /// 覆盖整个 buffer 的 view
    #[inline]
    pub fn view(&self) -> GfxBufferView {
        GfxBufferView {
            handle: self.handle,
            offset: 0,
            size: self.size,
            actual_size: self.size,
            mapped: self.map_ptr,
        }
    }
}

/// buffer 上的一段区域，可以随意复制，不拥有底层 buffer
///
/// - `size`: 调用方请求的逻辑大小
/// - `actual_size`: 该区域实际占用的大小，arena 分配时可能大于 `size`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBufferView {
    pub handle: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    pub actual_size: vk::DeviceSize,

    mapped: Option<NonNull<u8>>,
}

// new & init
impl GfxBufferView {
    pub fn new(handle: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self {
            handle,
            offset,
            size,
            actual_size: size,
            mapped: None,
        }
    }

    /// # Safety
    /// `ptr` 必须指向 `self.offset` 处的映射内存，并且在 view 的使用期间保持有效
    pub unsafe fn with_mapped_ptr(mut self, ptr: NonNull<u8>) -> Self {
        self.mapped = Some(ptr);
        self
    }
}

// tools
impl GfxBufferView {
    /// 以当前 view 为基准切出一段子区域
    ///
    /// `offset` 相对于当前 view 的起点
    pub fn sub_view(&self, offset: vk::DeviceSize, size: vk::DeviceSize, actual_size: vk::DeviceSize) -> Self {
        assert!(
            offset + actual_size.max(size) <= self.actual_size,
            "GfxBufferView::sub_view: [{offset}, +{actual_size}) is out of range {}",
            self.actual_size
        );
        Self {
            handle: self.handle,
            offset: self.offset + offset,
            size,
            actual_size,
            // SAFETY: 上面已经检查过范围，偏移后的指针仍然落在同一段映射内存中
            mapped: self.mapped.map(|ptr| unsafe { ptr.add(offset as usize) }),
        }
    }

    #[inline]
    pub fn slice(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.sub_view(offset, size, size)
    }

    #[inline]
    pub fn mapped_ptr(&self) -> Option<NonNull<u8>> {
        self.mapped
    }

    #[inline]
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: self.offset,
            range: self.size,
        }
    }

    /// 通过 mem map 的方式将 data 写入到这段区域的开头
    ///
    /// 调用方需要保证 GPU 此时没有在读写这段内存
    pub fn write_mapped(&self, data: &[u8]) {
        let Some(ptr) = self.mapped else {
            panic!("GfxBufferView::write_mapped: buffer is not host visible");
        };
        assert!(data.len() as vk::DeviceSize <= self.size, "GfxBufferView::write_mapped: data larger than view");

        // SAFETY: 长度已检查，映射内存在 buffer 存活期间一直有效
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len());
        }
    }
}
