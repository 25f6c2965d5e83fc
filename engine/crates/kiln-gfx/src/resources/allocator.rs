use std::{ptr::NonNull, rc::Rc};

use ash::vk;
use vk_mem::Alloc;

use crate::{
    arena::{BufferArena, ContiguousAllocator},
    foundation::{device::GfxDevice, error::GfxError},
    resources::{
        buffer::GfxBuffer,
        texture::{GfxTexture, GfxTextureDesc},
    },
};

/// 资源放置在哪种内存上
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxMemoryPlacement {
    /// 只有 GPU 访问
    DeviceLocal,
    /// CPU 可写，创建时常驻映射
    HostVisible,
}

impl GfxMemoryPlacement {
    fn alloc_create_info(self) -> vk_mem::AllocationCreateInfo {
        match self {
            Self::DeviceLocal => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            Self::HostVisible => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferHost,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
        }
    }
}

/// 基于 vk-mem 的 GPU 资源分配器
///
/// 由于 vma 的生命周期设定：需要引用 Instance 以及 Device，并确保在其声明周期之内这两个的引用是有效的.
/// 因此需要在设备创建完成之后再创建，并在设备销毁之前 drop
pub struct GfxAllocator {
    inner: vk_mem::Allocator,
    device: Rc<GfxDevice>,
}

impl Drop for GfxAllocator {
    fn drop(&mut self) {
        log::info!("Destroying GfxAllocator");
        // vk_mem 是 RAII 的
    }
}

// new & init
impl GfxAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: Rc<GfxDevice>) -> Result<Self, GfxError> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, &device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci)? };
        Ok(Self { inner: vma, device })
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}

// buffer
impl GfxAllocator {
    pub fn create_buffer(
        &self,
        buffer_ci: &vk::BufferCreateInfo,
        placement: GfxMemoryPlacement,
        debug_name: impl AsRef<str>,
    ) -> Result<GfxBuffer, GfxError> {
        let alloc_ci = placement.alloc_create_info();
        let (handle, mut allocation) = unsafe { self.inner.create_buffer(buffer_ci, &alloc_ci)? };

        let mut map_ptr = None;
        if placement == GfxMemoryPlacement::HostVisible {
            match unsafe { self.inner.map_memory(&mut allocation) } {
                Ok(ptr) => map_ptr = NonNull::new(ptr),
                Err(err) => {
                    unsafe { self.inner.destroy_buffer(handle, &mut allocation) };
                    return Err(err.into());
                }
            }
        }

        self.device.set_object_debug_name(handle, format!("Buffer::{}", debug_name.as_ref()));
        Ok(GfxBuffer {
            handle,
            allocation,
            size: buffer_ci.size,
            map_ptr,
            debug_name: debug_name.as_ref().to_string(),
        })
    }

    pub fn destroy_buffer(&self, mut buffer: GfxBuffer) {
        unsafe {
            if buffer.map_ptr.is_some() {
                self.inner.unmap_memory(&mut buffer.allocation);
            }
            self.inner.destroy_buffer(buffer.handle, &mut buffer.allocation);
        }
    }

    /// 写入映射内存之后调用，非 coherent 内存需要 flush 才对 GPU 可见
    pub fn flush_buffer(
        &self,
        buffer: &GfxBuffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<(), GfxError> {
        self.inner.flush_allocation(&buffer.allocation, offset, size)?;
        Ok(())
    }
}

// texture
impl GfxAllocator {
    pub fn create_texture(&self, desc: &GfxTextureDesc, debug_name: impl AsRef<str>) -> Result<GfxTexture, GfxError> {
        let image_ci = desc.image_create_info();
        let alloc_ci = GfxMemoryPlacement::DeviceLocal.alloc_create_info();
        let (image, mut allocation) = unsafe { self.inner.create_image(&image_ci, &alloc_ci)? };

        let view_type = if desc.layers > 1 { vk::ImageViewType::TYPE_2D_ARRAY } else { vk::ImageViewType::TYPE_2D };
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(desc.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: super::texture::infer_image_aspect(desc.format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: desc.layers,
            });
        let image_view = match unsafe { self.device.create_image_view(&view_ci, None) } {
            Ok(view) => view,
            Err(err) => {
                unsafe { self.inner.destroy_image(image, &mut allocation) };
                return Err(err.into());
            }
        };

        self.device.set_object_debug_name(image, format!("Image::{}", debug_name.as_ref()));
        self.device.set_object_debug_name(image_view, format!("ImageView::{}", debug_name.as_ref()));
        Ok(GfxTexture {
            image,
            allocation,
            image_view,
            desc: *desc,
            debug_name: debug_name.as_ref().to_string(),
        })
    }

    pub fn destroy_texture(&self, mut texture: GfxTexture) {
        unsafe {
            self.device.destroy_image_view(texture.image_view, None);
            self.inner.destroy_image(texture.image, &mut texture.allocation);
        }
    }
}

// arena
impl GfxAllocator {
    /// 创建一个拥有 backing buffer 的 arena
    ///
    /// `buffer_ci.size` 必须不小于 `strategy.size_hint()`，否则返回 `BackingTooSmall`，不会创建 buffer
    pub fn create_arena<A: ContiguousAllocator>(
        &self,
        buffer_ci: &vk::BufferCreateInfo,
        placement: GfxMemoryPlacement,
        strategy: A,
        debug_name: impl AsRef<str>,
    ) -> Result<BufferArena<A>, GfxError> {
        BufferArena::check_backing(buffer_ci.size, &strategy)?;

        let buffer = self.create_buffer(buffer_ci, placement, format!("Arena::{}", debug_name.as_ref()))?;
        Ok(BufferArena::with_backing(buffer, strategy, debug_name.as_ref()))
    }

    /// 仍然存活的分配会被一起释放，并输出警告
    pub fn destroy_arena<A: ContiguousAllocator>(&self, arena: BufferArena<A>) {
        if let Some(buffer) = arena.into_backing() {
            self.destroy_buffer(buffer);
        }
    }
}
