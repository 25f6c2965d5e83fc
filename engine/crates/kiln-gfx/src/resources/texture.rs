use ash::vk;

/// 创建 render target 所需的描述
///
/// 同时作为 [`super::render_target_cache::RenderTargetCache`] 判断是否需要重建的依据
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxTextureDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub layers: u32,
}

impl GfxTextureDesc {
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            usage,
            layers: 1,
        }
    }

    /// builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// builder
    #[inline]
    pub fn layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn image_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(self.layers)
            .samples(self.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

/// 由 [`super::allocator::GfxAllocator`] 创建的 image + image view
///
/// # Destroy
/// 需要通过 `GfxAllocator::destroy_texture` 手动销毁
pub struct GfxTexture {
    pub(crate) image: vk::Image,
    pub(crate) allocation: vk_mem::Allocation,
    pub(crate) image_view: vk::ImageView,

    pub(crate) desc: GfxTextureDesc,
    pub(crate) debug_name: String,
}

// getters
impl GfxTexture {
    #[inline]
    pub fn desc(&self) -> &GfxTextureDesc {
        &self.desc
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// 借出一个可复制的 view，有效期不能超过 texture 本身
    #[inline]
    pub fn view(&self) -> GfxTextureView {
        GfxTextureView {
            image: self.image,
            image_view: self.image_view,
            format: self.desc.format,
            samples: self.desc.samples,
            extent: self.desc.extent,
            layers: self.desc.layers,
        }
    }
}

/// 渲染图使用的 texture 句柄，不拥有任何资源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxTextureView {
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub extent: vk::Extent2D,
    pub layers: u32,
}

impl GfxTextureView {
    /// 根据 format 推断 aspect
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        infer_image_aspect(self.format)
    }

    /// 覆盖所有 mip 和 layer 的 subresource range
    pub fn full_subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask(),
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        }
    }
}

/// 推断图像的 aspect flags
pub fn infer_image_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => vk::ImageAspectFlags::DEPTH,

        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }

        _ => vk::ImageAspectFlags::COLOR,
    }
}
