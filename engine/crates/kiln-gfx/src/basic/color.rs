/// debug label 使用的颜色，RGBA
pub struct LabelColor;
impl LabelColor {
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

    /// 渲染图中每个 pass 的 label
    pub const COLOR_PASS: [f32; 4] = Self::BLUE;
    /// 整个 command buffer 的 label
    pub const COLOR_CMD: [f32; 4] = Self::GREEN;
}
