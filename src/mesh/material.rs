//! 材质定义

use std::path::Path;

use glam::DVec4;

/// 从 COLLADA effect 解析出的材质
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub ambient: DVec4,
    pub diffuse: DVec4,
    pub specular: DVec4,
    pub emissive: DVec4,
    pub shininess: f64,
    pub transparency: f64,
    /// 透明混合因子 (src, dst)，由 <transparent opaque=…> 计算
    pub blend_src_factor: f64,
    pub blend_dst_factor: f64,
    pub lighting: bool,
    /// 相对文档目录解析后的纹理路径
    pub texture_image: Option<String>,
}

impl Material {
    pub fn set_shininess(&mut self, shininess: f64) {
        self.shininess = shininess;
    }

    pub fn set_transparency(&mut self, transparency: f64) {
        self.transparency = transparency;
    }

    pub fn set_blend_factors(&mut self, src: f64, dst: f64) {
        self.blend_src_factor = src;
        self.blend_dst_factor = dst;
    }

    pub fn blend_factors(&self) -> (f64, f64) {
        (self.blend_src_factor, self.blend_dst_factor)
    }

    pub fn set_lighting(&mut self, lighting: bool) {
        self.lighting = lighting;
    }

    /// 纹理文件与基准目录组合为完整路径，统一使用正斜杠
    pub fn set_texture_image(&mut self, file: &str, base_path: &Path) {
        let full = base_path.join(file);
        self.texture_image = Some(full.to_string_lossy().replace('\\', "/"));
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: DVec4::new(0.5, 0.5, 0.5, 1.0),
            diffuse: DVec4::new(1.0, 1.0, 1.0, 1.0),
            specular: DVec4::new(0.0, 0.0, 0.0, 1.0),
            emissive: DVec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
            transparency: 0.0,
            blend_src_factor: 1.0,
            blend_dst_factor: 0.0,
            lighting: false,
            texture_image: None,
        }
    }
}
