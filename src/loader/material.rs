//! 材质解析
//!
//! material → instance_effect → effect → profile_COMMON → technique，
//! 在 lambert / phong / blinn 中取其一。颜色通道二选一：<color> 直接取
//! RGBA，<texture> 经 newparam 采样器链（sampler2D → source → surface →
//! init_from → image）解析出纹理文件，链路缺失时退回直接按 id 找 <image>。

use glam::DVec4;
use xmltree::Element;

use crate::mesh::Material;

use super::xml::{attr, parse_floats, text_of};
use super::Loader;

impl<'d> Loader<'d> {
    /// 解析材质定义，按材质 id 记忆化；无法解析时返回 None
    pub(super) fn load_material(&mut self, name: &str) -> Option<Material> {
        let key = super::xml::strip_ref(name).to_string();
        if let Some(cached) = self.material_cache.get(&key) {
            return cached.clone();
        }
        let material = self.parse_material(&key);
        self.material_cache.insert(key, material.clone());
        material
    }

    fn parse_material(&self, id: &str) -> Option<Material> {
        let material_elem = self.element_by_id("material", id)?;
        let instance_effect = material_elem.get_child("instance_effect")?;

        let effect_url = attr(instance_effect, "url").unwrap_or("");
        let Some(effect) = self.element_by_id("effect", effect_url) else {
            log::error!("找不到 effect [{}]", effect_url);
            return None;
        };

        let mut material = Material {
            name: id.to_string(),
            ..Material::default()
        };

        if let Some(common) = effect.get_child("profile_COMMON") {
            if let Some(technique) = common.get_child("technique") {
                if let Some(lambert) = technique.get_child("lambert") {
                    self.load_shading_block(lambert, false, &mut material);
                } else if let Some(phong) = technique.get_child("phong") {
                    self.load_shading_block(phong, true, &mut material);
                } else if let Some(blinn) = technique.get_child("blinn") {
                    self.load_shading_block(blinn, true, &mut material);
                }
            }
        }

        if effect.get_child("profile_GLSL").is_some() {
            log::error!("不支持 profile_GLSL");
        }
        if effect.get_child("profile_CG").is_some() {
            log::error!("不支持 profile_CG");
        }

        Some(material)
    }

    /// lambert 无高光；phong/blinn 另有 specular 与 shininess
    fn load_shading_block(&self, elem: &Element, has_specular: bool, material: &mut Material) {
        self.load_color_or_texture(elem, "ambient", material);
        self.load_color_or_texture(elem, "emission", material);
        if has_specular {
            self.load_color_or_texture(elem, "specular", material);
        }
        self.load_color_or_texture(elem, "diffuse", material);

        if has_specular {
            if let Some(shininess) = elem.get_child("shininess") {
                material.set_shininess(load_float(shininess));
            }
        }
        if let Some(transparency) = elem.get_child("transparency") {
            material.set_transparency(load_float(transparency));
        }
        if let Some(transparent) = elem.get_child("transparent") {
            load_transparent(transparent, material);
        }
    }

    fn load_color_or_texture(&self, elem: &Element, kind: &str, material: &mut Material) {
        let Some(type_elem) = elem.get_child(kind) else {
            return;
        };

        if let Some(color_elem) = type_elem.get_child("color") {
            let v = parse_floats(&text_of(color_elem));
            if v.len() >= 4 {
                let color = DVec4::new(v[0], v[1], v[2], v[3]);
                match kind {
                    "diffuse" => material.diffuse = color,
                    "ambient" => material.ambient = color,
                    "emission" => material.emissive = color,
                    "specular" => material.specular = color,
                    _ => {}
                }
            }
        } else if let Some(texture_elem) = type_elem.get_child("texture") {
            material.set_lighting(true);
            let texture_name = attr(texture_elem, "texture").unwrap_or("");
            if let Some(image) = self.resolve_texture_image(texture_name) {
                if let Some(init_from) = image.get_child("init_from") {
                    material.set_texture_image(text_of(init_from).trim(), &self.path);
                }
            }
        }
    }

    /// newparam 采样器链解析；newparam 本身是 <image> 时直接采用，
    /// 找不到 newparam 时退回按 id 查找 <image>
    fn resolve_texture_image(&self, texture_name: &str) -> Option<&'d Element> {
        let Some(newparam) = self.element_by_id("newparam", texture_name) else {
            return self.element_by_id("image", texture_name);
        };
        if newparam.name == "image" {
            return Some(newparam);
        }
        let sampler = newparam.get_child("sampler2D")?;
        let source_name = text_of(sampler.get_child("source")?);
        let source_elem = self.element_by_id("newparam", source_name.trim())?;
        let surface = source_elem.get_child("surface")?;
        let init_from = surface.get_child("init_from")?;
        self.element_by_id("image", text_of(init_from).trim())
    }
}

/// <float> 子元素文本，缺省 0
fn load_float(elem: &Element) -> f64 {
    elem.get_child("float")
        .map(|f| text_of(f))
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0.0)
}

/// <transparent opaque=…><color> 计算混合因子
fn load_transparent(elem: &Element, material: &mut Material) {
    let Some(opaque) = attr(elem, "opaque") else {
        return;
    };
    let Some(color_elem) = elem.get_child("color") else {
        return;
    };
    let text = text_of(color_elem);
    if text.trim().is_empty() {
        log::error!("transparent 元素缺少颜色文本");
        return;
    }
    let v = parse_floats(&text);
    if v.len() < 4 {
        log::error!("transparent 颜色分量不足");
        return;
    }

    let transparency = material.transparency;
    let (src, dst) = match opaque {
        "RGB_ZERO" => (v[0] * transparency, 1.0 - v[0] * transparency),
        "A_ONE" => (1.0 - v[3] * transparency, v[3] * transparency),
        _ => (0.0, 0.0),
    };
    material.set_blend_factors(src, dst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loader_doc(body: &str) -> Element {
        Element::parse(format!("<COLLADA version=\"1.4.1\">{body}</COLLADA>").as_bytes()).unwrap()
    }

    fn effect_doc(shading: &str) -> Element {
        loader_doc(&format!(
            r##"<library_materials>
                 <material id="mat"><instance_effect url="#fx"/></material>
               </library_materials>
               <library_effects>
                 <effect id="fx"><profile_COMMON><technique sid="common">{shading}</technique></profile_COMMON></effect>
               </library_effects>"##
        ))
    }

    #[test]
    fn test_phong_colors_and_shininess() {
        let root = effect_doc(
            r##"<phong>
                 <diffuse><color>0.8 0.6 0.4 1</color></diffuse>
                 <specular><color>1 1 1 1</color></specular>
                 <shininess><float>50</float></shininess>
               </phong>"##,
        );
        let mut loader = Loader::new(&root, PathBuf::new(), String::new());
        let mat = loader.load_material("#mat").unwrap();
        assert!((mat.diffuse - DVec4::new(0.8, 0.6, 0.4, 1.0)).length() < 1e-12);
        assert!((mat.shininess - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_lambert_rgb_zero_blend_factors() {
        let root = effect_doc(
            r##"<lambert>
                 <transparency><float>0.4</float></transparency>
                 <transparent opaque="RGB_ZERO"><color>0.5 0.5 0.5 1</color></transparent>
               </lambert>"##,
        );
        let mut loader = Loader::new(&root, PathBuf::new(), String::new());
        let mat = loader.load_material("mat").unwrap();
        let (src, dst) = mat.blend_factors();
        assert!((src - 0.2).abs() < 1e-12);
        assert!((dst - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_a_one_blend_factors() {
        let root = effect_doc(
            r##"<lambert>
                 <transparency><float>0.5</float></transparency>
                 <transparent opaque="A_ONE"><color>0 0 0 0.8</color></transparent>
               </lambert>"##,
        );
        let mut loader = Loader::new(&root, PathBuf::new(), String::new());
        let mat = loader.load_material("mat").unwrap();
        let (src, dst) = mat.blend_factors();
        assert!((src - 0.6).abs() < 1e-12);
        assert!((dst - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_texture_through_sampler_chain() {
        let root = loader_doc(
            r##"<library_materials>
                 <material id="mat"><instance_effect url="#fx"/></material>
               </library_materials>
               <library_images>
                 <image id="wood-img"><init_from>wood.png</init_from></image>
               </library_images>
               <library_effects>
                 <effect id="fx"><profile_COMMON>
                   <newparam sid="wood-surface">
                     <surface type="2D"><init_from>wood-img</init_from></surface>
                   </newparam>
                   <newparam sid="wood-sampler">
                     <sampler2D><source>wood-surface</source></sampler2D>
                   </newparam>
                   <technique sid="common">
                     <lambert><diffuse><texture texture="wood-sampler" texcoord="uv0"/></diffuse></lambert>
                   </technique>
                 </profile_COMMON></effect>
               </library_effects>"##,
        );
        let mut loader = Loader::new(&root, PathBuf::from("/assets"), String::new());
        let mat = loader.load_material("mat").unwrap();
        assert!(mat.lighting);
        assert_eq!(mat.texture_image.as_deref(), Some("/assets/wood.png"));
    }

    #[test]
    fn test_material_without_effect_is_none() {
        let root = loader_doc(r##"<library_materials><material id="mat"/></library_materials>"##);
        let mut loader = Loader::new(&root, PathBuf::new(), String::new());
        assert!(loader.load_material("mat").is_none());
    }
}
