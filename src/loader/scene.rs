//! 场景遍历与节点变换

use glam::{DMat4, DVec3};
use xmltree::Element;

use crate::mesh::Mesh;

use super::xml::{attr, children_named, parse_floats, parse_matrix_text, text_of};
use super::Loader;

impl<'d> Loader<'d> {
    /// 定位 <scene> → <visual_scene>，按文档顺序加载顶层节点
    pub(super) fn load_scene(&mut self, mesh: &mut Mesh) {
        let Some(scene) = self.root.get_child("scene") else {
            log::error!("文档 [{}] 缺少 scene 元素", self.filename);
            return;
        };
        let Some(instance) = scene.get_child("instance_visual_scene") else {
            log::error!("scene 缺少 instance_visual_scene");
            return;
        };
        let url = attr(instance, "url").unwrap_or("");
        let Some(visual_scene) = self.element_by_id("visual_scene", url) else {
            log::error!("找不到 visual_scene id='{}'", url);
            return;
        };

        for node in children_named(visual_scene, "node") {
            self.load_node(node, mesh, DMat4::IDENTITY);
        }
    }

    /// 加载单个 <node>：合成变换、递归子节点、实例化几何与控制器
    fn load_node(&mut self, elem: &'d Element, mesh: &mut Mesh, parent_transform: DMat4) {
        let transform = parent_transform * load_node_transform(elem);

        if let Some(name) = attr(elem, "name") {
            self.current_node_name = name.to_string();
        }

        for child in children_named(elem, "node") {
            self.load_node(child, mesh, transform);
        }

        // instance_node 与本节点上的几何实例互斥
        if let Some(instance) = elem.get_child("instance_node") {
            let url = attr(instance, "url").unwrap_or("");
            match self.element_by_id("node", url) {
                Some(node) => self.load_node(node, mesh, transform),
                None => log::error!("找不到 node [{}]", url),
            }
            return;
        }

        for instance in children_named(elem, "instance_geometry") {
            let url = attr(instance, "url").unwrap_or("");
            self.rebuild_material_map(instance);
            match self.element_by_id("geometry", url) {
                Some(geometry) => self.load_geometry(geometry, transform, mesh),
                None => log::error!("找不到 geometry [{}]", url),
            }
        }

        for instance in children_named(elem, "instance_controller") {
            let url = attr(instance, "url").unwrap_or("");
            let Some(controller) = self.element_by_id("controller", url) else {
                log::error!("找不到 controller [{}]", url);
                continue;
            };
            let Some(skeleton_ref) = instance.get_child("skeleton") else {
                log::error!("instance_controller [{}] 缺少 skeleton 引用", url);
                continue;
            };
            let root_url = text_of(skeleton_ref);
            let Some(skeleton_root) = self.element_by_id("node", root_url.trim()) else {
                log::error!("找不到骨骼根节点 [{}]", root_url.trim());
                continue;
            };

            self.rebuild_material_map(instance);
            self.load_controller(controller, skeleton_root, transform, mesh);
        }
    }

    /// 在几何/控制器实例边界上重建 symbol → target 材质映射
    fn rebuild_material_map(&mut self, instance: &Element) {
        self.material_map.clear();
        for bind in children_named(instance, "bind_material") {
            let Some(technique) = bind.get_child("technique_common") else {
                continue;
            };
            for inst_mat in children_named(technique, "instance_material") {
                if let (Some(symbol), Some(target)) =
                    (attr(inst_mat, "symbol"), attr(inst_mat, "target"))
                {
                    self.material_map.insert(symbol.to_string(), target.to_string());
                }
            }
        }
    }
}

/// 解析节点局部变换
///
/// 存在 <matrix> 时直接采用（行主序 16 值）；否则从单位矩阵出发，
/// 依次右乘 translate、文档顺序的各 rotate（轴 + 角度，度）、scale。
/// 平移不预乘单位缩放，统一在整网格缩放时应用。
pub(super) fn load_node_transform(elem: &Element) -> DMat4 {
    if let Some(matrix_elem) = elem.get_child("matrix") {
        return parse_matrix_text(&text_of(matrix_elem)).unwrap_or(DMat4::IDENTITY);
    }

    let mut transform = DMat4::IDENTITY;

    if let Some(translate_elem) = elem.get_child("translate") {
        let v = parse_floats(&text_of(translate_elem));
        if v.len() >= 3 {
            transform *= DMat4::from_translation(DVec3::new(v[0], v[1], v[2]));
        }
    }

    for rotate_elem in children_named(elem, "rotate") {
        let v = parse_floats(&text_of(rotate_elem));
        if v.len() >= 4 {
            transform *= rotation_about(DVec3::new(v[0], v[1], v[2]), v[3]);
        }
    }

    if let Some(scale_elem) = elem.get_child("scale") {
        let v = parse_floats(&text_of(scale_elem));
        if v.len() >= 3 {
            transform *= DMat4::from_scale(DVec3::new(v[0], v[1], v[2]));
        }
    }

    transform
}

/// 绕任意轴的旋转矩阵，角度为度；零轴退化为单位矩阵
fn rotation_about(axis: DVec3, angle_deg: f64) -> DMat4 {
    let axis = axis.normalize_or_zero();
    if axis == DVec3::ZERO {
        return DMat4::IDENTITY;
    }
    DMat4::from_axis_angle(axis, angle_deg.to_radians())
}
