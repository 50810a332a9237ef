//! 控制器与蒙皮绑定
//!
//! <skin> 给出绑定形状矩阵、关节名称表、逆绑定矩阵与逐顶点的
//! (关节, 权重) 记录流。<v> 是宽度为 (j_off + w_off + 1) 的交错索引，
//! 每个源顶点有 <vcount> 条记录。绑定完成后按 skin 的 source 几何编织。

use glam::DMat4;
use xmltree::Element;

use crate::mesh::Mesh;
use crate::skeleton::Skeleton;

use super::xml::{attr, children_named, parse_floats, parse_ints, parse_matrix_text, text_of};
use super::Loader;

impl<'d> Loader<'d> {
    /// 加载 <controller>：骨骼树 → 动画 → 蒙皮数据 → 几何编织
    pub(super) fn load_controller(
        &mut self,
        controller: &'d Element,
        skeleton_root: &'d Element,
        transform: DMat4,
        mesh: &mut Mesh,
    ) {
        let mut skeleton = Skeleton::new();
        self.load_skeleton_nodes(skeleton_root, None, &mut skeleton);

        if let Some(library) = self.root.get_child("library_animations") {
            self.load_animations(library, &mut skeleton);
        }

        let Some(skin) = controller.get_child("skin") else {
            log::error!("controller 缺少 skin 元素");
            return;
        };
        let geometry_url = attr(skin, "source").unwrap_or("").to_string();

        if let Some(bind_shape) = skin.get_child("bind_shape_matrix") {
            if let Some(matrix) = parse_matrix_text(&text_of(bind_shape)) {
                skeleton.set_bind_shape_transform(matrix);
            }
        }

        if !self.load_skin_joints(skin, &mut skeleton) {
            return;
        }
        self.load_vertex_weights(skin, &mut skeleton);

        mesh.set_skeleton(skeleton);

        match self.element_by_id("geometry", &geometry_url) {
            Some(geometry) => self.load_geometry(geometry, transform, mesh),
            None => log::error!("找不到 geometry [{}]", geometry_url),
        }
    }

    /// <joints>：JOINT 名称数组与逐关节逆绑定矩阵
    fn load_skin_joints(&mut self, skin: &Element, skeleton: &mut Skeleton) -> bool {
        let mut joints_url = "";
        let mut inv_bind_url = "";
        if let Some(joints_elem) = skin.get_child("joints") {
            for input in children_named(joints_elem, "input") {
                let source = attr(input, "source").unwrap_or("");
                match attr(input, "semantic") {
                    Some("JOINT") => joints_url = source,
                    Some("INV_BIND_MATRIX") => inv_bind_url = source,
                    _ => {}
                }
            }
        }

        let Some(joints) = self.read_joint_names(joints_url) else {
            return false;
        };

        let Some(ibm_source) = self.element_by_id("source", inv_bind_url) else {
            log::error!("找不到源 [{}]，蒙皮信息解析失败", inv_bind_url);
            return false;
        };
        let Some(float_array) = ibm_source.get_child("float_array") else {
            log::error!("逆绑定矩阵源缺少 float_array 元素");
            return false;
        };
        let poses = parse_floats(&text_of(float_array));

        for (i, joint) in joints.iter().enumerate() {
            let base = i * 16;
            let Some(slice) = poses.get(base..base + 16) else {
                log::error!("逆绑定矩阵数量少于关节数量");
                break;
            };
            let mut arr = [0.0; 16];
            arr.copy_from_slice(slice);
            let matrix = DMat4::from_cols_array(&arr).transpose();
            match skeleton.node_by_name(joint) {
                Some(handle) => {
                    if let Some(node) = skeleton.node_mut(handle) {
                        node.set_inverse_bind_transform(matrix);
                    }
                }
                None => log::error!("骨骼中找不到关节 '{}'", joint),
            }
        }
        true
    }

    fn read_joint_names(&self, joints_url: &str) -> Option<Vec<String>> {
        let Some(joints_source) = self.element_by_id("source", joints_url) else {
            log::error!("找不到源 [{}]，蒙皮信息解析失败", joints_url);
            return None;
        };
        let Some(name_array) = joints_source.get_child("Name_array") else {
            log::error!("关节源缺少 Name_array 元素");
            return None;
        };
        Some(
            text_of(name_array)
                .split_whitespace()
                .map(String::from)
                .collect(),
        )
    }

    /// <vertex_weights>：按记录宽度消费交错索引流
    fn load_vertex_weights(&mut self, skin: &Element, skeleton: &mut Skeleton) {
        let Some(vertex_weights) = skin.get_child("vertex_weights") else {
            log::error!("skin 缺少 vertex_weights 元素");
            return;
        };

        let mut joint_offset = 0;
        let mut weight_offset = 0;
        let mut joints_url = "";
        let mut weights_url = "";
        for input in children_named(vertex_weights, "input") {
            let source = attr(input, "source").unwrap_or("");
            let offset = attr(input, "offset")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0);
            match attr(input, "semantic") {
                Some("JOINT") => {
                    joints_url = source;
                    joint_offset = offset;
                }
                Some("WEIGHT") => {
                    weights_url = source;
                    weight_offset = offset;
                }
                _ => {}
            }
        }

        let Some(joints) = self.read_joint_names(joints_url) else {
            return;
        };

        let Some(weights_source) = self.element_by_id("source", weights_url) else {
            log::error!("找不到权重源 [{}]", weights_url);
            return;
        };
        let Some(float_array) = weights_source.get_child("float_array") else {
            log::error!("权重源缺少 float_array 元素");
            return;
        };
        let weights = parse_floats(&text_of(float_array));

        let vcount_text = vertex_weights.get_child("vcount").map(text_of).unwrap_or_default();
        let v_text = vertex_weights.get_child("v").map(text_of).unwrap_or_default();
        let vcounts = parse_ints(&vcount_text);
        let v = parse_ints(&v_text);

        skeleton.set_num_vert_attached(vcounts.len());

        let record_width = joint_offset + weight_offset + 1;
        let mut cursor = 0;
        for (vertex, &count) in vcounts.iter().enumerate() {
            for _ in 0..count {
                let joint_index = v.get(cursor + joint_offset);
                let weight_index = v.get(cursor + weight_offset);
                if let (Some(&ji), Some(&wi)) = (joint_index, weight_index) {
                    match (joints.get(ji), weights.get(wi)) {
                        (Some(joint), Some(&weight)) => {
                            skeleton.add_vert_node_weight(vertex, joint.clone(), weight);
                        }
                        _ => log::error!("顶点 {} 的关节/权重索引越界", vertex),
                    }
                }
                cursor += record_width;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::loader::load_from_str;
    use glam::DVec3;

    /// 两关节蒙皮的最小文档：一条线段几何 + 两个源顶点的权重绑定
    fn skinned_document(bind_shape: &str, vcount: &str, v: &str) -> String {
        format!(
            r##"<COLLADA version="1.4.1">
                 <library_geometries>
                   <geometry id="geo"><mesh>
                     <source id="pos">
                       <float_array id="pos-arr" count="6">0 0 0  0 2 0</float_array>
                       <technique_common><accessor source="#pos-arr" count="2" stride="3"/></technique_common>
                     </source>
                     <vertices id="vtx"><input semantic="POSITION" source="#pos"/></vertices>
                     <lines count="1">
                       <input semantic="VERTEX" source="#vtx" offset="0"/>
                       <p>0 1</p>
                     </lines>
                   </mesh></geometry>
                 </library_geometries>
                 <library_controllers>
                   <controller id="ctrl"><skin source="#geo">
                     <bind_shape_matrix>{bind_shape}</bind_shape_matrix>
                     <source id="joints-src">
                       <Name_array id="joints-arr" count="2">Bone1 Bone2</Name_array>
                     </source>
                     <source id="ibm-src">
                       <float_array id="ibm-arr" count="32">
                         1 0 0 0  0 1 0 0  0 0 1 0  0 0 0 1
                         1 0 0 0  0 1 0 -1  0 0 1 0  0 0 0 1
                       </float_array>
                     </source>
                     <source id="weights-src">
                       <float_array id="weights-arr" count="4">0.1 0.9 0.4 0.6</float_array>
                     </source>
                     <joints>
                       <input semantic="JOINT" source="#joints-src"/>
                       <input semantic="INV_BIND_MATRIX" source="#ibm-src"/>
                     </joints>
                     <vertex_weights count="2">
                       <input semantic="JOINT" source="#joints-src" offset="0"/>
                       <input semantic="WEIGHT" source="#weights-src" offset="1"/>
                       <vcount>{vcount}</vcount>
                       <v>{v}</v>
                     </vertex_weights>
                   </skin></controller>
                 </library_controllers>
                 <library_visual_scenes>
                   <visual_scene id="vs">
                     <node id="bone1" sid="Bone1" name="Bone1" type="JOINT">
                       <translate sid="trans">0 0 0</translate>
                       <node id="bone2" sid="Bone2" name="Bone2" type="JOINT">
                         <translate sid="trans">0 1 0</translate>
                       </node>
                     </node>
                     <node name="skin-node">
                       <instance_controller url="#ctrl">
                         <skeleton>#bone1</skeleton>
                       </instance_controller>
                     </node>
                   </visual_scene>
                 </library_visual_scenes>
                 <scene><instance_visual_scene url="#vs"/></scene>
               </COLLADA>"##
        )
    }

    const IDENTITY: &str = "1 0 0 0  0 1 0 0  0 0 1 0  0 0 0 1";

    #[test]
    fn test_two_joint_vertex_weights() {
        let doc = skinned_document(IDENTITY, "2 2", "0 0 1 1  0 2 1 3");
        let mesh = load_from_str(&doc, "").unwrap();
        let skeleton = mesh.skeleton().unwrap();

        assert_eq!(skeleton.num_vert_attached(), 2);
        assert_eq!(skeleton.vert_node_weight_count(0), 2);
        assert_eq!(skeleton.vert_node_weight(0, 0), Some(("Bone1", 0.1)));
        assert_eq!(skeleton.vert_node_weight(0, 1), Some(("Bone2", 0.9)));
        assert_eq!(skeleton.vert_node_weight(1, 0), Some(("Bone1", 0.4)));
        assert_eq!(skeleton.vert_node_weight(1, 1), Some(("Bone2", 0.6)));
    }

    #[test]
    fn test_inverse_bind_matrices_assigned_by_joint_name() {
        let doc = skinned_document(IDENTITY, "2 2", "0 0 1 1  0 2 1 3");
        let mesh = load_from_str(&doc, "").unwrap();
        let skeleton = mesh.skeleton().unwrap();

        let bone2 = skeleton.node_by_name("Bone2").unwrap();
        let ibm = skeleton.node(bone2).unwrap().inverse_bind_transform();
        let p = ibm.transform_point3(DVec3::new(0.0, 1.0, 0.0));
        assert!((p - DVec3::ZERO).length() < 1e-12);
    }

    #[test]
    fn test_joint_names_resolve_in_skeleton() {
        // 不变量：权重绑定引用的关节都能在骨骼树中按名称找到
        let doc = skinned_document(IDENTITY, "1 1", "0 0  1 1");
        let mesh = load_from_str(&doc, "").unwrap();
        let skeleton = mesh.skeleton().unwrap();
        for vertex in 0..skeleton.num_vert_attached() {
            for i in 0..skeleton.vert_node_weight_count(vertex) {
                let (joint, _) = skeleton.vert_node_weight(vertex, i).unwrap();
                assert!(skeleton.node_by_name(joint).is_some());
            }
        }
    }

    #[test]
    fn test_bind_shape_applied_to_skinned_vertices() {
        // 绑定形状矩阵平移 (1,0,0)，线段端点随之偏移
        let bind = "1 0 0 1  0 1 0 0  0 0 1 0  0 0 0 1";
        let doc = skinned_document(bind, "2 2", "0 0 1 1  0 2 1 3");
        let mesh = load_from_str(&doc, "").unwrap();
        let sub = &mesh.sub_meshes()[0];
        // lines 路径不做蒙皮变换，顶点保持原位；此处验证骨骼仍随网格返回
        assert_eq!(sub.vertex_count(), 2);
        assert!(mesh.has_skeleton());
        let skeleton = mesh.skeleton().unwrap();
        let p = skeleton
            .bind_shape_transform()
            .transform_point3(DVec3::ZERO);
        assert!((p - DVec3::X).length() < 1e-12);
    }
}
