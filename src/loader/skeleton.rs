//! 骨骼树构建
//!
//! 递归遍历 <node>，节点名取 sid（缺省取 name），类别默认 JOINT。
//! 每个变换元素除参与合成外还按原始参数入列，供动画通道按 SID 改写。

use glam::DMat4;
use xmltree::Element;

use crate::skeleton::{NodeTransform, Skeleton, SkeletonNode, SkeletonNodeType, TransformKind};

use super::xml::{attr, children_named, parse_floats, parse_matrix_text, text_of};
use super::Loader;

impl<'d> Loader<'d> {
    /// 从骨骼根元素递归构建节点树，返回根句柄
    pub(super) fn load_skeleton_nodes(
        &mut self,
        elem: &'d Element,
        parent: Option<usize>,
        skeleton: &mut Skeleton,
    ) -> usize {
        let name = attr(elem, "sid").or_else(|| attr(elem, "name")).unwrap_or("");
        let id = attr(elem, "id").unwrap_or("");
        let mut node = SkeletonNode::new(name, id);

        if attr(elem, "type") == Some("NODE") {
            node.set_type(SkeletonNodeType::Node);
        }

        set_skeleton_node_transform(elem, &mut node);

        let handle = skeleton.add_node(node, parent);
        for child in children_named(elem, "node") {
            self.load_skeleton_nodes(child, Some(handle), skeleton);
        }
        handle
    }
}

/// 解析节点变换并保留原始变换序列
///
/// 合成后的局部变换恒等于原始变换按插入顺序的乘积。
pub(super) fn set_skeleton_node_transform(elem: &Element, node: &mut SkeletonNode) {
    let mut transform = DMat4::IDENTITY;

    if let Some(matrix_elem) = elem.get_child("matrix") {
        if let Some(matrix) = parse_matrix_text(&text_of(matrix_elem)) {
            transform = matrix;
            let mut nt = NodeTransform::from_matrix(matrix);
            if let Some(sid) = attr(matrix_elem, "sid") {
                nt.set_sid(sid);
            }
            node.add_raw_transform(nt);
        }
    } else {
        if let Some(translate_elem) = elem.get_child("translate") {
            let v = parse_floats(&text_of(translate_elem));
            if v.len() >= 3 {
                let mut nt = NodeTransform::new(TransformKind::Translate);
                if let Some(sid) = attr(translate_elem, "sid") {
                    nt.set_sid(sid);
                }
                nt.set_source_values(&v[..3]);
                nt.recalculate_matrix();
                transform *= nt.matrix();
                node.add_raw_transform(nt);
            }
        }

        for rotate_elem in children_named(elem, "rotate") {
            let v = parse_floats(&text_of(rotate_elem));
            if v.len() >= 4 {
                let mut nt = NodeTransform::new(TransformKind::Rotate);
                if let Some(sid) = attr(rotate_elem, "sid") {
                    nt.set_sid(sid);
                }
                nt.set_source_values(&v[..4]);
                nt.recalculate_matrix();
                transform *= nt.matrix();
                node.add_raw_transform(nt);
            }
        }

        if let Some(scale_elem) = elem.get_child("scale") {
            let v = parse_floats(&text_of(scale_elem));
            if v.len() >= 3 {
                let mut nt = NodeTransform::new(TransformKind::Scale);
                if let Some(sid) = attr(scale_elem, "sid") {
                    nt.set_sid(sid);
                }
                nt.set_source_values(&v[..3]);
                nt.recalculate_matrix();
                transform *= nt.matrix();
                node.add_raw_transform(nt);
            }
        }
    }

    node.set_transform(transform);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use std::path::PathBuf;

    fn parse_elem(text: &str) -> Element {
        Element::parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_node_named_by_sid_over_name() {
        let root = parse_elem(
            r#"<node id="armature-root" sid="Root" name="RootName" type="JOINT">
                 <node id="child" name="Child" type="JOINT"/>
               </node>"#,
        );
        let doc = parse_elem("<COLLADA version=\"1.4.1\"/>");
        let mut loader = Loader::new(&doc, PathBuf::new(), String::new());
        let mut skeleton = Skeleton::new();
        let handle = loader.load_skeleton_nodes(&root, None, &mut skeleton);
        assert_eq!(skeleton.node(handle).unwrap().name, "Root");
        assert_eq!(skeleton.node(handle).unwrap().id, "armature-root");
        // 子节点没有 sid，退回 name
        let child = skeleton.node_by_name("Child").unwrap();
        assert_eq!(skeleton.node(child).unwrap().parent, Some(handle));
    }

    #[test]
    fn test_type_node_attribute() {
        let elem = parse_elem(r#"<node id="n" name="n" type="NODE"/>"#);
        let doc = parse_elem("<COLLADA version=\"1.4.1\"/>");
        let mut loader = Loader::new(&doc, PathBuf::new(), String::new());
        let mut skeleton = Skeleton::new();
        let handle = loader.load_skeleton_nodes(&elem, None, &mut skeleton);
        assert_eq!(skeleton.node(handle).unwrap().node_type, SkeletonNodeType::Node);
    }

    #[test]
    fn test_raw_transforms_compose_to_local_transform() {
        let elem = parse_elem(
            r#"<node id="n" sid="N">
                 <translate sid="trans">1 2 3</translate>
                 <rotate sid="rotZ">0 0 1 90</rotate>
                 <scale sid="scale">2 2 2</scale>
               </node>"#,
        );
        let mut node = SkeletonNode::new("N", "n");
        set_skeleton_node_transform(&elem, &mut node);

        assert_eq!(node.raw_transforms().len(), 3);
        assert_eq!(node.raw_transforms()[0].sid(), "trans");
        assert_eq!(node.raw_transforms()[2].sid(), "scale");
        assert_eq!(node.raw_transforms()[2].kind(), TransformKind::Scale);

        let mut product = DMat4::IDENTITY;
        for nt in node.raw_transforms() {
            product *= nt.matrix();
        }
        let expected = product.transform_point3(DVec3::X);
        let actual = node.transform().transform_point3(DVec3::X);
        assert!((expected - actual).length() < 1e-12);
        // T * Rz(90) * S 作用于 (1,0,0)：缩放到 (2,0,0)，旋到 (0,2,0)，平移到 (1,4,3)
        assert!((actual - DVec3::new(1.0, 4.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_matrix_node_keeps_single_raw_transform() {
        let elem = parse_elem(
            r#"<node id="n" sid="N">
                 <matrix sid="transform">1 0 0 4  0 1 0 5  0 0 1 6  0 0 0 1</matrix>
               </node>"#,
        );
        let mut node = SkeletonNode::new("N", "n");
        set_skeleton_node_transform(&elem, &mut node);
        assert_eq!(node.raw_transforms().len(), 1);
        assert_eq!(node.raw_transforms()[0].sid(), "transform");
        let p = node.transform().transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(4.0, 5.0, 6.0)).length() < 1e-12);
    }
}
