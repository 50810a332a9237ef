//! 骨骼节点

use glam::DMat4;

use super::NodeTransform;

/// 节点类别：关节参与蒙皮，普通节点只参与层级变换
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonNodeType {
    Joint,
    Node,
}

/// 骨骼树节点
///
/// name 取 sid（缺省时取 name 属性），动画与蒙皮都按它寻址；
/// raw_transforms 保留文档中的变换序列，合成变换恒等于其按序乘积。
#[derive(Clone, Debug)]
pub struct SkeletonNode {
    pub name: String,
    pub id: String,
    pub handle: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub node_type: SkeletonNodeType,
    transform: DMat4,
    raw_transforms: Vec<NodeTransform>,
    inverse_bind_transform: DMat4,
}

impl SkeletonNode {
    pub fn new<S: Into<String>, I: Into<String>>(name: S, id: I) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            handle: 0,
            parent: None,
            children: Vec::new(),
            node_type: SkeletonNodeType::Joint,
            transform: DMat4::IDENTITY,
            raw_transforms: Vec::new(),
            inverse_bind_transform: DMat4::IDENTITY,
        }
    }

    pub fn set_type(&mut self, node_type: SkeletonNodeType) {
        self.node_type = node_type;
    }

    /// 设置合成后的局部变换
    pub fn set_transform(&mut self, transform: DMat4) {
        self.transform = transform;
    }

    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    pub fn add_raw_transform(&mut self, transform: NodeTransform) {
        self.raw_transforms.push(transform);
    }

    pub fn raw_transforms(&self) -> &[NodeTransform] {
        &self.raw_transforms
    }

    pub fn set_inverse_bind_transform(&mut self, transform: DMat4) {
        self.inverse_bind_transform = transform;
    }

    pub fn inverse_bind_transform(&self) -> DMat4 {
        self.inverse_bind_transform
    }

    pub fn handle(&self) -> usize {
        self.handle
    }
}
