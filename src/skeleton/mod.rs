//! 骨骼系统

mod node;
mod node_transform;

pub use node::{SkeletonNode, SkeletonNodeType};
pub use node_transform::{NodeTransform, TransformKind};

use glam::DMat4;

use crate::animation::SkeletonAnimation;

/// 骨骼：扁平存储的节点树（句柄即下标）、绑定形状矩阵、
/// 逐源顶点的 (关节名, 权重) 绑定与动画列表
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    nodes: Vec<SkeletonNode>,
    root: Option<usize>,
    bind_shape_transform: DMat4,
    vert_weights: Vec<Vec<(String, f64)>>,
    animations: Vec<SkeletonAnimation>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            bind_shape_transform: DMat4::IDENTITY,
            vert_weights: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// 挂接节点并返回句柄；首个无父节点成为根
    pub fn add_node(&mut self, mut node: SkeletonNode, parent: Option<usize>) -> usize {
        let handle = self.nodes.len();
        node.handle = handle;
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.push(handle);
                }
            }
            None => {
                if self.root.is_none() {
                    self.root = Some(handle);
                }
            }
        }
        handle
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn node(&self, handle: usize) -> Option<&SkeletonNode> {
        self.nodes.get(handle)
    }

    pub fn node_mut(&mut self, handle: usize) -> Option<&mut SkeletonNode> {
        self.nodes.get_mut(handle)
    }

    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node_by_id(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_bind_shape_transform(&mut self, transform: DMat4) {
        self.bind_shape_transform = transform;
    }

    pub fn bind_shape_transform(&self) -> DMat4 {
        self.bind_shape_transform
    }

    /// 预置被绑定的源顶点数量（与 <vcount> 条目数一致）
    pub fn set_num_vert_attached(&mut self, count: usize) {
        self.vert_weights = vec![Vec::new(); count];
    }

    pub fn num_vert_attached(&self) -> usize {
        self.vert_weights.len()
    }

    pub fn add_vert_node_weight<S: Into<String>>(&mut self, vertex: usize, joint: S, weight: f64) {
        if let Some(list) = self.vert_weights.get_mut(vertex) {
            list.push((joint.into(), weight));
        }
    }

    pub fn vert_node_weight_count(&self, vertex: usize) -> usize {
        self.vert_weights.get(vertex).map_or(0, Vec::len)
    }

    pub fn vert_node_weight(&self, vertex: usize, index: usize) -> Option<(&str, f64)> {
        self.vert_weights
            .get(vertex)
            .and_then(|list| list.get(index))
            .map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn add_animation(&mut self, animation: SkeletonAnimation) {
        self.animations.push(animation);
    }

    pub fn animation(&self, index: usize) -> Option<&SkeletonAnimation> {
        self.animations.get(index)
    }

    pub fn animations(&self) -> &[SkeletonAnimation] {
        &self.animations
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }
}
