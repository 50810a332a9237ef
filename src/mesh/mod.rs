//! 网格容器

mod material;
mod submesh;

pub use material::Material;
pub use submesh::{NodeAssignment, PrimitiveType, SubMesh};

use std::path::{Path, PathBuf};

use glam::DVec3;

use crate::skeleton::Skeleton;

/// 加载结果网格，独占持有全部子网格、材质与骨骼
#[derive(Debug, Default)]
pub struct Mesh {
    path: PathBuf,
    sub_meshes: Vec<SubMesh>,
    materials: Vec<Material>,
    skeleton: Option<Skeleton>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置源文档所在目录（纹理相对路径的基准）
    pub fn set_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.path = path.into();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 对所有子网格顶点做逐分量缩放
    pub fn scale(&mut self, factor: DVec3) {
        for sub_mesh in &mut self.sub_meshes {
            sub_mesh.scale(factor);
        }
    }

    pub fn add_sub_mesh(&mut self, sub_mesh: SubMesh) {
        self.sub_meshes.push(sub_mesh);
    }

    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    pub fn set_skeleton(&mut self, skeleton: Skeleton) {
        self.skeleton = Some(skeleton);
    }

    pub fn has_skeleton(&self) -> bool {
        self.skeleton.is_some()
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        self.skeleton.as_mut()
    }

    /// 添加材质并返回其索引
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// 按材质名查找已登记的材质索引
    pub fn index_of_material(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    /// 所有子网格顶点的轴对齐包围盒 (min, max)；无顶点时为 None
    pub fn aabb(&self) -> Option<(DVec3, DVec3)> {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        let mut any = false;
        for sub_mesh in &self.sub_meshes {
            for v in sub_mesh.vertices() {
                min = min.min(*v);
                max = max.max(*v);
                any = true;
            }
        }
        any.then_some((min, max))
    }
}
