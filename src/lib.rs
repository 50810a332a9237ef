//! COLLADA Mesh - Rust 实现的 COLLADA 1.4 数字资产加载库
//!
//! 把 COLLADA (.dae) 文档转换为可直接用于实时渲染的三角网格：
//! - 场景遍历与节点变换合成
//! - 几何解析（triangles / polylist / lines）与多索引流重编织
//! - 材质解析（lambert / phong / blinn、纹理、透明混合因子）
//! - 骨骼树构建与蒙皮权重绑定
//! - 动画通道装配为逐骨骼矩阵时间线

pub mod animation;
pub mod loader;
pub mod mesh;
pub mod skeleton;

pub use animation::{Keyframe, SkeletonAnimation};
pub use loader::{load, load_from_str};
pub use mesh::{Material, Mesh, PrimitiveType, SubMesh};
pub use skeleton::{NodeTransform, Skeleton, SkeletonNode, SkeletonNodeType, TransformKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColladaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("COLLADA parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ColladaError>;
