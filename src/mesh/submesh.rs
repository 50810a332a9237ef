//! 子网格定义

use glam::{DVec2, DVec3};

/// 子网格图元类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    Triangles,
    Lines,
}

/// 顶点到骨骼节点的蒙皮权重分配
#[derive(Clone, Copy, Debug)]
pub struct NodeAssignment {
    pub vertex_index: usize,
    pub node_handle: usize,
    pub weight: f64,
}

/// 子网格：单索引缓冲的顶点流，可选法线、纹理坐标与蒙皮权重
#[derive(Clone, Debug)]
pub struct SubMesh {
    name: String,
    primitive_type: PrimitiveType,
    material_index: Option<usize>,
    vertices: Vec<DVec3>,
    normals: Vec<DVec3>,
    tex_coords: Vec<DVec2>,
    indices: Vec<u32>,
    node_assignments: Vec<NodeAssignment>,
}

impl SubMesh {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            primitive_type: PrimitiveType::Triangles,
            material_index: None,
            vertices: Vec::new(),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            indices: Vec::new(),
            node_assignments: Vec::new(),
        }
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_primitive_type(&mut self, primitive_type: PrimitiveType) {
        self.primitive_type = primitive_type;
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    pub fn set_material_index(&mut self, index: usize) {
        self.material_index = Some(index);
    }

    pub fn material_index(&self) -> Option<usize> {
        self.material_index
    }

    pub fn add_vertex(&mut self, vertex: DVec3) {
        self.vertices.push(vertex);
    }

    pub fn vertex(&self, index: usize) -> Option<DVec3> {
        self.vertices.get(index).copied()
    }

    pub fn set_vertex(&mut self, index: usize, vertex: DVec3) {
        if let Some(v) = self.vertices.get_mut(index) {
            *v = vertex;
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn add_normal(&mut self, normal: DVec3) {
        self.normals.push(normal);
    }

    pub fn normals(&self) -> &[DVec3] {
        &self.normals
    }

    pub fn add_tex_coord(&mut self, uv: DVec2) {
        self.tex_coords.push(uv);
    }

    pub fn tex_coords(&self) -> &[DVec2] {
        &self.tex_coords
    }

    pub fn add_index(&mut self, index: u32) {
        self.indices.push(index);
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn add_node_assignment(&mut self, vertex_index: usize, node_handle: usize, weight: f64) {
        self.node_assignments.push(NodeAssignment {
            vertex_index,
            node_handle,
            weight,
        });
    }

    pub fn node_assignments(&self) -> &[NodeAssignment] {
        &self.node_assignments
    }

    /// 逐分量缩放所有顶点
    pub fn scale(&mut self, factor: DVec3) {
        for v in &mut self.vertices {
            *v *= factor;
        }
    }
}

impl Default for SubMesh {
    fn default() -> Self {
        Self::new()
    }
}
