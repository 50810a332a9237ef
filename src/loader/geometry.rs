//! 几何编织
//!
//! COLLADA 允许位置/法线/纹理坐标各持一套索引，GPU 管线只接受单一索引
//! 缓冲。这里把多索引流重编织为单索引：完整语义组合一致的角复用已有
//! 输出顶点，不一致的就按需复制。polylist 围绕首顶点做凸多边形扇形
//! 三角化；lines 逐对输出端点。

use std::collections::HashMap;

use glam::{DMat4, DVec2, DVec3};
use xmltree::Element;

use crate::mesh::{Mesh, PrimitiveType, SubMesh};
use crate::skeleton::Skeleton;

use super::xml::{attr, children_named, parse_ints, text_of};
use super::Loader;

/// 每语义的索引槽位与元组宽度
#[derive(Clone, Copy, Debug, Default)]
struct PrimitiveInputs {
    vertex: Option<usize>,
    normal: Option<usize>,
    texcoord: Option<usize>,
    /// 单个角占用的索引数（最大 offset + 1）
    width: usize,
}

/// 重编织期间记录的 COLLADA 顶点索引 → 输出顶点对应关系
#[derive(Clone, Copy, Debug)]
struct GeometryIndices {
    mapped_index: u32,
    normal_index: Option<usize>,
    texcoord_index: Option<usize>,
}

/// 单个图元的编织工作状态
#[derive(Default)]
struct Weaver {
    inputs: PrimitiveInputs,
    /// 法线经由 VERTEX 输入连带加载（与位置共用索引）
    combined_vert_norms: bool,
    verts: Vec<DVec3>,
    norms: Vec<DVec3>,
    texcoords: Vec<DVec2>,
    position_dups: HashMap<usize, usize>,
    normal_dups: HashMap<usize, usize>,
    texcoord_dups: HashMap<usize, usize>,
    /// 位置索引 → 已输出的语义组合变体列表
    vertex_index_map: HashMap<usize, Vec<GeometryIndices>>,
}

fn remap(dups: &HashMap<usize, usize>, index: usize) -> usize {
    dups.get(&index).copied().unwrap_or(index)
}

impl Weaver {
    /// 处理一个三角形角：完整语义组合一致则复用，否则追加输出顶点
    fn add_corner(&mut self, values: &[usize], sub_mesh: &mut SubMesh, skeleton: Option<&Skeleton>) {
        let mut dae_vert_index = 0;
        let mut remapped_normal = None;
        let mut remapped_texcoord = None;
        let mut add_vertex = self.inputs.vertex.is_none();

        if let Some(vertex_offset) = self.inputs.vertex {
            let raw = values[vertex_offset];
            dae_vert_index = remap(&self.position_dups, raw);
            remapped_normal = self
                .inputs
                .normal
                .map(|off| remap(&self.normal_dups, values[off]));
            remapped_texcoord = self
                .inputs
                .texcoord
                .map(|off| remap(&self.texcoord_dups, values[off]));

            match self.vertex_index_map.get(&dae_vert_index) {
                None => add_vertex = true,
                Some(variants) => {
                    // 缺失的语义分量视作恒等，比较 Option 本身即可
                    let reuse = variants.iter().find(|entry| {
                        entry.normal_index == remapped_normal
                            && entry.texcoord_index == remapped_texcoord
                    });
                    match reuse {
                        Some(entry) => {
                            sub_mesh.add_index(entry.mapped_index);
                            return;
                        }
                        None => add_vertex = true,
                    }
                }
            }
        }

        if !add_vertex {
            return;
        }

        let mut entry = GeometryIndices {
            mapped_index: 0,
            normal_index: None,
            texcoord_index: None,
        };

        if self.inputs.vertex.is_some() {
            let Some(&position) = self.verts.get(dae_vert_index) else {
                log::error!("顶点索引 {} 超出位置源范围", dae_vert_index);
                return;
            };
            sub_mesh.add_vertex(position);
            let new_index = (sub_mesh.vertex_count() - 1) as u32;
            sub_mesh.add_index(new_index);

            if self.combined_vert_norms {
                if let Some(&normal) = self.norms.get(dae_vert_index) {
                    sub_mesh.add_normal(normal);
                }
            }

            // 蒙皮网格：位置先过绑定形状矩阵，并复制源顶点的权重绑定
            if let Some(skeleton) = skeleton {
                let bind_shape = skeleton.bind_shape_transform();
                sub_mesh.set_vertex(new_index as usize, bind_shape.transform_point3(position));
                for i in 0..skeleton.vert_node_weight_count(dae_vert_index) {
                    if let Some((joint, weight)) = skeleton.vert_node_weight(dae_vert_index, i) {
                        match skeleton.node_by_name(joint) {
                            Some(handle) => {
                                sub_mesh.add_node_assignment(new_index as usize, handle, weight);
                            }
                            None => log::error!("骨骼中找不到关节 '{}'", joint),
                        }
                    }
                }
            }

            entry.mapped_index = new_index;
        }

        if let Some(normal_index) = remapped_normal {
            if let Some(&normal) = self.norms.get(normal_index) {
                sub_mesh.add_normal(normal);
            }
            entry.normal_index = Some(normal_index);
        }

        if let Some(texcoord_index) = remapped_texcoord {
            if let Some(&uv) = self.texcoords.get(texcoord_index) {
                sub_mesh.add_tex_coord(uv);
            }
            entry.texcoord_index = Some(texcoord_index);
        }

        if self.inputs.vertex.is_some() {
            self.vertex_index_map
                .entry(dae_vert_index)
                .or_default()
                .push(entry);
        }
    }
}

impl<'d> Loader<'d> {
    /// 加载 <geometry>/<mesh>：triangles、polylist、lines 依次各成一个子网格
    pub(super) fn load_geometry(&mut self, elem: &'d Element, transform: DMat4, mesh: &mut Mesh) {
        let Some(mesh_elem) = elem.get_child("mesh") else {
            return;
        };
        for triangles in children_named(mesh_elem, "triangles") {
            self.load_triangles(triangles, &transform, mesh);
        }
        for polylist in children_named(mesh_elem, "polylist") {
            self.load_polylist(polylist, &transform, mesh);
        }
        for lines in children_named(mesh_elem, "lines") {
            self.load_lines(lines, &transform, mesh);
        }
    }

    /// 解析 material 属性：经当前 symbol → target 映射再走材质解析，
    /// 未登记到网格的材质先登记
    fn resolve_primitive_material(&mut self, elem: &Element, mesh: &mut Mesh, sub_mesh: &mut SubMesh) {
        let Some(symbol) = attr(elem, "material") else {
            return;
        };
        let target = self
            .material_map
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| symbol.to_string());
        match self.load_material(&target) {
            Some(material) => {
                let index = mesh
                    .index_of_material(&material.name)
                    .unwrap_or_else(|| mesh.add_material(material));
                sub_mesh.set_material_index(index);
            }
            None => log::warn!("无法添加材质 [{}]", target),
        }
    }

    /// 读取 <input> 槽位并加载各语义引用的源数据
    fn build_weaver(&mut self, elem: &Element, transform: &DMat4) -> Option<Weaver> {
        let mut weaver = Weaver::default();
        let mut max_offset = 0;
        let mut any_input = false;

        for input in children_named(elem, "input") {
            let semantic = attr(input, "semantic").unwrap_or("");
            let source = attr(input, "source").unwrap_or("");
            let offset = attr(input, "offset")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0);
            any_input = true;
            max_offset = max_offset.max(offset);

            match semantic {
                "VERTEX" => {
                    let normals_before = weaver.norms.len();
                    self.load_vertices(
                        source,
                        transform,
                        &mut weaver.verts,
                        &mut weaver.norms,
                        &mut weaver.position_dups,
                        &mut weaver.normal_dups,
                    );
                    if weaver.norms.len() > normals_before {
                        weaver.combined_vert_norms = true;
                    }
                    weaver.inputs.vertex = Some(offset);
                }
                "NORMAL" => {
                    self.load_normals(source, transform, &mut weaver.norms, &mut weaver.normal_dups);
                    weaver.combined_vert_norms = false;
                    weaver.inputs.normal = Some(offset);
                }
                // 只支持一组 UV，后续 TEXCOORD 仅占位
                "TEXCOORD" if weaver.inputs.texcoord.is_none() => {
                    self.load_tex_coords(source, &mut weaver.texcoords, &mut weaver.texcoord_dups);
                    weaver.inputs.texcoord = Some(offset);
                }
                other => {
                    log::warn!("暂不支持的图元 input 语义: '{}'", other);
                }
            }
        }

        if !any_input {
            log::error!("图元缺少 input 元素");
            return None;
        }
        weaver.inputs.width = max_offset + 1;
        Some(weaver)
    }

    fn load_triangles(&mut self, elem: &'d Element, transform: &DMat4, mesh: &mut Mesh) {
        let mut sub_mesh = SubMesh::new();
        sub_mesh.set_name(self.current_node_name.clone());
        sub_mesh.set_primitive_type(PrimitiveType::Triangles);
        self.resolve_primitive_material(elem, mesh, &mut sub_mesh);

        let Some(mut weaver) = self.build_weaver(elem, transform) else {
            return;
        };

        let p_text = elem.get_child("p").map(text_of).unwrap_or_default();
        if p_text.trim().is_empty() {
            let count = attr(elem, "count")
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(1);
            if count != 0 {
                log::error!("COLLADA 文件 [{}] 无效，尽力加载其余部分", self.filename);
            } else {
                log::info!("triangles 计数为零，可能并非预期");
            }
            return;
        }

        let indices = parse_ints(&p_text);
        for corner in indices.chunks_exact(weaver.inputs.width) {
            weaver.add_corner(corner, &mut sub_mesh, mesh.skeleton());
        }

        mesh.add_sub_mesh(sub_mesh);
    }

    /// polylist 凸多边形按首顶点扇形三角化：
    /// vcount = n 时产生三角形 (0, k-1, k)，k = 2 … n-1
    fn load_polylist(&mut self, elem: &'d Element, transform: &DMat4, mesh: &mut Mesh) {
        let mut sub_mesh = SubMesh::new();
        sub_mesh.set_name(self.current_node_name.clone());
        sub_mesh.set_primitive_type(PrimitiveType::Triangles);
        self.resolve_primitive_material(elem, mesh, &mut sub_mesh);

        let Some(mut weaver) = self.build_weaver(elem, transform) else {
            return;
        };

        let Some(vcount_elem) = elem.get_child("vcount") else {
            log::error!("polylist 缺少 vcount 元素");
            return;
        };
        let Some(p_elem) = elem.get_child("p") else {
            log::error!("polylist 缺少 p 元素");
            return;
        };

        let vcounts = parse_ints(&text_of(vcount_elem));
        let indices = parse_ints(&text_of(p_elem));
        let width = weaver.inputs.width;

        let mut base = 0;
        for &count in &vcounts {
            if base + count * width > indices.len() {
                log::error!("polylist 索引流长度与 vcount 不一致");
                break;
            }
            for k in 2..count {
                for corner in [0, k - 1, k] {
                    let start = base + corner * width;
                    weaver.add_corner(&indices[start..start + width], &mut sub_mesh, mesh.skeleton());
                }
            }
            base += count * width;
        }

        mesh.add_sub_mesh(sub_mesh);
    }

    /// lines 只消费 VERTEX 输入，逐对端点输出
    fn load_lines(&mut self, elem: &'d Element, transform: &DMat4, mesh: &mut Mesh) {
        let mut sub_mesh = SubMesh::new();
        sub_mesh.set_name(self.current_node_name.clone());
        sub_mesh.set_primitive_type(PrimitiveType::Lines);

        let Some(input) = elem.get_child("input") else {
            log::error!("lines 缺少 input 元素");
            return;
        };
        let source = attr(input, "source").unwrap_or("");

        let mut verts = Vec::new();
        let mut norms = Vec::new();
        let mut vert_dups = HashMap::new();
        let mut norm_dups = HashMap::new();
        self.load_vertices(source, transform, &mut verts, &mut norms, &mut vert_dups, &mut norm_dups);

        let p_text = elem.get_child("p").map(text_of).unwrap_or_default();
        for pair in parse_ints(&p_text).chunks_exact(2) {
            let (a, b) = (pair[0], pair[1]);
            let (Some(&va), Some(&vb)) = (verts.get(a), verts.get(b)) else {
                log::error!("lines 索引超出位置源范围");
                break;
            };
            sub_mesh.add_vertex(va);
            sub_mesh.add_index(sub_mesh.vertex_count() as u32 - 1);
            sub_mesh.add_vertex(vb);
            sub_mesh.add_index(sub_mesh.vertex_count() as u32 - 1);
        }

        mesh.add_sub_mesh(sub_mesh);
    }
}
