//! COLLADA 文档加载器
//!
//! 一次 load 调用独占自身全部可变状态（源缓存、材质映射、当前节点名、
//! 单位缩放），互不共享，可在多线程上各自加载不同文档。
//! 文档级失败（文件不可读、XML 不合法、缺少 COLLADA 根）返回错误；
//! 其余错误只记录日志并跳过对应子结构，尽量返回已成功构建的部分。

mod animation;
mod geometry;
mod material;
mod scene;
mod skeleton;
mod skin;
mod source;
mod xml;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{DVec2, DVec3};
use xmltree::Element;

use crate::mesh::{Material, Mesh};
use crate::{ColladaError, Result};

use source::SourceData;
use xml::attr;

/// 支持的 COLLADA 版本（其余版本报错但继续尽力解析）
const SUPPORTED_VERSIONS: [&str; 2] = ["1.4.0", "1.4.1"];

/// 从文件加载 COLLADA 网格
pub fn load<P: AsRef<Path>>(filename: P) -> Result<Mesh> {
    let filename = filename.as_ref();
    let text = fs::read_to_string(filename).map_err(|e| {
        log::error!("无法读取 COLLADA 文件 [{}]: {}", filename.display(), e);
        e
    })?;
    let base_path = filename.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    load_document(&text, base_path, filename.display().to_string())
}

/// 从内存中的 XML 文本加载；base_path 为纹理相对路径的基准目录
pub fn load_from_str<P: Into<PathBuf>>(text: &str, base_path: P) -> Result<Mesh> {
    load_document(text, base_path.into(), String::new())
}

fn load_document(text: &str, base_path: PathBuf, filename: String) -> Result<Mesh> {
    let root = Element::parse(text.as_bytes()).map_err(|e| {
        log::error!("COLLADA 文件 [{}] XML 解析失败: {}", filename, e);
        ColladaError::from(e)
    })?;

    if root.name != "COLLADA" {
        log::error!("缺少 COLLADA 根元素");
        return Err(ColladaError::Parse("missing COLLADA root".into()));
    }

    // 版本校验：两个受支持版本都不匹配才算失配，失配仅报错不中止
    let version = attr(&root, "version").unwrap_or("");
    if SUPPORTED_VERSIONS.iter().all(|v| *v != version) {
        log::error!("无效的 COLLADA 版本 '{}'，要求 1.4.0 或 1.4.1", version);
    }

    // <asset><unit meter=…> 决定最终整体缩放
    let mut meter = 1.0;
    if let Some(asset) = root.get_child("asset") {
        if let Some(unit) = asset.get_child("unit") {
            if let Some(m) = attr(unit, "meter").and_then(|s| s.parse::<f64>().ok()) {
                meter = m;
            }
        }
    }

    let mut mesh = Mesh::new();
    mesh.set_path(base_path.clone());

    let mut loader = Loader::new(&root, base_path, filename);
    loader.load_scene(&mut mesh);

    // 统一在此应用单位缩放，使模型呈现正确尺寸
    mesh.scale(DVec3::splat(meter));

    Ok(mesh)
}

/// 单次加载的全部可变状态
struct Loader<'d> {
    root: &'d Element,
    path: PathBuf,
    filename: String,
    current_node_name: String,
    /// 几何实例边界上重建的 symbol → target 材质映射
    material_map: HashMap<String, String>,
    material_cache: HashMap<String, Option<Material>>,
    position_cache: HashMap<String, SourceData<DVec3>>,
    normal_cache: HashMap<String, SourceData<DVec3>>,
    texcoord_cache: HashMap<String, SourceData<DVec2>>,
}

impl<'d> Loader<'d> {
    fn new(root: &'d Element, path: PathBuf, filename: String) -> Self {
        Self {
            root,
            path,
            filename,
            current_node_name: String::new(),
            material_map: HashMap::new(),
            material_cache: HashMap::new(),
            position_cache: HashMap::new(),
            normal_cache: HashMap::new(),
            texcoord_cache: HashMap::new(),
        }
    }

    /// 文档级 id/sid 查找；返回值的生命周期跟随文档而非加载器
    fn element_by_id(&self, name: &str, id: &str) -> Option<&'d Element> {
        xml::element_by_id(self.root, name, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 以三角形列出的单位立方体（8 顶点 12 三角形，无法线无 UV）
    fn cube_document(unit: Option<f64>, size: f64) -> String {
        let s = size;
        let positions = format!(
            "0 0 0  {s} 0 0  {s} {s} 0  0 {s} 0  0 0 {s}  {s} 0 {s}  {s} {s} {s}  0 {s} {s}"
        );
        let indices = "0 1 2 0 2 3 4 5 6 4 6 7 0 1 5 0 5 4 2 3 7 2 7 6 0 3 7 0 7 4 1 2 6 1 6 5";
        let unit_elem = unit
            .map(|m| format!(r##"<asset><unit meter="{m}"/></asset>"##))
            .unwrap_or_default();
        format!(
            r##"<COLLADA version="1.4.1">
                 {unit_elem}
                 <library_geometries>
                   <geometry id="cube"><mesh>
                     <source id="cube-pos">
                       <float_array id="cube-pos-arr" count="24">{positions}</float_array>
                       <technique_common><accessor source="#cube-pos-arr" count="8" stride="3"/></technique_common>
                     </source>
                     <vertices id="cube-vtx"><input semantic="POSITION" source="#cube-pos"/></vertices>
                     <triangles count="12">
                       <input semantic="VERTEX" source="#cube-vtx" offset="0"/>
                       <p>{indices}</p>
                     </triangles>
                   </mesh></geometry>
                 </library_geometries>
                 <library_visual_scenes>
                   <visual_scene id="vs">
                     <node name="cube-node"><instance_geometry url="#cube"/></node>
                   </visual_scene>
                 </library_visual_scenes>
                 <scene><instance_visual_scene url="#vs"/></scene>
               </COLLADA>"##
        )
    }

    #[test]
    fn test_unit_cube_shares_all_vertices() {
        let mesh = load_from_str(&cube_document(None, 1.0), "").unwrap();
        assert_eq!(mesh.sub_meshes().len(), 1);
        let sub = &mesh.sub_meshes()[0];
        assert_eq!(sub.vertex_count(), 8);
        assert_eq!(sub.indices().len(), 36);
        assert_eq!(sub.name(), "cube-node");
        assert!(sub.indices().iter().all(|&i| (i as usize) < sub.vertex_count()));
    }

    #[test]
    fn test_unit_meter_scales_aabb() {
        // 100 边长 + meter=0.01 → 单位立方体
        let mesh = load_from_str(&cube_document(Some(0.01), 100.0), "").unwrap();
        let (min, max) = mesh.aabb().unwrap();
        assert!((max - min - DVec3::ONE).length() < 1e-9);
    }

    #[test]
    fn test_same_document_loads_identically() {
        let text = cube_document(None, 2.0);
        let a = load_from_str(&text, "").unwrap();
        let b = load_from_str(&text, "").unwrap();
        assert_eq!(a.sub_meshes().len(), b.sub_meshes().len());
        let (sa, sb) = (&a.sub_meshes()[0], &b.sub_meshes()[0]);
        assert_eq!(sa.indices(), sb.indices());
        assert_eq!(sa.vertices(), sb.vertices());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let result = load_from_str("<notcollada/>", "");
        assert!(result.is_err());
    }

    #[test]
    fn test_version_mismatch_still_loads() {
        let text = cube_document(None, 1.0).replace("1.4.1", "1.5.0");
        let mesh = load_from_str(&text, "").unwrap();
        assert_eq!(mesh.sub_meshes().len(), 1);
    }
}
