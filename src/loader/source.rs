//! 源数组解析与缓存
//!
//! 位置/法线按节点变换后的值缓存（键为源 id），并同步建立重复索引表：
//! 后出现的等值项映射到首次出现的下标。相等性取变换后 double 的位模式，
//! 不容忍数值噪声（上游工具产出的要么精确重复要么不同）。

use std::collections::HashMap;

use glam::{DMat4, DVec2, DVec3};
use xmltree::Element;

use super::xml::{attr, children_named, parse_floats, text_of};
use super::Loader;

/// 源缓存条目：解析后的值序列与重复索引表
#[derive(Clone, Debug, Default)]
pub(super) struct SourceData<T> {
    pub values: Vec<T>,
    pub duplicates: HashMap<usize, usize>,
}

fn vec3_key(v: DVec3) -> [u64; 3] {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

fn vec2_key(v: DVec2) -> [u64; 2] {
    [v.x.to_bits(), v.y.to_bits()]
}

/// <float_array> 缺失或无文本时的分级诊断：
/// 声明数量非零按错误处理，零数量仅提示
fn report_missing_array(kind: &str, float_array: Option<&Element>) {
    let count = float_array
        .and_then(|fa| attr(fa, "count"))
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(1);
    if count != 0 {
        log::error!("{} 源缺少 float_array 元素或 count 无效", kind);
    } else {
        log::info!("{} 源的 float_array count 为零，可能并非预期", kind);
    }
}

fn float_array_text(source_elem: &Element, kind: &str) -> Option<String> {
    let float_array = source_elem.get_child("float_array");
    let text = float_array.map(text_of).unwrap_or_default();
    if text.trim().is_empty() {
        report_missing_array(kind, float_array);
        return None;
    }
    Some(text)
}

impl<'d> Loader<'d> {
    /// <vertices> 解引用：加载 POSITION，必要时连带 NORMAL
    pub(super) fn load_vertices(
        &mut self,
        id: &str,
        transform: &DMat4,
        verts: &mut Vec<DVec3>,
        norms: &mut Vec<DVec3>,
        vert_dups: &mut HashMap<usize, usize>,
        norm_dups: &mut HashMap<usize, usize>,
    ) {
        let Some(vertices_elem) = self.element_by_id("vertices", id) else {
            log::error!("找不到 vertices [{}]", id);
            return;
        };
        for input in children_named(vertices_elem, "input") {
            let source = attr(input, "source").unwrap_or("");
            match attr(input, "semantic") {
                Some("POSITION") => self.load_positions(source, transform, verts, vert_dups),
                Some("NORMAL") => self.load_normals(source, transform, norms, norm_dups),
                _ => {}
            }
        }
    }

    /// 位置源：按完整变换变换后缓存
    pub(super) fn load_positions(
        &mut self,
        id: &str,
        transform: &DMat4,
        values: &mut Vec<DVec3>,
        duplicates: &mut HashMap<usize, usize>,
    ) {
        let key = super::xml::strip_ref(id).to_string();
        if !self.position_cache.contains_key(&key) {
            let Some(source_elem) = self.element_by_id("source", id) else {
                log::error!("找不到顶点源 [{}]", id);
                return;
            };
            let Some(text) = float_array_text(source_elem, "顶点") else {
                return;
            };

            let floats = parse_floats(&text);
            let mut data = SourceData::default();
            let mut unique: HashMap<[u64; 3], usize> = HashMap::new();
            for chunk in floats.chunks_exact(3) {
                let vec = transform.transform_point3(DVec3::new(chunk[0], chunk[1], chunk[2]));
                data.values.push(vec);
                let index = data.values.len() - 1;
                match unique.get(&vec3_key(vec)) {
                    Some(&first) => {
                        data.duplicates.insert(index, first);
                    }
                    None => {
                        unique.insert(vec3_key(vec), index);
                    }
                }
            }
            self.position_cache.insert(key.clone(), data);
        }

        let entry = &self.position_cache[&key];
        values.clear();
        values.extend_from_slice(&entry.values);
        duplicates.clone_from(&entry.duplicates);
    }

    /// 法线源：去掉平移分量后变换并归一化
    pub(super) fn load_normals(
        &mut self,
        id: &str,
        transform: &DMat4,
        values: &mut Vec<DVec3>,
        duplicates: &mut HashMap<usize, usize>,
    ) {
        let key = super::xml::strip_ref(id).to_string();
        if !self.normal_cache.contains_key(&key) {
            let Some(source_elem) = self.element_by_id("source", id) else {
                log::error!("找不到法线源 [{}]", id);
                return;
            };
            let float_array = source_elem.get_child("float_array");
            let text = float_array.map(text_of).unwrap_or_default();
            if text.trim().is_empty() {
                let count = float_array
                    .and_then(|fa| attr(fa, "count"))
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(1);
                if count != 0 {
                    log::warn!("法线源缺少 float_array 元素或 count 无效");
                } else {
                    log::info!("法线源的 float_array count 为零，可能并非预期");
                }
                return;
            }

            let floats = parse_floats(&text);
            let mut data = SourceData::default();
            let mut unique: HashMap<[u64; 3], usize> = HashMap::new();
            for chunk in floats.chunks_exact(3) {
                let vec = transform
                    .transform_vector3(DVec3::new(chunk[0], chunk[1], chunk[2]))
                    .normalize_or_zero();
                data.values.push(vec);
                let index = data.values.len() - 1;
                match unique.get(&vec3_key(vec)) {
                    Some(&first) => {
                        data.duplicates.insert(index, first);
                    }
                    None => {
                        unique.insert(vec3_key(vec), index);
                    }
                }
            }
            self.normal_cache.insert(key.clone(), data);
        }

        let entry = &self.normal_cache[&key];
        values.clear();
        values.extend_from_slice(&entry.values);
        duplicates.clone_from(&entry.duplicates);
    }

    /// 纹理坐标源：经 accessor 校验 stride/count，仅取前两个分量，
    /// V 坐标按图像原点翻转存为 1 − v
    pub(super) fn load_tex_coords(
        &mut self,
        id: &str,
        values: &mut Vec<DVec2>,
        duplicates: &mut HashMap<usize, usize>,
    ) {
        let key = super::xml::strip_ref(id).to_string();
        if !self.texcoord_cache.contains_key(&key) {
            let Some(data) = self.parse_tex_coords(id) else {
                return;
            };
            self.texcoord_cache.insert(key.clone(), data);
        }

        let entry = &self.texcoord_cache[&key];
        values.clear();
        values.extend_from_slice(&entry.values);
        duplicates.clone_from(&entry.duplicates);
    }

    fn parse_tex_coords(&self, id: &str) -> Option<SourceData<DVec2>> {
        let Some(source_elem) = self.element_by_id("source", id) else {
            log::error!("找不到纹理坐标源 [{}]", id);
            return None;
        };

        let float_array = source_elem.get_child("float_array");
        let text = float_array.map(text_of).unwrap_or_default();
        if text.trim().is_empty() {
            report_missing_array("纹理坐标", float_array);
            return None;
        }
        let Some(total_count) = attr(float_array?, "count").and_then(|s| s.parse::<usize>().ok())
        else {
            log::error!("纹理坐标源 [{}] 的 float_array 缺少 count 属性", id);
            return None;
        };

        let Some(technique) = source_elem.get_child("technique_common") else {
            log::error!("纹理坐标源 [{}] 缺少 technique_common 元素", id);
            return None;
        };
        let Some(accessor) = technique.get_child("accessor") else {
            log::error!("纹理坐标源 [{}] 的 technique_common 缺少 accessor", id);
            return None;
        };
        let Some(stride) = attr(accessor, "stride").and_then(|s| s.parse::<usize>().ok()) else {
            log::error!("纹理坐标源 [{}] 的 accessor 缺少 stride 属性", id);
            return None;
        };
        let Some(tex_count) = attr(accessor, "count").and_then(|s| s.parse::<usize>().ok()) else {
            log::error!("纹理坐标源 [{}] 的 accessor 缺少 count 属性", id);
            return None;
        };

        if tex_count * stride != total_count {
            log::error!("纹理坐标源 [{}] 的数量与 stride 不一致", id);
            return None;
        }
        // 数量为零是合法文档，静默返回
        if total_count == 0 {
            return Some(SourceData::default());
        }

        let floats = parse_floats(&text);
        if floats.len() < total_count || stride < 2 {
            log::error!("纹理坐标源 [{}] 的 float_array 数据不足", id);
            return None;
        }

        let mut data = SourceData::default();
        let mut unique: HashMap<[u64; 2], usize> = HashMap::new();
        for i in (0..total_count).step_by(stride) {
            let vec = DVec2::new(floats[i], 1.0 - floats[i + 1]);
            data.values.push(vec);
            let index = data.values.len() - 1;
            match unique.get(&vec2_key(vec)) {
                Some(&first) => {
                    data.duplicates.insert(index, first);
                }
                None => {
                    unique.insert(vec2_key(vec), index);
                }
            }
        }
        Some(data)
    }
}
