//! 动画通道装配
//!
//! 通道 target 形如 `bone/sid`、`bone/sid.X`、`bone/sid(3)`、
//! `bone/sid(2)(3)`，定位骨骼原始变换中的单个分量或整段参数。
//! 每个关键帧以该骨骼当前原始变换序列的副本为底，被各通道逐分量
//! 改写，最后按插入顺序重算乘积得到该时刻的矩阵。

use std::collections::BTreeMap;

use glam::DMat4;
use xmltree::Element;

use crate::animation::SkeletonAnimation;
use crate::skeleton::{NodeTransform, Skeleton};

use super::xml::{attr, children_named, parse_floats, text_of};
use super::Loader;

/// 以 total_cmp 全序排序的关键帧时间键
#[derive(Clone, Copy, Debug, PartialEq)]
struct TimeKey(f64);

impl Eq for TimeKey {}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// 装配期工作表：骨骼 id → (时间 → 原始变换序列副本)
type KeyframeTable = BTreeMap<String, BTreeMap<TimeKey, Vec<NodeTransform>>>;

impl<'d> Loader<'d> {
    /// <library_animations>：含嵌套 <animation> 组时逐组装配，
    /// 否则整个库作为单个动画集
    pub(super) fn load_animations(&mut self, library: &'d Element, skeleton: &mut Skeleton) {
        let mut groups = children_named(library, "animation").peekable();
        let nested = groups
            .peek()
            .is_some_and(|first| first.get_child("animation").is_some());
        if nested {
            for group in groups {
                self.load_animation_set(group, skeleton);
            }
        } else {
            self.load_animation_set(library, skeleton);
        }
    }

    /// 装配一组 <animation> 的全部通道为命名动画
    fn load_animation_set(&mut self, elem: &'d Element, skeleton: &mut Skeleton) {
        let name = attr(elem, "name")
            .or_else(|| attr(elem, "id"))
            .map(String::from)
            .unwrap_or_else(|| format!("animation{}", skeleton.animation_count() + 1));

        let mut table = KeyframeTable::new();
        for animation in children_named(elem, "animation") {
            for channel in children_named(animation, "channel") {
                self.load_channel(channel, skeleton, &mut table);
            }
        }

        let mut result = SkeletonAnimation::new(name);
        for (bone_id, frames) in &mut table {
            for (time, transforms) in frames {
                let mut matrix = DMat4::IDENTITY;
                for nt in transforms.iter_mut() {
                    nt.recalculate_matrix();
                    matrix *= nt.matrix();
                }
                result.add_keyframe(bone_id.clone(), time.0, matrix);
            }
        }
        skeleton.add_animation(result);
    }

    /// 单个 <channel>：解析 target，采样 INPUT/OUTPUT 源并写入工作表
    fn load_channel(&mut self, channel: &Element, skeleton: &Skeleton, table: &mut KeyframeTable) {
        let source_url = attr(channel, "source").unwrap_or("");
        let target = attr(channel, "target").unwrap_or("");

        let Some((bone_id, rest)) = target.split_once('/') else {
            log::warn!("无法解析动画 target '{}'", target);
            return;
        };
        let (target_sid, component) = parse_target_components(rest);

        let Some(sampler) = self.element_by_id("sampler", source_url) else {
            log::error!("找不到 sampler [{}]", source_url);
            return;
        };

        let mut times_source = None;
        let mut output_source = None;
        for input in children_named(sampler, "input") {
            let source = attr(input, "source").unwrap_or("");
            match attr(input, "semantic") {
                Some("INPUT") => times_source = self.element_by_id("source", source),
                Some("OUTPUT") => output_source = self.element_by_id("source", source),
                // 插值语义按线性采样处理
                _ => {}
            }
        }
        let (Some(times_source), Some(output_source)) = (times_source, output_source) else {
            log::error!("sampler [{}] 缺少 INPUT/OUTPUT 源", source_url);
            return;
        };

        let times = read_float_array(times_source);
        let values = read_float_array(output_source);
        let stride = output_source
            .get_child("technique_common")
            .and_then(|t| t.get_child("accessor"))
            .and_then(|a| attr(a, "stride"))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1);

        let Some(handle) = skeleton.node_by_id(bone_id) else {
            log::error!("动画通道的目标骨骼 '{}' 不在骨骼树中", bone_id);
            return;
        };
        let base_transforms = skeleton.node(handle).map(|n| n.raw_transforms().to_vec());
        let Some(base_transforms) = base_transforms else {
            return;
        };

        let bone_frames = table.entry(bone_id.to_string()).or_default();
        for (i, &time) in times.iter().enumerate() {
            let frame = bone_frames
                .entry(TimeKey(time))
                .or_insert_with(|| base_transforms.clone());
            for nt in frame.iter_mut() {
                if nt.sid() != target_sid {
                    continue;
                }
                match component {
                    Some(index) => {
                        if let Some(&value) = values.get(i) {
                            nt.set_component(index, value);
                        }
                    }
                    None => {
                        for k in 0..stride {
                            if let Some(&value) = values.get(i * stride + k) {
                                nt.set_component(k, value);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn read_float_array(source: &Element) -> Vec<f64> {
    source
        .get_child("float_array")
        .map(|fa| parse_floats(&text_of(fa)))
        .unwrap_or_default()
}

/// 拆解 target 的 `/` 之后部分：SID 与可选分量索引
///
/// `.X/.Y/.Z/.ANGLE` 映射到 0..3；`(i)` 取 i；`(i)(j)` 按矩阵展平为 i*4+j
fn parse_target_components(rest: &str) -> (&str, Option<usize>) {
    let Some(sep) = rest.find(['(', '.']) else {
        return (rest, None);
    };
    let sid = &rest[..sep];
    let suffix = &rest[sep..];

    if let Some(component) = suffix.strip_prefix('.') {
        let index = match component {
            "X" => Some(0),
            "Y" => Some(1),
            "Z" => Some(2),
            "ANGLE" => Some(3),
            other => {
                log::warn!("未知的动画分量选择器 '{}'", other);
                None
            }
        };
        return (sid, index);
    }

    let indices: Vec<usize> = suffix
        .split(['(', ')'])
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect();
    match indices.as_slice() {
        [i] => (sid, Some(*i)),
        [i, j] => (sid, Some(i * 4 + j)),
        _ => (sid, None),
    }
}
