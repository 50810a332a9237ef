//! 骨骼动画容器

use std::collections::BTreeMap;

use glam::DMat4;

/// 单个关键帧：时间（秒）与该时刻的节点局部变换
#[derive(Clone, Copy, Debug)]
pub struct Keyframe {
    pub time: f64,
    pub transform: DMat4,
}

/// 命名骨骼动画：每根骨骼一条按时间升序的矩阵时间线
#[derive(Clone, Debug, Default)]
pub struct SkeletonAnimation {
    name: String,
    tracks: BTreeMap<String, Vec<Keyframe>>,
}

impl SkeletonAnimation {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            tracks: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 插入关键帧，按时间保持有序；同一时间覆盖旧值
    pub fn add_keyframe<S: Into<String>>(&mut self, bone_id: S, time: f64, transform: DMat4) {
        let track = self.tracks.entry(bone_id.into()).or_default();
        match track.binary_search_by(|kf| kf.time.total_cmp(&time)) {
            Ok(pos) => track[pos].transform = transform,
            Err(pos) => track.insert(pos, Keyframe { time, transform }),
        }
    }

    pub fn track(&self, bone_id: &str) -> Option<&[Keyframe]> {
        self.tracks.get(bone_id).map(Vec::as_slice)
    }

    pub fn tracks(&self) -> &BTreeMap<String, Vec<Keyframe>> {
        &self.tracks
    }

    pub fn bone_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn keyframe_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }
}
