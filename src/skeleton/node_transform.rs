//! 节点原始变换
//!
//! 骨骼节点按文档顺序保留 <matrix>/<translate>/<rotate>/<scale> 的原始参数，
//! 动画通道通过 SID 定位并逐分量改写，之后由参数重建 4×4 矩阵。

use glam::{DMat4, DVec3};

/// 原始变换类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    Translate,
    Rotate,
    Scale,
    Matrix,
}

/// 单个原始变换：类别 + 源参数 + 缓存矩阵
///
/// 参数布局：Translate/Scale 为 [x, y, z]；Rotate 为 [axis_x, axis_y,
/// axis_z, angle_deg]；Matrix 为行主序 16 值。
#[derive(Clone, Debug)]
pub struct NodeTransform {
    sid: String,
    kind: TransformKind,
    source: Vec<f64>,
    matrix: DMat4,
}

impl NodeTransform {
    pub fn new(kind: TransformKind) -> Self {
        Self {
            sid: String::new(),
            kind,
            source: Vec::new(),
            matrix: DMat4::IDENTITY,
        }
    }

    /// 由已合成的矩阵构造（类别为 Matrix，源参数取其行主序展开）
    pub fn from_matrix(matrix: DMat4) -> Self {
        let mut nt = Self::new(TransformKind::Matrix);
        nt.matrix = matrix;
        let cols = matrix.transpose().to_cols_array();
        nt.source = cols.to_vec();
        nt
    }

    pub fn set_sid<S: Into<String>>(&mut self, sid: S) {
        self.sid = sid.into();
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn set_kind(&mut self, kind: TransformKind) {
        self.kind = kind;
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn set_source_values(&mut self, values: &[f64]) {
        self.source = values.to_vec();
    }

    pub fn source_values(&self) -> &[f64] {
        &self.source
    }

    /// 改写单个源参数分量，越界时忽略
    pub fn set_component(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.source.get_mut(index) {
            *slot = value;
        }
    }

    /// 由（可能已被改写的）源参数重建矩阵
    pub fn recalculate_matrix(&mut self) {
        self.matrix = match self.kind {
            TransformKind::Translate => {
                DMat4::from_translation(vec3_from(&self.source))
            }
            TransformKind::Rotate => {
                let axis = vec3_from(&self.source).normalize_or_zero();
                let angle = self.source.get(3).copied().unwrap_or(0.0);
                if axis == DVec3::ZERO {
                    DMat4::IDENTITY
                } else {
                    DMat4::from_axis_angle(axis, angle.to_radians())
                }
            }
            TransformKind::Scale => DMat4::from_scale(vec3_from(&self.source)),
            TransformKind::Matrix => {
                if self.source.len() >= 16 {
                    let mut arr = [0.0; 16];
                    arr.copy_from_slice(&self.source[..16]);
                    // 源参数为行主序
                    DMat4::from_cols_array(&arr).transpose()
                } else {
                    DMat4::IDENTITY
                }
            }
        };
    }

    pub fn matrix(&self) -> DMat4 {
        self.matrix
    }
}

fn vec3_from(values: &[f64]) -> DVec3 {
    DVec3::new(
        values.first().copied().unwrap_or(0.0),
        values.get(1).copied().unwrap_or(0.0),
        values.get(2).copied().unwrap_or(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_recalculate() {
        let mut nt = NodeTransform::new(TransformKind::Translate);
        nt.set_source_values(&[1.0, 2.0, 3.0]);
        nt.recalculate_matrix();
        let p = nt.matrix().transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn test_rotate_component_rewrite() {
        // Z 轴旋转，动画改写 ANGLE 分量（索引 3）后重建
        let mut nt = NodeTransform::new(TransformKind::Rotate);
        nt.set_source_values(&[0.0, 0.0, 1.0, 0.0]);
        nt.set_component(3, 90.0);
        nt.recalculate_matrix();
        let p = nt.matrix().transform_point3(DVec3::new(1.0, 0.0, 0.0));
        assert!((p - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_matrix_row_major_source() {
        let mut nt = NodeTransform::new(TransformKind::Matrix);
        nt.set_source_values(&[
            1.0, 0.0, 0.0, 5.0, //
            0.0, 1.0, 0.0, 6.0, //
            0.0, 0.0, 1.0, 7.0, //
            0.0, 0.0, 0.0, 1.0,
        ]);
        nt.recalculate_matrix();
        let p = nt.matrix().transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(5.0, 6.0, 7.0)).length() < 1e-12);
    }
}
