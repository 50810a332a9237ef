//! xmltree DOM 辅助
//!
//! COLLADA 通过 id/sid 在文档内任意引用元素，引用串可带 '#' 前缀。
//! 这里统一提供递归查找与文本/数值解析工具。

use glam::DMat4;
use xmltree::{Element, XMLNode};

/// 去掉引用串的 '#' 前缀
pub fn strip_ref(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

/// 按名称迭代直接子元素
pub fn children_named<'a>(elem: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    elem.children.iter().filter_map(move |node| match node {
        XMLNode::Element(e) if e.name == name => Some(e),
        _ => None,
    })
}

/// 元素文本内容，缺省为空串
pub fn text_of(elem: &Element) -> String {
    elem.get_text().map(|t| t.into_owned()).unwrap_or_default()
}

pub fn attr<'a>(elem: &'a Element, name: &str) -> Option<&'a str> {
    elem.attributes.get(name).map(String::as_str)
}

/// 文档级递归查找：匹配 id 或 sid 属性；空引用退化为按元素名匹配
pub fn element_by_id<'a>(parent: &'a Element, name: &str, id: &str) -> Option<&'a Element> {
    let id = strip_ref(id);
    if (id.is_empty() && parent.name == name)
        || attr(parent, "id") == Some(id)
        || attr(parent, "sid") == Some(id)
    {
        return Some(parent);
    }
    for node in &parent.children {
        if let XMLNode::Element(child) = node {
            if let Some(found) = element_by_id(child, name, id) {
                return Some(found);
            }
        }
    }
    None
}

/// 空白分隔（任意长度空白）的浮点序列
pub fn parse_floats(text: &str) -> Vec<f64> {
    text.split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .collect()
}

/// 空白分隔的非负整数序列
pub fn parse_ints(text: &str) -> Vec<usize> {
    text.split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .collect()
}

/// 行主序 16 值文本解析为矩阵；数量不足时为 None
pub fn parse_matrix_text(text: &str) -> Option<DMat4> {
    let values = parse_floats(text);
    if values.len() < 16 {
        return None;
    }
    let mut arr = [0.0; 16];
    arr.copy_from_slice(&values[..16]);
    Some(DMat4::from_cols_array(&arr).transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Element {
        Element::parse(
            r#"<root>
                 <library>
                   <geometry id="cube"><mesh/></geometry>
                   <node id="arm" sid="Armature"/>
                 </library>
               </root>"#
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_element_by_id_strips_hash() {
        let root = doc();
        let found = element_by_id(&root, "geometry", "#cube").unwrap();
        assert_eq!(found.name, "geometry");
    }

    #[test]
    fn test_element_by_sid() {
        let root = doc();
        let found = element_by_id(&root, "node", "Armature").unwrap();
        assert_eq!(attr(found, "id"), Some("arm"));
    }

    #[test]
    fn test_element_by_id_missing() {
        let root = doc();
        assert!(element_by_id(&root, "geometry", "#nothing").is_none());
    }

    #[test]
    fn test_parse_matrix_row_major() {
        let m = parse_matrix_text("1 0 0 5  0 1 0 6  0 0 1 7  0 0 0 1").unwrap();
        let p = m.transform_point3(glam::DVec3::ZERO);
        assert!((p - glam::DVec3::new(5.0, 6.0, 7.0)).length() < 1e-12);
    }

    #[test]
    fn test_parse_floats_any_whitespace() {
        assert_eq!(parse_floats("1.0  2.5\n3"), vec![1.0, 2.5, 3.0]);
    }
}
