//! 表单输入缓冲。
//!
//! 输入框每次按键都会提交一次编辑，而数值字段写回文档时会被规整（`1.` 变成 `1`，`-` 变成 `0`）。
//! 字段获得焦点期间显示用户输入的原文，失去焦点后再显示文档中的值。

use mapedit_core::document::MapParameter;
use serde_json::Value;

/// 表单字段的标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    Parameter(MapParameter),
    Entry {
        category: String,
        index: usize,
        field: String,
    },
}

impl FieldKey {
    pub fn entry(category: &str, index: usize, field: &str) -> Self {
        FieldKey::Entry {
            category: category.to_string(),
            index,
            field: field.to_string(),
        }
    }
}

/// 同一时刻只有一个字段处于编辑状态。
#[derive(Debug, Default)]
pub struct EditBuffer {
    active: Option<(FieldKey, String)>,
}

impl EditBuffer {
    /// 输入框应显示的文本：正在编辑的字段返回原文，其余字段取文档值。
    pub fn text(&self, key: &FieldKey, stored: Option<&Value>) -> String {
        match &self.active {
            Some((active, text)) if active == key => text.clone(),
            _ => stored.map(value_text).unwrap_or_default(),
        }
    }

    pub fn update(&mut self, key: FieldKey, text: impl Into<String>) {
        self.active = Some((key, text.into()));
    }

    /// 字段失去焦点时调用，之后显示文档中的值。
    pub fn release(&mut self, key: &FieldKey) {
        if self.active.as_ref().is_some_and(|(active, _)| active == key) {
            self.active = None;
        }
    }

    /// 文档被替换或条目位置变化时丢弃缓冲。
    #[inline]
    pub fn clear(&mut self) {
        self.active = None;
    }

    #[inline]
    pub fn is_editing(&self) -> bool {
        self.active.is_some()
    }
}

/// 表单中显示的文本：字符串去掉引号，其余沿用 JSON 表示。
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
