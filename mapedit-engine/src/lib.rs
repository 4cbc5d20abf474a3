pub mod command;
pub mod viewer;

pub mod errors {
    use mapedit_core::errors::DocumentError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("no document is loaded")]
        DocumentNotLoaded,
        #[error("no category is selected")]
        NoCategorySelected,
        #[error(transparent)]
        Document(#[from] DocumentError),
    }
}

pub mod session {
    use mapedit_core::document::{Document, EntryField, MapParameter, coerce_number};
    use mapedit_core::errors::DocumentError;
    use mapedit_core::geometry::Vector3;
    use serde_json::Value;
    use tracing::{debug, info};

    use crate::errors::EngineError;

    /// 可视化面板的维度模式。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum ViewMode {
        /// 2D：压平到水平面。
        Flat,
        /// 3D：直接使用 (x, y, z)。
        #[default]
        Spatial,
    }

    impl ViewMode {
        pub fn parse(value: &str) -> Option<Self> {
            match value.to_ascii_lowercase().as_str() {
                "2d" | "flat" => Some(ViewMode::Flat),
                "3d" | "spatial" => Some(ViewMode::Spatial),
                _ => None,
            }
        }

        #[inline]
        pub fn toggled(self) -> Self {
            match self {
                ViewMode::Flat => ViewMode::Spatial,
                ViewMode::Spatial => ViewMode::Flat,
            }
        }

        pub fn label(self) -> &'static str {
            match self {
                ViewMode::Flat => "2D View",
                ViewMode::Spatial => "3D View",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Axis {
        X,
        Y,
        Z,
    }

    impl Axis {
        pub fn parse(value: &str) -> Option<Self> {
            match value.to_ascii_lowercase().as_str() {
                "x" => Some(Axis::X),
                "y" => Some(Axis::Y),
                "z" => Some(Axis::Z),
                _ => None,
            }
        }
    }

    /// 编辑会话：持有当前文档以及选中分类、批量偏移等运行时状态。
    ///
    /// 每次编辑都先由 `Document` 计算出新值再整体替换，失败时文档保持不变。
    #[derive(Debug, Default)]
    pub struct Session {
        document: Option<Document>,
        revision: u64,
        selected: Option<String>,
        bulk_offset: Vector3,
        source_label: Option<String>,
        error: Option<String>,
        view_mode: ViewMode,
    }

    impl Session {
        pub fn new() -> Self {
            Self::default()
        }

        /// 替换当前文档：记录来源标签，重置选中分类并清除错误提示。
        pub fn load_document(&mut self, document: Document, label: impl Into<String>) {
            let label = label.into();
            info!(
                label = %label,
                categories = document.categories().count(),
                "载入新文档"
            );
            self.replace(document);
            self.selected = None;
            self.error = None;
            self.source_label = Some(label);
        }

        #[inline]
        pub fn document(&self) -> Option<&Document> {
            self.document.as_ref()
        }

        /// 文档每被替换一次，修订号加一。
        #[inline]
        pub fn revision(&self) -> u64 {
            self.revision
        }

        #[inline]
        pub fn source_label(&self) -> Option<&str> {
            self.source_label.as_deref()
        }

        #[inline]
        pub fn error(&self) -> Option<&str> {
            self.error.as_deref()
        }

        pub fn report_error(&mut self, message: impl Into<String>) {
            self.error = Some(message.into());
        }

        #[inline]
        pub fn clear_error(&mut self) {
            self.error = None;
        }

        #[inline]
        pub fn selected_category(&self) -> Option<&str> {
            self.selected.as_deref()
        }

        /// 选择分类或清空选择，不修改文档内容。
        pub fn select_category(&mut self, category: Option<&str>) -> Result<(), EngineError> {
            let Some(category) = category else {
                self.selected = None;
                return Ok(());
            };
            let document = self.current()?;
            if !document.has_category(category) {
                return Err(DocumentError::CategoryNotFound(category.to_string()).into());
            }
            debug!(category, "选中分类");
            self.selected = Some(category.to_string());
            Ok(())
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected = None;
        }

        pub fn selected_entries(&self) -> Result<&[Value], EngineError> {
            let category = self.active_category()?;
            Ok(self.current()?.entries(category)?)
        }

        pub fn set_parameter(&mut self, parameter: MapParameter, raw: &str) -> Result<(), EngineError> {
            let next = self.current()?.with_parameter(parameter, raw);
            self.replace(next);
            Ok(())
        }

        pub fn edit_entry_field(
            &mut self,
            category: &str,
            index: usize,
            field: &EntryField,
            raw: &str,
        ) -> Result<(), EngineError> {
            let next = self
                .current()?
                .with_entry_field(category, index, field, raw)?;
            self.replace(next);
            Ok(())
        }

        pub fn insert_entry(&mut self, category: &str, index: Option<usize>) -> Result<(), EngineError> {
            let next = self.current()?.with_inserted_entry(category, index)?;
            self.replace(next);
            Ok(())
        }

        pub fn remove_entry(&mut self, category: &str, index: usize) -> Result<(), EngineError> {
            let next = self.current()?.without_entry(category, index)?;
            self.replace(next);
            Ok(())
        }

        /// 在选中分类内移动条目；没有目标位置（拖拽取消）时不做任何事并返回 `false`。
        pub fn reorder_entries(
            &mut self,
            from: usize,
            to: Option<usize>,
        ) -> Result<bool, EngineError> {
            let Some(to) = to else {
                return Ok(false);
            };
            let category = self.active_category()?.to_string();
            let next = self.current()?.with_moved_entry(&category, from, to)?;
            self.replace(next);
            Ok(true)
        }

        #[inline]
        pub fn bulk_offset(&self) -> Vector3 {
            self.bulk_offset
        }

        #[inline]
        pub fn set_bulk_offset(&mut self, offset: Vector3) {
            self.bulk_offset = offset;
        }

        pub fn set_bulk_offset_axis(&mut self, axis: Axis, raw: &str) {
            let value = coerce_number(raw);
            let mut offset = self.bulk_offset.as_vec3();
            match axis {
                Axis::X => offset.x = value,
                Axis::Y => offset.y = value,
                Axis::Z => offset.z = value,
            }
            self.bulk_offset = Vector3(offset);
        }

        /// 将批量偏移应用到选中分类的全部条目，随后把偏移重置为零。
        pub fn apply_bulk_move(&mut self) -> Result<(), EngineError> {
            let category = self.active_category()?.to_string();
            let offset = self.bulk_offset;
            let next = self.current()?.with_offset(&category, offset)?;
            info!(
                category = %category,
                dx = offset.x(),
                dy = offset.y(),
                dz = offset.z(),
                "批量平移分类"
            );
            self.replace(next);
            self.bulk_offset = Vector3::ZERO;
            Ok(())
        }

        #[inline]
        pub fn view_mode(&self) -> ViewMode {
            self.view_mode
        }

        #[inline]
        pub fn set_view_mode(&mut self, mode: ViewMode) {
            self.view_mode = mode;
        }

        fn current(&self) -> Result<&Document, EngineError> {
            self.document.as_ref().ok_or(EngineError::DocumentNotLoaded)
        }

        fn active_category(&self) -> Result<&str, EngineError> {
            self.selected
                .as_deref()
                .ok_or(EngineError::NoCategorySelected)
        }

        fn replace(&mut self, next: Document) {
            self.document = Some(next);
            self.revision = self.revision.wrapping_add(1);
        }
    }

    #[cfg(test)]
    mod tests {
        use serde_json::json;

        use super::*;

        fn loaded_session() -> Session {
            let document = Document::from_value(json!({
                "name": "M",
                "deathHeight": -64,
                "locations": {
                    "spawn": [
                        {"x": 1, "y": 2, "z": 3, "yaw": 0, "pitch": 0, "customOptions": {}},
                        {"x": 4, "y": 5, "z": 6, "yaw": 0, "pitch": 0, "customOptions": {}}
                    ],
                    "npc": [
                        {"x": 0, "y": 70, "z": 0, "yaw": 180, "pitch": 0, "customOptions": {"skin": "steve"}}
                    ]
                }
            }))
            .unwrap();
            let mut session = Session::new();
            session.load_document(document, "map.json");
            session
        }

        #[test]
        fn loading_resets_selection_and_error() {
            let mut session = loaded_session();
            session.select_category(Some("spawn")).unwrap();
            session.report_error("boom");
            let revision = session.revision();

            let replacement = Document::from_value(json!({"locations": {"a": []}})).unwrap();
            session.load_document(replacement, "Pasted JSON");

            assert!(session.selected_category().is_none());
            assert!(session.error().is_none());
            assert_eq!(session.source_label(), Some("Pasted JSON"));
            assert_eq!(session.revision(), revision + 1);
        }

        #[test]
        fn selecting_unknown_category_fails() {
            let mut session = loaded_session();
            let err = session.select_category(Some("missing")).unwrap_err();
            assert!(matches!(
                err,
                EngineError::Document(DocumentError::CategoryNotFound(_))
            ));
            assert!(session.selected_category().is_none());

            let mut empty = Session::new();
            assert!(matches!(
                empty.select_category(Some("spawn")),
                Err(EngineError::DocumentNotLoaded)
            ));
        }

        #[test]
        fn failed_edit_leaves_document_untouched() {
            let mut session = loaded_session();
            let before = session.document().cloned();
            let revision = session.revision();
            assert!(session.remove_entry("spawn", 7).is_err());
            assert_eq!(session.document().cloned(), before);
            assert_eq!(session.revision(), revision);
        }

        #[test]
        fn reorder_without_destination_is_noop() {
            let mut session = loaded_session();
            session.select_category(Some("spawn")).unwrap();
            let revision = session.revision();
            assert!(!session.reorder_entries(0, None).unwrap());
            assert_eq!(session.revision(), revision);

            assert!(session.reorder_entries(0, Some(1)).unwrap());
            let entries = session.selected_entries().unwrap();
            assert_eq!(entries[0]["x"], json!(4));
            assert_eq!(entries[1]["x"], json!(1));
        }

        #[test]
        fn bulk_move_applies_and_resets_offset() {
            let mut session = loaded_session();
            session.select_category(Some("spawn")).unwrap();
            let untouched = session.document().unwrap().entries("npc").unwrap().to_vec();

            session.set_bulk_offset_axis(Axis::X, "10");
            session.set_bulk_offset_axis(Axis::Y, "oops");
            session.set_bulk_offset_axis(Axis::Z, "-1.5");
            assert_eq!(session.bulk_offset(), Vector3::new(10.0, 0.0, -1.5));

            session.apply_bulk_move().unwrap();
            assert!(session.bulk_offset().is_zero());

            let entries = session.selected_entries().unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0]["x"], json!(11));
            assert_eq!(entries[0]["y"], json!(2));
            assert_eq!(entries[0]["z"], json!(1.5));
            assert_eq!(entries[1]["x"], json!(14));
            assert_eq!(
                session.document().unwrap().entries("npc").unwrap(),
                untouched.as_slice()
            );
        }

        #[test]
        fn bulk_move_requires_selection() {
            let mut session = loaded_session();
            session.set_bulk_offset(Vector3::new(1.0, 1.0, 1.0));
            assert!(matches!(
                session.apply_bulk_move(),
                Err(EngineError::NoCategorySelected)
            ));
            assert_eq!(session.bulk_offset(), Vector3::new(1.0, 1.0, 1.0));
        }

        #[test]
        fn view_mode_parses_and_toggles() {
            assert_eq!(ViewMode::parse("2D"), Some(ViewMode::Flat));
            assert_eq!(ViewMode::parse("3d"), Some(ViewMode::Spatial));
            assert_eq!(ViewMode::default(), ViewMode::Spatial);
            assert_eq!(ViewMode::Spatial.toggled(), ViewMode::Flat);
        }
    }
}
