pub mod geometry {
    use glam::DVec3;

    /// 三维点，内部以 `glam::DVec3` 表示，坐标系与地图文件一致（Y 轴向上）。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        /// 投影到水平面（Y = 0），用于 2D 视图。
        #[inline]
        pub fn flatten(self) -> Self {
            Self(DVec3::new(self.0.x, 0.0, self.0.z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，批量平移偏移量也使用该类型。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const ZERO: Vector3 = Vector3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn is_zero(self) -> bool {
            self.0 == DVec3::ZERO
        }
    }

    impl Default for Vector3 {
        fn default() -> Self {
            Self::ZERO
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐包围盒，用于相机自动取景。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Bounds3D {
        min: Point3,
        max: Point3,
    }

    impl Bounds3D {
        #[inline]
        pub fn new(min: Point3, max: Point3) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        pub fn from_points<I>(points: I) -> Self
        where
            I: IntoIterator<Item = Point3>,
        {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(point);
            }
            bounds
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y() || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Point3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point3 {
            self.max
        }

        pub fn include_point(&mut self, point: Point3) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point3(self.min.as_vec3().min(point.as_vec3()));
            self.max = Point3(self.max.as_vec3().max(point.as_vec3()));
        }

        /// 空包围盒的中心约定为原点。
        pub fn center(&self) -> Point3 {
            if self.is_empty() {
                return Point3::new(0.0, 0.0, 0.0);
            }
            Point3((self.min.as_vec3() + self.max.as_vec3()) * 0.5)
        }

        pub fn size(&self) -> Vector3 {
            if self.is_empty() {
                return Vector3::ZERO;
            }
            Vector3(self.max.as_vec3() - self.min.as_vec3())
        }

        /// 三个轴向尺寸中的最大值。
        #[inline]
        pub fn max_extent(&self) -> f64 {
            self.size().as_vec3().max_element()
        }
    }

}

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum DocumentError {
        #[error("document root must be a JSON object, found {0}")]
        NotAnObject(&'static str),
        #[error("category `{0}` not found")]
        CategoryNotFound(String),
        #[error("category `{0}` is not a list")]
        CategoryNotList(String),
        #[error("index {index} is out of range for category `{category}` ({len} entries)")]
        IndexOutOfRange {
            category: String,
            index: usize,
            len: usize,
        },
        #[error("entry {index} in category `{category}` is not an object")]
        EntryNotObject { category: String, index: usize },
        #[error("field `{0}` cannot be edited directly")]
        ReadOnlyField(String),
    }
}

pub mod document {
    use serde_json::{Map, Number, Value};

    use crate::errors::DocumentError;
    use crate::geometry::{Point3, Vector3};

    pub const NAME_KEY: &str = "name";
    pub const DEATH_HEIGHT_KEY: &str = "deathHeight";
    pub const LOCATIONS_KEY: &str = "locations";
    pub const CUSTOM_OPTIONS_KEY: &str = "customOptions";

    /// 超过该值的整数无法被 f64 精确表示，写回时保留浮点形式。
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

    /// 地图顶层可编辑参数。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MapParameter {
        Name,
        DeathHeight,
    }

    impl MapParameter {
        pub fn key(self) -> &'static str {
            match self {
                MapParameter::Name => NAME_KEY,
                MapParameter::DeathHeight => DEATH_HEIGHT_KEY,
            }
        }

        pub fn parse(name: &str) -> Option<Self> {
            match name {
                NAME_KEY => Some(MapParameter::Name),
                DEATH_HEIGHT_KEY | "death_height" | "deathheight" => Some(MapParameter::DeathHeight),
                _ => None,
            }
        }

        /// 将表单输入转换为文档值：名称原样保存，死亡高度按数值解析。
        pub fn coerce(self, raw: &str) -> Value {
            match self {
                MapParameter::Name => Value::String(raw.to_string()),
                MapParameter::DeathHeight => number_value(coerce_number(raw)),
            }
        }
    }

    /// 条目字段名。五个数值字段之外的键一律按原样文本写入。
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum EntryField {
        X,
        Y,
        Z,
        Yaw,
        Pitch,
        CustomOptions,
        Other(String),
    }

    impl EntryField {
        pub const NUMERIC: [EntryField; 5] = [
            EntryField::X,
            EntryField::Y,
            EntryField::Z,
            EntryField::Yaw,
            EntryField::Pitch,
        ];

        pub fn parse(name: &str) -> Self {
            match name {
                "x" => EntryField::X,
                "y" => EntryField::Y,
                "z" => EntryField::Z,
                "yaw" => EntryField::Yaw,
                "pitch" => EntryField::Pitch,
                CUSTOM_OPTIONS_KEY => EntryField::CustomOptions,
                other => EntryField::Other(other.to_string()),
            }
        }

        pub fn key(&self) -> &str {
            match self {
                EntryField::X => "x",
                EntryField::Y => "y",
                EntryField::Z => "z",
                EntryField::Yaw => "yaw",
                EntryField::Pitch => "pitch",
                EntryField::CustomOptions => CUSTOM_OPTIONS_KEY,
                EntryField::Other(name) => name,
            }
        }

        #[inline]
        pub fn is_numeric(&self) -> bool {
            matches!(
                self,
                EntryField::X | EntryField::Y | EntryField::Z | EntryField::Yaw | EntryField::Pitch
            )
        }

        /// 生成写入文档的值；`customOptions` 不接受表单编辑。
        pub fn coerce(&self, raw: &str) -> Result<Value, DocumentError> {
            match self {
                EntryField::CustomOptions => {
                    Err(DocumentError::ReadOnlyField(CUSTOM_OPTIONS_KEY.to_string()))
                }
                field if field.is_numeric() => Ok(number_value(coerce_number(raw))),
                _ => Ok(Value::String(raw.to_string())),
            }
        }
    }

    /// 单个位置条目的强类型视图。文档内部仍以 JSON 值保存，以便保留未知字段。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Entry {
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub yaw: f64,
        pub pitch: f64,
        pub custom_options: Map<String, Value>,
    }

    impl Entry {
        /// 宽松读取：缺失或非数值的坐标视为 0。
        pub fn from_value(value: &Value) -> Self {
            let Some(object) = value.as_object() else {
                return Self::default();
            };
            let number = |key: &str| object.get(key).map(coerce_value).unwrap_or(0.0);
            Self {
                x: number("x"),
                y: number("y"),
                z: number("z"),
                yaw: number("yaw"),
                pitch: number("pitch"),
                custom_options: object
                    .get(CUSTOM_OPTIONS_KEY)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            }
        }

        pub fn into_value(self) -> Value {
            let mut object = Map::new();
            object.insert("x".into(), number_value(self.x));
            object.insert("y".into(), number_value(self.y));
            object.insert("z".into(), number_value(self.z));
            object.insert("yaw".into(), number_value(self.yaw));
            object.insert("pitch".into(), number_value(self.pitch));
            object.insert(CUSTOM_OPTIONS_KEY.into(), Value::Object(self.custom_options));
            Value::Object(object)
        }

        #[inline]
        pub fn position(&self) -> Point3 {
            Point3::new(self.x, self.y, self.z)
        }
    }

    /// 按 `parseFloat(v) || 0` 的规则解析：跳过前导空白，取最长数值前缀，失败或非有限值返回 0。
    pub fn coerce_number(raw: &str) -> f64 {
        let text = raw.trim_start();
        let bytes = text.as_bytes();
        let mut end = 0;
        if matches!(bytes.first(), Some(b'+' | b'-')) {
            end = 1;
        }

        let int_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut digits = end - int_start;

        if end < bytes.len() && bytes[end] == b'.' {
            let frac_start = end + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            digits += frac_end - frac_start;
            if frac_end > frac_start {
                end = frac_end;
            }
        }

        if digits == 0 {
            return 0.0;
        }

        if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
            let mut exp_end = end + 1;
            if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
                exp_end += 1;
            }
            let exp_digits_start = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > exp_digits_start {
                end = exp_end;
            }
        }

        match text[..end].parse::<f64>() {
            Ok(value) if value.is_finite() && value != 0.0 => value,
            _ => 0.0,
        }
    }

    /// 将任意 JSON 值视作数值：数字直接读取，字符串走 [`coerce_number`]，其余为 0。
    pub fn coerce_value(value: &Value) -> f64 {
        match value {
            Value::Number(number) => number
                .as_f64()
                .filter(|value| value.is_finite())
                .unwrap_or(0.0),
            Value::String(text) => coerce_number(text),
            _ => 0.0,
        }
    }

    /// 整数值写为 JSON 整数（`5` 而非 `5.0`），其余写为浮点。
    pub fn number_value(value: f64) -> Value {
        if !value.is_finite() {
            return Value::from(0);
        }
        if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
            return Value::from(value as i64);
        }
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }

    /// 单元素移动：取出 `from` 处元素并插入到 `to`，其余元素保持相对顺序。
    /// `to` 越界时按数组 splice 语义夹到末尾；`from` 越界返回 `None`。
    pub fn move_item<T: Clone>(items: &[T], from: usize, to: usize) -> Option<Vec<T>> {
        if from >= items.len() {
            return None;
        }
        let mut moved = items.to_vec();
        let item = moved.remove(from);
        let target = to.min(moved.len());
        moved.insert(target, item);
        Some(moved)
    }

    /// 地图配置文档。根对象按原始键序保存，所有编辑都返回新的文档值。
    #[derive(Debug, Clone, PartialEq)]
    pub struct Document {
        root: Map<String, Value>,
    }

    impl Document {
        pub fn from_value(value: Value) -> Result<Self, DocumentError> {
            match value {
                Value::Object(root) => Ok(Self { root }),
                Value::Null => Err(DocumentError::NotAnObject("null")),
                Value::Bool(_) => Err(DocumentError::NotAnObject("a boolean")),
                Value::Number(_) => Err(DocumentError::NotAnObject("a number")),
                Value::String(_) => Err(DocumentError::NotAnObject("a string")),
                Value::Array(_) => Err(DocumentError::NotAnObject("an array")),
            }
        }

        #[inline]
        pub fn as_map(&self) -> &Map<String, Value> {
            &self.root
        }

        pub fn to_value(&self) -> Value {
            Value::Object(self.root.clone())
        }

        pub fn name(&self) -> Option<&str> {
            self.root.get(NAME_KEY).and_then(Value::as_str)
        }

        pub fn death_height(&self) -> Option<f64> {
            self.root.get(DEATH_HEIGHT_KEY).and_then(Value::as_f64)
        }

        #[inline]
        pub fn parameter(&self, parameter: MapParameter) -> Option<&Value> {
            self.root.get(parameter.key())
        }

        fn locations(&self) -> Option<&Map<String, Value>> {
            self.root.get(LOCATIONS_KEY).and_then(Value::as_object)
        }

        /// 按文档中的顺序列出全部分类名。
        pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
            self.locations()
                .into_iter()
                .flat_map(|locations| locations.keys().map(String::as_str))
        }

        pub fn has_category(&self, category: &str) -> bool {
            self.locations()
                .is_some_and(|locations| locations.contains_key(category))
        }

        pub fn entries(&self, category: &str) -> Result<&[Value], DocumentError> {
            let value = self
                .locations()
                .and_then(|locations| locations.get(category))
                .ok_or_else(|| DocumentError::CategoryNotFound(category.to_string()))?;
            value
                .as_array()
                .map(Vec::as_slice)
                .ok_or_else(|| DocumentError::CategoryNotList(category.to_string()))
        }

        pub fn with_parameter(&self, parameter: MapParameter, raw: &str) -> Document {
            let mut root = self.root.clone();
            root.insert(parameter.key().to_string(), parameter.coerce(raw));
            Document { root }
        }

        pub fn with_entry_field(
            &self,
            category: &str,
            index: usize,
            field: &EntryField,
            raw: &str,
        ) -> Result<Document, DocumentError> {
            let value = field.coerce(raw)?;
            let mut entries = self.entries(category)?.to_vec();
            let len = entries.len();
            let entry = entries
                .get_mut(index)
                .ok_or_else(|| out_of_range(category, index, len))?;
            let object = entry
                .as_object_mut()
                .ok_or_else(|| DocumentError::EntryNotObject {
                    category: category.to_string(),
                    index,
                })?;
            object.insert(field.key().to_string(), value);
            Ok(self.with_category(category, entries))
        }

        /// 插入空白条目；`index` 为空时追加到末尾，超出长度同样追加。
        pub fn with_inserted_entry(
            &self,
            category: &str,
            index: Option<usize>,
        ) -> Result<Document, DocumentError> {
            let mut entries = self.entries(category)?.to_vec();
            let target = index.map_or(entries.len(), |index| index.min(entries.len()));
            entries.insert(target, Entry::default().into_value());
            Ok(self.with_category(category, entries))
        }

        pub fn without_entry(&self, category: &str, index: usize) -> Result<Document, DocumentError> {
            let mut entries = self.entries(category)?.to_vec();
            if index >= entries.len() {
                return Err(out_of_range(category, index, entries.len()));
            }
            entries.remove(index);
            Ok(self.with_category(category, entries))
        }

        pub fn with_moved_entry(
            &self,
            category: &str,
            from: usize,
            to: usize,
        ) -> Result<Document, DocumentError> {
            let entries = self.entries(category)?;
            let moved = move_item(entries, from, to)
                .ok_or_else(|| out_of_range(category, from, entries.len()))?;
            Ok(self.with_category(category, moved))
        }

        /// 对分类内所有条目的 x/y/z 加上同一偏移，整组原子替换。
        pub fn with_offset(&self, category: &str, offset: Vector3) -> Result<Document, DocumentError> {
            let entries = self.entries(category)?;
            let mut shifted = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                let mut object = entry
                    .as_object()
                    .cloned()
                    .ok_or_else(|| DocumentError::EntryNotObject {
                        category: category.to_string(),
                        index,
                    })?;
                for (key, delta) in [("x", offset.x()), ("y", offset.y()), ("z", offset.z())] {
                    let current = object.get(key).map(coerce_value).unwrap_or(0.0);
                    object.insert(key.to_string(), number_value(current + delta));
                }
                shifted.push(Value::Object(object));
            }
            Ok(self.with_category(category, shifted))
        }

        fn with_category(&self, category: &str, entries: Vec<Value>) -> Document {
            let mut root = self.root.clone();
            if let Some(Value::Object(locations)) = root.get_mut(LOCATIONS_KEY) {
                // 已存在的键保持原位置。
                locations.insert(category.to_string(), Value::Array(entries));
            }
            Document { root }
        }
    }

    fn out_of_range(category: &str, index: usize, len: usize) -> DocumentError {
        DocumentError::IndexOutOfRange {
            category: category.to_string(),
            index,
            len,
        }
    }

}
