use std::collections::HashMap;

use mapedit_core::document::{EntryField, MapParameter};

use crate::session::{Axis, Session, ViewMode};

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
    /// 命令名之后的原始文本；存在时取值参数按原样截取，保留空白。
    raw: Option<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            raw: None,
        }
    }

    /// 解析一行命令文本：第一个词为命令名，其后去掉一个分隔空白的剩余部分原样保留。
    /// 空行返回 `None`。
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_start();
        let name_end = line.find(char::is_whitespace).unwrap_or(line.len());
        let name = &line[..name_end];
        if name.is_empty() {
            return None;
        }
        let raw = skip_separator(&line[name_end..]);
        Some(Self {
            name: name.to_string(),
            args: raw.split_whitespace().map(str::to_string).collect(),
            raw: Some(raw.to_string()),
        })
    }

    /// 以相同参数改用另一个命令名。
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn index_arg(&self, position: usize) -> Result<usize, CommandResponse> {
        let raw = self.args.get(position).ok_or_else(|| {
            CommandResponse::err(format!("{} 缺少第 {} 个参数（索引）", self.name, position + 1))
        })?;
        raw.parse::<usize>()
            .map_err(|_| CommandResponse::err(format!("无效索引: {raw}")))
    }

    /// 跳过前 `position` 个参数后的文本值。
    ///
    /// 由 [`CommandRequest::parse_line`] 构造时原样返回剩余文本（只去掉一个分隔空白）；
    /// 否则把剩余参数以空格拼接。
    pub fn rest_from(&self, position: usize) -> String {
        if let Some(raw) = &self.raw {
            let mut rest = raw.as_str();
            for _ in 0..position {
                rest = rest.trim_start();
                let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                rest = skip_separator(&rest[token_end..]);
            }
            return rest.to_string();
        }
        self.args
            .get(position..)
            .map(|rest| rest.join(" "))
            .unwrap_or_default()
    }
}

fn skip_separator(text: &str) -> &str {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_whitespace() => chars.as_str(),
        _ => text,
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn usage(&self) -> &'static str;
    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>)
    -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

impl CommandContext<'_> {
    fn active_category(&self) -> Result<String, CommandResponse> {
        self.session
            .selected_category()
            .map(str::to_string)
            .ok_or_else(|| CommandResponse::err("请先选择分类"))
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SelectCategoryCommand);
        bus.register(DeselectCategoryCommand);
        bus.register(SetParameterCommand);
        bus.register(EditEntryCommand);
        bus.register(InsertEntryCommand);
        bus.register(RemoveEntryCommand);
        bus.register(MoveEntryCommand);
        bus.register(OffsetCommand);
        bus.register(ApplyOffsetCommand);
        bus.register(ViewModeCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// 按名称排序的 (命令, 用法) 列表。
    pub fn available_commands(&self) -> Vec<(&'static str, &'static str)> {
        let mut commands: Vec<_> = self
            .handlers
            .values()
            .map(|handler| (handler.name(), handler.usage()))
            .collect();
        commands.sort_unstable_by_key(|(name, _)| *name);
        commands
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! try_response {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

struct SelectCategoryCommand;

impl CommandHandler for SelectCategoryCommand {
    fn name(&self) -> &'static str {
        "select"
    }

    fn usage(&self) -> &'static str {
        "select <category>"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let raw = request.rest_from(0);
        // 分类名本身带空白时按原样匹配，否则忽略首尾空白。
        let exact = context
            .session
            .document()
            .is_some_and(|document| document.has_category(&raw));
        let category = if exact { raw } else { raw.trim().to_string() };
        if category.is_empty() {
            return CommandResponse::err("select 需要分类名");
        }
        match context.session.select_category(Some(category.as_str())) {
            Ok(()) => CommandResponse::ok(format!("已选择分类 {category}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct DeselectCategoryCommand;

impl CommandHandler for DeselectCategoryCommand {
    fn name(&self) -> &'static str {
        "deselect"
    }

    fn usage(&self) -> &'static str {
        "deselect"
    }

    fn execute(&self, _request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        context.session.clear_selection();
        CommandResponse::ok("已取消分类选择")
    }
}

struct SetParameterCommand;

impl CommandHandler for SetParameterCommand {
    fn name(&self) -> &'static str {
        "set"
    }

    fn usage(&self) -> &'static str {
        "set name|deathHeight <value>"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let Some(parameter) = request.args.first().and_then(|name| MapParameter::parse(name)) else {
            return CommandResponse::err("set 仅支持 name 或 deathHeight");
        };
        let value = request.rest_from(1);
        match context.session.set_parameter(parameter, &value) {
            Ok(()) => CommandResponse::ok(format!("{} 已更新", parameter.key())),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct EditEntryCommand;

impl CommandHandler for EditEntryCommand {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn usage(&self) -> &'static str {
        "edit <index> <field> <value>"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let category = try_response!(context.active_category());
        let index = try_response!(request.index_arg(0));
        let Some(field) = request.args.get(1).map(|name| EntryField::parse(name)) else {
            return CommandResponse::err("edit 需要字段名");
        };
        let value = request.rest_from(2);
        match context
            .session
            .edit_entry_field(&category, index, &field, &value)
        {
            Ok(()) => CommandResponse::ok(format!("#{} {} 已更新", index + 1, field.key())),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct InsertEntryCommand;

impl CommandHandler for InsertEntryCommand {
    fn name(&self) -> &'static str {
        "insert"
    }

    fn usage(&self) -> &'static str {
        "insert [index]"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let category = try_response!(context.active_category());
        let index = if request.args.is_empty() {
            None
        } else {
            Some(try_response!(request.index_arg(0)))
        };
        match context.session.insert_entry(&category, index) {
            Ok(()) => match index {
                Some(index) => CommandResponse::ok(format!("已在位置 {index} 插入新条目")),
                None => CommandResponse::ok("已在末尾添加新条目"),
            },
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct RemoveEntryCommand;

impl CommandHandler for RemoveEntryCommand {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn usage(&self) -> &'static str {
        "remove <index>"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let category = try_response!(context.active_category());
        let index = try_response!(request.index_arg(0));
        match context.session.remove_entry(&category, index) {
            Ok(()) => CommandResponse::ok(format!("已删除条目 #{}", index + 1)),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct MoveEntryCommand;

impl CommandHandler for MoveEntryCommand {
    fn name(&self) -> &'static str {
        "move"
    }

    fn usage(&self) -> &'static str {
        "move <from> [to]"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let from = try_response!(request.index_arg(0));
        let to = if request.args.len() > 1 {
            Some(try_response!(request.index_arg(1)))
        } else {
            None
        };
        match context.session.reorder_entries(from, to) {
            Ok(true) => CommandResponse::ok(format!("已移动条目 {from} -> {}", to.unwrap_or(from))),
            Ok(false) => CommandResponse::ok("未指定目标位置，顺序保持不变"),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct OffsetCommand;

impl CommandHandler for OffsetCommand {
    fn name(&self) -> &'static str {
        "offset"
    }

    fn usage(&self) -> &'static str {
        "offset x|y|z <value>"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let Some(axis) = request.args.first().and_then(|axis| Axis::parse(axis)) else {
            return CommandResponse::err("offset 需要轴名 x、y 或 z");
        };
        context
            .session
            .set_bulk_offset_axis(axis, &request.rest_from(1));
        let offset = context.session.bulk_offset();
        CommandResponse::ok(format!(
            "批量偏移 = ({}, {}, {})",
            offset.x(),
            offset.y(),
            offset.z()
        ))
    }
}

struct ApplyOffsetCommand;

impl CommandHandler for ApplyOffsetCommand {
    fn name(&self) -> &'static str {
        "apply_offset"
    }

    fn usage(&self) -> &'static str {
        "apply_offset"
    }

    fn execute(&self, _request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let category = try_response!(context.active_category());
        let count = context
            .session
            .selected_entries()
            .map_or(0, |entries| entries.len());
        match context.session.apply_bulk_move() {
            Ok(()) => CommandResponse::ok(format!("已平移 {category} 中的 {count} 个条目")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct ViewModeCommand;

impl CommandHandler for ViewModeCommand {
    fn name(&self) -> &'static str {
        "view"
    }

    fn usage(&self) -> &'static str {
        "view 2d|3d|toggle"
    }

    fn execute(&self, request: &CommandRequest, context: &mut CommandContext<'_>) -> CommandResponse {
        let current = context.session.view_mode();
        let mode = match request.args.first().map(String::as_str) {
            None | Some("toggle") => current.toggled(),
            Some(raw) => match ViewMode::parse(raw) {
                Some(mode) => mode,
                None => return CommandResponse::err(format!("未知视图模式: {raw}")),
            },
        };
        context.session.set_view_mode(mode);
        CommandResponse::ok(mode.label())
    }
}

#[cfg(test)]
mod tests {
    use mapedit_core::document::Document;
    use serde_json::json;

    use super::*;

    fn session() -> Session {
        let document = Document::from_value(json!({
            "name": "M",
            "deathHeight": -64,
            "locations": {
                "spawn": [{"x": 1, "y": 2, "z": 3, "yaw": 0, "pitch": 0, "customOptions": {}}]
            }
        }))
        .unwrap();
        let mut session = Session::new();
        session.load_document(document, "map.json");
        session
    }

    fn run(bus: &CommandBus, context: &mut CommandContext<'_>, line: &str) -> CommandResponse {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        bus.dispatch(&CommandRequest::new(name, parts), context)
    }

    #[test]
    fn edit_flow_through_bus() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        assert!(!run(&bus, &mut context, "edit 0 x 5").success);
        assert!(run(&bus, &mut context, "select spawn").success);
        assert!(run(&bus, &mut context, "edit 0 x 5").success);
        assert!(run(&bus, &mut context, "insert 0").success);
        assert!(run(&bus, &mut context, "move 1 0").success);
        assert!(run(&bus, &mut context, "set name Big Lobby").success);

        let document = context.session.document().unwrap();
        assert_eq!(document.name(), Some("Big Lobby"));
        let entries = document.entries("spawn").unwrap();
        assert_eq!(
            entries[0],
            json!({"x": 5, "y": 2, "z": 3, "yaw": 0, "pitch": 0, "customOptions": {}})
        );
        assert_eq!(entries[1]["x"], json!(0));
    }

    #[test]
    fn offset_and_apply() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        run(&bus, &mut context, "select spawn");
        assert!(run(&bus, &mut context, "offset y 10").success);
        assert!(run(&bus, &mut context, "apply_offset").success);
        assert!(context.session.bulk_offset().is_zero());
        assert_eq!(
            context.session.selected_entries().unwrap()[0]["y"],
            json!(12)
        );
    }

    #[test]
    fn invalid_requests_report_errors() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        run(&bus, &mut context, "select spawn");
        assert!(!run(&bus, &mut context, "remove 4").success);
        assert!(!run(&bus, &mut context, "remove x").success);
        assert!(!run(&bus, &mut context, "set colour red").success);
        assert!(!run(&bus, &mut context, "teleport").success);
        let cancelled = run(&bus, &mut context, "move 0");
        assert!(cancelled.success);
        assert_eq!(context.session.selected_entries().unwrap().len(), 1);
    }

    #[test]
    fn parsed_lines_keep_value_whitespace() {
        let request = CommandRequest::parse_line("edit 0 label   two  spaces ").unwrap();
        assert_eq!(request.name, "edit");
        assert_eq!(request.args, ["0", "label", "two", "spaces"]);
        assert_eq!(request.rest_from(2), "  two  spaces ");
        assert_eq!(request.rest_from(0), "0 label   two  spaces ");

        let select = CommandRequest::parse_line("  select my  spawn").unwrap();
        assert_eq!(select.rest_from(0), "my  spawn");
        assert_eq!(CommandRequest::parse_line("set name").unwrap().rest_from(1), "");
        assert!(CommandRequest::parse_line("   ").is_none());

        let built = CommandRequest::new("edit", ["0", "label", " padded "]);
        assert_eq!(built.rest_from(2), " padded ");
    }

    #[test]
    fn edit_stores_exact_text_through_bus() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        for line in ["select spawn", "edit 0 label   two  spaces ", "set name  Big   Lobby"] {
            let request = CommandRequest::parse_line(line).unwrap();
            assert!(bus.dispatch(&request, &mut context).success, "{line}");
        }

        let document = context.session.document().unwrap();
        assert_eq!(document.entries("spawn").unwrap()[0]["label"], json!("  two  spaces "));
        assert_eq!(document.name(), Some(" Big   Lobby"));

        let request = CommandRequest::parse_line("select spawn  ").unwrap();
        assert!(bus.dispatch(&request, &mut context).success);
    }

    #[test]
    fn view_command_toggles() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        let response = run(&bus, &mut context, "view");
        assert_eq!(response.message.as_deref(), Some("2D View"));
        assert_eq!(context.session.view_mode(), ViewMode::Flat);
        run(&bus, &mut context, "view 3d");
        assert_eq!(context.session.view_mode(), ViewMode::Spatial);
        assert!(bus.available_commands().iter().any(|(name, _)| *name == "apply_offset"));
    }
}
