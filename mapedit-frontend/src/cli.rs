use std::io::{BufRead, Write};
use std::path::Path;

use mapedit_config::AppConfig;
use mapedit_engine::command::{CommandBus, CommandContext, CommandRequest};
use mapedit_engine::session::{Session, ViewMode};
use mapedit_engine::viewer::{
    PointerPosition, RaycastScene, ViewportSize, VisualizationPanel,
};
use mapedit_io::clipboard::{Osc52Clipboard, copy_document};
use mapedit_io::{DocumentSaver, JsonFacade, to_pretty_json};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::FrontendError;
use crate::loader::{InitialSource, Ingestor};
use crate::resource_locator::ExportLocator;

/// 无窗口时假定的视口尺寸，高度与桌面端面板一致。
pub const DEFAULT_VIEWPORT: ViewportSize = ViewportSize {
    width: 800.0,
    height: 400.0,
};

pub const NO_DOCUMENT_NOTICE: &str = "No JSON Loaded";
pub const COPY_CONFIRMATION: &str = "JSON copied to clipboard!";

const PASTE_TERMINATOR: &str = ".";

/// CLI 自身处理的命令；其余编辑命令转交命令总线。
const CLI_COMMANDS: [(&str, &str); 14] = [
    ("load", "load <path>"),
    ("fetch", "fetch <url>"),
    ("paste", "paste  (以单独一行 `.` 结束)"),
    ("categories", "categories"),
    ("list", "list"),
    ("apply", "apply"),
    ("hover", "hover <px> <py> [width height]"),
    ("frame", "frame"),
    ("show", "show"),
    ("export", "export [path]"),
    ("copy", "copy"),
    ("status", "status"),
    ("help", "help"),
    ("quit", "quit"),
];

enum Flow {
    Continue,
    Quit,
}

/// 行式交互编辑器：持有会话、命令总线与无窗口点云面板。
pub struct Editor {
    session: Session,
    bus: CommandBus,
    ingestor: Ingestor,
    panel: VisualizationPanel<RaycastScene>,
    export: ExportLocator,
}

impl Editor {
    pub fn new(config: &AppConfig) -> Result<Self, FrontendError> {
        let ingestor = Ingestor::from_config(&config.ingest)?;
        Ok(Self::with_ingestor(config, ingestor))
    }

    pub fn with_ingestor(config: &AppConfig, ingestor: Ingestor) -> Self {
        let mut session = Session::new();
        session.set_view_mode(if config.viewer.default_3d {
            ViewMode::Spatial
        } else {
            ViewMode::Flat
        });
        let backend = RaycastScene::new(DEFAULT_VIEWPORT, config.viewer.pick_threshold);
        Self {
            session,
            bus: CommandBus::new(),
            ingestor,
            panel: VisualizationPanel::new(
                backend,
                config.viewer.fov_degrees,
                DEFAULT_VIEWPORT.aspect(),
            ),
            export: ExportLocator::from_config(&config.export),
        }
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn preload(&mut self, source: &InitialSource) -> bool {
        let loaded = self.ingestor.ingest_initial(&mut self.session, source);
        self.panel.sync(&self.session);
        loaded
    }

    /// 逐行读取命令直到 `quit` 或输入结束。
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> Result<(), FrontendError> {
        info!("进入 CLI 交互循环");
        writeln!(output, "Map JSON Editor，输入 help 查看命令")?;
        if let Some(error) = self.session.error() {
            writeln!(output, "错误: {error}")?;
        }
        let mut lines = input.lines();
        loop {
            write!(output, "> ")?;
            output.flush()?;
            let Some(line) = lines.next() else {
                writeln!(output)?;
                break;
            };
            let line = line?;
            let Some(request) = CommandRequest::parse_line(&line) else {
                continue;
            };
            debug!(command = %request.name, args = ?request.args, "CLI 命令");
            let flow = match request.name.as_str() {
                "paste" => {
                    let text = read_paste_block(&mut lines)?;
                    self.ingest_paste(&text, output)?;
                    Flow::Continue
                }
                _ => self.execute(request, output)?,
            };
            self.panel.sync(&self.session);
            if let Flow::Quit = flow {
                break;
            }
        }
        info!("退出 CLI");
        Ok(())
    }

    fn execute<W: Write>(&mut self, request: CommandRequest, output: &mut W) -> Result<Flow, FrontendError> {
        let args = request.args.as_slice();
        match request.name.as_str() {
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" => self.print_help(output)?,
            "load" => {
                if args.is_empty() {
                    writeln!(output, "load 需要文件路径")?;
                } else {
                    let path = request.rest_from(0);
                    let path = path.trim();
                    let loaded = self.ingestor.ingest_file(&mut self.session, Path::new(path));
                    self.report_ingest(loaded, output)?;
                }
            }
            "fetch" => match args.first() {
                Some(url) => {
                    let loaded = self.ingestor.ingest_url(&mut self.session, url);
                    self.report_ingest(loaded, output)?;
                }
                None => writeln!(output, "fetch 需要 URL")?,
            },
            "categories" => self.print_categories(output)?,
            "list" => self.print_entries(output)?,
            "hover" => self.hover(args, output)?,
            "frame" => self.print_framing(output)?,
            "show" => match self.session.document() {
                Some(document) => writeln!(output, "{}", to_pretty_json(document)?)?,
                None => writeln!(output, "{NO_DOCUMENT_NOTICE}")?,
            },
            "export" => self.export(request.rest_from(0).trim(), output)?,
            "copy" => self.copy(output)?,
            "status" => self.print_status(output)?,
            "apply" => self.dispatch(request.renamed("apply_offset"), output)?,
            _ => self.dispatch(request, output)?,
        }
        Ok(Flow::Continue)
    }

    fn dispatch<W: Write>(&mut self, request: CommandRequest, output: &mut W) -> Result<(), FrontendError> {
        let name = request.name.as_str();
        if self.session.document().is_none() && self.bus.contains(name) && name != "view" {
            writeln!(output, "{NO_DOCUMENT_NOTICE}")?;
            return Ok(());
        }
        let mut context = CommandContext {
            session: &mut self.session,
        };
        let response = self.bus.dispatch(&request, &mut context);
        let message = response.message.unwrap_or_default();
        if response.success {
            writeln!(output, "[命令] {message}")?;
        } else {
            warn!(command = name, error = %message, "CLI 命令执行失败");
            writeln!(output, "错误: {message}")?;
        }
        Ok(())
    }

    fn ingest_paste<W: Write>(&mut self, text: &str, output: &mut W) -> Result<(), FrontendError> {
        let loaded = self.ingestor.ingest_paste(&mut self.session, text);
        self.report_ingest(loaded, output)
    }

    fn report_ingest<W: Write>(&self, loaded: bool, output: &mut W) -> Result<(), FrontendError> {
        if loaded {
            let label = self.session.source_label().unwrap_or_default();
            let categories = self
                .session
                .document()
                .map_or(0, |document| document.categories().count());
            writeln!(output, "已载入 {label}，共 {categories} 个分类")?;
        } else if let Some(error) = self.session.error() {
            writeln!(output, "错误: {error}")?;
        }
        Ok(())
    }

    fn print_help<W: Write>(&self, output: &mut W) -> Result<(), FrontendError> {
        writeln!(output, "可用命令：")?;
        for (_, usage) in CLI_COMMANDS {
            writeln!(output, "  {usage}")?;
        }
        for (name, usage) in self.bus.available_commands() {
            if name != "apply_offset" {
                writeln!(output, "  {usage}")?;
            }
        }
        Ok(())
    }

    fn print_categories<W: Write>(&self, output: &mut W) -> Result<(), FrontendError> {
        let Some(document) = self.session.document() else {
            writeln!(output, "{NO_DOCUMENT_NOTICE}")?;
            return Ok(());
        };
        let selected = self.session.selected_category();
        for category in document.categories() {
            let marker = if selected == Some(category) { "*" } else { " " };
            match document.entries(category) {
                Ok(entries) => writeln!(output, "{marker} {category} ({} 个条目)", entries.len())?,
                Err(_) => writeln!(output, "{marker} {category} (不是列表)")?,
            }
        }
        Ok(())
    }

    fn print_entries<W: Write>(&self, output: &mut W) -> Result<(), FrontendError> {
        if self.session.document().is_none() {
            writeln!(output, "{NO_DOCUMENT_NOTICE}")?;
            return Ok(());
        }
        match self.session.selected_entries() {
            Ok(entries) => {
                if entries.is_empty() {
                    writeln!(output, "（空分类）")?;
                }
                for (index, entry) in entries.iter().enumerate() {
                    writeln!(output, "{}", format_entry(index, entry))?;
                }
            }
            Err(err) => writeln!(output, "错误: {err}")?,
        }
        Ok(())
    }

    fn hover<W: Write>(&mut self, args: &[String], output: &mut W) -> Result<(), FrontendError> {
        let numbers: Vec<f64> = args.iter().filter_map(|arg| arg.parse().ok()).collect();
        if numbers.len() != args.len() || !(numbers.len() == 2 || numbers.len() == 4) {
            writeln!(output, "用法: hover <px> <py> [width height]")?;
            return Ok(());
        }
        if let [_, _, width, height] = numbers[..] {
            let viewport = ViewportSize { width, height };
            self.panel.backend_mut().set_viewport(viewport);
            self.panel.set_aspect(viewport.aspect());
        }
        self.panel.sync(&self.session);
        if !self.panel.is_mounted() {
            writeln!(output, "未显示点云，请先选择分类")?;
            return Ok(());
        }
        self.panel.hover(PointerPosition {
            x: numbers[0],
            y: numbers[1],
        });
        match self.panel.hover_label() {
            Some(label) => writeln!(output, "{label}")?,
            None => writeln!(output, "no point")?,
        }
        Ok(())
    }

    fn print_framing<W: Write>(&mut self, output: &mut W) -> Result<(), FrontendError> {
        self.panel.sync(&self.session);
        let Some(framing) = self.panel.framing() else {
            writeln!(output, "未显示点云，请先选择分类")?;
            return Ok(());
        };
        let position = framing.position;
        let target = framing.target;
        writeln!(
            output,
            "{}：{} 个点，相机=({:.3}, {:.3}, {:.3})，目标=({:.3}, {:.3}, {:.3})，距离={:.3}，fov={}°",
            self.session.view_mode().label(),
            self.panel.point_count(),
            position.x(),
            position.y(),
            position.z(),
            target.x(),
            target.y(),
            target.z(),
            framing.distance(),
            framing.fov_degrees
        )?;
        Ok(())
    }

    fn export<W: Write>(&mut self, path: &str, output: &mut W) -> Result<(), FrontendError> {
        let Some(document) = self.session.document() else {
            writeln!(output, "{NO_DOCUMENT_NOTICE}")?;
            return Ok(());
        };
        let explicit = (!path.is_empty()).then(|| Path::new(path));
        let target = self.export.target_for(explicit);
        match JsonFacade::new().save(document, &target) {
            Ok(()) => {
                info!(path = %target.display(), "导出 JSON");
                writeln!(output, "已导出到 {}", target.display())?;
            }
            Err(err) => {
                warn!(path = %target.display(), error = %err, "导出失败");
                writeln!(output, "错误: {err}")?;
            }
        }
        Ok(())
    }

    fn copy<W: Write>(&mut self, output: &mut W) -> Result<(), FrontendError> {
        let Some(document) = self.session.document() else {
            writeln!(output, "{NO_DOCUMENT_NOTICE}")?;
            return Ok(());
        };
        let mut clipboard = Osc52Clipboard::new(&mut *output);
        match copy_document(&mut clipboard, document) {
            Ok(()) => writeln!(output, "{COPY_CONFIRMATION}")?,
            // 失败只记日志。
            Err(err) => warn!(error = %err, "Failed to copy JSON"),
        }
        Ok(())
    }

    fn print_status<W: Write>(&self, output: &mut W) -> Result<(), FrontendError> {
        let session = &self.session;
        match session.source_label() {
            Some(label) => writeln!(output, "来源: {label}（修订 {}）", session.revision())?,
            None => writeln!(output, "{NO_DOCUMENT_NOTICE}")?,
        }
        if let Some(document) = session.document() {
            writeln!(output, "name: {}", document.name().unwrap_or_default())?;
            match document.death_height() {
                Some(height) => writeln!(output, "deathHeight: {height}")?,
                None => writeln!(output, "deathHeight: -")?,
            }
        }
        writeln!(
            output,
            "分类: {}",
            session.selected_category().unwrap_or("（未选择）")
        )?;
        let offset = session.bulk_offset();
        writeln!(
            output,
            "批量偏移: ({}, {}, {})",
            offset.x(),
            offset.y(),
            offset.z()
        )?;
        writeln!(output, "视图: {}", session.view_mode().label())?;
        if let Some(error) = session.error() {
            writeln!(output, "错误: {error}")?;
        }
        Ok(())
    }
}

/// 读取粘贴块，直到单独一行 `.` 或输入结束。
fn read_paste_block<I>(lines: &mut I) -> Result<String, FrontendError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut text = String::new();
    for line in lines {
        let line = line?;
        if line.trim() == PASTE_TERMINATOR {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

/// 列表行使用 1 起的 `#n` 标签，字段按文档原有顺序输出。
fn format_entry(index: usize, entry: &Value) -> String {
    let Some(object) = entry.as_object() else {
        return format!("#{} {entry}", index + 1);
    };
    let fields: Vec<String> = object
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("#{} {}", index + 1, fields.join(" "))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mapedit_io::IoError;
    use mapedit_io::remote::{FetchResponse, HttpFetcher};

    use super::*;

    struct OfflineFetcher;

    impl HttpFetcher for OfflineFetcher {
        fn get(&self, url: &str) -> Result<FetchResponse, IoError> {
            Ok(FetchResponse {
                status: if url.ends_with("/raw/abcd") { 200 } else { 404 },
                body: r#"{"name":"Remote","locations":{"spawn":[]}}"#.to_string(),
            })
        }
    }

    fn editor() -> Editor {
        Editor::with_ingestor(&AppConfig::default(), Ingestor::new(Box::new(OfflineFetcher)))
    }

    fn run_script(editor: &mut Editor, script: &str) -> String {
        let mut output = Vec::new();
        editor
            .run(Cursor::new(script.to_string()), &mut output)
            .expect("脚本执行不应出错");
        String::from_utf8(output).expect("输出应为 UTF-8")
    }

    const PASTE: &str = "paste\n{\"name\":\"M\",\"deathHeight\":-64,\"locations\":{\"spawn\":[{\"x\":1,\"y\":2,\"z\":3,\"yaw\":0,\"pitch\":0,\"customOptions\":{}}]}}\n.\n";

    #[test]
    fn paste_select_edit_and_list() {
        let mut editor = editor();
        let script = format!("{PASTE}select spawn\nedit 0 x 5\nlist\nquit\n");
        let output = run_script(&mut editor, &script);
        assert!(output.contains("已载入 Pasted JSON"));
        assert!(output.contains(
            "#1 x=5 y=2 z=3 yaw=0 pitch=0 customOptions={}"
        ));
    }

    #[test]
    fn edited_text_keeps_exact_whitespace() {
        let mut editor = editor();
        let script = format!(
            "{PASTE}select spawn\nedit 0 label   two  spaces \nset name  Big   Lobby\n"
        );
        let output = run_script(&mut editor, &script);
        assert!(!output.contains("错误"));
        let document = editor.session().document().unwrap();
        assert_eq!(
            document.entries("spawn").unwrap()[0]["label"],
            serde_json::json!("  two  spaces ")
        );
        assert_eq!(document.name(), Some(" Big   Lobby"));
    }

    #[test]
    fn malformed_paste_prints_error() {
        let mut editor = editor();
        let output = run_script(&mut editor, "paste\n{not json\n.\nstatus\n");
        assert!(output.contains("Error parsing pasted JSON"));
        assert!(output.contains(NO_DOCUMENT_NOTICE));
        assert!(editor.session().document().is_none());
    }

    #[test]
    fn editing_without_document_is_rejected() {
        let mut editor = editor();
        let output = run_script(&mut editor, "insert\nlist\n");
        assert!(output.contains(NO_DOCUMENT_NOTICE));
    }

    #[test]
    fn bulk_offset_and_apply() {
        let mut editor = editor();
        let script = format!("{PASTE}select spawn\noffset x 10\noffset z -3\napply\nlist\nstatus\n");
        let output = run_script(&mut editor, &script);
        assert!(output.contains("#1 x=11 y=2 z=0"));
        assert!(output.contains("批量偏移: (0, 0, 0)"));
    }

    #[test]
    fn hover_reports_point_number() {
        let mut editor = editor();
        let script = format!("{PASTE}select spawn\nhover 400 200\nhover 0 0\n");
        let output = run_script(&mut editor, &script);
        assert!(output.contains("Point #1"));
        assert!(output.contains("no point"));
    }

    #[test]
    fn fetch_rewrites_paste_host() {
        let mut editor = editor();
        let output = run_script(
            &mut editor,
            "fetch https://paste.cytooxien.de/abcd\nfetch https://example.com/missing.json\n",
        );
        assert!(output.contains("已载入 abcd"));
        assert!(output.contains("HTTP error! status: 404"));
        assert_eq!(editor.session().source_label(), Some("abcd"));
    }

    #[test]
    fn copy_emits_osc52_and_confirmation() {
        let mut editor = editor();
        let output = run_script(&mut editor, &format!("{PASTE}copy\n"));
        assert!(output.contains("\x1b]52;c;"));
        assert!(output.contains(COPY_CONFIRMATION));
    }

    #[test]
    fn export_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = editor();
        let script = format!("{PASTE}export {}\n", dir.path().display());
        let output = run_script(&mut editor, &script);
        assert!(output.contains("已导出到"));
        let written = std::fs::read_to_string(dir.path().join("map_data.json")).unwrap();
        assert!(written.starts_with("{\n  \"name\": \"M\""));
    }
}
