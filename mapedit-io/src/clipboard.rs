//! 剪贴板写入。终端环境下通过 OSC 52 转义序列交给终端模拟器处理。

use std::io::Write;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use mapedit_core::document::Document;
use tracing::debug;

use crate::{IoError, to_pretty_json};

pub trait ClipboardSink {
    fn write_text(&mut self, text: &str) -> Result<(), IoError>;
}

/// 将文本编码为 `ESC ] 52 ; c ; <base64> BEL` 写入底层输出。
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ClipboardSink for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), IoError> {
        let payload = STANDARD.encode(text.as_bytes());
        write!(self.out, "\x1b]52;c;{payload}\x07")
            .and_then(|_| self.out.flush())
            .map_err(|err| IoError::Clipboard(err.to_string()))?;
        debug!(bytes = text.len(), "写入剪贴板");
        Ok(())
    }
}

/// 以导出格式序列化文档并写入剪贴板。
pub fn copy_document(sink: &mut dyn ClipboardSink, document: &Document) -> Result<(), IoError> {
    let text = to_pretty_json(document)?;
    sink.write_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osc52_sequence_wraps_base64_payload() {
        let mut clipboard = Osc52Clipboard::new(Vec::new());
        clipboard.write_text("Hello").unwrap();
        let written = String::from_utf8(clipboard.into_inner()).unwrap();
        assert_eq!(written, "\x1b]52;c;SGVsbG8=\x07");
    }
}
