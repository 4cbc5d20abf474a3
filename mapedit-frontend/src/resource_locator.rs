use std::env;
use std::path::{Path, PathBuf};

use mapedit_config::ExportConfig;
use tracing::{debug, trace};

const EXPORT_DIR_ENV: &str = "MAPEDIT_EXPORT_DIR";

/// 决定导出文件写到哪里：配置目录优先，其次环境变量，最后是当前目录。
#[derive(Debug, Clone)]
pub struct ExportLocator {
    directory: PathBuf,
    file_name: String,
}

impl ExportLocator {
    pub fn from_config(config: &ExportConfig) -> Self {
        let env_dir = env::var_os(EXPORT_DIR_ENV).map(PathBuf::from);
        Self::resolve(config, env_dir)
    }

    fn resolve(config: &ExportConfig, env_dir: Option<PathBuf>) -> Self {
        let candidates = [config.directory.clone(), env_dir];
        let directory = candidates
            .into_iter()
            .flatten()
            .inspect(|dir| trace!(candidate = %dir.display(), "export directory candidate"))
            .find(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        debug!(directory = %directory.display(), file = %config.file_name, "导出位置");
        ExportLocator {
            directory,
            file_name: config.file_name.clone(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 默认导出路径 `<目录>/<文件名>`。
    pub fn default_target(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// 显式给出的路径若是目录，则在其中使用默认文件名。
    pub fn target_for(&self, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) if path.is_dir() => path.join(&self.file_name),
            Some(path) => path.to_path_buf(),
            None => self.default_target(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_directory_wins_over_env() {
        let config = ExportConfig {
            directory: Some(PathBuf::from("exports")),
            ..ExportConfig::default()
        };
        let locator = ExportLocator::resolve(&config, Some(PathBuf::from("from-env")));
        assert_eq!(locator.default_target(), Path::new("exports").join("map_data.json"));
    }

    #[test]
    fn falls_back_to_current_directory() {
        let locator = ExportLocator::resolve(&ExportConfig::default(), None);
        assert_eq!(locator.default_target(), Path::new(".").join("map_data.json"));
    }

    #[test]
    fn explicit_directory_gets_default_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ExportLocator::resolve(&ExportConfig::default(), None);
        assert_eq!(
            locator.target_for(Some(dir.path())),
            dir.path().join("map_data.json")
        );
        let file = dir.path().join("custom.json");
        assert_eq!(locator.target_for(Some(&file)), file);
    }
}
