use mapedit_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("Bevy 前端未启用，请使用 `--features bevy_app` 编译")]
    BevyFeatureDisabled,
    #[error("终端读写失败: {0}")]
    Terminal(#[from] std::io::Error),
    #[error(transparent)]
    Io(#[from] IoError),
}
