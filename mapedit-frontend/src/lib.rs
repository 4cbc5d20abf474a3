pub mod cli;
pub mod errors;
pub mod form;
pub mod loader;
pub mod resource_locator;

#[cfg(feature = "bevy_app")]
pub mod bevy_app;

use std::io;

use errors::FrontendError;
use loader::InitialSource;
use mapedit_config::AppConfig;
use tracing::info;

/// 在标准输入输出上运行交互式 CLI 编辑器。
pub fn run_cli(config: &AppConfig, initial: Option<&InitialSource>) -> Result<(), FrontendError> {
    info!("启动 CLI 编辑器");
    let mut editor = cli::Editor::new(config)?;
    if let Some(source) = initial {
        editor.preload(source);
    }
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    editor.run(stdin.lock(), &mut stdout)
}

/// 启动 Bevy + egui 桌面前端，若未启用 `bevy_app` 特性则返回错误。
pub fn launch_bevy_desktop(
    config: &AppConfig,
    initial: Option<&InitialSource>,
) -> Result<(), FrontendError> {
    #[cfg(feature = "bevy_app")]
    {
        info!(title = %config.frontend.bevy_window_title, "启动 Bevy 桌面前端");
        bevy_app::launch(config, initial)
    }
    #[cfg(not(feature = "bevy_app"))]
    {
        let _ = (config, initial);
        Err(FrontendError::BevyFeatureDisabled)
    }
}
