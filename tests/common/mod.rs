//! Shared utilities for integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use plugin_host::group::{self, MemoryGroupPlugin};
use plugin_host::{start_plugin, Dispatcher, PluginConfig, PluginServer, ShutdownTask};
use tempfile::TempDir;

/// A group plugin served from a private temporary directory.
pub struct TestPlugin {
    pub server: PluginServer,
    pub socket_path: PathBuf,
    _dir: TempDir,
}

pub fn group_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    group::register(&mut dispatcher, Arc::new(MemoryGroupPlugin::new()));
    dispatcher
}

/// Start the in-memory group plugin with extra cleanup tasks.
pub async fn start_group_plugin(cleanup: Vec<ShutdownTask>) -> TestPlugin {
    start_group_plugin_with(|_| {}, cleanup).await
}

/// Start the in-memory group plugin after adjusting the default config.
#[allow(dead_code)]
pub async fn start_group_plugin_with<F>(configure: F, cleanup: Vec<ShutdownTask>) -> TestPlugin
where
    F: FnOnce(&mut PluginConfig),
{
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("group.sock");

    let mut config = PluginConfig::default();
    config.listener.socket_path = socket_path.clone();
    configure(&mut config);

    let server = start_plugin(&config, group_dispatcher(), cleanup).await.unwrap();

    TestPlugin {
        server,
        socket_path,
        _dir: dir,
    }
}

/// Upper bound for anything that should happen "promptly".
#[allow(dead_code)]
pub const PROMPTLY: Duration = Duration::from_secs(5);
