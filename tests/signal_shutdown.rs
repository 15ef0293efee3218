//! Real signal delivery. Kept in its own test binary so the signal reaches
//! only this server.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use plugin_host::lifecycle::TriggerOrigin;

mod common;

#[tokio::test]
async fn termination_signal_runs_shutdown() {
    let plugin = common::start_group_plugin(Vec::new()).await;
    let socket_path = plugin.socket_path.clone();

    kill(Pid::this(), Signal::SIGHUP).unwrap();

    let outcome = tokio::time::timeout(common::PROMPTLY, plugin.server.wait())
        .await
        .expect("signal did not trigger shutdown");

    assert_eq!(outcome.into_result().unwrap(), TriggerOrigin::Signal("SIGHUP"));
    assert!(!socket_path.exists());
}
