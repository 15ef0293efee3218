//! Shutdown behaviour of a running plugin server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plugin_host::error::BoxError;
use plugin_host::group::{InspectGroupsRequest, InspectGroupsResponse};
use plugin_host::lifecycle::TriggerOrigin;
use plugin_host::{ServerError, ShutdownTask, TerminationOutcome};
use plugin_sdk::PluginClient;

mod common;

fn recording_task(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> ShutdownTask {
    let log = log.clone();
    ShutdownTask::new(name, move || async move {
        log.lock().unwrap().push(name);
        Ok::<_, BoxError>(())
    })
}

async fn inspect(client: &mut PluginClient) -> InspectGroupsResponse {
    client
        .call("Group.InspectGroups", &InspectGroupsRequest::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn clean_stop_unbinds_socket() {
    let plugin = common::start_group_plugin(Vec::new()).await;
    let socket_path = plugin.socket_path.clone();
    assert!(socket_path.exists());

    assert!(plugin.server.stop());
    let outcome = tokio::time::timeout(common::PROMPTLY, plugin.server.wait())
        .await
        .expect("outcome not reported");

    assert_eq!(outcome.into_result().unwrap(), TriggerOrigin::External);
    assert!(!socket_path.exists());
    assert!(PluginClient::connect(&socket_path).await.is_err());
}

#[tokio::test]
async fn stop_with_connections_in_flight_is_drainless() {
    let plugin = common::start_group_plugin(Vec::new()).await;
    let socket_path = plugin.socket_path.clone();

    let mut first = PluginClient::connect(&socket_path).await.unwrap();
    let mut second = PluginClient::connect(&socket_path).await.unwrap();
    inspect(&mut first).await;
    inspect(&mut second).await;
    assert_eq!(plugin.server.active_connections(), 2);

    plugin.server.stop();
    let outcome = tokio::time::timeout(common::PROMPTLY, plugin.server.wait())
        .await
        .expect("shutdown waited for in-flight connections");
    assert!(outcome.is_clean());

    // No new connections, but the ones already accepted keep working.
    assert!(PluginClient::connect(&socket_path).await.is_err());
    inspect(&mut first).await;
    inspect(&mut second).await;
}

#[tokio::test]
async fn drain_timeout_waits_for_connections() {
    let plugin = common::start_group_plugin_with(
        |config| config.shutdown.drain_timeout_ms = Some(10_000),
        Vec::new(),
    )
    .await;

    let mut client = PluginClient::connect(&plugin.socket_path).await.unwrap();
    inspect(&mut client).await;

    plugin.server.stop();
    let wait = tokio::spawn(plugin.server.wait());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!wait.is_finished());

    drop(client);
    let outcome = tokio::time::timeout(common::PROMPTLY, wait)
        .await
        .expect("drain did not finish")
        .unwrap();
    assert!(outcome.is_clean());
}

#[tokio::test]
async fn cleanup_tasks_run_once_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let plugin = common::start_group_plugin(vec![
        recording_task("flush", &log),
        recording_task("release", &log),
    ])
    .await;

    let trigger = plugin.server.trigger();
    let racer = tokio::spawn(async move { trigger.fire(TriggerOrigin::Signal("SIGTERM")) });
    let stopped_here = plugin.server.stop();
    let stopped_there = racer.await.unwrap();
    assert!(stopped_here ^ stopped_there);

    assert!(plugin.server.wait().await.is_clean());
    assert_eq!(*log.lock().unwrap(), vec!["flush", "release"]);
}

#[tokio::test]
async fn failing_cleanup_task_fails_the_outcome() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let plugin = common::start_group_plugin(vec![
        ShutdownTask::new("flush", || async { Err::<(), _>("journal unavailable") }),
        recording_task("release", &log),
    ])
    .await;
    let socket_path = plugin.socket_path.clone();

    plugin.server.stop();
    match plugin.server.wait().await {
        TerminationOutcome::Failed(ServerError::ShutdownTask { name, source }) => {
            assert_eq!(name, "flush");
            assert_eq!(source.to_string(), "journal unavailable");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert!(log.lock().unwrap().is_empty());
    // The listener was closed before the failing task ran.
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn independent_servers_do_not_share_triggers() {
    let first = common::start_group_plugin(Vec::new()).await;
    let second = common::start_group_plugin(Vec::new()).await;

    first.server.stop();
    assert!(first.server.wait().await.is_clean());

    let mut client = PluginClient::connect(&second.socket_path).await.unwrap();
    inspect(&mut client).await;

    second.server.stop();
    assert!(second.server.wait().await.is_clean());
}
