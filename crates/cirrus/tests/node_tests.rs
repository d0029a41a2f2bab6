//! End-to-end test: a single-node cluster assembled from configuration
//! elects itself, commits a job, and shuts down cleanly.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cirrus::{Config, Node};
use cirrus_consensus::Role;
use cirrus_types::{Job, JobStatus};

async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_single_node_lifecycle() {
    let data_dir = tempfile::tempdir().unwrap();
    let base_dir = tempfile::tempdir().unwrap();
    fs::write(base_dir.path().join("service.bin"), b"service payload").unwrap();

    let toml = format!(
        r#"
[node]
node_id = "solo"
listen_addr = "127.0.0.1:0"
base_dir = "{base}"

[storage]
path = "{data}"
sync_writes = false

[interconnect]
coordinate = [0, 0]

[[interconnect.dimensions]]
size = 32
bypass = [8, 12]

[[interconnect.dimensions]]
size = 16
bypass = [4]
"#,
        base = base_dir.path().display(),
        data = data_dir.path().display(),
    );
    let config = Config::from_toml(&toml).unwrap();

    let mut node = Node::new(config).await.unwrap();
    let engine = Arc::clone(node.engine());
    let run_task = tokio::spawn(async move { node.run().await });

    // A single-node cluster elects itself within a couple of timeouts.
    let elected = wait_for(|| engine.role() == Role::Leader, Duration::from_secs(3)).await;
    assert!(elected, "single node failed to elect itself");
    assert!(engine.current_term() >= 1);

    engine
        .post_job(Job::new("j1", "Render", "p", "iss", "cid", "solo"))
        .unwrap();
    let committed = wait_for(
        || engine.commit_index() >= 1 && engine.job("j1").is_some(),
        Duration::from_secs(3),
    )
    .await;
    assert!(committed, "job never committed");
    assert_eq!(engine.job("j1").unwrap().status, JobStatus::Queued);

    engine.stop();
    run_task.await.unwrap().unwrap();
}
