//! Rerunning the download: nothing present is fetched again or modified

mod common;

use common::{
    assert_no_partials, image_body, metadata_body, mount_collection, mount_image, mount_metadata,
    snapshot, test_config,
};
use pepe_pin::fetch::BatchDownloadCoordinator;
use pepe_pin::RunStatus;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

#[tokio::test]
async fn rerun_against_unchanged_remote_is_a_no_op() {
    let dir = TempDir::new().unwrap();

    let first_server = MockServer::start().await;
    mount_collection(&first_server, 1..=5).await;
    let config = test_config(&first_server, dir.path(), 1, 5);
    BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();
    let before = snapshot(dir.path());
    assert_eq!(before.len(), 10);

    let second_server = MockServer::start().await;
    for id in 1..=5 {
        mount_metadata(&second_server, id, 0).await;
        mount_image(&second_server, id, 0).await;
    }
    let config = test_config(&second_server, dir.path(), 1, 5);
    let summary = BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.already_present, 10);
    assert_eq!(summary.written, 0);
    assert_eq!(snapshot(dir.path()), before);
    second_server.verify().await;
}

#[tokio::test]
async fn rerun_fetches_exactly_the_missing_files() {
    let dir = TempDir::new().unwrap();
    let metadata = dir.path().join("metadata");
    let images = dir.path().join("pepes");
    std::fs::create_dir_all(&metadata).unwrap();
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(metadata.join("1"), b"local metadata 1").unwrap();
    std::fs::write(images.join("2.png"), b"local image 2").unwrap();
    std::fs::write(metadata.join("3"), b"local metadata 3").unwrap();
    std::fs::write(images.join("3.png"), b"local image 3").unwrap();

    let server = MockServer::start().await;
    mount_metadata(&server, 1, 0).await;
    mount_image(&server, 1, 1).await;
    mount_metadata(&server, 2, 1).await;
    mount_image(&server, 2, 0).await;
    mount_metadata(&server, 3, 0).await;
    mount_image(&server, 3, 0).await;

    let config = test_config(&server, dir.path(), 1, 3);
    let summary = BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();

    assert_eq!(summary.written, 2);
    assert_eq!(summary.already_present, 4);
    assert_eq!(std::fs::read(metadata.join("1")).unwrap(), b"local metadata 1");
    assert_eq!(std::fs::read(images.join("2.png")).unwrap(), b"local image 2");
    assert_eq!(std::fs::read(images.join("3.png")).unwrap(), b"local image 3");
    assert_eq!(std::fs::read(images.join("1.png")).unwrap(), image_body(1));
    assert_eq!(
        std::fs::read_to_string(metadata.join("2")).unwrap(),
        metadata_body(2)
    );
    server.verify().await;
}

#[tokio::test]
async fn leftovers_of_an_interrupted_run_are_replaced() {
    let dir = TempDir::new().unwrap();
    let images = dir.path().join("pepes");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join(".1.png.part"), b"\x89PN").unwrap();

    let server = MockServer::start().await;
    mount_collection(&server, [1]).await;
    let config = test_config(&server, dir.path(), 1, 1);
    BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();

    assert_no_partials(dir.path());
    assert_eq!(std::fs::read(images.join("1.png")).unwrap(), image_body(1));
}

#[tokio::test]
async fn resumed_run_completes_an_interrupted_one() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    for id in 1..=20 {
        mount_metadata(&server, id, 1).await;
        mount_image(&server, id, 1).await;
    }
    let config = test_config(&server, dir.path(), 11, 20);
    BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();

    let config = test_config(&server, dir.path(), 1, 20);
    let summary = BatchDownloadCoordinator::new(&config, CancellationToken::new())
        .unwrap()
        .run(config.id_range().unwrap())
        .await
        .unwrap();

    assert_eq!(summary.completed_ids, 20);
    assert_eq!(summary.written, 20);
    assert_eq!(summary.already_present, 20);
    assert_eq!(snapshot(dir.path()).len(), 40);
    server.verify().await;
}
