//! Remote store fixtures

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Metadata record as served by the remote store
pub fn metadata_body(id: u32) -> String {
    format!(
        r#"{{"name":"Pepe #{id}","description":"A rare pepe","image":"https://data.peplicator.fun/pepes/{id}.png","attributes":[{{"trait_type":"Mood","value":"Smug"}}]}}"#
    )
}

/// Image bytes for `id`; distinct per ID so misplaced files are caught
pub fn image_body(id: u32) -> Vec<u8> {
    let mut body = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    body.extend_from_slice(id.to_string().as_bytes());
    body
}

/// Serve `metadata/<id>` with [`metadata_body`], expecting exactly `expected` requests
pub async fn mount_metadata(server: &MockServer, id: u32, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/metadata/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(metadata_body(id)))
        .expect(expected)
        .mount(server)
        .await;
}

/// Serve `pepes/<id>.png` with [`image_body`], expecting exactly `expected` requests
pub async fn mount_image(server: &MockServer, id: u32, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/pepes/{id}.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_body(id)))
        .expect(expected)
        .mount(server)
        .await;
}

/// Answer `remote_path` with `status`
pub async fn mount_status(server: &MockServer, remote_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(remote_path.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve both resources for every ID in `ids`, each expected exactly once
pub async fn mount_collection(server: &MockServer, ids: impl IntoIterator<Item = u32>) {
    for id in ids {
        mount_metadata(server, id, 1).await;
        mount_image(server, id, 1).await;
    }
}
