//! Mock server setup

use super::fixtures::SIGN_IN_OK;
use site_migrate::{RequestConfig, SiteClient, SiteUrl, TaskLog};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount the sign-in endpoint answering with [`SIGN_IN_OK`]
pub async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/2.0/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SIGN_IN_OK))
        .mount(server)
        .await;
}

/// A client for `server` that has already signed in
pub async fn signed_in_client(server: &MockServer, page_size: u32) -> SiteClient {
    mount_sign_in(server).await;
    let site = SiteUrl::parse(&format!("{}/#/site/alpha/projects", server.uri()))
        .expect("mock server URL parses");
    let request = RequestConfig {
        page_size,
        ..Default::default()
    };
    let mut client =
        SiteClient::new(site, &request, TaskLog::new(true)).expect("client builds");
    assert!(client.sign_in("admin", "pw").await.expect("sign-in succeeds"));
    client
}
