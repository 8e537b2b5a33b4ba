use super::*;
use crate::config::{ExportConfig, ImportConfig, TaskConfig};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod export;

const SIGN_IN_OK: &str = r#"<tsResponse xmlns="http://tableau.com/api"><credentials token="tok-1"><site id="site-1" contentUrl="alpha"/><user id="user-1"/></credentials></tsResponse>"#;

const PROJECTS: &str = r#"<project id="p-default" name="Default"/><project id="p-fin" name="Finance"/>"#;

const API: &str = "/api/2.0/sites/site-1";

fn config_for(server: &MockServer, task: TaskConfig) -> Config {
    let mut config = Config::new(
        format!("{}/#/site/alpha/workbooks", server.uri()),
        "admin",
        "pw",
    );
    config.task = task;
    config
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/2.0/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SIGN_IN_OK))
        .mount(server)
        .await;
}

/// One-page listing response
fn list_response(collection: &str, records: &str, total: usize) -> String {
    format!(
        r#"<tsResponse xmlns="http://tableau.com/api"><pagination pageNumber="1" totalAvailable="{total}"/><{collection}>{records}</{collection}></tsResponse>"#
    )
}

async fn mount_get(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_projects(server: &MockServer) {
    mount_get(
        server,
        &format!("{API}/projects"),
        list_response("projects", PROJECTS, 2),
    )
    .await;
}

/// Poll until the status log contains `text`
async fn wait_for_status(migrator: &Migrator, text: &str) {
    for _ in 0..500 {
        if migrator.status_text().contains(text) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status never contained {text:?}:\n{}", migrator.status_text());
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}
