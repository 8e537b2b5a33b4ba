use super::*;
use wiremock::matchers::query_param;

const DATASOURCES: &str = r#"
    <datasource id="ds1" name="Orders"><project id="p-fin" name="Finance"/><tags><tag label="move"/></tags></datasource>
    <datasource id="ds2" name="Stock"><project id="p-default" name="Default"/><tags><tag label="move"/></tags></datasource>
    <datasource id="ds3" name="Ledger"><project id="p-fin" name="Finance"/></datasource>"#;

const WORKBOOKS: &str = r#"
    <workbook id="wb1" name="Sales: Q3" contentUrl="sales"><project id="p-fin" name="Finance"/><tags><tag label="move"/><tag label="keep"/></tags></workbook>
    <workbook id="wb2" name="Ops"><project id="p-fin" name="Finance"/></workbook>"#;

async fn mount_content_lists(server: &MockServer) {
    mount_projects(server).await;
    mount_get(
        server,
        &format!("{API}/datasources"),
        list_response("datasources", DATASOURCES, 3),
    )
    .await;
    mount_get(
        server,
        &format!("{API}/users/user-1/workbooks"),
        list_response("workbooks", WORKBOOKS, 2),
    )
    .await;
}

fn tagged_export(dest: &std::path::Path) -> ExportConfig {
    let mut export = ExportConfig::new(dest);
    export.project_name = Some("Finance".into());
    export.tag = Some("move".into());
    export.remove_tag_after_export = true;
    export.into_project_directories = true;
    export
}

#[tokio::test]
async fn export_downloads_filtered_items_and_removes_tags() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_content_lists(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/datasources/ds1/content")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"<datasource/>".to_vec(), "application/xml"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/workbooks/wb1/content")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"PK\x03\x04packaged".to_vec(), "application/octet-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{API}/datasources/ds1/tags/move")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{API}/workbooks/wb1/tags/move")))
        .respond_with(ResponseTemplate::new(500).set_body_string("tag service down"))
        .expect(1)
        .mount(&server)
        .await;

    let dest = temp_dir();
    let config = config_for(&server, TaskConfig::export(tagged_export(dest.path())));
    let migrator = Migrator::new(config).unwrap();
    let results = migrator.run().await.unwrap();

    assert!(migrator.is_done());
    assert_eq!(results.exported.len(), 2);
    let orders = dest.path().join("datasources/Finance/Orders.tds");
    let sales = dest.path().join("workbooks/Finance/Sales-COLON- Q3.twbx");
    assert_eq!(std::fs::read(&orders).unwrap(), b"<datasource/>");
    assert!(sales.is_file());
    assert_eq!(results.exported[0].path, orders);
    assert_eq!(results.exported[1].path, sales);

    // ds1 lost its tag; wb1 kept it because the delete failed
    let datasources = results.datasources.unwrap();
    assert_eq!(datasources.len(), 3);
    assert!(!datasources[0].has_tag("move"));
    assert!(datasources[1].has_tag("move"));
    let workbooks = results.workbooks.unwrap();
    assert!(workbooks[0].has_tag("move"));

    assert_eq!(migrator.error_count(), 1);
    assert!(migrator.error_text().contains("tag_mutation_error"));
}

#[tokio::test]
async fn existing_files_get_numbered_names() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_content_lists(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/datasources/ds1/content")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"new".to_vec(), "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let dest = temp_dir();
    let existing = dest.path().join("datasources");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("Orders.tdsx"), "old").unwrap();

    let mut export = ExportConfig::new(dest.path());
    export.workbooks = false;
    export.tag = Some("move".into());
    export.project_name = Some("Finance".into());
    let migrator = Migrator::new(config_for(&server, TaskConfig::export(export))).unwrap();
    let results = migrator.run().await.unwrap();

    assert_eq!(results.exported.len(), 1);
    assert_eq!(results.exported[0].path, existing.join("Orders (1).tdsx"));
    assert_eq!(std::fs::read_to_string(existing.join("Orders.tdsx")).unwrap(), "old");
}

#[tokio::test]
async fn unknown_project_filter_skips_the_export() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_content_lists(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/datasources/ds1/content")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dest = temp_dir();
    let mut export = ExportConfig::new(dest.path());
    export.project_name = Some("Marketing".into());
    let migrator = Migrator::new(config_for(&server, TaskConfig::export(export))).unwrap();
    let results = migrator.run().await.unwrap();

    assert!(results.exported.is_empty());
    assert!(migrator.error_text().contains("'Marketing' matches no project"));
}

#[tokio::test]
async fn failed_download_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_content_lists(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/datasources/ds1/content")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/datasources/ds3/content")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"x".to_vec(), "text/xml"))
        .expect(1)
        .mount(&server)
        .await;

    let dest = temp_dir();
    let mut export = ExportConfig::new(dest.path());
    export.workbooks = false;
    export.project_name = Some("Finance".into());
    let migrator = Migrator::new(config_for(&server, TaskConfig::export(export))).unwrap();
    let results = migrator.run().await.unwrap();

    assert_eq!(results.exported.len(), 1);
    assert_eq!(results.exported[0].id, "ds3");
    assert!(dest.path().join("datasources/Ledger.tds").is_file());
    assert!(!dest.path().join("datasources/Orders.tmp").exists());
    assert!(migrator.error_text().contains("download_error"));
}

#[tokio::test]
async fn listings_page_through_large_collections() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    for (page, records) in [
        ("1", r#"<datasource id="a" name="A"/><datasource id="b" name="B"/>"#),
        ("2", r#"<datasource id="c" name="C"/>"#),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("{API}/datasources")))
            .and(query_param("pageNumber", page))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_response(
                "datasources",
                records,
                3,
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut config = config_for(
        &server,
        TaskConfig {
            list_datasources: true,
            ..Default::default()
        },
    );
    config.request.page_size = 2;
    let migrator = Migrator::new(config).unwrap();
    let results = migrator.run().await.unwrap();

    let ids: Vec<String> = results
        .datasources
        .unwrap()
        .iter()
        .map(|d| d.id().to_string())
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}
