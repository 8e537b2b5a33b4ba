//! Response documents for mock servers

/// Sign-in response for site `site-1` and user `user-1` with token `tok-1`
pub const SIGN_IN_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tsResponse xmlns="http://tableau.com/api" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <credentials token="tok-1">
    <site id="site-1" contentUrl="alpha"/>
    <user id="user-1"/>
  </credentials>
</tsResponse>"#;

/// Path prefix of every site-scoped request
pub const SITE_API: &str = "/api/2.0/sites/site-1";

/// One page of a listing with its pagination summary
pub fn list_page(collection: &str, records: &str, page: u32, page_size: u32, total: u64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tsResponse xmlns="http://tableau.com/api">
  <pagination pageNumber="{page}" pageSize="{page_size}" totalAvailable="{total}"/>
  <{collection}>{records}</{collection}>
</tsResponse>"#
    )
}

/// `<project>` records numbered `first..first + count`
pub fn projects(first: u32, count: u32) -> String {
    (first..first + count)
        .map(|i| format!(r#"<project id="p{i}" name="Project {i}"/>"#))
        .collect()
}

/// Response to opening an upload session
pub fn upload_session(id: &str) -> String {
    format!(r#"<tsResponse><fileUpload uploadSessionId="{id}" fileSize="0"/></tsResponse>"#)
}
