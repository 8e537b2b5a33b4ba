//! Decoders from response elements to typed records

use crate::error::{Error, Result};
use crate::types::{Connection, ContentItem, ContentKind, Group, Project, SiteInfo, User};
use crate::xml::XmlElement;

/// A record that can be decoded from one response element
pub trait FromRecord: Sized {
    /// Decode `element`; fails with [`Error::RecordParse`] when required data is missing
    fn from_record(element: &XmlElement) -> Result<Self>;
}

fn expect_name(element: &XmlElement, expected: &str) -> Result<()> {
    if element.name == expected {
        Ok(())
    } else {
        Err(Error::record(
            expected,
            format!("expected <{expected}>, found <{}>", element.name),
        ))
    }
}

fn optional(element: &XmlElement, name: &str) -> Option<String> {
    element
        .attr(name)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRecord for ContentItem {
    fn from_record(element: &XmlElement) -> Result<Self> {
        let kind = match element.name.as_str() {
            "workbook" => ContentKind::Workbook,
            "datasource" => ContentKind::Datasource,
            other => {
                return Err(Error::record(
                    "content",
                    format!("expected <workbook> or <datasource>, found <{other}>"),
                ));
            }
        };
        let label = kind.element();
        let id = element.required_attr("id", label)?;
        let name = element.required_attr("name", label)?;
        let mut item = ContentItem::new(kind, id, name);

        if let Some(project) = element.child("project") {
            let project_id = project.required_attr("id", label)?;
            item = item.with_project(project_id, optional(project, "name"));
        }
        if let Some(owner_id) = element.child("owner").and_then(|o| optional(o, "id")) {
            item = item.with_owner(owner_id);
        }
        if let Some(tags) = element.child("tags") {
            let labels: Vec<&str> = tags
                .children_named("tag")
                .filter_map(|t| t.attr("label"))
                .collect();
            item = item.with_tags(labels);
        }
        if kind == ContentKind::Workbook {
            if let Some(content_url) = optional(element, "contentUrl") {
                item = item.with_content_url(content_url);
            }
            item = item.with_show_tabs(element.attr("showTabs") == Some("true"));
        }
        Ok(item)
    }
}

impl FromRecord for Connection {
    fn from_record(element: &XmlElement) -> Result<Self> {
        expect_name(element, "connection")?;
        Ok(Self {
            id: element.required_attr("id", "connection")?.to_string(),
            connection_type: element.attr("type").unwrap_or_default().to_string(),
            server_address: optional(element, "serverAddress"),
            server_port: optional(element, "serverPort"),
            user_name: optional(element, "userName"),
        })
    }
}

impl FromRecord for Project {
    fn from_record(element: &XmlElement) -> Result<Self> {
        expect_name(element, "project")?;
        Ok(Self {
            id: element.required_attr("id", "project")?.to_string(),
            name: element.required_attr("name", "project")?.to_string(),
            description: optional(element, "description"),
            parent_project_id: optional(element, "parentProjectId"),
        })
    }
}

impl FromRecord for User {
    fn from_record(element: &XmlElement) -> Result<Self> {
        expect_name(element, "user")?;
        Ok(Self {
            id: element.required_attr("id", "user")?.to_string(),
            name: element.required_attr("name", "user")?.to_string(),
            site_role: optional(element, "siteRole"),
        })
    }
}

impl FromRecord for Group {
    fn from_record(element: &XmlElement) -> Result<Self> {
        expect_name(element, "group")?;
        Ok(Self {
            id: element.required_attr("id", "group")?.to_string(),
            name: element.required_attr("name", "group")?.to_string(),
            members: Vec::new(),
        })
    }
}

impl FromRecord for SiteInfo {
    fn from_record(element: &XmlElement) -> Result<Self> {
        expect_name(element, "site")?;
        Ok(Self {
            id: element.required_attr("id", "site")?.to_string(),
            name: element.required_attr("name", "site")?.to_string(),
            content_url: element.attr("contentUrl").unwrap_or_default().to_string(),
            admin_mode: optional(element, "adminMode"),
            state: optional(element, "state"),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn element(xml: &str) -> XmlElement {
        parse_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn decodes_workbook_with_project_owner_and_tags() {
        let item = ContentItem::from_record(&element(
            r#"<workbook id="w1" name="Sales" contentUrl="Sales" showTabs="true">
                 <project id="p1" name="Finance"/>
                 <owner id="u9"/>
                 <tags><tag label="export"/><tag label="Q3"/></tags>
               </workbook>"#,
        ))
        .unwrap();
        assert_eq!(item.kind(), ContentKind::Workbook);
        assert_eq!(item.project_id(), Some("p1"));
        assert_eq!(item.project_name(), Some("Finance"));
        assert_eq!(item.owner_id(), Some("u9"));
        assert_eq!(item.tags(), ["export", "Q3"]);
        assert_eq!(item.content_url(), Some("Sales"));
        assert!(item.show_tabs());
        assert!(item.connections().is_none());
    }

    #[test]
    fn decodes_datasource_without_optional_children() {
        let item = ContentItem::from_record(&element(
            r#"<datasource id="d1" name="Orders" type="postgres"/>"#,
        ))
        .unwrap();
        assert_eq!(item.kind(), ContentKind::Datasource);
        assert_eq!(item.project_id(), None);
        assert!(item.tags().is_empty());
        assert!(!item.show_tabs());
    }

    #[test]
    fn content_without_id_is_a_parse_error() {
        let err = ContentItem::from_record(&element(r#"<workbook name="x"/>"#)).unwrap_err();
        assert!(matches!(err, Error::RecordParse { ref kind, .. } if kind == "workbook"));
    }

    #[test]
    fn wrong_element_is_a_parse_error() {
        assert!(Project::from_record(&element(r#"<user id="1" name="a"/>"#)).is_err());
        assert!(ContentItem::from_record(&element(r#"<view id="1" name="a"/>"#)).is_err());
    }

    #[test]
    fn decodes_flat_records() {
        let project = Project::from_record(&element(
            r#"<project id="p1" name="Finance" description="Money" parentProjectId="p0"/>"#,
        ))
        .unwrap();
        assert_eq!(project.description.as_deref(), Some("Money"));
        assert_eq!(project.parent_project_id.as_deref(), Some("p0"));

        let user =
            User::from_record(&element(r#"<user id="u1" name="ann" siteRole="Viewer"/>"#)).unwrap();
        assert_eq!(user.site_role.as_deref(), Some("Viewer"));

        let group = Group::from_record(&element(r#"<group id="g1" name="All Users"/>"#)).unwrap();
        assert!(group.members.is_empty());

        let connection = Connection::from_record(&element(
            r#"<connection id="c1" type="sqlserver" serverAddress="db" serverPort="1433" userName="sa"/>"#,
        ))
        .unwrap();
        assert_eq!(connection.connection_type, "sqlserver");
        assert_eq!(connection.server_port.as_deref(), Some("1433"));

        let site = SiteInfo::from_record(&element(
            r#"<site id="s1" name="Default" contentUrl="" adminMode="ContentAndUsers" state="Active"/>"#,
        ))
        .unwrap();
        assert_eq!(site.content_url, "");
        assert_eq!(site.state.as_deref(), Some("Active"));
    }
}
