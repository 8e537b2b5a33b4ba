//! Authenticated session state
//!
//! A [`Session`] only exists after a sign-in response carried a token, a site id
//! and a user id. It is never modified afterwards.

use crate::endpoints::SiteUrl;
use crate::error::{Error, Result};
use crate::xml::{self, XmlElement};

/// Header carrying the auth token on every signed request
pub const AUTH_HEADER: &str = "X-Tableau-Auth";

/// Credentials and identity returned by sign-in
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    server_base_url: String,
    site_segment: String,
    auth_token: String,
    site_id: String,
    user_id: String,
}

impl Session {
    /// Build a session from a sign-in response
    ///
    /// Returns `Ok(None)` when the response is well-formed but names no user,
    /// which the server does for some accounts that do not exist.
    pub(crate) fn from_sign_in(site: &SiteUrl, response: &XmlElement) -> Result<Option<Self>> {
        let credentials = response
            .find("credentials")
            .ok_or_else(|| Error::Authentication {
                reason: "response has no credentials element".into(),
            })?;
        let auth_token = credentials
            .attr("token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                reason: "response has no auth token".into(),
            })?;
        let site_id = credentials
            .find("site")
            .and_then(|s| s.attr("id"))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Authentication {
                reason: "response has no site id".into(),
            })?;
        let Some(user_id) = credentials
            .find("user")
            .and_then(|u| u.attr("id"))
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            server_base_url: site.server_base(),
            site_segment: site.site_segment.clone(),
            auth_token: auth_token.to_string(),
            site_id: site_id.to_string(),
            user_id: user_id.to_string(),
        }))
    }

    /// `scheme://host[:port]` of the server
    pub fn server_base_url(&self) -> &str {
        &self.server_base_url
    }

    /// Site URL segment; empty for the default site
    pub fn site_segment(&self) -> &str {
        &self.site_segment
    }

    /// Token sent in [`AUTH_HEADER`]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Server id of the signed-in site
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Server id of the signed-in user
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Always true; a session is only constructed from a successful sign-in
    pub fn is_authenticated(&self) -> bool {
        !self.auth_token.is_empty()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_base_url", &self.server_base_url)
            .field("site_segment", &self.site_segment)
            .field("auth_token", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Sign-in request body
pub(crate) fn sign_in_body(username: &str, password: &str, site_segment: &str) -> String {
    xml::ts_request(&xml::element(
        "credentials",
        &[("name", username), ("password", password)],
        &xml::empty_element("site", &[("contentUrl", site_segment)]),
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn site() -> SiteUrl {
        SiteUrl::parse("https://host/#/site/alpha/workbooks").unwrap()
    }

    #[test]
    fn complete_response_yields_a_session() {
        let doc = parse_document(
            br#"<tsResponse><credentials token="tok"><site id="s1" contentUrl="alpha"/><user id="u1"/></credentials></tsResponse>"#,
        )
        .unwrap();
        let session = Session::from_sign_in(&site(), &doc).unwrap().unwrap();
        assert_eq!(session.auth_token(), "tok");
        assert_eq!(session.site_id(), "s1");
        assert_eq!(session.user_id(), "u1");
        assert_eq!(session.site_segment(), "alpha");
        assert_eq!(session.server_base_url(), "https://host");
        assert!(session.is_authenticated());
    }

    #[test]
    fn missing_user_id_is_a_soft_failure() {
        let doc = parse_document(
            br#"<tsResponse><credentials token="tok"><site id="s1"/></credentials></tsResponse>"#,
        )
        .unwrap();
        assert!(Session::from_sign_in(&site(), &doc).unwrap().is_none());
    }

    #[test]
    fn missing_token_is_an_error() {
        let doc = parse_document(
            br#"<tsResponse><credentials><site id="s1"/><user id="u1"/></credentials></tsResponse>"#,
        )
        .unwrap();
        assert!(matches!(
            Session::from_sign_in(&site(), &doc),
            Err(Error::Authentication { .. })
        ));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let doc = parse_document(
            br#"<tsResponse><credentials token="secret-token"><site id="s1"/><user id="u1"/></credentials></tsResponse>"#,
        )
        .unwrap();
        let session = Session::from_sign_in(&site(), &doc).unwrap().unwrap();
        assert!(!format!("{session:?}").contains("secret-token"));
    }

    #[test]
    fn sign_in_body_names_the_site() {
        let body = sign_in_body("admin", "p&ss", "alpha");
        assert_eq!(
            body,
            "<tsRequest><credentials name=\"admin\" password=\"p&amp;ss\"><site contentUrl=\"alpha\"/></credentials></tsRequest>"
        );
    }
}
