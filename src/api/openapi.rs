use super::handlers::{health, ip, jwks, login, logout, no_account, validate};
use utoipa::{
    openapi::{Contact, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        validate::validate,
        login::login,
        login::login_fedcm_auto,
        logout::logout,
        jwks::jwks,
        no_account::no_account,
        ip::ip,
    ),
    components(schemas(
        health::Health,
        login::LoginViewModel,
        logout::LogoutForm,
        no_account::NoAccountViewModel,
        ip::RemoteIp,
        crate::session::Identity,
        crate::storage::ProviderView,
    )),
    tags(
        (name = "forward-auth", description = "Reverse proxy authentication checks"),
        (name = "login", description = "Login page data, login completion and logout"),
        (name = "keys", description = "Session verification keys"),
        (name = "health", description = "Liveness and build information"),
        (name = "misc", description = "Helpers for the login pages")
    )
)]
struct ApiDoc;

/// The `OpenAPI` document served at `/openapi.json`, with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    let non_empty = |s: &str| !s.is_empty();
    match author.split_once('<') {
        Some((name, email)) => (
            Some(name.trim()).filter(|n| non_empty(n)),
            Some(email.trim_end_matches('>').trim()).filter(|e| non_empty(e)),
        ),
        None => (Some(author.trim()).filter(|n| non_empty(n)), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Authgate"));
            assert_eq!(contact.email.as_deref(), Some("team@authgate.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_documents_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/validate",
            "/login",
            "/login-fedcm-auto",
            "/logout",
            "/jwks",
            "/no-account",
            "/ip",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "forward-auth"));
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.test>"),
            (Some("Jane Doe"), Some("jane@example.test"))
        );
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(parse_author("<jane@example.test>"), (None, Some("jane@example.test")));
    }
}
