//! Directory service access.
//!
//! The generator needs exactly one thing from the directory: the classes a
//! client is a member of. Plugins receive the same handle and may run their
//! own searches. Two backends implement the traits here: [`LdapConnector`]
//! for a real server and [`StaticDirectory`] for tests and offline rendering.

use crate::config::LdapConfig;
use crate::error::DirectoryError;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result type alias for directory operations.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Search scope relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// A search filter.
///
/// Rendering through `Display` produces RFC 4515 text with every assertion
/// value escaped, so client-supplied names cannot alter the filter structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// `(attribute=value)`
    Equals { attribute: String, value: String },
    /// `(attribute=*)`
    Present(String),
    And(Vec<SearchFilter>),
    Or(Vec<SearchFilter>),
}

impl SearchFilter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Self::Present(attribute.into())
    }

    /// Evaluates the filter against an entry. Attribute names and values
    /// compare case-insensitively, as with the directory's default matching.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            SearchFilter::Equals { attribute, value } => entry
                .values(attribute)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            SearchFilter::Present(attribute) => !entry.values(attribute).is_empty(),
            SearchFilter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            SearchFilter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
        }
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFilter::Equals { attribute, value } => {
                write!(f, "({}={})", attribute, ldap3::ldap_escape(value))
            }
            SearchFilter::Present(attribute) => write!(f, "({}=*)", attribute),
            SearchFilter::And(filters) => {
                f.write_str("(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
            SearchFilter::Or(filters) => {
                f.write_str("(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One search operation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub base: String,
    pub filter: SearchFilter,
    pub scope: SearchScope,
    /// Attributes to return; empty requests all user attributes
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Creates a subtree search returning the given attributes.
    pub fn subtree(base: impl Into<String>, filter: SearchFilter, attributes: &[&str]) -> Self {
        Self {
            base: base.into(),
            filter,
            scope: SearchScope::Subtree,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A directory entry with its attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a value to an attribute (builder style).
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .push(value.into());
        self
    }

    /// All values of an attribute; attribute names are case-insensitive.
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First value of an attribute.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute).first().map(String::as_str)
    }
}

/// An open directory session.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Runs one search and returns the matched entries in server order.
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Ends the session. Dropping the last handle also releases it.
    async fn close(&self) -> DirectoryResult<()>;
}

/// Opens directory sessions, one per request.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> DirectoryResult<Arc<dyn Directory>>;
}

/// Finds the classes of `client_name`: entries of the configured object class
/// whose member attribute equals the name, searched over the whole subtree
/// below the base DN. Every value of the class attribute is returned, in
/// result order.
pub async fn lookup_classes(
    directory: &dyn Directory,
    config: &LdapConfig,
    client_name: &str,
) -> DirectoryResult<Vec<String>> {
    let filter = SearchFilter::And(vec![
        SearchFilter::equals("objectClass", &config.object_class),
        SearchFilter::equals(&config.member_attribute, client_name),
    ]);
    let request = SearchRequest::subtree(&config.base_dn, filter, &[config.class_attribute.as_str()]);

    debug!(client = client_name, filter = %request.filter, "Searching client classes");

    let entries = directory.search(&request).await?;
    let classes: Vec<String> = entries
        .iter()
        .flat_map(|entry| entry.values(&config.class_attribute).iter().cloned())
        .collect();

    debug!(client = client_name, classes = ?classes, "Directory classes resolved");
    Ok(classes)
}

// ============================================================================
// LDAP backend
// ============================================================================

/// Connects to an LDAP server as configured.
pub struct LdapConnector {
    config: LdapConfig,
}

impl LdapConnector {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> DirectoryResult<Arc<dyn Directory>> {
        let timeout = self.config.timeout();
        let settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_starttls(self.config.starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection closed with error");
            }
        });

        if let Some(ref bind_dn) = self.config.bind_dn {
            let password = self.config.bind_password.as_deref().unwrap_or("");
            ldap.with_timeout(timeout)
                .simple_bind(bind_dn, password)
                .await
                .and_then(|result| result.success())
                .map_err(DirectoryError::bind)?;
        }

        debug!(url = %self.config.url, "LDAP session established");
        Ok(Arc::new(LdapDirectory { ldap, timeout }))
    }
}

/// A bound LDAP session.
pub struct LdapDirectory {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut ldap = self.ldap.clone();
        let filter = request.filter.to_string();
        let attributes: Vec<&str> = request.attributes.iter().map(String::as_str).collect();

        let (entries, _result) = ldap
            .with_timeout(self.timeout)
            .search(&request.base, request.scope.into(), &filter, attributes)
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs.into_iter().collect(),
                }
            })
            .collect())
    }

    async fn close(&self) -> DirectoryResult<()> {
        let mut ldap = self.ldap.clone();
        ldap.unbind().await?;
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// An in-memory directory.
///
/// Acts as its own connector. Clones share the close counter, so a test can
/// observe whether a session opened through `connect()` was released.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<DirectoryEntry>,
    connect_error: Option<String>,
    search_error: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl StaticDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// A directory whose `connect()` always fails with `message`.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            connect_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// A directory that connects but fails every search with `message`.
    pub fn failing_search(message: impl Into<String>) -> Self {
        Self {
            search_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Number of sessions closed so far.
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
        let dn = dn.to_ascii_lowercase();
        let base = base.to_ascii_lowercase();
        match scope {
            SearchScope::Base => dn == base,
            SearchScope::OneLevel => dn
                .strip_suffix(&base)
                .and_then(|rdn| rdn.strip_suffix(','))
                .is_some_and(|rdn| !rdn.is_empty() && !rdn.contains(',')),
            SearchScope::Subtree => {
                base.is_empty()
                    || dn == base
                    || dn
                        .strip_suffix(&base)
                        .is_some_and(|rest| rest.ends_with(','))
            }
        }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        if let Some(ref message) = self.search_error {
            return Err(DirectoryError::search(message.clone()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|entry| Self::in_scope(&entry.dn, &request.base, request.scope))
            .filter(|entry| request.filter.matches(entry))
            .cloned()
            .collect())
    }

    async fn close(&self) -> DirectoryResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DirectoryConnector for StaticDirectory {
    async fn connect(&self) -> DirectoryResult<Arc<dyn Directory>> {
        if let Some(ref message) = self.connect_error {
            return Err(DirectoryError::connect(message.clone()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_entry(class: &str, members: &[&str]) -> DirectoryEntry {
        let mut entry = DirectoryEntry::new(format!("cn={},ou=preseed,o=lab", class))
            .with("objectClass", "preseedObject")
            .with("cn", class);
        for member in members {
            entry = entry.with("preseedValue", *member);
        }
        entry
    }

    fn lab_config() -> LdapConfig {
        LdapConfig {
            base_dn: "o=lab".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_rendering_escapes_values() {
        let filter = SearchFilter::And(vec![
            SearchFilter::equals("objectClass", "preseedObject"),
            SearchFilter::equals("preseedValue", "host*)(cn=x"),
        ]);
        assert_eq!(
            filter.to_string(),
            r"(&(objectClass=preseedObject)(preseedValue=host\2a\29\28cn=x))"
        );
        assert_eq!(SearchFilter::present("cn").to_string(), "(cn=*)");
    }

    #[test]
    fn test_filter_matching() {
        let entry = class_entry("labX", &["host1", "host2"]);
        assert!(SearchFilter::equals("preseedvalue", "HOST2").matches(&entry));
        assert!(!SearchFilter::equals("preseedValue", "host3").matches(&entry));
        assert!(SearchFilter::Or(vec![
            SearchFilter::equals("cn", "nope"),
            SearchFilter::present("cn"),
        ])
        .matches(&entry));
    }

    #[tokio::test]
    async fn test_lookup_classes_in_result_order() {
        let directory = StaticDirectory::new(vec![
            class_entry("labX", &["host1"]),
            class_entry("web", &["host2"]),
            class_entry("gpu", &["host1", "host2"]),
        ]);

        let classes = lookup_classes(&directory, &lab_config(), "host1").await.unwrap();
        assert_eq!(classes, vec!["labX", "gpu"]);
    }

    #[tokio::test]
    async fn test_lookup_classes_no_match() {
        let directory = StaticDirectory::new(vec![class_entry("labX", &["host1"])]);
        let classes = lookup_classes(&directory, &lab_config(), "host9").await.unwrap();
        assert!(classes.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_respects_base_and_object_class() {
        let outside = DirectoryEntry::new("cn=other,o=elsewhere")
            .with("objectClass", "preseedObject")
            .with("cn", "other")
            .with("preseedValue", "host1");
        let wrong_class = DirectoryEntry::new("cn=person,o=lab")
            .with("objectClass", "person")
            .with("cn", "person")
            .with("preseedValue", "host1");
        let directory = StaticDirectory::new(vec![outside, wrong_class]);

        let classes = lookup_classes(&directory, &lab_config(), "host1").await.unwrap();
        assert!(classes.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_directory() {
        let directory = StaticDirectory::unreachable("Can't contact LDAP server");
        let err = directory.connect().await.err().unwrap();
        assert_eq!(err.to_string(), "Can't contact LDAP server");
    }

    #[tokio::test]
    async fn test_failing_search() {
        let directory = StaticDirectory::failing_search("No such object");
        let session = directory.connect().await.unwrap();
        let err = lookup_classes(session.as_ref(), &lab_config(), "host1")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Search { .. }));
    }

    #[tokio::test]
    async fn test_close_is_counted_across_clones() {
        let directory = StaticDirectory::default();
        let session = directory.connect().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(directory.close_count(), 1);
    }

    #[test]
    fn test_scopes() {
        assert!(StaticDirectory::in_scope("cn=a,o=lab", "o=lab", SearchScope::OneLevel));
        assert!(!StaticDirectory::in_scope("cn=a,ou=x,o=lab", "o=lab", SearchScope::OneLevel));
        assert!(StaticDirectory::in_scope("cn=a,ou=x,o=lab", "O=Lab", SearchScope::Subtree));
        assert!(!StaticDirectory::in_scope("cn=a,o=labs", "o=lab", SearchScope::Subtree));
        assert!(StaticDirectory::in_scope("o=lab", "o=lab", SearchScope::Base));
    }
}
