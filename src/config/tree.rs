//! Hierarchical, case-insensitive key/value tree.
//!
//! # Responsibilities
//! - Hold configuration as nested sections addressed by `:`-separated paths
//! - Match keys case-insensitively while keeping the first spelling for display
//! - Hand out owned, cheap-to-clone section views (subtrees are `Arc`-shared)
//!
//! # Design Decisions
//! - TOML is the on-disk format; arrays become index-keyed children (`0`, `1`, ...)
//! - Scalars are stored as strings; typed reading happens in `schema.rs`
//! - A missing section is an empty view rather than an error

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::loader::ConfigError;

/// Separator between path segments (`Endpoints:Web:Url`).
pub const KEY_DELIMITER: char = ':';

#[derive(Debug, Clone, Default)]
struct Node {
    /// Key as first written.
    key: String,
    value: Option<String>,
    /// Children keyed by lowercased key.
    children: BTreeMap<String, Arc<Node>>,
}

// The original spelling in `key` is display-only.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.children == other.children
    }
}

impl Eq for Node {}

impl Node {
    fn named(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    fn child(&self, segment: &str) -> Option<&Arc<Node>> {
        self.children.get(&segment.to_lowercase())
    }

    fn descend(self: &Arc<Self>, path: &str) -> Option<Arc<Node>> {
        let mut node = Arc::clone(self);
        for segment in segments(path) {
            let next = Arc::clone(node.child(segment)?);
            node = next;
        }
        Some(node)
    }

    fn child_mut(&mut self, segment: &str) -> &mut Node {
        let entry = self
            .children
            .entry(segment.to_lowercase())
            .or_insert_with(|| Arc::new(Node::named(segment)));
        Arc::make_mut(entry)
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        if let Some(value) = &self.value {
            out.push((prefix.to_string(), value.clone()));
        }
        for (key, child) in &self.children {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}{KEY_DELIMITER}{key}")
            };
            child.flatten_into(&path, out);
        }
    }

    fn insert_toml(&mut self, value: &toml::Value) {
        match value {
            toml::Value::Table(table) => {
                for (key, child) in table {
                    self.child_mut(key).insert_toml(child);
                }
            }
            toml::Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.child_mut(&index.to_string()).insert_toml(child);
                }
            }
            toml::Value::String(s) => self.value = Some(s.clone()),
            other => self.value = Some(other.to_string()),
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(KEY_DELIMITER).filter(|s| !s.is_empty())
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}{KEY_DELIMITER}{path}"),
    }
}

/// A complete configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    root: Arc<Node>,
}

impl ConfigTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text into a tree.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content).map_err(ConfigError::Parse)?;
        let mut root = Node::default();
        root.insert_toml(&toml::Value::Table(table));
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Build a tree from flat `(path, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut tree = Self::new();
        for (path, value) in pairs {
            tree.set(path.as_ref(), value);
        }
        tree
    }

    /// Set the value at `path`, creating intermediate sections.
    pub fn set(&mut self, path: &str, value: impl Into<String>) {
        let mut node = Arc::make_mut(&mut self.root);
        for segment in segments(path) {
            node = node.child_mut(segment);
        }
        node.value = Some(value.into());
    }

    /// Remove the section at `path` with everything below it.
    pub fn remove(&mut self, path: &str) -> bool {
        let parts: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };
        let mut node = Arc::make_mut(&mut self.root);
        for segment in parents {
            match node.children.get_mut(&segment.to_lowercase()) {
                Some(child) => node = Arc::make_mut(child),
                None => return false,
            }
        }
        node.children.remove(&last.to_lowercase()).is_some()
    }

    /// Value at `path`, if any.
    pub fn get(&self, path: &str) -> Option<String> {
        self.root.descend(path).and_then(|n| n.value.clone())
    }

    /// Section view at `path`. Missing sections are returned empty.
    pub fn section(&self, path: &str) -> ConfigSection {
        self.root().section(path)
    }

    /// View of the whole tree.
    pub fn root(&self) -> ConfigSection {
        ConfigSection {
            path: String::new(),
            node: Arc::clone(&self.root),
        }
    }
}

/// Owned view of one subtree.
///
/// Two sections are equal when they sit at the same (case-insensitive) path and
/// hold the same keys and values.
#[derive(Clone)]
pub struct ConfigSection {
    path: String,
    node: Arc<Node>,
}

impl ConfigSection {
    /// Full path of this section, as addressed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, in its original spelling.
    pub fn key(&self) -> &str {
        if self.node.key.is_empty() {
            self.path.rsplit(KEY_DELIMITER).next().unwrap_or_default()
        } else {
            &self.node.key
        }
    }

    /// Scalar value held directly by this section.
    pub fn value(&self) -> Option<&str> {
        self.node.value.as_deref()
    }

    /// Scalar value at a relative path.
    pub fn get(&self, path: &str) -> Option<String> {
        self.node.descend(path).and_then(|n| n.value.clone())
    }

    /// Relative subsection. Missing subsections are returned empty.
    pub fn section(&self, path: &str) -> ConfigSection {
        let full = join(&self.path, path);
        let node = self.node.descend(path).unwrap_or_else(|| {
            let key = segments(path).last().unwrap_or_default();
            Arc::new(Node::named(key))
        });
        ConfigSection { path: full, node }
    }

    /// Whether this section carries a value or any children.
    pub fn exists(&self) -> bool {
        !self.node.is_empty()
    }

    /// Whether this section has child sections.
    pub fn has_children(&self) -> bool {
        !self.node.children.is_empty()
    }

    /// Immediate child sections, ordered by lowercased key.
    pub fn children(&self) -> impl Iterator<Item = ConfigSection> + '_ {
        self.node.children.values().map(move |child| ConfigSection {
            path: join(&self.path, &child.key),
            node: Arc::clone(child),
        })
    }

    /// Every value below this section as `(relative lowercased path, value)`, sorted.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.node.flatten_into("", &mut out);
        out
    }
}

impl PartialEq for ConfigSection {
    fn eq(&self, other: &Self) -> bool {
        self.path.eq_ignore_ascii_case(&other.path) && self.node == other.node
    }
}

impl Eq for ConfigSection {}

impl fmt::Debug for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSection")
            .field("path", &self.path)
            .field("entries", &self.flatten().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let tree = ConfigTree::from_pairs([("Endpoints:Web:Url", "http://localhost:5000")]);
        assert_eq!(
            tree.get("endpoints:WEB:url").as_deref(),
            Some("http://localhost:5000")
        );
        let web = tree.section("ENDPOINTS:web");
        assert_eq!(web.key(), "Web");
        assert!(web.exists());
    }

    #[test]
    fn missing_section_is_empty() {
        let tree = ConfigTree::new();
        let section = tree.section("Certificates:Default");
        assert!(!section.exists());
        assert_eq!(section.path(), "Certificates:Default");
        assert_eq!(section.key(), "Default");
        assert_eq!(section.children().count(), 0);
    }

    #[test]
    fn toml_tables_and_arrays_become_sections() {
        let tree = ConfigTree::from_toml_str(
            r#"
            [Endpoints.Web]
            Url = "https://*:5001"
            SslProtocols = ["Tls12", "Tls13"]

            [Limits]
            Port = 8080
            Enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(tree.get("Endpoints:Web:Url").as_deref(), Some("https://*:5001"));
        assert_eq!(tree.get("Endpoints:Web:SslProtocols:1").as_deref(), Some("Tls13"));
        assert_eq!(tree.get("Limits:Port").as_deref(), Some("8080"));
        assert_eq!(tree.get("Limits:Enabled").as_deref(), Some("true"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = ConfigTree::from_toml_str("[Endpoints\nUrl = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn sections_compare_by_path_and_content() {
        let a = ConfigTree::from_pairs([("Endpoints:A:Url", "http://*:80")]);
        let b = ConfigTree::from_pairs([("endpoints:a:url", "http://*:80")]);
        let c = ConfigTree::from_pairs([("Endpoints:B:Url", "http://*:80")]);

        assert_eq!(a.section("Endpoints:A"), b.section("Endpoints:a"));
        assert_ne!(a.section("Endpoints:A"), c.section("Endpoints:B"));
    }

    #[test]
    fn key_spelling_does_not_affect_equality() {
        let a = ConfigTree::from_pairs([("Endpoints:Web:Url", "http://*:80"), ("Endpoints:Web:Protocols", "Http1")]);
        let b = ConfigTree::from_pairs([("ENDPOINTS:web:URL", "http://*:80"), ("endpoints:WEB:protocols", "Http1")]);
        assert_eq!(a, b);
        assert_eq!(a.section("Endpoints"), b.section("endpoints"));

        let c = ConfigTree::from_pairs([("Endpoints:Web:Url", "HTTP://*:80"), ("Endpoints:Web:Protocols", "Http1")]);
        assert_ne!(a, c);
    }

    #[test]
    fn clones_are_independent() {
        let original = ConfigTree::from_pairs([("A:B", "1")]);
        let mut changed = original.clone();
        changed.set("A:B", "2");
        assert_eq!(changed.get("A:B").as_deref(), Some("2"));
        assert!(changed.remove("A:B"));

        assert_eq!(original.get("A:B").as_deref(), Some("1"));
        assert!(changed.get("A:B").is_none());
        assert!(!changed.remove("Missing:Key"));
    }

    #[test]
    fn flatten_is_sorted_and_relative() {
        let tree = ConfigTree::from_pairs([("S:Z", "1"), ("S:A:B", "2")]);
        assert_eq!(
            tree.section("S").flatten(),
            vec![("a:b".to_string(), "2".to_string()), ("z".to_string(), "1".to_string())]
        );
    }
}
