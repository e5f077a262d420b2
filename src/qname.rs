//! Qualified names for the interface model.
//!
//! WSDL 1.1 identifiziert messages, portTypes, bindings und services ueber
//! QNames (Namespace-URI + local name). Der optionale Prefix ist reine
//! Serialisierungs-Kosmetik: `Eq`/`Hash`/`Ord` ignorieren ihn, konsistent mit
//! "two qnames are equal if they have the same uri and local-name".

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace-qualified name. Owned, klein, ueberall kopierbar.
#[derive(Debug, Clone)]
pub struct QName {
    pub uri: Box<str>,
    pub local_name: Box<str>,
    /// Prefix aus dem Quelldokument, falls vorhanden. Nicht identitaetsrelevant.
    pub prefix: Option<Box<str>>,
}

impl QName {
    pub fn new(uri: &str, local_name: &str) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(uri: &str, local_name: &str, prefix: &str) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: Some(prefix.into()),
        }
    }

    /// True wenn URI und local name exakt passen (Vokabular-Vergleich).
    pub fn matches(&self, uri: &str, local_name: &str) -> bool {
        &*self.uri == uri && &*self.local_name == local_name
    }

    /// Clark-Notation `{uri}local` fuer Fehlermeldungen und Logs.
    pub fn clark(&self) -> String {
        if self.uri.is_empty() {
            self.local_name.to_string()
        } else {
            format!("{{{}}}{}", self.uri, self.local_name)
        }
    }

    /// Serialisierte Form `prefix:local` bzw. `local` ohne Prefix.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) if !p.is_empty() => format!("{p}:{}", self.local_name),
            _ => self.local_name.to_string(),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.local_name.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.local_name.cmp(&other.local_name))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clark())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(q: &QName) -> u64 {
        let mut h = DefaultHasher::new();
        q.hash(&mut h);
        h.finish()
    }

    #[test]
    fn prefix_is_ignored_for_identity() {
        let a = QName::new("urn:x", "msg");
        let b = QName::with_prefix("urn:x", "msg", "tns");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_uri_different_qname() {
        assert_ne!(QName::new("urn:x", "msg"), QName::new("urn:y", "msg"));
    }

    #[test]
    fn clark_notation() {
        assert_eq!(QName::new("urn:x", "msg").clark(), "{urn:x}msg");
        assert_eq!(QName::new("", "msg").clark(), "msg");
    }

    #[test]
    fn lexical_form() {
        assert_eq!(QName::with_prefix("urn:x", "msg", "tns").lexical(), "tns:msg");
        assert_eq!(QName::new("urn:x", "msg").lexical(), "msg");
    }

    #[test]
    fn ordering_is_uri_then_local() {
        let mut v = vec![
            QName::new("urn:b", "a"),
            QName::new("urn:a", "z"),
            QName::new("urn:a", "a"),
        ];
        v.sort();
        assert_eq!(v[0].clark(), "{urn:a}a");
        assert_eq!(v[1].clark(), "{urn:a}z");
        assert_eq!(v[2].clark(), "{urn:b}a");
    }
}
