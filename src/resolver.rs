//! Document acquisition and import deduplication.
//!
//! Beschafft WSDL-Dokumente ueber einen austauschbaren [`DocumentFetcher`]
//! und fuehrt das Sitzungs-Gedaechtnis bereits geparster Dokumente. Die
//! visited-Menge arbeitet mit kanonisierten URIs, damit Diamant-Importe
//! (A importiert B und C, beide importieren D) genau einmal geparst werden
//! und Selbst-Importe terminieren.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::FastHashSet;
use crate::error::{Error, Result};

/// Beschafft den Bytestrom zu einer System-ID.
///
/// Die Indirektion entkoppelt Parser und Transport: Tests hinterlegen eine
/// In-Memory-Map, Produktionscode haengt HTTP-Clients oder Caches ein.
pub trait DocumentFetcher {
    fn fetch(&self, system_id: &str) -> std::io::Result<Box<dyn Read>>;
}

/// Fetcher fuer lokale Dateien (`file:`-URLs und nackte Pfade).
#[derive(Debug, Default)]
pub struct FileFetcher;

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, system_id: &str) -> std::io::Result<Box<dyn Read>> {
        // file:///p wird zu /p; Hostnamen in file-URLs unterstuetzen wir nicht.
        let path = system_id.strip_prefix("file://").unwrap_or(system_id);
        let file = File::open(Path::new(path))?;
        Ok(Box::new(file))
    }
}

/// Per-session resolver: fetcher plus the set of already-parsed documents.
///
/// Der Fetcher steckt in einem `Arc`, damit mehrere Aufloesungs-Versuche
/// (Fallback-Stufen) ihn teilen koennen; die visited-Menge ist pro Sitzung.
pub struct DocumentResolver {
    fetcher: Arc<dyn DocumentFetcher>,
    visited: FastHashSet<String>,
}

impl DocumentResolver {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { fetcher, visited: FastHashSet::default() }
    }

    /// Loest `location` relativ zu `base` auf und kanonisiert das Ergebnis.
    pub fn resolve(&self, base: &str, location: &str) -> String {
        canonicalize(&resolve_url(base, location))
    }

    /// Marks a document as visited. Returns `false` if it was already parsed
    /// in this session; the caller then skips the import silently.
    ///
    /// Markiert wird beim BETRETEN, nicht beim Abschluss — sonst wuerde ein
    /// Selbst-Import endlos rekurrieren.
    pub fn enter(&mut self, canonical_id: &str) -> bool {
        self.visited.insert(canonical_id.to_string())
    }

    pub fn is_visited(&self, canonical_id: &str) -> bool {
        self.visited.contains(canonical_id)
    }

    /// Oeffnet das Dokument; Transportfehler werden als retryable I/O-Fehler
    /// gemeldet.
    pub fn open(&self, system_id: &str) -> Result<Box<dyn Read>> {
        self.fetcher
            .fetch(system_id)
            .map_err(|e| Error::io(system_id, e))
    }
}

/// RFC-3986-artige Referenzaufloesung, beschraenkt auf das, was in
/// WSDL-Importen tatsaechlich vorkommt (http/https/file/urn und relative
/// Pfade). Absichtlich ohne externe URL-Crate.
pub fn resolve_url(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return base.to_string();
    }
    if has_scheme(reference) {
        return reference.to_string();
    }
    if let Some(rest) = reference.strip_prefix("//") {
        // Netzwerk-Pfad-Referenz: Schema der Basis uebernehmen.
        let scheme = base.split(':').next().unwrap_or("http");
        return format!("{scheme}://{rest}");
    }
    if reference.starts_with('?') {
        let stem = base.split('?').next().unwrap_or(base);
        return format!("{stem}{reference}");
    }
    if let Some(root) = authority_end(base) {
        if reference.starts_with('/') {
            return format!("{}{}", &base[..root], reference);
        }
    } else if reference.starts_with('/') {
        // Basis ohne Authority (nackter Pfad): absolute Pfade ersetzen sie.
        return reference.to_string();
    }
    // Relative Pfad-Referenz: letztes Segment der Basis ersetzen.
    let stem = base.split(['?', '#']).next().unwrap_or(base);
    let dir = match stem.rfind('/') {
        Some(i) => &stem[..=i],
        None => "",
    };
    merge_dot_segments(&format!("{dir}{reference}"))
}

/// Kanonische Form fuer die visited-Menge: Fragment weg, Punkt-Segmente raus.
pub fn canonicalize(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    merge_dot_segments(without_fragment)
}

/// True wenn die Referenz mit `scheme:` beginnt (RFC 3986 Abschnitt 3.1).
fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else { return false };
    let candidate = &reference[..colon];
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Byte-Index des Endes von `scheme://authority`, falls vorhanden.
fn authority_end(url: &str) -> Option<usize> {
    let start = url.find("://")? + 3;
    match url[start..].find('/') {
        Some(i) => Some(start + i),
        None => Some(url.len()),
    }
}

/// Entfernt `./` und `../` Segmente aus dem Pfad-Anteil, ohne die Authority
/// anzutasten. Ueberschuessige `..` am Anfang bleiben stehen (relative Basen).
fn merge_dot_segments(url: &str) -> String {
    let (head, path, tail) = split_for_segments(url);
    if !path.contains("./") && !path.contains("/.") {
        return url.to_string();
    }
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(out.last(), Some(&s) if s != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let mut joined = out.join("/");
    if absolute {
        joined.insert(0, '/');
    }
    if trailing_slash && !joined.ends_with('/') {
        joined.push('/');
    }
    format!("{head}{joined}{tail}")
}

/// Zerlegt die URL in (scheme+authority, pfad, query+fragment).
fn split_for_segments(url: &str) -> (&str, &str, &str) {
    let (prefix, rest) = match authority_end(url) {
        Some(i) => url.split_at(i),
        None => match url.find(':') {
            Some(i) if has_scheme(url) => url.split_at(i + 1),
            _ => ("", url),
        },
    };
    let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, tail) = rest.split_at(path_end);
    (prefix, path, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FastHashMap;
    use std::io::Cursor;

    /// In-Memory-Fetcher fuer Tests.
    struct MapFetcher(FastHashMap<String, String>);

    impl DocumentFetcher for MapFetcher {
        fn fetch(&self, system_id: &str) -> std::io::Result<Box<dyn Read>> {
            match self.0.get(system_id) {
                Some(body) => Ok(Box::new(Cursor::new(body.clone().into_bytes()))),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no entry")),
            }
        }
    }

    #[test]
    fn absolute_reference_wins() {
        assert_eq!(
            resolve_url("http://a/b/c.wsdl", "http://x/y.wsdl"),
            "http://x/y.wsdl"
        );
        assert_eq!(resolve_url("http://a/b.wsdl", "urn:foo:bar"), "urn:foo:bar");
    }

    #[test]
    fn sibling_reference_replaces_last_segment() {
        assert_eq!(
            resolve_url("http://a/dir/base.wsdl", "types.wsdl"),
            "http://a/dir/types.wsdl"
        );
    }

    #[test]
    fn parent_reference_climbs() {
        assert_eq!(
            resolve_url("http://a/x/y/base.wsdl", "../shared/core.wsdl"),
            "http://a/x/shared/core.wsdl"
        );
        assert_eq!(
            resolve_url("http://a/x/base.wsdl", "./same.wsdl"),
            "http://a/x/same.wsdl"
        );
    }

    #[test]
    fn rooted_reference_keeps_authority() {
        assert_eq!(
            resolve_url("http://a:8080/x/y.wsdl", "/z.wsdl"),
            "http://a:8080/z.wsdl"
        );
    }

    #[test]
    fn query_reference_replaces_query() {
        assert_eq!(
            resolve_url("http://a/svc?foo", "?wsdl"),
            "http://a/svc?wsdl"
        );
    }

    #[test]
    fn bare_path_bases_resolve() {
        assert_eq!(resolve_url("dir/base.wsdl", "other.wsdl"), "dir/other.wsdl");
        assert_eq!(resolve_url("base.wsdl", "other.wsdl"), "other.wsdl");
    }

    #[test]
    fn canonical_form_strips_fragment_and_dots() {
        assert_eq!(
            canonicalize("http://a/x/../y.wsdl#frag"),
            "http://a/y.wsdl"
        );
        assert_eq!(canonicalize("http://a/y.wsdl"), "http://a/y.wsdl");
    }

    #[test]
    fn enter_marks_and_detects_revisits() {
        let mut r = DocumentResolver::new(Arc::new(MapFetcher(FastHashMap::default())));
        assert!(r.enter("http://a/d.wsdl"));
        assert!(!r.enter("http://a/d.wsdl"));
        assert!(r.is_visited("http://a/d.wsdl"));
    }

    #[test]
    fn diamond_import_collapses_to_one_visit() {
        let mut r = DocumentResolver::new(Arc::new(MapFetcher(FastHashMap::default())));
        // b.wsdl und c.wsdl referenzieren d.wsdl ueber verschiedene Schreibweisen.
        let from_b = r.resolve("http://a/x/b.wsdl", "./d.wsdl");
        let from_c = r.resolve("http://a/x/sub/c.wsdl", "../d.wsdl");
        assert_eq!(from_b, from_c);
        assert!(r.enter(&from_b));
        assert!(!r.enter(&from_c));
    }

    #[test]
    fn open_maps_transport_errors_to_retryable_io() {
        let r = DocumentResolver::new(Arc::new(MapFetcher(FastHashMap::default())));
        let Err(err) = r.open("http://nowhere/x.wsdl") else {
            panic!("expected an I/O error for an unknown document");
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("http://nowhere/x.wsdl"));
    }

    #[test]
    fn open_returns_document_body() {
        let mut map = FastHashMap::default();
        map.insert("mem:doc".to_string(), "<x/>".to_string());
        let r = DocumentResolver::new(Arc::new(MapFetcher(map)));
        let mut body = String::new();
        r.open("mem:doc").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "<x/>");
    }
}
