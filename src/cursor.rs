//! Forward-only XML pull cursor over `quick_xml::NsReader`.
//!
//! Der Parser sieht XML nur durch diese Abstraktion: aktueller Token-Typ,
//! Element-QName, Attribut-Lookup, Namespace-Deklarationen im Scope und
//! Vorwaerts-Navigation (`advance`, `skip_subtree`, `skip_to_end`).
//!
//! Kommentare, PIs und die XML-Deklaration werden intern uebersprungen;
//! Empty-Elements (`<x/>`) erscheinen als StartElement + synthetisches
//! EndElement, damit jede Element-Schleife nur ein Muster kennen muss.

use std::io::{BufReader, Read};

use quick_xml::escape::{escape, resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{Error, Locator, Result};
use crate::qname::QName;

/// Token-Typ an der aktuellen Cursor-Position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Vor dem ersten `advance`.
    StartDocument,
    StartElement,
    EndElement,
    /// Text- oder CDATA-Inhalt (Whitespace eingeschlossen).
    Characters,
    EndDocument,
}

/// Aufgeloestes Attribut eines Start-Elements (xmlns-Deklarationen ausgenommen).
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: QName,
    pub value: String,
}

/// Namespace-Deklaration mit der Tiefe des deklarierenden Elements.
#[derive(Debug, Clone)]
struct NsDecl {
    depth: usize,
    prefix: String,
    uri: String,
}

/// Pull cursor over one XML document.
///
/// Mehrere Cursor duerfen gleichzeitig auf einem Thread leben (ein geparkter
/// aeusserer Cursor waehrend ein Import vollstaendig gelesen wird); geteilt
/// wird nie.
pub struct XmlCursor {
    reader: NsReader<BufReader<Box<dyn Read>>>,
    system_id: String,
    token: Token,
    name: QName,
    attrs: Vec<Attr>,
    text: String,
    depth: usize,
    /// Empty-Element gesehen: naechstes `advance` liefert das synthetische EndElement.
    pending_end: bool,
    ns_stack: Vec<NsDecl>,
    buf: Vec<u8>,
}

impl XmlCursor {
    /// Erstellt einen Cursor ueber einem Byte-Strom. Position: StartDocument.
    pub fn from_reader(read: Box<dyn Read>, system_id: &str) -> Self {
        let mut reader = NsReader::from_reader(BufReader::new(read));
        reader.config_mut().trim_text(false);
        Self {
            reader,
            system_id: system_id.to_string(),
            token: Token::StartDocument,
            name: QName::new("", ""),
            attrs: Vec::new(),
            text: String::new(),
            depth: 0,
            pending_end: false,
            ns_stack: Vec::new(),
            buf: Vec::new(),
        }
    }

    /// Cursor ueber einem In-Memory-Dokument (Tests, Metadata-Deskriptoren).
    pub fn from_string(xml: &str, system_id: &str) -> Self {
        Self::from_reader(Box::new(std::io::Cursor::new(xml.as_bytes().to_vec())), system_id)
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Aktuelle Position als Locator fuer Fehlermeldungen.
    pub fn locator(&self) -> Locator {
        Locator {
            system_id: self.system_id.clone(),
            position: self.reader.buffer_position(),
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// QName des aktuellen Start- bzw. End-Elements.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Textinhalt, gueltig bei [`Token::Characters`].
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Anzahl aktuell offener Elemente (das Element unter dem Cursor zaehlt mit).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_start_of(&self, uri: &str, local: &str) -> bool {
        self.token == Token::StartElement && self.name.matches(uri, local)
    }

    /// Unqualifiziertes Attribut des aktuellen Start-Elements.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.uri.is_empty() && &*a.name.local_name == local)
            .map(|a| a.value.as_str())
    }

    /// Namespace-qualifiziertes Attribut (z.B. `wsam:Action`).
    pub fn attribute_ns(&self, uri: &str, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.matches(uri, local))
            .map(|a| a.value.as_str())
    }

    /// Alle Attribute des aktuellen Start-Elements, in Dokumentreihenfolge.
    pub fn attributes(&self) -> &[Attr] {
        &self.attrs
    }

    /// Resolves a QName-valued attribute (`tns:Greeting`) against the in-scope
    /// prefixes. Ohne Prefix gilt der Default-Namespace, falls deklariert.
    pub fn qname_attribute(&self, local: &str) -> Result<Option<QName>> {
        let Some(value) = self.attribute(local) else {
            return Ok(None);
        };
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local_name)) => {
                let Some(uri) = self.lookup_prefix(prefix) else {
                    return Err(Error::UnresolvablePrefix {
                        at: self.locator(),
                        prefix: prefix.to_string(),
                    });
                };
                Ok(Some(QName::with_prefix(&uri, local_name, prefix)))
            }
            None => {
                let uri = self.lookup_prefix("").unwrap_or_default();
                Ok(Some(QName::new(&uri, value)))
            }
        }
    }

    /// URI eines Prefix im aktuellen Scope (`""` = Default-Namespace).
    pub fn lookup_prefix(&self, prefix: &str) -> Option<String> {
        self.ns_stack
            .iter()
            .rev()
            .find(|d| d.prefix == prefix)
            .map(|d| d.uri.clone())
    }

    /// Snapshot aller im Scope sichtbaren Deklarationen (prefix, uri).
    /// Spaetere Deklarationen verschatten fruehere mit gleichem Prefix.
    pub fn namespaces_in_scope(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for decl in &self.ns_stack {
            if let Some(slot) = out.iter_mut().find(|(p, _)| *p == decl.prefix) {
                slot.1 = decl.uri.clone();
            } else {
                out.push((decl.prefix.clone(), decl.uri.clone()));
            }
        }
        out
    }

    /// Liest das naechste signifikante Token (Elemente und Text).
    pub fn advance(&mut self) -> Result<Token> {
        if self.pending_end {
            // Synthetisches EndElement des Empty-Elements; name bleibt gueltig.
            self.pending_end = false;
            self.close_current_element();
            self.token = Token::EndElement;
            return Ok(self.token);
        }

        loop {
            self.buf.clear();
            // Events borrowen den Lese-Buffer; erst in eigene Daten ueberfuehren,
            // dann mit vollem &mut self weiterverarbeiten.
            let raw = {
                let pos = self.reader.buffer_position();
                match self.reader.read_event_into(&mut self.buf) {
                    Ok(Event::Start(e)) => RawEvent::Start(e.into_owned(), false),
                    Ok(Event::Empty(e)) => RawEvent::Start(e.into_owned(), true),
                    Ok(Event::End(e)) => RawEvent::End(e.name().as_ref().to_vec()),
                    Ok(Event::Text(e)) => RawEvent::Text(e.as_ref().to_vec()),
                    Ok(Event::CData(e)) => RawEvent::CData(e.into_inner().into_owned()),
                    Ok(Event::GeneralRef(e)) => RawEvent::GeneralRef(e.as_ref().to_vec()),
                    Ok(Event::Eof) => RawEvent::Eof,
                    // Kommentare, PIs, DOCTYPE und die XML-Deklaration sind fuer
                    // das WSDL-Vokabular bedeutungslos.
                    Ok(Event::Comment(_) | Event::PI(_) | Event::DocType(_) | Event::Decl(_)) => {
                        RawEvent::Insignificant
                    }
                    Err(e) => {
                        return Err(Error::MalformedXml {
                            at: Locator { system_id: self.system_id.clone(), position: pos },
                            message: e.to_string(),
                        });
                    }
                }
            };

            match raw {
                RawEvent::Start(e, is_empty) => {
                    self.enter_element(&e)?;
                    self.pending_end = is_empty;
                    self.token = Token::StartElement;
                    return Ok(self.token);
                }
                RawEvent::End(name) => {
                    self.name = self.resolve_end_name(&name);
                    self.close_current_element();
                    self.token = Token::EndElement;
                    return Ok(self.token);
                }
                RawEvent::Text(bytes) => {
                    let raw_text = std::str::from_utf8(&bytes)
                        .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
                    let text = unescape(raw_text)
                        .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
                    if !text.is_empty() {
                        self.text = text.into_owned();
                        self.token = Token::Characters;
                        return Ok(self.token);
                    }
                }
                RawEvent::CData(bytes) => {
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
                    self.text = text.to_string();
                    self.token = Token::Characters;
                    return Ok(self.token);
                }
                RawEvent::GeneralRef(bytes) => {
                    // Zeichen- und vordefinierte Entity-Referenzen werden zu
                    // Characters; alles andere (DTD-Entities) wird ignoriert.
                    let name = std::str::from_utf8(&bytes)
                        .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
                    if let Some(ch) = resolve_char_reference(name) {
                        self.text = ch.to_string();
                        self.token = Token::Characters;
                        return Ok(self.token);
                    } else if let Some(resolved) = resolve_predefined_entity(name) {
                        self.text = resolved.to_string();
                        self.token = Token::Characters;
                        return Ok(self.token);
                    }
                    log::debug!("ignoring unresolvable entity reference &{name};");
                }
                RawEvent::Eof => {
                    if self.depth != 0 {
                        return Err(Error::malformed(
                            self.locator_raw(),
                            "premature end of document: unclosed elements remain",
                        ));
                    }
                    self.token = Token::EndDocument;
                    return Ok(self.token);
                }
                RawEvent::Insignificant => {}
            }
        }
    }

    /// Consumes the subtree of the current start element; the cursor ends up
    /// positioned ON the matching end element.
    pub fn skip_subtree(&mut self) -> Result<()> {
        debug_assert_eq!(self.token, Token::StartElement, "skip_subtree: not at a start element");
        if self.pending_end {
            self.advance()?;
            return Ok(());
        }
        let target = self.depth - 1;
        loop {
            match self.advance()? {
                Token::EndElement if self.depth == target => return Ok(()),
                Token::EndDocument => {
                    return Err(Error::malformed(
                        self.locator_raw(),
                        "premature end of document while skipping a subtree",
                    ));
                }
                _ => {}
            }
        }
    }

    /// Ueberspringt alle restlichen Kinder des Elements, das bei `open_depth`
    /// offen ist; der Cursor landet auf dessen EndElement.
    pub fn skip_to_end(&mut self, open_depth: usize) -> Result<()> {
        loop {
            if self.token == Token::EndElement && self.depth == open_depth - 1 {
                return Ok(());
            }
            if self.token == Token::EndDocument {
                return Err(Error::malformed(
                    self.locator_raw(),
                    "premature end of document while skipping to an end element",
                ));
            }
            self.advance()?;
        }
    }

    /// Captures the current element as a self-contained XML fragment string.
    ///
    /// `inherited_scope` sind Deklarationen aus umschliessenden Scopes
    /// (definitions → service → port), die auf das Wurzelelement des Fragments
    /// injiziert werden, sofern das Fragment den Prefix nicht selbst neu
    /// deklariert. Damit bleibt jedes fremde Namensraum-Fragment spaeter
    /// eigenstaendig re-serialisierbar.
    ///
    /// Nach der Rueckkehr steht der Cursor auf dem EndElement des Fragments.
    pub fn capture_fragment(&mut self, inherited_scope: &[(String, String)]) -> Result<String> {
        debug_assert_eq!(self.token, Token::StartElement, "capture_fragment: not at a start element");
        let mut out = String::new();
        let target = self.depth - 1;
        self.write_start_tag(&mut out, Some(inherited_scope));

        if self.pending_end {
            self.advance()?;
            out.push_str(&format!("</{}>", self.name.lexical()));
            return Ok(out);
        }

        loop {
            match self.advance()? {
                Token::StartElement => {
                    self.write_start_tag(&mut out, None);
                    if self.pending_end {
                        // Empty-Element: End-Tag sofort schreiben, synthetisches
                        // EndElement konsumieren.
                        self.advance()?;
                        out.push_str(&format!("</{}>", self.name.lexical()));
                    }
                }
                Token::Characters => {
                    out.push_str(&escape(self.text.as_str()));
                }
                Token::EndElement => {
                    out.push_str(&format!("</{}>", self.name.lexical()));
                    if self.depth == target {
                        return Ok(out);
                    }
                }
                Token::EndDocument | Token::StartDocument => {
                    return Err(Error::malformed(
                        self.locator_raw(),
                        "premature end of document inside a captured fragment",
                    ));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Intern
    // ------------------------------------------------------------------

    /// Locator ohne den Umweg ueber `self.locator()` (borrow-freundlich).
    fn locator_raw(&self) -> Locator {
        Locator {
            system_id: self.system_id.clone(),
            position: self.reader.buffer_position(),
        }
    }

    fn enter_element(&mut self, e: &BytesStart<'static>) -> Result<()> {
        let new_depth = self.depth + 1;

        // Pass 1: xmlns-Deklarationen auf den eigenen Scope-Stack, damit
        // End-Tag- und QName-Attribut-Aufloesung sie sehen. (Element- und
        // Attribut-Namen loest der NsReader selbst auf.)
        self.attrs.clear();
        for attr in e.attributes().with_checks(false) {
            let attr = attr.map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
            let key = attr.key.as_ref();
            let is_default = key == b"xmlns";
            let Some(prefix) = (if is_default {
                Some(String::new())
            } else {
                key.strip_prefix(b"xmlns:")
                    .map(|p| String::from_utf8_lossy(p).into_owned())
            }) else {
                continue;
            };
            let raw_value = std::str::from_utf8(attr.value.as_ref())
                .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
            let uri = unescape(raw_value)
                .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?
                .into_owned();
            self.ns_stack.push(NsDecl { depth: new_depth, prefix, uri });
        }

        let (uri, local, prefix) = self.resolve_element_qname(e.name())?;
        self.name = match prefix {
            Some(p) => QName::with_prefix(&uri, &local, &p),
            None => QName::new(&uri, &local),
        };

        // Pass 2: gewoehnliche Attribute aufloesen.
        for attr in e.attributes().with_checks(false) {
            let attr = attr.map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let raw_value = std::str::from_utf8(attr.value.as_ref())
                .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?;
            let value = unescape(raw_value)
                .map_err(|er| Error::malformed(self.locator_raw(), er.to_string()))?
                .into_owned();
            let (uri, local, prefix) = self.resolve_attribute_qname(attr.key)?;
            let name = match prefix {
                Some(p) => QName::with_prefix(&uri, &local, &p),
                None => QName::new(&uri, &local),
            };
            self.attrs.push(Attr { name, value });
        }

        self.depth = new_depth;
        Ok(())
    }

    fn close_current_element(&mut self) {
        self.depth -= 1;
        let depth = self.depth;
        self.ns_stack.retain(|d| d.depth <= depth);
    }

    fn resolve_element_qname(&self, name: XmlQName<'_>) -> Result<(String, String, Option<String>)> {
        let (ns, local) = self.reader.resolver().resolve_element(name);
        let uri = self.resolve_to_uri(ns)?;
        let local_name = String::from_utf8_lossy(local.as_ref()).into_owned();
        let prefix = split_prefix(name.as_ref()).map(|p| String::from_utf8_lossy(p).into_owned());
        Ok((uri, local_name, prefix))
    }

    fn resolve_attribute_qname(&self, name: XmlQName<'_>) -> Result<(String, String, Option<String>)> {
        let (ns, local) = self.reader.resolver().resolve_attribute(name);
        let uri = self.resolve_to_uri(ns)?;
        let local_name = String::from_utf8_lossy(local.as_ref()).into_owned();
        let prefix = split_prefix(name.as_ref()).map(|p| String::from_utf8_lossy(p).into_owned());
        Ok((uri, local_name, prefix))
    }

    /// End-Tag-Name: Prefix-Lookup auf dem noch nicht gepoppten Scope, damit
    /// vom Element selbst deklarierte Prefixe korrekt aufloesen.
    fn resolve_end_name(&self, raw: &[u8]) -> QName {
        match split_prefix(raw) {
            Some(p) => {
                let prefix = String::from_utf8_lossy(p).into_owned();
                let local = String::from_utf8_lossy(&raw[p.len() + 1..]).into_owned();
                let uri = self.lookup_prefix(&prefix).unwrap_or_default();
                QName::with_prefix(&uri, &local, &prefix)
            }
            None => {
                let local = String::from_utf8_lossy(raw).into_owned();
                let uri = self.lookup_prefix("").unwrap_or_default();
                QName::new(&uri, &local)
            }
        }
    }

    fn resolve_to_uri(&self, ns: ResolveResult<'_>) -> Result<String> {
        match ns {
            ResolveResult::Bound(ns) => Ok(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            ResolveResult::Unbound => Ok(String::new()),
            ResolveResult::Unknown(prefix) => Err(Error::UnresolvablePrefix {
                at: self.locator_raw(),
                prefix: String::from_utf8_lossy(&prefix).into_owned(),
            }),
        }
    }

    /// Serialisiert den Start-Tag des aktuellen Elements inkl. seiner eigenen
    /// xmlns-Deklarationen; `inject` ergaenzt geerbte Deklarationen.
    fn write_start_tag(&self, out: &mut String, inject: Option<&[(String, String)]>) {
        out.push('<');
        out.push_str(&self.name.lexical());

        let own: Vec<&NsDecl> = self.ns_stack.iter().filter(|d| d.depth == self.depth).collect();
        for decl in &own {
            push_xmlns(out, &decl.prefix, &decl.uri);
        }
        if let Some(scope) = inject {
            for (prefix, uri) in scope {
                if own.iter().any(|d| d.prefix == *prefix) {
                    continue;
                }
                push_xmlns(out, prefix, uri);
            }
        }
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name.lexical());
            out.push_str("=\"");
            out.push_str(&escape(attr.value.as_str()));
            out.push('"');
        }
        out.push('>');
    }
}

/// Vom Lese-Buffer entkoppeltes Event (quick-xml Events borrowen den Buffer).
enum RawEvent {
    Start(BytesStart<'static>, bool),
    End(Vec<u8>),
    Text(Vec<u8>),
    CData(Vec<u8>),
    GeneralRef(Vec<u8>),
    Eof,
    Insignificant,
}

fn push_xmlns(out: &mut String, prefix: &str, uri: &str) {
    out.push(' ');
    if prefix.is_empty() {
        out.push_str("xmlns");
    } else {
        out.push_str("xmlns:");
        out.push_str(prefix);
    }
    out.push_str("=\"");
    out.push_str(&escape(uri));
    out.push('"');
}

fn split_prefix(name: &[u8]) -> Option<&[u8]> {
    let pos = memchr::memchr(b':', name)?;
    Some(&name[..pos])
}

/// Loest eine XML-Zeichenreferenz auf (`#49` dezimal, `#x31` hexadezimal).
fn resolve_char_reference(ref_name: &str) -> Option<char> {
    let digits = ref_name.strip_prefix('#')?;
    let code_point = if let Some(hex) = digits.strip_prefix('x') {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code_point)
}
