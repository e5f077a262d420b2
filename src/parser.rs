//! Recursive-descent WSDL 1.1 parser over the pull cursor.
//!
//! Eine [`ParseSession`] umfasst das Wurzeldokument und alle transitiv
//! importierten Dokumente: gemeinsamer Model-Builder, gemeinsame
//! Extension-Pipeline, gemeinsame visited-Menge. Jedes Dokument bekommt
//! seinen eigenen Cursor; waehrend ein Import gelesen wird, parkt der
//! aeussere Cursor einfach auf dem Stack.
//!
//! Konvention aller `parse_*`-Methoden: Einstieg mit dem Cursor AUF dem
//! StartElement des Konstrukts, Rueckkehr mit dem Cursor AUF dem
//! zugehoerigen EndElement. Unbekannte Elemente gehen zuerst an die
//! Extension-Pipeline; bleibt das Element unbehandelt, wird der Teilbaum
//! tolerant uebersprungen (WSDL 1.1 Sec 2.1.3 Extensibility).

use std::sync::Arc;

use crate::cursor::{Token, XmlCursor};
use crate::error::{Error, Result};
use crate::extensions::ExtensionPipeline;
use crate::model::{
    Binding, BoundFault, BoundOperation, Fault, Message, MessageRef, Operation, ParameterBinding,
    Part, PartDescriptor, Port, PortType, Service, SoapVersion, Style, WsdlModel,
    WsdlModelBuilder,
};
use crate::names;
use crate::qname::QName;
use crate::resolver::{DocumentFetcher, DocumentResolver};

/// Strategie fuer die Abbildung eines Transport-URIs auf eine Binding-ID.
/// Registrierte Factories werden der Reihe nach gefragt; die erste, die den
/// Transport beansprucht, gewinnt. Beansprucht keine ihn, greift die
/// Standard-Abbildung nach SOAP-Version.
pub trait BindingIdFactory {
    fn binding_id(&self, version: SoapVersion, transport: &str) -> Option<String>;
}

/// Parse session over one root document plus its transitive imports.
pub struct ParseSession {
    builder: WsdlModelBuilder,
    resolver: DocumentResolver,
    extensions: ExtensionPipeline,
    binding_id_factories: Vec<Arc<dyn BindingIdFactory>>,
}

impl ParseSession {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, extensions: ExtensionPipeline) -> Self {
        Self {
            builder: WsdlModelBuilder::new(),
            resolver: DocumentResolver::new(fetcher),
            extensions,
            binding_id_factories: Vec::new(),
        }
    }

    pub fn register_binding_id_factory(&mut self, factory: Arc<dyn BindingIdFactory>) {
        self.binding_id_factories.push(factory);
    }

    /// Parst das Dokument hinter `system_id` (und alles, was es importiert).
    pub fn parse_location(&mut self, system_id: &str) -> Result<()> {
        let canonical = self.resolver.resolve("", system_id);
        if !self.resolver.enter(&canonical) {
            return Ok(());
        }
        log::debug!("parsing WSDL document {canonical}");
        let read = self.resolver.open(&canonical)?;
        let mut cursor = XmlCursor::from_reader(read, &canonical);
        self.parse_root(&mut cursor)
    }

    /// Parst ein bereits beschafftes Dokument (Metadata-Deskriptoren,
    /// In-Memory-Quellen). Importe darin werden relativ zu `system_id`
    /// aufgeloest.
    pub fn parse_source(&mut self, xml: &str, system_id: &str) -> Result<()> {
        let canonical = self.resolver.resolve("", system_id);
        self.resolver.enter(&canonical);
        let mut cursor = XmlCursor::from_string(xml, &canonical);
        self.parse_root(&mut cursor)
    }

    /// Schliesst die Sitzung ab: `finished`-Hooks, Freeze, `post_finished`.
    pub fn finish(mut self) -> Result<WsdlModel> {
        self.extensions.finished(&mut self.builder)?;
        let model = self.builder.freeze();
        self.extensions.post_finished(&model)?;
        Ok(model)
    }

    // ------------------------------------------------------------------
    // Dokument-Ebene
    // ------------------------------------------------------------------

    fn parse_root(&mut self, cursor: &mut XmlCursor) -> Result<()> {
        loop {
            match cursor.advance()? {
                Token::StartElement => break,
                Token::EndDocument => {
                    return Err(Error::malformed(cursor.locator(), "document has no root element"));
                }
                _ => {}
            }
        }
        if !cursor.is_start_of(names::NS_WSDL, names::EL_DEFINITIONS) {
            // Typischer Fall: ein HTML-Fehlerdokument statt WSDL. Retryable,
            // damit die Fallback-Stufen greifen.
            return Err(Error::unexpected(
                cursor.locator(),
                cursor.name().clark(),
                "wsdl:definitions",
            ));
        }
        self.parse_definitions(cursor)
    }

    fn parse_definitions(&mut self, cursor: &mut XmlCursor) -> Result<()> {
        let tns = required_attr(cursor, names::AT_TARGET_NAMESPACE)?;
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            let name = cursor.name().clone();
            if &*name.uri == names::NS_WSDL {
                match &*name.local_name {
                    names::EL_IMPORT => self.parse_import(cursor)?,
                    names::EL_MESSAGE => self.parse_message(cursor, &tns)?,
                    names::EL_PORT_TYPE => self.parse_port_type(cursor, &tns)?,
                    names::EL_BINDING => self.parse_binding(cursor, &tns)?,
                    names::EL_SERVICE => self.parse_service(cursor, &tns)?,
                    // Schema-Definitionen sind Sache des Schema-Compilers.
                    names::EL_TYPES | names::EL_DOCUMENTATION => cursor.skip_subtree()?,
                    other => {
                        log::warn!("ignoring unexpected wsdl:{other} inside wsdl:definitions");
                        cursor.skip_subtree()?;
                    }
                }
            } else if !self.extensions.definitions_element(cursor)? {
                log::debug!("skipping foreign element {} in wsdl:definitions", name.clark());
                cursor.skip_subtree()?;
            }
        }
        Ok(())
    }

    /// `wsdl:import` (Spec 2.1.2). Bereits besuchte Ziele sind ein No-op;
    /// die visited-Menge wird beim Betreten markiert, daher terminieren auch
    /// Selbst- und Zyklus-Importe.
    fn parse_import(&mut self, cursor: &mut XmlCursor) -> Result<()> {
        let location = required_attr(cursor, names::AT_LOCATION)?;
        let resolved = self.resolver.resolve(cursor.system_id(), &location);
        if self.resolver.enter(&resolved) {
            log::debug!("following wsdl:import to {resolved}");
            let read = self.resolver.open(&resolved)?;
            let mut inner = XmlCursor::from_reader(read, &resolved);
            self.parse_root(&mut inner)?;
        } else {
            log::debug!("skipping already parsed import {resolved}");
        }
        // Restliche Kinder des import-Elements (documentation) ueberspringen.
        cursor.skip_subtree()
    }

    // ------------------------------------------------------------------
    // Abstrakter Teil: message, portType
    // ------------------------------------------------------------------

    fn parse_message(&mut self, cursor: &mut XmlCursor, tns: &str) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let mut message = Message::new(QName::new(tns, &name));
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_WSDL, names::EL_PART) {
                self.parse_part(cursor, &mut message)?;
            } else if cursor.is_start_of(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if !self.extensions.message_element(&mut message, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        self.builder.add_message(message);
        Ok(())
    }

    /// `wsdl:part`: `element` hat Vorrang vor `type`; ein Part ohne beides
    /// traegt keine Typinformation und wird verworfen.
    fn parse_part(&mut self, cursor: &mut XmlCursor, message: &mut Message) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let element = cursor.qname_attribute(names::AT_ELEMENT)?;
        let type_ = cursor.qname_attribute(names::AT_TYPE)?;
        match (element, type_) {
            (Some(e), _) => message.add_part(&name, PartDescriptor::Element(e)),
            (None, Some(t)) => message.add_part(&name, PartDescriptor::Type(t)),
            (None, None) => {
                log::warn!(
                    "dropping part '{name}' of {}: neither element nor type attribute",
                    message.name
                );
            }
        }
        cursor.skip_subtree()
    }

    fn parse_port_type(&mut self, cursor: &mut XmlCursor, tns: &str) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let mut port_type = PortType::new(QName::new(tns, &name));
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_WSDL, names::EL_OPERATION) {
                let op = self.parse_port_type_operation(cursor)?;
                port_type.put_operation(op);
            } else if cursor.is_start_of(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if !self.extensions.port_type_element(&mut port_type, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        self.builder.add_port_type(port_type);
        Ok(())
    }

    fn parse_port_type_operation(&mut self, cursor: &mut XmlCursor) -> Result<Operation> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let mut op = Operation::new(&name);
        if let Some(order) = cursor.attribute(names::AT_PARAMETER_ORDER) {
            op.parameter_order = Some(order.split_whitespace().map(str::to_string).collect());
        }
        self.extensions.port_type_operation_attributes(&mut op, cursor)?;

        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            let name = cursor.name().clone();
            if &*name.uri == names::NS_WSDL {
                match &*name.local_name {
                    names::EL_INPUT => {
                        let input = self.parse_operation_io(cursor, false)?;
                        op.input = Some(input);
                    }
                    names::EL_OUTPUT => {
                        let output = self.parse_operation_io(cursor, true)?;
                        op.output = Some(output);
                    }
                    names::EL_FAULT => {
                        let fault = self.parse_operation_fault(cursor)?;
                        op.faults.push(fault);
                    }
                    names::EL_DOCUMENTATION => cursor.skip_subtree()?,
                    other => {
                        log::warn!("ignoring wsdl:{other} inside portType operation '{}'", op.name);
                        cursor.skip_subtree()?;
                    }
                }
            } else if !self.extensions.port_type_operation_element(&mut op, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        Ok(op)
    }

    /// Abstraktes input/output-Element (Spec 2.4.2/2.4.3).
    fn parse_operation_io(&mut self, cursor: &mut XmlCursor, output: bool) -> Result<MessageRef> {
        let message = required_qname_attr(cursor, names::AT_MESSAGE)?;
        let mut io = MessageRef::new(message);
        io.name = cursor.attribute(names::AT_NAME).map(str::to_string);
        if output {
            self.extensions.operation_output_attributes(&mut io, cursor)?;
        } else {
            self.extensions.operation_input_attributes(&mut io, cursor)?;
        }

        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else {
                let handled = if output {
                    self.extensions.operation_output_element(&mut io, cursor)?
                } else {
                    self.extensions.operation_input_element(&mut io, cursor)?
                };
                if !handled {
                    cursor.skip_subtree()?;
                }
            }
        }
        Ok(io)
    }

    fn parse_operation_fault(&mut self, cursor: &mut XmlCursor) -> Result<Fault> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let message = required_qname_attr(cursor, names::AT_MESSAGE)?;
        let mut fault = Fault { name, message };

        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if !self.extensions.operation_fault_element(&mut fault, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        Ok(fault)
    }

    // ------------------------------------------------------------------
    // Konkreter Teil: binding
    // ------------------------------------------------------------------

    fn parse_binding(&mut self, cursor: &mut XmlCursor, tns: &str) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let port_type = required_qname_attr(cursor, names::AT_TYPE)?;
        let mut binding = Binding::new(QName::new(tns, &name), port_type);
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if child.matches(names::NS_WSDL, names::EL_OPERATION) {
                let op = self.parse_binding_operation(cursor)?;
                binding.put_operation(op);
            } else if child.matches(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if is_soap_ext(&child, names::EL_SOAP_BINDING) {
                self.parse_soap_binding(cursor, &mut binding)?;
            } else if !self.extensions.binding_element(&mut binding, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        self.builder.add_binding(binding);
        Ok(())
    }

    /// `soap:binding` bzw. `soap12:binding` (Spec 3.3): SOAP-Version,
    /// Transport und Default-Stil des Bindings.
    fn parse_soap_binding(&mut self, cursor: &mut XmlCursor, binding: &mut Binding) -> Result<()> {
        binding.soap_version = if &*cursor.name().uri == names::NS_SOAP12 {
            SoapVersion::Soap12
        } else {
            SoapVersion::Soap11
        };
        let transport = cursor.attribute(names::AT_TRANSPORT).unwrap_or("");
        binding.binding_id = self.binding_id_for_transport(binding.soap_version, transport);
        if let Some(style) = cursor.attribute(names::AT_STYLE) {
            binding.style = Style::from_attribute(style);
        }
        cursor.skip_subtree()
    }

    /// Erst die registrierten Factories, dann die Standard-Abbildung. Ein
    /// fremder Transport ohne zustaendige Factory faellt auf die
    /// Standard-SOAP/HTTP-Binding-ID seiner Version zurueck.
    fn binding_id_for_transport(&self, version: SoapVersion, transport: &str) -> String {
        for factory in &self.binding_id_factories {
            if let Some(id) = factory.binding_id(version, transport) {
                return id;
            }
        }
        if !transport.is_empty() && transport != names::SOAP_HTTP_TRANSPORT {
            log::warn!(
                "no binding id factory claims transport '{transport}', assuming the standard SOAP/HTTP binding"
            );
        }
        version.default_binding_id().to_string()
    }

    fn parse_binding_operation(&mut self, cursor: &mut XmlCursor) -> Result<BoundOperation> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let mut op = BoundOperation::new(&name);
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if child.matches(names::NS_WSDL, names::EL_INPUT) {
                self.parse_binding_io(cursor, &mut op, false)?;
            } else if child.matches(names::NS_WSDL, names::EL_OUTPUT) {
                self.parse_binding_io(cursor, &mut op, true)?;
            } else if child.matches(names::NS_WSDL, names::EL_FAULT) {
                self.parse_binding_fault(cursor, &mut op)?;
            } else if child.matches(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if is_soap_ext(&child, names::EL_SOAP_OPERATION) {
                // soapAction wird wortwoertlich uebernommen, auch leer.
                if let Some(action) = cursor.attribute(names::AT_SOAP_ACTION) {
                    op.soap_action = action.to_string();
                }
                if let Some(style) = cursor.attribute(names::AT_STYLE) {
                    op.set_style(Style::from_attribute(style));
                }
                cursor.skip_subtree()?;
            } else if !self.extensions.binding_operation_element(&mut op, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        Ok(op)
    }

    /// `wsdl:input`/`wsdl:output` innerhalb einer Binding-Operation
    /// (Spec 3.5-3.7 plus MIME Spec 5).
    fn parse_binding_io(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
        output: bool,
    ) -> Result<()> {
        let depth = cursor.depth();
        let mut body_seen = false;

        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if is_soap_ext(&child, names::EL_SOAP_BODY) {
                self.parse_soap_body(cursor, op, output, &mut body_seen)?;
            } else if is_soap_ext(&child, names::EL_SOAP_HEADER) {
                self.parse_soap_header(cursor, op, output)?;
            } else if child.matches(names::NS_MIME, names::EL_MIME_MULTIPART) {
                self.parse_mime_multipart(cursor, op, output, &mut body_seen)?;
            } else if child.matches(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else {
                let handled = if output {
                    self.extensions.binding_operation_output_element(op, cursor)?
                } else {
                    self.extensions.binding_operation_input_element(op, cursor)?
                };
                if !handled {
                    cursor.skip_subtree()?;
                }
            }
        }
        Ok(())
    }

    /// `soap:body`: Body-Namespace und die optionale explizite `parts`-Liste.
    ///
    /// `parts=""` bedeutet "kein Part im Body" — dafuer wird der
    /// Sentinel-Part eingetragen, der mit keinem NCName kollidieren kann;
    /// die eigentliche Wirkung entfaltet das explicit-Flag beim Freeze.
    fn parse_soap_body(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
        output: bool,
        body_seen: &mut bool,
    ) -> Result<()> {
        if *body_seen {
            log::warn!(
                "multiple soap:body elements for operation '{}', ignoring all but the first",
                op.name
            );
            return cursor.skip_subtree();
        }
        *body_seen = true;

        if let Some(ns) = cursor.attribute(names::AT_NAMESPACE) {
            if output {
                op.output_body_namespace = Some(ns.to_string());
            } else {
                op.input_body_namespace = Some(ns.to_string());
            }
        }
        if let Some(parts) = cursor.attribute(names::AT_PARTS) {
            op.set_explicit_parts(output);
            let mut any = false;
            for part in parts.split_whitespace() {
                any = true;
                op.bind_part(part, ParameterBinding::Body, output);
            }
            if !any {
                op.bind_part(names::EMPTY_PARTS_SENTINEL, ParameterBinding::Body, output);
            }
        }
        cursor.skip_subtree()
    }

    /// `soap:header` bindet genau einen Part an den Header (Spec 3.7).
    fn parse_soap_header(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
        output: bool,
    ) -> Result<()> {
        match cursor.attribute(names::AT_PART) {
            Some(part) => op.bind_part(part, ParameterBinding::Header, output),
            None => log::warn!(
                "soap:header without part attribute in operation '{}', ignoring",
                op.name
            ),
        }
        // headerfault-Kinder sind fuer das Modell ohne Belang.
        cursor.skip_subtree()
    }

    /// `mime:multipartRelated` (MIME Spec 5): `mime:content`-Parts werden
    /// Attachments, ein eingebettetes `soap:body` wirkt wie ein direktes.
    fn parse_mime_multipart(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
        output: bool,
        body_seen: &mut bool,
    ) -> Result<()> {
        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_MIME, names::EL_MIME_PART) {
                self.parse_mime_part(cursor, op, output, body_seen)?;
            } else {
                cursor.skip_subtree()?;
            }
        }
        Ok(())
    }

    fn parse_mime_part(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
        output: bool,
        body_seen: &mut bool,
    ) -> Result<()> {
        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if child.matches(names::NS_MIME, names::EL_MIME_CONTENT) {
                if let Some(part) = cursor.attribute(names::AT_PART) {
                    let mime_type = cursor.attribute(names::AT_TYPE).unwrap_or("").to_string();
                    op.bind_part(part, ParameterBinding::Attachment(mime_type), output);
                }
                cursor.skip_subtree()?;
            } else if is_soap_ext(&child, names::EL_SOAP_BODY) {
                self.parse_soap_body(cursor, op, output, body_seen)?;
            } else if is_soap_ext(&child, names::EL_SOAP_HEADER) {
                self.parse_soap_header(cursor, op, output)?;
            } else {
                cursor.skip_subtree()?;
            }
        }
        Ok(())
    }

    /// `wsdl:fault` einer Binding-Operation. Namenlose Faults sind
    /// Dokumentfehler, aber keine fatalen: sie werden verworfen.
    fn parse_binding_fault(
        &mut self,
        cursor: &mut XmlCursor,
        op: &mut BoundOperation,
    ) -> Result<()> {
        match cursor.attribute(names::AT_NAME) {
            Some(name) => op.faults.push(BoundFault { name: name.to_string() }),
            None => log::warn!("binding fault without name in operation '{}', ignoring", op.name),
        }

        let depth = cursor.depth();
        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if is_soap_ext(&child, names::EL_SOAP_FAULT)
                || child.matches(names::NS_WSDL, names::EL_DOCUMENTATION)
            {
                cursor.skip_subtree()?;
            } else if !self.extensions.binding_operation_fault_element(op, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // service / port
    // ------------------------------------------------------------------

    fn parse_service(&mut self, cursor: &mut XmlCursor, tns: &str) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let mut service = Service::new(QName::new(tns, &name));
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            if cursor.is_start_of(names::NS_WSDL, names::EL_PORT) {
                self.parse_port(cursor, &mut service, tns)?;
            } else if cursor.is_start_of(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if !self.extensions.service_element(&mut service, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        self.builder.add_service(service);
        Ok(())
    }

    fn parse_port(&mut self, cursor: &mut XmlCursor, service: &mut Service, tns: &str) -> Result<()> {
        let name = required_attr(cursor, names::AT_NAME)?;
        let binding = required_qname_attr(cursor, names::AT_BINDING)?;
        let mut port = Port::new(QName::new(tns, &name), binding);
        let depth = cursor.depth();

        while next_child(cursor, depth)? {
            let child = cursor.name().clone();
            if is_soap_ext(&child, names::EL_SOAP_ADDRESS) {
                if let Some(location) = cursor.attribute(names::AT_LOCATION) {
                    port.address = location.to_string();
                }
                cursor.skip_subtree()?;
            } else if is_epr_element(&child) {
                // Der Snapshot enthaelt alle Deklarationen von definitions bis
                // hinunter zum EPR-Element; capture_fragment injiziert davon,
                // was das Fragment nicht selbst deklariert.
                let scope = cursor.namespaces_in_scope();
                let fragment = cursor.capture_fragment(&scope)?;
                debug_assert_eq!(cursor.token(), Token::EndElement);
                port.endpoint_reference = Some(fragment);
            } else if child.matches(names::NS_WSDL, names::EL_DOCUMENTATION) {
                cursor.skip_subtree()?;
            } else if !self.extensions.port_element(&mut port, cursor)? {
                cursor.skip_subtree()?;
            }
        }
        service.put_port(port);
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Freistehende Helfer
// ----------------------------------------------------------------------

/// Treibt den Cursor zum naechsten Kind-StartElement des Elements, das bei
/// `parent_depth` offen ist; `false` sobald dessen EndElement erreicht ist.
/// Text zwischen Elementen (Whitespace, Mixed Content) wird ueberlesen.
fn next_child(cursor: &mut XmlCursor, parent_depth: usize) -> Result<bool> {
    loop {
        match cursor.advance()? {
            Token::StartElement => return Ok(true),
            Token::EndElement if cursor.depth() == parent_depth - 1 => return Ok(false),
            Token::EndElement | Token::Characters | Token::StartDocument => {}
            Token::EndDocument => {
                return Err(Error::malformed(
                    cursor.locator(),
                    "premature end of document inside an open element",
                ));
            }
        }
    }
}

fn required_attr(cursor: &XmlCursor, attribute: &'static str) -> Result<String> {
    match cursor.attribute(attribute) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::MissingAttribute {
            at: cursor.locator(),
            element: cursor.name().clark(),
            attribute,
        }),
    }
}

fn required_qname_attr(cursor: &XmlCursor, attribute: &'static str) -> Result<QName> {
    cursor.qname_attribute(attribute)?.ok_or_else(|| Error::MissingAttribute {
        at: cursor.locator(),
        element: cursor.name().clark(),
        attribute,
    })
}

/// True fuer SOAP-1.1- und SOAP-1.2-Extension-Elemente gleichen Namens.
fn is_soap_ext(name: &QName, local: &str) -> bool {
    (&*name.uri == names::NS_SOAP11 || &*name.uri == names::NS_SOAP12)
        && &*name.local_name == local
}

/// `wsa:EndpointReference` in der W3C- oder Member-Submission-Variante.
fn is_epr_element(name: &QName) -> bool {
    (&*name.uri == names::NS_WSA || &*name.uri == names::NS_MSA)
        && &*name.local_name == names::EL_EPR
}


/// Gibt die Parts einer Message zurueck, die laut `parameterOrder` als
/// Parameter erscheinen sollen, in Deklarationsreihenfolge der Liste.
/// Nicht aufgefuehrte Parts bleiben unberuehrt.
pub fn ordered_parameters<'m>(message: &'m Message, order: &[String]) -> Vec<&'m Part> {
    order.iter().filter_map(|name| message.part(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FastHashMap;
    use std::io::Read;

    struct MapFetcher(FastHashMap<String, String>);

    impl MapFetcher {
        fn with(docs: &[(&str, &str)]) -> Arc<Self> {
            let mut map = FastHashMap::default();
            for (id, body) in docs {
                map.insert(id.to_string(), body.to_string());
            }
            Arc::new(Self(map))
        }
    }

    impl DocumentFetcher for MapFetcher {
        fn fetch(&self, system_id: &str) -> std::io::Result<Box<dyn Read>> {
            match self.0.get(system_id) {
                Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone().into_bytes()))),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "404")),
            }
        }
    }

    fn parse_one(xml: &str) -> Result<WsdlModel> {
        let fetcher = MapFetcher::with(&[("mem:root.wsdl", xml)]);
        let mut session = ParseSession::new(fetcher, ExtensionPipeline::standard());
        session.parse_location("mem:root.wsdl")?;
        session.finish()
    }

    const HELLO_WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
             xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
             xmlns:xsd="http://www.w3.org/2001/XMLSchema"
             xmlns:tns="urn:hello" targetNamespace="urn:hello">
  <documentation>Example service</documentation>
  <types/>
  <message name="sayHelloIn">
    <part name="who" type="xsd:string"/>
    <part name="greeting" element="tns:Greeting"/>
  </message>
  <message name="sayHelloOut">
    <part name="answer" type="xsd:string"/>
  </message>
  <portType name="HelloPortType">
    <operation name="sayHello" parameterOrder="who greeting">
      <input message="tns:sayHelloIn"/>
      <output message="tns:sayHelloOut"/>
      <fault name="oops" message="tns:sayHelloOut"/>
    </operation>
  </portType>
  <binding name="HelloBinding" type="tns:HelloPortType">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http" style="rpc"/>
    <operation name="sayHello">
      <soap:operation soapAction="urn:hello:say"/>
      <input><soap:body use="literal" namespace="urn:hello:body"/></input>
      <output><soap:body use="literal"/></output>
      <fault name="oops"><soap:fault name="oops" use="literal"/></fault>
    </operation>
  </binding>
  <service name="HelloService">
    <port name="HelloPort" binding="tns:HelloBinding">
      <soap:address location="http://example.org/hello"/>
    </port>
  </service>
</definitions>"#;

    #[test]
    fn parses_a_complete_document() {
        let model = parse_one(HELLO_WSDL).unwrap();

        let msg = model.message(&QName::new("urn:hello", "sayHelloIn")).unwrap();
        assert_eq!(msg.parts().len(), 2);
        assert_eq!(
            msg.part("who").unwrap().descriptor,
            PartDescriptor::Type(QName::new(names::NS_XSD, "string"))
        );
        assert!(msg.part("greeting").unwrap().descriptor.is_element());

        let pt = model.port_type(&QName::new("urn:hello", "HelloPortType")).unwrap();
        let op = pt.operation("sayHello").unwrap();
        assert_eq!(op.parameter_order.as_deref(), Some(&["who".to_string(), "greeting".to_string()][..]));
        assert_eq!(op.faults.len(), 1);
        assert_eq!(op.faults[0].name, "oops");

        let binding = model.binding(&QName::new("urn:hello", "HelloBinding")).unwrap();
        assert_eq!(binding.style, Style::Rpc);
        assert_eq!(binding.soap_version, SoapVersion::Soap11);
        assert_eq!(binding.binding_id, names::BINDING_ID_SOAP11_HTTP);
        let bop = binding.operation("sayHello").unwrap();
        assert_eq!(bop.soap_action, "urn:hello:say");
        assert_eq!(bop.effective_style(), Style::Rpc);
        assert_eq!(bop.input_body_namespace.as_deref(), Some("urn:hello:body"));
        assert_eq!(bop.faults.len(), 1);
        // Beide Parts landen mangels expliziter Liste im Body.
        assert_eq!(bop.input_binding("who"), Some(&ParameterBinding::Body));
        assert_eq!(bop.input_binding("greeting"), Some(&ParameterBinding::Body));

        let svc = model.service(&QName::new("urn:hello", "HelloService")).unwrap();
        let port = svc.port(&QName::new("urn:hello", "HelloPort")).unwrap();
        assert_eq!(port.address, "http://example.org/hello");
        assert_eq!(port.binding, QName::new("urn:hello", "HelloBinding"));
    }

    #[test]
    fn missing_target_namespace_is_an_error() {
        let err = parse_one(r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"/>"#)
            .unwrap_err();
        assert!(
            matches!(err, Error::MissingAttribute { attribute: "targetNamespace", .. }),
            "{err}"
        );
    }

    #[test]
    fn non_wsdl_root_is_unexpected_and_retryable() {
        let err = parse_one("<html><body>It works!</body></html>").unwrap_err();
        assert!(matches!(err, Error::UnexpectedElement { .. }), "{err}");
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_parts_list_sets_sentinel_and_explicit_flag() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <message name="In"><part name="p" type="xsd:int"/></message>
          <portType name="PT"><operation name="go"><input message="tns:In"/></operation></portType>
          <binding name="B" type="tns:PT">
            <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
            <operation name="go"><input><soap:body parts=""/></input></operation>
          </binding>
          <service name="S"><port name="P" binding="tns:B">
            <soap:address location="http://h/s"/></port></service>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let bop = model
            .binding(&QName::new("urn:t", "B"))
            .unwrap()
            .operation("go")
            .unwrap();
        assert!(bop.explicit_input_parts());
        assert_eq!(
            bop.input_binding(names::EMPTY_PARTS_SENTINEL),
            Some(&ParameterBinding::Body)
        );
        // Der echte Part ist wegen der expliziten (leeren) Liste ungebunden.
        assert_eq!(bop.input_binding("p"), Some(&ParameterBinding::Unbound));
    }

    #[test]
    fn header_and_mime_attachment_bindings() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:mime="http://schemas.xmlsoap.org/wsdl/mime/"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <message name="In">
            <part name="head" type="xsd:string"/>
            <part name="photo" type="xsd:base64Binary"/>
            <part name="payload" type="xsd:string"/>
          </message>
          <portType name="PT"><operation name="send"><input message="tns:In"/></operation></portType>
          <binding name="B" type="tns:PT">
            <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
            <operation name="send">
              <input>
                <soap:header message="tns:In" part="head" use="literal"/>
                <mime:multipartRelated>
                  <mime:part><soap:body use="literal"/></mime:part>
                  <mime:part><mime:content part="photo" type="image/jpeg"/></mime:part>
                </mime:multipartRelated>
              </input>
            </operation>
          </binding>
          <service name="S"><port name="P" binding="tns:B">
            <soap:address location="http://h/s"/></port></service>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let bop = model
            .binding(&QName::new("urn:t", "B"))
            .unwrap()
            .operation("send")
            .unwrap();
        assert_eq!(bop.input_binding("head"), Some(&ParameterBinding::Header));
        assert_eq!(
            bop.input_binding("photo"),
            Some(&ParameterBinding::Attachment("image/jpeg".to_string()))
        );
        // Kein explizites parts-Attribut: der Rest faellt in den Body.
        assert_eq!(bop.input_binding("payload"), Some(&ParameterBinding::Body));
    }

    #[test]
    fn soap12_binding_is_recognised() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap12:binding transport="http://schemas.xmlsoap.org/soap/http"/>
          </binding>
          <service name="S"><port name="P" binding="tns:B">
            <soap12:address location="http://h/s"/></port></service>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let binding = model.binding(&QName::new("urn:t", "B")).unwrap();
        assert_eq!(binding.soap_version, SoapVersion::Soap12);
        assert_eq!(binding.binding_id, names::BINDING_ID_SOAP12_HTTP);
        let port = model.port(&QName::new("urn:t", "P")).unwrap();
        assert_eq!(port.address, "http://h/s");
    }

    #[test]
    fn notification_operation_has_no_input() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <message name="Out"><part name="p" type="xsd:string"/></message>
          <portType name="PT">
            <operation name="notify"><output message="tns:Out"/></operation>
          </portType>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let op = model
            .port_type(&QName::new("urn:t", "PT"))
            .unwrap()
            .operation("notify")
            .unwrap();
        assert!(op.input.is_none());
        assert!(op.output.is_some());
    }

    #[test]
    fn imports_are_followed_and_deduplicated() {
        // Diamant: root importiert a und b, beide importieren shared.
        let root = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            targetNamespace="urn:root">
          <import namespace="urn:a" location="a.wsdl"/>
          <import namespace="urn:b" location="b.wsdl"/>
          <service name="S"/>
        </definitions>"#;
        let a = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            targetNamespace="urn:a">
          <import namespace="urn:shared" location="shared.wsdl"/>
        </definitions>"#;
        let b = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            targetNamespace="urn:b">
          <import namespace="urn:shared" location="./shared.wsdl"/>
        </definitions>"#;
        let shared = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            targetNamespace="urn:shared">
          <message name="M"><part name="p" type="xsd:string"/></message>
        </definitions>"#;
        let fetcher = MapFetcher::with(&[
            ("http://h/root.wsdl", root),
            ("http://h/a.wsdl", a),
            ("http://h/b.wsdl", b),
            ("http://h/shared.wsdl", shared),
        ]);
        let mut session = ParseSession::new(fetcher, ExtensionPipeline::standard());
        session.parse_location("http://h/root.wsdl").unwrap();
        let model = session.finish().unwrap();
        assert!(model.message(&QName::new("urn:shared", "M")).is_some());
        assert_eq!(model.messages().count(), 1);
    }

    #[test]
    fn self_import_terminates() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            targetNamespace="urn:t">
          <import namespace="urn:t" location="self.wsdl"/>
          <service name="S"/>
        </definitions>"#;
        let fetcher = MapFetcher::with(&[("http://h/self.wsdl", xml)]);
        let mut session = ParseSession::new(fetcher, ExtensionPipeline::standard());
        session.parse_location("http://h/self.wsdl").unwrap();
        let model = session.finish().unwrap();
        assert!(model.service(&QName::new("urn:t", "S")).is_some());
    }

    #[test]
    fn import_without_location_is_an_error() {
        let err = parse_one(
            r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" targetNamespace="urn:t">
              <import namespace="urn:x"/>
            </definitions>"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { attribute: "location", .. }), "{err}");
    }

    #[test]
    fn endpoint_reference_is_captured_with_scope() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:wsa="http://www.w3.org/2005/08/addressing"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
          </binding>
          <service name="S">
            <port name="P" binding="tns:B">
              <soap:address location="http://h/s"/>
              <wsa:EndpointReference>
                <wsa:Address>http://h/s</wsa:Address>
                <wsa:ReferenceParameters><tns:Key>42</tns:Key></wsa:ReferenceParameters>
              </wsa:EndpointReference>
            </port>
          </service>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let port = model.port(&QName::new("urn:t", "P")).unwrap();
        let epr = port.endpoint_reference.as_deref().expect("EPR captured");
        assert!(epr.starts_with("<wsa:EndpointReference"), "{epr}");
        // Der tns-Prefix stammt aus dem definitions-Scope und muss im
        // Fragment deklariert sein.
        assert!(epr.contains(r#"xmlns:tns="urn:t""#), "{epr}");
        assert!(epr.contains("<tns:Key>42</tns:Key>"), "{epr}");
        assert_eq!(port.address, "http://h/s");
    }

    #[test]
    fn using_addressing_in_binding_sets_flags() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:wsaw="http://www.w3.org/2006/05/addressing/wsdl"
            xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
            <wsaw:UsingAddressing wsdl:required="true"/>
          </binding>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let binding = model.binding(&QName::new("urn:t", "B")).unwrap();
        assert!(binding.addressing_enabled);
        assert!(binding.addressing_required);
    }

    #[test]
    fn using_addressing_in_port_sets_binding_flags() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:wsaw="http://www.w3.org/2006/05/addressing/wsdl"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
          </binding>
          <service name="S">
            <port name="P" binding="tns:B">
              <soap:address location="http://h/s"/>
              <wsaw:UsingAddressing/>
            </port>
          </service>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let binding = model.binding(&QName::new("urn:t", "B")).unwrap();
        assert!(binding.addressing_enabled);
        assert!(!binding.addressing_required);
    }

    #[test]
    fn wsam_action_is_recorded_on_message_refs() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:wsam="http://www.w3.org/2007/05/addressing/metadata"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <message name="In"><part name="p" type="xsd:string"/></message>
          <portType name="PT">
            <operation name="go">
              <input message="tns:In" wsam:Action="urn:act:go"/>
            </operation>
          </portType>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let op = model
            .port_type(&QName::new("urn:t", "PT"))
            .unwrap()
            .operation("go")
            .unwrap();
        assert_eq!(
            op.input.as_ref().unwrap().action.as_deref(),
            Some("urn:act:go")
        );
    }

    #[test]
    fn policy_reference_in_document_reaches_the_model() {
        let xml = r##"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:wsp="http://www.w3.org/ns/ws-policy"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <wsp:Policy><wsp:All/></wsp:Policy>
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <wsp:PolicyReference URI="#Common"/>
          </binding>
          <service name="S"/>
        </definitions>"##;
        let model = parse_one(xml).unwrap();
        assert_eq!(model.policy_references(), ["#Common"]);
    }

    #[test]
    fn unknown_foreign_elements_are_skipped() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:x="urn:vendor" targetNamespace="urn:t">
          <x:turbo mode="max"><x:nested/></x:turbo>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        assert!(model.service(&QName::new("urn:t", "S")).is_some());
    }

    #[test]
    fn partless_parts_are_dropped() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            targetNamespace="urn:t">
          <message name="M">
            <part name="typed" type="xsd:string"/>
            <part name="untyped"/>
          </message>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        let msg = model.message(&QName::new("urn:t", "M")).unwrap();
        assert_eq!(msg.parts().len(), 1);
        assert!(msg.part("untyped").is_none());
    }

    #[test]
    fn binding_id_factory_claims_foreign_transports() {
        struct JmsFactory;
        impl BindingIdFactory for JmsFactory {
            fn binding_id(&self, _version: SoapVersion, transport: &str) -> Option<String> {
                (transport == "urn:transport:jms").then(|| "urn:binding:jms".to_string())
            }
        }

        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap:binding transport="urn:transport:jms"/>
          </binding>
          <service name="S"/>
        </definitions>"#;
        let fetcher = MapFetcher::with(&[("mem:jms.wsdl", xml)]);
        let mut session = ParseSession::new(fetcher, ExtensionPipeline::standard());
        session.register_binding_id_factory(Arc::new(JmsFactory));
        session.parse_location("mem:jms.wsdl").unwrap();
        let model = session.finish().unwrap();
        assert_eq!(
            model.binding(&QName::new("urn:t", "B")).unwrap().binding_id,
            "urn:binding:jms"
        );
    }

    #[test]
    fn unclaimed_foreign_transport_falls_back_to_version_default() {
        let xml = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
            xmlns:tns="urn:t" targetNamespace="urn:t">
          <portType name="PT"/>
          <binding name="B" type="tns:PT">
            <soap:binding transport="urn:transport:smtp"/>
          </binding>
          <service name="S"/>
        </definitions>"#;
        let model = parse_one(xml).unwrap();
        assert_eq!(
            model.binding(&QName::new("urn:t", "B")).unwrap().binding_id,
            names::BINDING_ID_SOAP11_HTTP
        );
    }

    #[test]
    fn ordered_parameters_follows_declared_order() {
        let mut m = Message::new(QName::new("urn:t", "M"));
        m.add_part("a", PartDescriptor::Type(QName::new(names::NS_XSD, "int")));
        m.add_part("b", PartDescriptor::Type(QName::new(names::NS_XSD, "int")));
        let order = vec!["b".to_string(), "a".to_string(), "missing".to_string()];
        let params = ordered_parameters(&m, &order);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
