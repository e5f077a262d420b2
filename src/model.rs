//! The typed, cross-referenced interface model (WSDL 1.1 Sec 2.2-2.7).
//!
//! Waehrend des Parsens ist das Modell ein [`WsdlModelBuilder`] und strikt
//! mutierbar; `freeze()` konsumiert den Builder, loest Teil- und Stil-Referenzen
//! auf und liefert das unveraenderliche [`WsdlModel`]. Nach dem Freeze ist
//! Mutation per Konstruktion unmoeglich — das Modell besitzt nur Lese-API und
//! darf beliebig geteilt werden.

use crate::qname::QName;
use crate::{FastIndexMap, names};

/// SOAP-Stil einer Bindung bzw. Operation (Spec 3.3/3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    Rpc,
    /// Default laut SOAP-Binding-Spec, wenn kein `style`-Attribut vorliegt.
    #[default]
    Document,
}

impl Style {
    /// Parst den Attributwert; unbekannte Werte fallen auf Document zurueck.
    pub fn from_attribute(value: &str) -> Self {
        if value.eq_ignore_ascii_case("rpc") { Style::Rpc } else { Style::Document }
    }
}

/// SOAP-Version, abgeleitet aus dem Namespace des Binding-Elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    /// WSDL-Extension-Namespace dieser Version.
    pub fn wsdl_ns(self) -> &'static str {
        match self {
            SoapVersion::Soap11 => names::NS_SOAP11,
            SoapVersion::Soap12 => names::NS_SOAP12,
        }
    }

    /// Standard-Binding-ID fuer SOAP-ueber-HTTP dieser Version.
    pub fn default_binding_id(self) -> &'static str {
        match self {
            SoapVersion::Soap11 => names::BINDING_ID_SOAP11_HTTP,
            SoapVersion::Soap12 => names::BINDING_ID_SOAP12_HTTP,
        }
    }
}

/// Descriptor eines Message-Parts: entweder Element- oder Typ-Referenz
/// (Spec 2.3.1, die Attribute schliessen sich gegenseitig aus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartDescriptor {
    Element(QName),
    Type(QName),
}

impl PartDescriptor {
    pub fn is_element(&self) -> bool {
        matches!(self, PartDescriptor::Element(_))
    }

    pub fn qname(&self) -> &QName {
        match self {
            PartDescriptor::Element(q) | PartDescriptor::Type(q) => q,
        }
    }
}

/// Ein Part einer Message. Der Index ist die Einfuegeposition und damit die
/// Wire-Reihenfolge (signifikant fuer positionsbasierte Bindungen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub index: usize,
    pub descriptor: PartDescriptor,
}

/// Named, ordered list of typed parts (Spec 2.3).
#[derive(Debug, Clone)]
pub struct Message {
    pub name: QName,
    parts: Vec<Part>,
}

impl Message {
    pub fn new(name: QName) -> Self {
        Self { name, parts: Vec::new() }
    }

    /// Haengt einen Part an; der Index ergibt sich aus der Reihenfolge.
    pub fn add_part(&mut self, name: &str, descriptor: PartDescriptor) {
        let index = self.parts.len();
        self.parts.push(Part { name: name.to_string(), index, descriptor });
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// Referenz einer Operation auf eine Message (input/output, Spec 2.4.2).
#[derive(Debug, Clone)]
pub struct MessageRef {
    /// Optionales `name`-Attribut des input/output-Elements.
    pub name: Option<String>,
    pub message: QName,
    /// WS-Addressing Action, falls von einer Addressing-Extension gesetzt.
    pub action: Option<String>,
}

impl MessageRef {
    pub fn new(message: QName) -> Self {
        Self { name: None, message, action: None }
    }
}

/// Fault-Referenz einer abstrakten Operation (Spec 2.4.4).
#[derive(Debug, Clone)]
pub struct Fault {
    pub name: String,
    pub message: QName,
}

/// Abstrakte Operation eines portType (Spec 2.4).
///
/// `input` ist optional: notification-only Operationen haben nur `output`.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub parameter_order: Option<Vec<String>>,
    pub input: Option<MessageRef>,
    pub output: Option<MessageRef>,
    pub faults: Vec<Fault>,
}

impl Operation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameter_order: None,
            input: None,
            output: None,
            faults: Vec::new(),
        }
    }
}

/// Named collection of abstract operations (Spec 2.4).
#[derive(Debug, Clone)]
pub struct PortType {
    pub name: QName,
    operations: FastIndexMap<String, Operation>,
}

impl PortType {
    pub fn new(name: QName) -> Self {
        Self { name, operations: FastIndexMap::default() }
    }

    pub fn put_operation(&mut self, op: Operation) {
        self.operations.insert(op.name.clone(), op);
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }
}

/// Wo ein Part auf dem Draht reist (Spec 3.5/3.7, MIME Spec 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterBinding {
    Body,
    Header,
    /// MIME-Attachment mit dem deklarierten Content-Type.
    Attachment(String),
    /// Von einer expliziten `parts`-Liste ausgeschlossen.
    Unbound,
}

/// Fault-Bindung in Dokumentreihenfolge (Spec 3.6).
#[derive(Debug, Clone)]
pub struct BoundFault {
    pub name: String,
}

/// Konkrete Bindung einer Operation (Spec 3.4-3.7).
#[derive(Debug, Clone)]
pub struct BoundOperation {
    pub name: String,
    /// Lokaler Stil-Override; `None` erbt den Binding-Stil (aufgeloest beim Freeze).
    style: Option<Style>,
    pub soap_action: String,
    /// `soap:body/@namespace` pro Richtung (von rpc/lit-Serialisierern gebraucht).
    pub input_body_namespace: Option<String>,
    pub output_body_namespace: Option<String>,
    explicit_input_parts: bool,
    explicit_output_parts: bool,
    input_parts: FastIndexMap<String, ParameterBinding>,
    output_parts: FastIndexMap<String, ParameterBinding>,
    pub faults: Vec<BoundFault>,
}

impl BoundOperation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            style: None,
            soap_action: String::new(),
            input_body_namespace: None,
            output_body_namespace: None,
            explicit_input_parts: false,
            explicit_output_parts: false,
            input_parts: FastIndexMap::default(),
            output_parts: FastIndexMap::default(),
            faults: Vec::new(),
        }
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = Some(style);
    }

    /// Effektiver Stil. Vor dem Freeze nur gesetzt, wenn die Operation ihn
    /// lokal deklariert; der Freeze fuellt die Vererbung vom Binding auf.
    pub fn effective_style(&self) -> Style {
        self.style.unwrap_or_default()
    }

    pub fn has_explicit_style(&self) -> bool {
        self.style.is_some()
    }

    pub fn set_explicit_parts(&mut self, output: bool) {
        if output {
            self.explicit_output_parts = true;
        } else {
            self.explicit_input_parts = true;
        }
    }

    pub fn explicit_input_parts(&self) -> bool {
        self.explicit_input_parts
    }

    pub fn explicit_output_parts(&self) -> bool {
        self.explicit_output_parts
    }

    /// Traegt eine Part-Bindung ein; die erste Eintragung gewinnt.
    pub fn bind_part(&mut self, part: &str, binding: ParameterBinding, output: bool) {
        let map = if output { &mut self.output_parts } else { &mut self.input_parts };
        map.entry(part.to_string()).or_insert(binding);
    }

    pub fn input_binding(&self, part: &str) -> Option<&ParameterBinding> {
        self.input_parts.get(part)
    }

    pub fn output_binding(&self, part: &str) -> Option<&ParameterBinding> {
        self.output_parts.get(part)
    }

    pub fn input_parts(&self) -> impl Iterator<Item = (&str, &ParameterBinding)> {
        self.input_parts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn output_parts(&self) -> impl Iterator<Item = (&str, &ParameterBinding)> {
        self.output_parts.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Concrete protocol/transport mapping of a portType (Spec 3).
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: QName,
    pub port_type: QName,
    /// Transport-Kennung (Standard-SOAP/HTTP oder von einer Factory geliefert).
    pub binding_id: String,
    pub soap_version: SoapVersion,
    pub style: Style,
    operations: FastIndexMap<String, BoundOperation>,
    /// wsaw:UsingAddressing gesehen (W3C oder Member-Submission Variante).
    pub addressing_enabled: bool,
    /// `wsdl:required="true"` auf UsingAddressing.
    pub addressing_required: bool,
}

impl Binding {
    pub fn new(name: QName, port_type: QName) -> Self {
        Self {
            name,
            port_type,
            binding_id: names::BINDING_ID_SOAP11_HTTP.to_string(),
            soap_version: SoapVersion::Soap11,
            style: Style::Document,
            operations: FastIndexMap::default(),
            addressing_enabled: false,
            addressing_required: false,
        }
    }

    pub fn put_operation(&mut self, op: BoundOperation) {
        self.operations.insert(op.name.clone(), op);
    }

    pub fn operation(&self, name: &str) -> Option<&BoundOperation> {
        self.operations.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &BoundOperation> {
        self.operations.values()
    }
}

/// Network-addressable endpoint instance (Spec 2.6).
#[derive(Debug, Clone)]
pub struct Port {
    pub name: QName,
    pub binding: QName,
    /// Leere Adresse, wenn das Dokument keine deklariert; Aufrufer
    /// ueberschreiben die Adresse haeufig ohnehin.
    pub address: String,
    /// Eingebettetes EndpointReference-Fragment, eigenstaendig
    /// re-serialisierbar (Namespace-Scope von definitions/service/port
    /// ist ins Fragment injiziert).
    pub endpoint_reference: Option<String>,
}

impl Port {
    pub fn new(name: QName, binding: QName) -> Self {
        Self { name, binding, address: String::new(), endpoint_reference: None }
    }
}

/// Named set of ports (Spec 2.7).
#[derive(Debug, Clone)]
pub struct Service {
    pub name: QName,
    ports: FastIndexMap<QName, Port>,
}

impl Service {
    pub fn new(name: QName) -> Self {
        Self { name, ports: FastIndexMap::default() }
    }

    pub fn put_port(&mut self, port: Port) {
        self.ports.insert(port.name.clone(), port);
    }

    pub fn port(&self, name: &QName) -> Option<&Port> {
        self.ports.get(name)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    /// Erster Port in Dokumentreihenfolge.
    pub fn first_port(&self) -> Option<&Port> {
        self.ports.values().next()
    }
}

/// Mutable model under construction. Scoped to one parse session; recursive
/// import parses populate the same builder.
#[derive(Debug, Default)]
pub struct WsdlModelBuilder {
    messages: FastIndexMap<QName, Message>,
    port_types: FastIndexMap<QName, PortType>,
    bindings: FastIndexMap<QName, Binding>,
    services: FastIndexMap<QName, Service>,
    /// Von der Policy-Extension gesammelte `wsp:PolicyReference/@URI` Werte.
    policy_references: Vec<String>,
}

impl WsdlModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuegt eine Message ein. Namenskollisionen ueberschreiben die fruehere
    /// Definition (permissives Legacy-Verhalten) mit einer Warnung; Import-
    /// Deduplizierung verhindert die legitime Quelle solcher Kollisionen.
    pub fn add_message(&mut self, message: Message) {
        if self.messages.insert(message.name.clone(), message).is_some() {
            log::warn!("duplicate wsdl:message definition replaces the earlier one");
        }
    }

    pub fn add_port_type(&mut self, port_type: PortType) {
        if self.port_types.insert(port_type.name.clone(), port_type).is_some() {
            log::warn!("duplicate wsdl:portType definition replaces the earlier one");
        }
    }

    pub fn add_binding(&mut self, binding: Binding) {
        if self.bindings.insert(binding.name.clone(), binding).is_some() {
            log::warn!("duplicate wsdl:binding definition replaces the earlier one");
        }
    }

    pub fn add_service(&mut self, service: Service) {
        if self.services.insert(service.name.clone(), service).is_some() {
            log::warn!("duplicate wsdl:service definition replaces the earlier one");
        }
    }

    pub fn message(&self, name: &QName) -> Option<&Message> {
        self.messages.get(name)
    }

    pub fn port_type(&self, name: &QName) -> Option<&PortType> {
        self.port_types.get(name)
    }

    pub fn binding_mut(&mut self, name: &QName) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    /// Nimmt gesammelte Policy-Referenz-URIs entgegen (Pass-through, Spec-seitig
    /// nicht weiter interpretiert).
    pub fn add_policy_references(&mut self, uris: impl IntoIterator<Item = String>) {
        self.policy_references.extend(uris);
    }

    /// Freezes the model: resolves style inheritance and fills in the part
    /// bindings for message parts no explicit binding entry mentions.
    ///
    /// Unaufloesbare Referenzen (Binding → portType, Operation → Message,
    /// Port → Binding) sind bei lose geschriebenen Dokumenten verbreitet und
    /// werden nur geloggt; die betroffene Aufloesung entfaellt dann.
    pub fn freeze(mut self) -> WsdlModel {
        let port_types = &self.port_types;
        for binding in self.bindings.values_mut() {
            let binding_style = binding.style;
            let port_type = port_types.get(&binding.port_type);
            if port_type.is_none() {
                log::warn!(
                    "binding {} references unknown portType {}",
                    binding.name,
                    binding.port_type
                );
            }
            for op in binding.operations.values_mut() {
                if op.style.is_none() {
                    op.style = Some(binding_style);
                }
                let Some(abstract_op) = port_type.and_then(|pt| pt.operations.get(&op.name)) else {
                    continue;
                };
                resolve_direction_parts(
                    &mut op.input_parts,
                    op.explicit_input_parts,
                    abstract_op.input.as_ref(),
                    &self.messages,
                );
                resolve_direction_parts(
                    &mut op.output_parts,
                    op.explicit_output_parts,
                    abstract_op.output.as_ref(),
                    &self.messages,
                );
            }
        }

        for service in self.services.values() {
            for port in service.ports.values() {
                if !self.bindings.contains_key(&port.binding) {
                    log::warn!("port {} references unknown binding {}", port.name, port.binding);
                }
            }
        }

        WsdlModel {
            messages: self.messages,
            port_types: self.port_types,
            bindings: self.bindings,
            services: self.services,
            policy_references: self.policy_references,
        }
    }
}

/// Default-Bindung fuer Parts, die keine explizite Bindung nennt: Body —
/// ausser eine explizite `parts`-Liste schliesst den Part aus (Unbound).
fn resolve_direction_parts(
    bound: &mut FastIndexMap<String, ParameterBinding>,
    explicit: bool,
    message_ref: Option<&MessageRef>,
    messages: &FastIndexMap<QName, Message>,
) {
    let Some(message) = message_ref.and_then(|r| messages.get(&r.message)) else {
        return;
    };
    for part in &message.parts {
        bound.entry(part.name.clone()).or_insert(if explicit {
            ParameterBinding::Unbound
        } else {
            ParameterBinding::Body
        });
    }
}

/// Frozen, read-only interface model. Queried by the RPC runtime.
#[derive(Debug)]
pub struct WsdlModel {
    messages: FastIndexMap<QName, Message>,
    port_types: FastIndexMap<QName, PortType>,
    bindings: FastIndexMap<QName, Binding>,
    services: FastIndexMap<QName, Service>,
    policy_references: Vec<String>,
}

impl WsdlModel {
    pub fn message(&self, name: &QName) -> Option<&Message> {
        self.messages.get(name)
    }

    pub fn port_type(&self, name: &QName) -> Option<&PortType> {
        self.port_types.get(name)
    }

    pub fn binding(&self, name: &QName) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn service(&self, name: &QName) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn port_types(&self) -> impl Iterator<Item = &PortType> {
        self.port_types.values()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }

    /// Port-Lookup ueber alle Services hinweg.
    pub fn port(&self, name: &QName) -> Option<&Port> {
        self.services.values().find_map(|s| s.ports.get(name))
    }

    /// Gesammelte `wsp:PolicyReference/@URI` Werte in Dokumentreihenfolge.
    pub fn policy_references(&self) -> &[String] {
        &self.policy_references
    }
}
