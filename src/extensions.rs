//! Pluggable parser extensions and the cursor-contract enforcement.
//!
//! An jeder Stelle, an der die WSDL-Grammatik fremde Vokabulare zulaesst,
//! bietet der Parser einen Hook an. Element-Hooks folgen einem strikten
//! Cursor-Vertrag:
//!
//! * `Ok(true)`  — die Extension hat das Element konsumiert; der Cursor steht
//!   auf dem zugehoerigen EndElement.
//! * `Ok(false)` — die Extension ist nicht zustaendig; der Cursor steht
//!   unveraendert auf dem StartElement.
//!
//! Jeder registrierte Handler wird in [`ContractChecked`] gewickelt, das den
//! Vertrag nach jedem Aufruf prueft. Ein Verstoss ist ein Bug der Extension
//! (nie ein Dokumentfehler) und bricht den Parse endgueltig ab.
//!
//! Attribut-Hooks laufen mit `&XmlCursor` und koennen den Cursor per
//! Konstruktion nicht bewegen.

use crate::cursor::{Token, XmlCursor};
use crate::error::{Error, Result};
use crate::model::{
    Binding, BoundOperation, Fault, Message, MessageRef, Operation, Port, PortType, Service,
    WsdlModel, WsdlModelBuilder,
};
use crate::names;
use crate::qname::QName;

/// Ein Parser-Erweiterungs-Handler. Alle Hooks haben No-op-Defaults;
/// Extensions ueberschreiben nur die Stellen, die sie interessieren.
#[allow(unused_variables)]
pub trait ExtensionHandler {
    /// Stabiler Name fuer Fehlermeldungen und Logs.
    fn name(&self) -> &'static str;

    /// True, wenn dieser Handler die Policy-Verarbeitung uebernimmt. Meldet
    /// kein registrierter Handler `true`, ergaenzt die Pipeline-Montage die
    /// eingebaute [`PolicyExtension`] automatisch.
    fn is_policy_extension(&self) -> bool {
        false
    }

    // ------------------------------------------------------------------
    // Element-Hooks (Cursor-Vertrag, siehe Modul-Doku).
    // ------------------------------------------------------------------

    fn definitions_element(&mut self, cursor: &mut XmlCursor) -> Result<bool> {
        Ok(false)
    }

    fn message_element(&mut self, message: &mut Message, cursor: &mut XmlCursor) -> Result<bool> {
        Ok(false)
    }

    fn port_type_element(
        &mut self,
        port_type: &mut PortType,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn port_type_operation_element(
        &mut self,
        operation: &mut Operation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn operation_input_element(
        &mut self,
        input: &mut MessageRef,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn operation_output_element(
        &mut self,
        output: &mut MessageRef,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn operation_fault_element(
        &mut self,
        fault: &mut Fault,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn binding_element(&mut self, binding: &mut Binding, cursor: &mut XmlCursor) -> Result<bool> {
        Ok(false)
    }

    fn binding_operation_element(
        &mut self,
        operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn binding_operation_input_element(
        &mut self,
        operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn binding_operation_output_element(
        &mut self,
        operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn binding_operation_fault_element(
        &mut self,
        operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        Ok(false)
    }

    fn service_element(&mut self, service: &mut Service, cursor: &mut XmlCursor) -> Result<bool> {
        Ok(false)
    }

    fn port_element(&mut self, port: &mut Port, cursor: &mut XmlCursor) -> Result<bool> {
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Attribut-Hooks (Cursor steht auf dem Start-Element, nur Lesezugriff).
    // ------------------------------------------------------------------

    fn port_type_operation_attributes(
        &mut self,
        operation: &mut Operation,
        cursor: &XmlCursor,
    ) -> Result<()> {
        Ok(())
    }

    fn operation_input_attributes(
        &mut self,
        input: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        Ok(())
    }

    fn operation_output_attributes(
        &mut self,
        output: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lebenszyklus.
    // ------------------------------------------------------------------

    /// Nach dem letzten Dokument, vor dem Freeze.
    fn finished(&mut self, builder: &mut WsdlModelBuilder) -> Result<()> {
        Ok(())
    }

    /// Nach dem Freeze, mit Sicht auf das fertige Modell.
    fn post_finished(&mut self, model: &WsdlModel) -> Result<()> {
        Ok(())
    }
}

/// Decorator, der den Cursor-Vertrag eines Handlers nach jedem Element-Hook
/// prueft. Verstoesse werden als [`Error::ExtensionContract`] gemeldet und
/// nennen Extension und Hook.
pub struct ContractChecked {
    inner: Box<dyn ExtensionHandler>,
}

impl ContractChecked {
    pub fn new(inner: Box<dyn ExtensionHandler>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn checked<F>(&mut self, hook: &'static str, cursor: &mut XmlCursor, call: F) -> Result<bool>
    where
        F: FnOnce(&mut dyn ExtensionHandler, &mut XmlCursor) -> Result<bool>,
    {
        let start_name = cursor.name().clone();
        let start_depth = cursor.depth();
        let handled = call(&mut *self.inner, cursor)?;

        let violation = if handled {
            // Konsumiert: Cursor muss auf dem EndElement desselben Elements stehen.
            if cursor.token() != Token::EndElement
                || cursor.name() != &start_name
                || cursor.depth() != start_depth - 1
            {
                Some(format!(
                    "claimed to consume <{}> but left the cursor at {:?} <{}> (depth {})",
                    start_name.clark(),
                    cursor.token(),
                    cursor.name().clark(),
                    cursor.depth()
                ))
            } else {
                None
            }
        } else if cursor.token() != Token::StartElement
            || cursor.name() != &start_name
            || cursor.depth() != start_depth
        {
            // Abgelehnt: Cursor muss unveraendert auf dem StartElement stehen.
            Some(format!(
                "declined <{}> but moved the cursor to {:?} <{}> (depth {})",
                start_name.clark(),
                cursor.token(),
                cursor.name().clark(),
                cursor.depth()
            ))
        } else {
            None
        };

        match violation {
            Some(detail) => Err(Error::ExtensionContract {
                extension: self.inner.name(),
                hook,
                detail,
            }),
            None => Ok(handled),
        }
    }
}

/// Makro fuer die Pipeline-Element-Hooks: erster Handler, der konsumiert,
/// gewinnt; der Rest wird nicht mehr gefragt.
macro_rules! element_hook {
    ($fn_name:ident $(, $arg:ident : $ty:ty)*) => {
        pub fn $fn_name(&mut self $(, $arg: $ty)*, cursor: &mut XmlCursor) -> Result<bool> {
            for handler in &mut self.handlers {
                if handler.checked(stringify!($fn_name), cursor, |h, c| {
                    h.$fn_name($(&mut *$arg,)* c)
                })? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    };
}

/// Geordnete Handler-Kette. Der Parser ruft nur die Pipeline, nie einzelne
/// Handler.
pub struct ExtensionPipeline {
    handlers: Vec<ContractChecked>,
}

impl ExtensionPipeline {
    /// Leere Pipeline (keine Built-ins; vor allem fuer Tests).
    pub fn empty() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Standard-Pipeline: W3C-Addressing, Member-Submission-Addressing und
    /// die Policy-Extension sind immer registriert.
    pub fn standard() -> Self {
        Self::assemble(Vec::new())
    }

    /// Montiert die Pipeline aus Built-ins plus `custom`-Handlern. Die
    /// eingebaute Policy-Extension wird nur ergaenzt, wenn kein Custom-Handler
    /// die Policy-Rolle beansprucht.
    pub fn assemble(custom: Vec<Box<dyn ExtensionHandler>>) -> Self {
        let mut pipeline = Self::empty();
        pipeline.register(Box::new(W3cAddressingExtension::new()));
        pipeline.register(Box::new(MemberSubmissionAddressingExtension::new()));
        let has_policy = custom.iter().any(|h| h.is_policy_extension());
        for handler in custom {
            pipeline.register(handler);
        }
        if !has_policy {
            pipeline.register(Box::new(PolicyExtension::new()));
        }
        pipeline
    }

    /// Haengt einen Handler ans Ende der Kette.
    pub fn register(&mut self, handler: Box<dyn ExtensionHandler>) {
        log::debug!("registering parser extension '{}'", handler.name());
        self.handlers.push(ContractChecked::new(handler));
    }

    element_hook!(definitions_element);
    element_hook!(message_element, message: &mut Message);
    element_hook!(port_type_element, port_type: &mut PortType);
    element_hook!(port_type_operation_element, operation: &mut Operation);
    element_hook!(operation_input_element, input: &mut MessageRef);
    element_hook!(operation_output_element, output: &mut MessageRef);
    element_hook!(operation_fault_element, fault: &mut Fault);
    element_hook!(binding_element, binding: &mut Binding);
    element_hook!(binding_operation_element, operation: &mut BoundOperation);
    element_hook!(binding_operation_input_element, operation: &mut BoundOperation);
    element_hook!(binding_operation_output_element, operation: &mut BoundOperation);
    element_hook!(binding_operation_fault_element, operation: &mut BoundOperation);
    element_hook!(service_element, service: &mut Service);
    element_hook!(port_element, port: &mut Port);

    pub fn port_type_operation_attributes(
        &mut self,
        operation: &mut Operation,
        cursor: &XmlCursor,
    ) -> Result<()> {
        for handler in &mut self.handlers {
            handler.inner.port_type_operation_attributes(operation, cursor)?;
        }
        Ok(())
    }

    pub fn operation_input_attributes(
        &mut self,
        input: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        for handler in &mut self.handlers {
            handler.inner.operation_input_attributes(input, cursor)?;
        }
        Ok(())
    }

    pub fn operation_output_attributes(
        &mut self,
        output: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        for handler in &mut self.handlers {
            handler.inner.operation_output_attributes(output, cursor)?;
        }
        Ok(())
    }

    pub fn finished(&mut self, builder: &mut WsdlModelBuilder) -> Result<()> {
        for handler in &mut self.handlers {
            handler.inner.finished(builder)?;
        }
        Ok(())
    }

    pub fn post_finished(&mut self, model: &WsdlModel) -> Result<()> {
        for handler in &mut self.handlers {
            handler.inner.post_finished(model)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Built-in: W3C WS-Addressing
// ----------------------------------------------------------------------

/// Versteht `wsaw:UsingAddressing` im Binding und im Port sowie
/// `wsam:Action` / `wsaw:Action` Attribute auf abstrakten
/// input/output-Elementen.
///
/// Die Port-Variante referenziert das Binding nur per QName; die Flags
/// werden deshalb erst in `finished` auf das Binding uebertragen, wenn
/// der Builder alle Definitionen kennt.
pub struct W3cAddressingExtension {
    port_usages: Vec<(QName, bool)>,
}

impl W3cAddressingExtension {
    pub fn new() -> Self {
        Self { port_usages: Vec::new() }
    }

    fn action_attribute(cursor: &XmlCursor) -> Option<String> {
        cursor
            .attribute_ns(names::NS_WSAM, names::AT_ACTION)
            .or_else(|| cursor.attribute_ns(names::NS_WSAW, names::AT_ACTION))
            .map(str::to_string)
    }
}

impl Default for W3cAddressingExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionHandler for W3cAddressingExtension {
    fn name(&self) -> &'static str {
        "w3c-addressing"
    }

    fn binding_element(&mut self, binding: &mut Binding, cursor: &mut XmlCursor) -> Result<bool> {
        if !cursor.is_start_of(names::NS_WSAW, names::EL_USING_ADDRESSING) {
            return Ok(false);
        }
        apply_using_addressing(binding, cursor);
        cursor.skip_subtree()?;
        Ok(true)
    }

    fn port_element(&mut self, port: &mut Port, cursor: &mut XmlCursor) -> Result<bool> {
        if !cursor.is_start_of(names::NS_WSAW, names::EL_USING_ADDRESSING) {
            return Ok(false);
        }
        self.port_usages.push((port.binding.clone(), required_flag(cursor)));
        cursor.skip_subtree()?;
        Ok(true)
    }

    fn finished(&mut self, builder: &mut WsdlModelBuilder) -> Result<()> {
        apply_port_usages(builder, std::mem::take(&mut self.port_usages));
        Ok(())
    }

    fn operation_input_attributes(
        &mut self,
        input: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        if let Some(action) = Self::action_attribute(cursor) {
            input.action = Some(action);
        }
        Ok(())
    }

    fn operation_output_attributes(
        &mut self,
        output: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        if let Some(action) = Self::action_attribute(cursor) {
            output.action = Some(action);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Built-in: Member-Submission WS-Addressing (2004/08)
// ----------------------------------------------------------------------

/// Die aeltere Member-Submission-Variante von WS-Addressing. Gleiche
/// Semantik wie die W3C-Variante, andere Namespaces.
pub struct MemberSubmissionAddressingExtension {
    port_usages: Vec<(QName, bool)>,
}

impl MemberSubmissionAddressingExtension {
    pub fn new() -> Self {
        Self { port_usages: Vec::new() }
    }

    fn at_using_addressing(cursor: &XmlCursor) -> bool {
        cursor.is_start_of(names::NS_MSA_WSDL, names::EL_USING_ADDRESSING)
            || cursor.is_start_of(names::NS_MSA, names::EL_USING_ADDRESSING)
    }
}

impl Default for MemberSubmissionAddressingExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionHandler for MemberSubmissionAddressingExtension {
    fn name(&self) -> &'static str {
        "member-submission-addressing"
    }

    fn binding_element(&mut self, binding: &mut Binding, cursor: &mut XmlCursor) -> Result<bool> {
        if !Self::at_using_addressing(cursor) {
            return Ok(false);
        }
        apply_using_addressing(binding, cursor);
        cursor.skip_subtree()?;
        Ok(true)
    }

    fn port_element(&mut self, port: &mut Port, cursor: &mut XmlCursor) -> Result<bool> {
        if !Self::at_using_addressing(cursor) {
            return Ok(false);
        }
        self.port_usages.push((port.binding.clone(), required_flag(cursor)));
        cursor.skip_subtree()?;
        Ok(true)
    }

    fn finished(&mut self, builder: &mut WsdlModelBuilder) -> Result<()> {
        apply_port_usages(builder, std::mem::take(&mut self.port_usages));
        Ok(())
    }

    fn operation_input_attributes(
        &mut self,
        input: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        if let Some(action) = cursor.attribute_ns(names::NS_MSA, names::AT_ACTION) {
            input.action = Some(action.to_string());
        }
        Ok(())
    }

    fn operation_output_attributes(
        &mut self,
        output: &mut MessageRef,
        cursor: &XmlCursor,
    ) -> Result<()> {
        if let Some(action) = cursor.attribute_ns(names::NS_MSA, names::AT_ACTION) {
            output.action = Some(action.to_string());
        }
        Ok(())
    }
}

/// Setzt die Addressing-Flags aus einem UsingAddressing-Element.
fn apply_using_addressing(binding: &mut Binding, cursor: &XmlCursor) {
    binding.addressing_enabled = true;
    if required_flag(cursor) {
        binding.addressing_required = true;
    }
}

/// `wsdl:required="true"` des aktuellen UsingAddressing-Elements.
fn required_flag(cursor: &XmlCursor) -> bool {
    let required = cursor
        .attribute_ns(names::NS_WSDL, names::AT_REQUIRED)
        .or_else(|| cursor.attribute(names::AT_REQUIRED));
    matches!(required, Some("true") | Some("1"))
}

/// Uebertraegt auf Ports gesehene UsingAddressing-Marker auf deren Bindings.
fn apply_port_usages(builder: &mut WsdlModelBuilder, usages: Vec<(QName, bool)>) {
    for (binding, required) in usages {
        match builder.binding_mut(&binding) {
            Some(b) => {
                b.addressing_enabled = true;
                if required {
                    b.addressing_required = true;
                }
            }
            None => log::warn!("UsingAddressing on a port whose binding {binding} is unknown"),
        }
    }
}

// ----------------------------------------------------------------------
// Built-in: WS-Policy Pass-through
// ----------------------------------------------------------------------

/// Sammelt `wsp:PolicyReference/@URI` an allen Hook-Punkten ein und
/// ueberspringt Inline-Policies. Policies werden nicht interpretiert, nur
/// durchgereicht; `finished` uebertraegt die URIs ins Modell.
pub struct PolicyExtension {
    references: Vec<String>,
}

impl PolicyExtension {
    pub fn new() -> Self {
        Self { references: Vec::new() }
    }

    /// Gemeinsame Behandlung fuer alle Scopes, in denen Policy-Markup
    /// auftauchen darf.
    fn consume_policy_markup(&mut self, cursor: &mut XmlCursor) -> Result<bool> {
        let name = cursor.name();
        if !is_policy_ns(&name.uri) {
            return Ok(false);
        }
        match &*name.local_name {
            names::EL_POLICY_REFERENCE => {
                if let Some(uri) = cursor.attribute(names::AT_URI) {
                    self.references.push(uri.to_string());
                } else {
                    log::warn!("wsp:PolicyReference without URI attribute, ignoring");
                }
                cursor.skip_subtree()?;
                Ok(true)
            }
            names::EL_POLICY | names::EL_USING_POLICY => {
                // Inline-Policies und UsingPolicy-Marker: bewusst nicht
                // interpretiert.
                cursor.skip_subtree()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Default for PolicyExtension {
    fn default() -> Self {
        Self::new()
    }
}

fn is_policy_ns(uri: &str) -> bool {
    uri == names::NS_WSP || uri == names::NS_WSP_2004
}

impl ExtensionHandler for PolicyExtension {
    fn name(&self) -> &'static str {
        "policy"
    }

    fn is_policy_extension(&self) -> bool {
        true
    }

    fn definitions_element(&mut self, cursor: &mut XmlCursor) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn message_element(&mut self, _message: &mut Message, cursor: &mut XmlCursor) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn port_type_element(
        &mut self,
        _port_type: &mut PortType,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn port_type_operation_element(
        &mut self,
        _operation: &mut Operation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn operation_input_element(
        &mut self,
        _input: &mut MessageRef,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn operation_output_element(
        &mut self,
        _output: &mut MessageRef,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn binding_element(&mut self, _binding: &mut Binding, cursor: &mut XmlCursor) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn binding_operation_element(
        &mut self,
        _operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn binding_operation_input_element(
        &mut self,
        _operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn binding_operation_output_element(
        &mut self,
        _operation: &mut BoundOperation,
        cursor: &mut XmlCursor,
    ) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn service_element(&mut self, _service: &mut Service, cursor: &mut XmlCursor) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn port_element(&mut self, _port: &mut Port, cursor: &mut XmlCursor) -> Result<bool> {
        self.consume_policy_markup(cursor)
    }

    fn finished(&mut self, builder: &mut WsdlModelBuilder) -> Result<()> {
        if !self.references.is_empty() {
            log::debug!("collected {} policy reference(s)", self.references.len());
        }
        builder.add_policy_references(std::mem::take(&mut self.references));
        Ok(())
    }
}
