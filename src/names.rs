//! Namespace URIs and element/attribute names of the consumed vocabulary.
//!
//! Die Strings muessen bit-exakt den Spezifikationen entsprechen
//! (WSDL 1.1, SOAP 1.1/1.2 Binding, MIME Binding, WS-Addressing, WS-Policy).

/// WSDL 1.1 namespace (Spec 2.1).
pub const NS_WSDL: &str = "http://schemas.xmlsoap.org/wsdl/";
/// SOAP 1.1 binding extension namespace (Spec 3).
pub const NS_SOAP11: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
/// SOAP 1.2 binding extension namespace.
pub const NS_SOAP12: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
/// MIME binding extension namespace (Spec 5).
pub const NS_MIME: &str = "http://schemas.xmlsoap.org/wsdl/mime/";
/// XML Schema namespace.
pub const NS_XSD: &str = "http://www.w3.org/2001/XMLSchema";

/// W3C WS-Addressing core namespace (EndpointReference).
pub const NS_WSA: &str = "http://www.w3.org/2005/08/addressing";
/// W3C WS-Addressing WSDL binding namespace (wsaw:UsingAddressing, wsaw:Action).
pub const NS_WSAW: &str = "http://www.w3.org/2006/05/addressing/wsdl";
/// W3C WS-Addressing metadata namespace (wsam:Action).
pub const NS_WSAM: &str = "http://www.w3.org/2007/05/addressing/metadata";
/// Member-Submission WS-Addressing namespace (2004/08 variant).
pub const NS_MSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
/// Member-Submission WS-Addressing policy namespace.
pub const NS_MSA_WSDL: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/policy";

/// W3C WS-Policy namespace.
pub const NS_WSP: &str = "http://www.w3.org/ns/ws-policy";
/// Legacy WS-Policy namespace (2004/09 member submission).
pub const NS_WSP_2004: &str = "http://schemas.xmlsoap.org/ws/2004/09/policy";

/// Standard SOAP-over-HTTP transport URI (Spec 3.3).
pub const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

/// Binding-ID der Standard SOAP 1.1/HTTP Bindung (JAX-RPC/JAX-WS Konvention).
pub const BINDING_ID_SOAP11_HTTP: &str = "http://schemas.xmlsoap.org/wsdl/soap/http";
/// Binding-ID der Standard SOAP 1.2/HTTP Bindung.
pub const BINDING_ID_SOAP12_HTTP: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/";

// WSDL 1.1 Strukturelemente (Spec 2.1-2.7).
pub const EL_DEFINITIONS: &str = "definitions";
pub const EL_IMPORT: &str = "import";
pub const EL_TYPES: &str = "types";
pub const EL_DOCUMENTATION: &str = "documentation";
pub const EL_MESSAGE: &str = "message";
pub const EL_PART: &str = "part";
pub const EL_PORT_TYPE: &str = "portType";
pub const EL_OPERATION: &str = "operation";
pub const EL_INPUT: &str = "input";
pub const EL_OUTPUT: &str = "output";
pub const EL_FAULT: &str = "fault";
pub const EL_BINDING: &str = "binding";
pub const EL_SERVICE: &str = "service";
pub const EL_PORT: &str = "port";

// SOAP Binding-Elemente (Spec 3.3-3.8). Gleiche local names in SOAP 1.1 und 1.2.
pub const EL_SOAP_BINDING: &str = "binding";
pub const EL_SOAP_OPERATION: &str = "operation";
pub const EL_SOAP_BODY: &str = "body";
pub const EL_SOAP_HEADER: &str = "header";
pub const EL_SOAP_FAULT: &str = "fault";
pub const EL_SOAP_ADDRESS: &str = "address";

// MIME Binding-Elemente (Spec 5).
pub const EL_MIME_MULTIPART: &str = "multipartRelated";
pub const EL_MIME_PART: &str = "part";
pub const EL_MIME_CONTENT: &str = "content";

// WS-Addressing.
pub const EL_EPR: &str = "EndpointReference";
pub const EL_USING_ADDRESSING: &str = "UsingAddressing";
pub const AT_ACTION: &str = "Action";

// WS-Policy.
pub const EL_POLICY: &str = "Policy";
pub const EL_POLICY_REFERENCE: &str = "PolicyReference";
pub const EL_USING_POLICY: &str = "UsingPolicy";

// Haeufige Attribute.
pub const AT_NAME: &str = "name";
pub const AT_TARGET_NAMESPACE: &str = "targetNamespace";
pub const AT_LOCATION: &str = "location";
pub const AT_NAMESPACE: &str = "namespace";
pub const AT_ELEMENT: &str = "element";
pub const AT_TYPE: &str = "type";
pub const AT_MESSAGE: &str = "message";
pub const AT_PARAMETER_ORDER: &str = "parameterOrder";
pub const AT_BINDING: &str = "binding";
pub const AT_TRANSPORT: &str = "transport";
pub const AT_STYLE: &str = "style";
pub const AT_SOAP_ACTION: &str = "soapAction";
pub const AT_PARTS: &str = "parts";
pub const AT_PART: &str = "part";
pub const AT_REQUIRED: &str = "required";
pub const AT_URI: &str = "URI";

/// Sentinel part name for an explicitly empty `soap:body/@parts=""` list.
/// Ein einzelnes Leerzeichen, damit es nie mit einem echten Part-Namen
/// kollidiert (NCNames enthalten kein Leerzeichen).
pub const EMPTY_PARTS_SENTINEL: &str = " ";
