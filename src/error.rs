//! Central error types for the WSDL 1.1 parser.
//!
//! Variants reference the relevant WSDL 1.1 spec section where one exists.
//! Dokument-bezogene Fehler tragen einen [`Locator`] (System-ID + Byte-Offset),
//! damit Operatoren die fehlerhafte Stelle im Quelldokument finden.

use core::fmt;
use std::borrow::Cow;

/// Position eines Fehlers im Quelldokument.
///
/// quick-xml liefert Byte-Offsets, keine Zeilennummern — der Offset wird
/// unveraendert durchgereicht.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// System-ID (URL oder Dateipfad) des Dokuments.
    pub system_id: String,
    /// Byte-Offset im Dokument.
    pub position: u64,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.system_id, self.position)
    }
}

/// All error types raised by the WSDL parser.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The XML tokenizer rejected the document (not well-formed).
    MalformedXml {
        at: Locator,
        message: String,
    },
    /// An element appeared where the WSDL 1.1 grammar does not allow it
    /// (Spec 2.1 document structure).
    UnexpectedElement {
        at: Locator,
        /// QName des gefundenen Elements in Clark-Notation.
        element: String,
        /// Was an dieser Stelle erwartet wurde.
        expected: Cow<'static, str>,
    },
    /// A mandatory attribute is absent or empty (e.g. `definitions/@targetNamespace`,
    /// `binding/@name`, `part/@name`).
    MissingAttribute {
        at: Locator,
        element: String,
        attribute: &'static str,
    },
    /// A QName-valued attribute uses a prefix with no in-scope declaration.
    UnresolvablePrefix {
        at: Locator,
        prefix: String,
    },
    /// Ein Dokument konnte nicht beschafft oder gelesen werden.
    /// Triggert die spaeteren Fallback-Stufen, sofern eine Location-URL existiert.
    Io {
        system_id: String,
        message: String,
    },
    /// A pluggable extension violated the cursor contract: after the hook the
    /// cursor position did not match the hook's boolean promise. This is a bug
    /// in the extension, never a document error, and is never recovered.
    ExtensionContract {
        /// Name der Extension (fuer die Fehlersuche).
        extension: &'static str,
        /// Hook an dem der Verstoss auftrat.
        hook: &'static str,
        detail: String,
    },
    /// The document parsed successfully but declares no usable `wsdl:service`
    /// (Spec 2.7). Raised after freeze.
    NoServiceFound {
        system_id: String,
    },
    /// Direct parse and every fallback tier failed. Carries every underlying
    /// failure so operators can see which resolution path broke and why.
    FallbackExhausted {
        attempts: Vec<Error>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedXml { at, message } => {
                write!(f, "malformed XML at {at}: {message}")
            }
            Self::UnexpectedElement { at, element, expected } => {
                write!(
                    f,
                    "unexpected element {element} at {at}, expected {expected} (WSDL 1.1 Sec 2.1)"
                )
            }
            Self::MissingAttribute { at, element, attribute } => {
                write!(
                    f,
                    "element {element} at {at} is missing required attribute '{attribute}'"
                )
            }
            Self::UnresolvablePrefix { at, prefix } => {
                write!(f, "unresolvable namespace prefix '{prefix}' at {at}")
            }
            Self::Io { system_id, message } => {
                write!(f, "cannot read document '{system_id}': {message}")
            }
            Self::ExtensionContract { extension, hook, detail } => {
                write!(
                    f,
                    "parser extension '{extension}' violated the cursor contract in {hook}: {detail}"
                )
            }
            Self::NoServiceFound { system_id } => {
                write!(
                    f,
                    "document '{system_id}' contains no usable wsdl:service (WSDL 1.1 Sec 2.7)"
                )
            }
            Self::FallbackExhausted { attempts } => {
                write!(f, "all WSDL resolution attempts failed:")?;
                for (i, e) in attempts.iter().enumerate() {
                    write!(f, " [{}] {e}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `MalformedXml` Fehler mit Locator.
    pub fn malformed(at: Locator, message: impl Into<String>) -> Self {
        Self::MalformedXml { at, message: message.into() }
    }

    /// Erstellt einen `UnexpectedElement` Fehler mit Kontext.
    pub fn unexpected(
        at: Locator,
        element: impl Into<String>,
        expected: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnexpectedElement {
            at,
            element: element.into(),
            expected: expected.into(),
        }
    }

    /// Erstellt einen `Io` Fehler fuer ein Dokument.
    pub fn io(system_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Io {
            system_id: system_id.into(),
            message: message.to_string(),
        }
    }

    /// True for the I/O + XML-syntax failure class that engages the Fallback
    /// Resolver. Extension contract faults and the no-service rejection are
    /// final and never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MalformedXml { .. }
            | Self::UnexpectedElement { .. }
            | Self::MissingAttribute { .. }
            | Self::UnresolvablePrefix { .. }
            | Self::Io { .. } => true,
            Self::ExtensionContract { .. }
            | Self::NoServiceFound { .. }
            | Self::FallbackExhausted { .. } => false,
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Locator {
        Locator { system_id: "http://example.org/a.wsdl".into(), position: 412 }
    }

    #[test]
    fn locator_display() {
        assert_eq!(loc().to_string(), "http://example.org/a.wsdl@412");
    }

    #[test]
    fn unexpected_element_display() {
        let e = Error::unexpected(loc(), "{urn:x}foo", "wsdl:part");
        let msg = e.to_string();
        assert!(msg.contains("{urn:x}foo"), "{msg}");
        assert!(msg.contains("wsdl:part"), "{msg}");
        assert!(msg.contains("412"), "{msg}");
    }

    #[test]
    fn missing_attribute_display() {
        let e = Error::MissingAttribute {
            at: loc(),
            element: "wsdl:definitions".into(),
            attribute: "targetNamespace",
        };
        let msg = e.to_string();
        assert!(msg.contains("targetNamespace"), "{msg}");
        assert!(msg.contains("wsdl:definitions"), "{msg}");
    }

    #[test]
    fn extension_contract_display_names_the_extension() {
        let e = Error::ExtensionContract {
            extension: "w3c-addressing",
            hook: "port_element",
            detail: "cursor moved past the end element".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("w3c-addressing"), "{msg}");
        assert!(msg.contains("port_element"), "{msg}");
    }

    #[test]
    fn fallback_exhausted_lists_every_cause() {
        let e = Error::FallbackExhausted {
            attempts: vec![
                Error::io("http://h/svc", "404"),
                Error::io("http://h/svc?wsdl", "connection refused"),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("[1]"), "{msg}");
        assert!(msg.contains("[2]"), "{msg}");
        assert!(msg.contains("404"), "{msg}");
        assert!(msg.contains("connection refused"), "{msg}");
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::io("x", "boom").is_retryable());
        assert!(Error::malformed(loc(), "tag soup").is_retryable());
        assert!(!Error::NoServiceFound { system_id: "x".into() }.is_retryable());
        assert!(
            !Error::ExtensionContract {
                extension: "policy",
                hook: "binding_element",
                detail: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn error_implements_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::io("a", "b"));
        assert!(!e.to_string().is_empty());
    }
}
