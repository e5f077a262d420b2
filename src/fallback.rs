//! Multi-tier WSDL resolution.
//!
//! Reihenfolge der Versuche:
//!
//! 1. Direktes Parsen der angegebenen Location.
//! 2. Registrierte [`MetadataResolver`] (MEX-artige Kataloge): der erste
//!    gelieferte Deskriptor wird geparst.
//! 3. Die `?wsdl`-Heuristik fuer http/https-URLs ohne Query-String.
//!
//! Nur retryable Fehler (I/O, XML-Syntax, Grammatik) schalten zur naechsten
//! Stufe weiter; Extension-Vertragsfehler und das Fehlen eines Service
//! brechen sofort ab. Scheitern alle Stufen, buendelt
//! [`Error::FallbackExhausted`] saemtliche Einzelursachen.
//!
//! Jeder Versuch laeuft in einer frischen [`ParseSession`]: ein Modell aus
//! Stufe 3 ist von einem direkt geparsten nicht unterscheidbar.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::extensions::{ExtensionHandler, ExtensionPipeline};
use crate::model::WsdlModel;
use crate::parser::{BindingIdFactory, ParseSession};
use crate::resolver::DocumentFetcher;

/// Eine einzelne WSDL-Quelle aus einem Metadata-Deskriptor.
pub struct WsdlSource {
    /// Dokumentinhalt.
    pub content: String,
    /// System-ID, gegen die relative Importe im Inhalt aufgeloest werden.
    pub system_id: String,
}

/// Ein von einem Metadata-Katalog gelieferter Deskriptor. Ein Deskriptor
/// kann mehrere WSDL-Dokumente umfassen (MEX liefert oft abstrakten und
/// konkreten Teil getrennt); alle werden in dieselbe Sitzung geparst.
pub struct ServiceDescriptor {
    pub sources: Vec<WsdlSource>,
}

/// Liefert alternative WSDL-Quellen zu einer Service-Location
/// (z.B. ein MEX-Client oder ein lokaler Metadaten-Cache).
pub trait MetadataResolver {
    fn resolve(&self, location: &str) -> Option<ServiceDescriptor>;
}

type HandlerFactory = Box<dyn Fn() -> Box<dyn ExtensionHandler>>;

/// Konfigurierter Einstiegspunkt des Parsers.
///
/// Custom-Extensions werden als Factories registriert, weil jeder
/// Aufloesungs-Versuch seine eigene, frische Pipeline braucht.
pub struct WsdlParser {
    fetcher: Arc<dyn DocumentFetcher>,
    metadata_resolvers: Vec<Box<dyn MetadataResolver>>,
    handler_factories: Vec<HandlerFactory>,
    binding_id_factories: Vec<Arc<dyn BindingIdFactory>>,
}

impl WsdlParser {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            metadata_resolvers: Vec::new(),
            handler_factories: Vec::new(),
            binding_id_factories: Vec::new(),
        }
    }

    /// Registriert einen Metadata-Katalog fuer die zweite Fallback-Stufe.
    pub fn with_metadata_resolver(mut self, resolver: Box<dyn MetadataResolver>) -> Self {
        self.metadata_resolvers.push(resolver);
        self
    }

    /// Registriert eine zusaetzliche Parser-Extension (zusaetzlich zu den
    /// immer vorhandenen Addressing- und Policy-Extensions; meldet die
    /// Extension sich als Policy-Extension, ersetzt sie die eingebaute).
    pub fn with_extension<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExtensionHandler> + 'static,
    {
        self.handler_factories.push(Box::new(factory));
        self
    }

    /// Registriert eine Binding-ID-Factory fuer nicht-standard Transporte.
    pub fn with_binding_id_factory(mut self, factory: Arc<dyn BindingIdFactory>) -> Self {
        self.binding_id_factories.push(factory);
        self
    }

    /// Loest `location` ueber alle Stufen auf und liefert das gefrorene Modell.
    pub fn parse_location(&self, location: &str) -> Result<WsdlModel> {
        let mut attempts: Vec<Error> = Vec::new();

        match self.try_location(location) {
            Ok(model) => return Ok(model),
            Err(e) if e.is_retryable() => {
                log::warn!("direct parse of {location} failed, engaging fallbacks: {e}");
                attempts.push(e);
            }
            Err(e) => return Err(e),
        }

        if let Some(descriptor) = self.first_descriptor(location) {
            match self.try_descriptor(&descriptor, location) {
                Ok(model) => return Ok(model),
                Err(e) if e.is_retryable() => {
                    log::warn!("metadata descriptor for {location} failed to parse: {e}");
                    attempts.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(candidate) = query_wsdl_candidate(location) {
            match self.try_location(&candidate) {
                Ok(model) => return Ok(model),
                Err(e) if e.is_retryable() => {
                    log::warn!("?wsdl heuristic on {candidate} failed: {e}");
                    attempts.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::FallbackExhausted { attempts })
    }

    /// Parst eine bereits vorliegende Quelle. Ohne Location-URL gibt es keine
    /// Fallback-Stufen: der erste Fehler ist endgueltig.
    pub fn parse_source(&self, xml: &str, system_id: &str) -> Result<WsdlModel> {
        self.try_source(xml, system_id)
    }

    fn try_location(&self, system_id: &str) -> Result<WsdlModel> {
        let mut session = self.new_session();
        session.parse_location(system_id)?;
        finish_checked(session, system_id)
    }

    fn try_source(&self, xml: &str, system_id: &str) -> Result<WsdlModel> {
        let mut session = self.new_session();
        session.parse_source(xml, system_id)?;
        finish_checked(session, system_id)
    }

    /// Alle Quellen eines Deskriptors wandern in dieselbe frische Sitzung.
    fn try_descriptor(&self, descriptor: &ServiceDescriptor, location: &str) -> Result<WsdlModel> {
        let mut session = self.new_session();
        for source in &descriptor.sources {
            session.parse_source(&source.content, &source.system_id)?;
        }
        finish_checked(session, location)
    }

    fn new_session(&self) -> ParseSession {
        let custom: Vec<Box<dyn ExtensionHandler>> =
            self.handler_factories.iter().map(|factory| factory()).collect();
        let mut session = ParseSession::new(self.fetcher.clone(), ExtensionPipeline::assemble(custom));
        for factory in &self.binding_id_factories {
            session.register_binding_id_factory(factory.clone());
        }
        session
    }

    /// Deskriptor des ersten Katalogs, der einen liefert (Registrierungs-
    /// Reihenfolge).
    fn first_descriptor(&self, location: &str) -> Option<ServiceDescriptor> {
        self.metadata_resolvers.iter().find_map(|r| r.resolve(location))
    }
}

/// Freeze plus Service-Pruefung. `NoServiceFound` entsteht erst NACH dem
/// Freeze und triggert keine weitere Fallback-Stufe.
fn finish_checked(session: ParseSession, system_id: &str) -> Result<WsdlModel> {
    let model = session.finish()?;
    if !model.has_services() {
        return Err(Error::NoServiceFound { system_id: system_id.to_string() });
    }
    Ok(model)
}

/// `?wsdl`-Kandidat: nur http/https und nur, wenn die URL noch keinen
/// Query-String traegt.
fn query_wsdl_candidate(location: &str) -> Option<String> {
    let is_http = location.starts_with("http://") || location.starts_with("https://");
    if !is_http || location.contains('?') {
        return None;
    }
    Some(format!("{location}?wsdl"))
}
