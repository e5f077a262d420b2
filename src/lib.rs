//! widl — a streaming WSDL 1.1 reader.
//!
//! Liest WSDL-1.1-Dokumente (samt SOAP-1.1/1.2- und MIME-Bindings,
//! WS-Addressing und WS-Policy-Referenzen) in einem Vorwaertslauf ueber
//! `quick-xml` und baut daraus ein gefrorenes, frei teilbares
//! Interface-Modell. Importe werden transitiv verfolgt und dedupliziert;
//! schlaegt der direkte Zugriff fehl, greifen Metadata-Kataloge und die
//! `?wsdl`-Heuristik.
//!
//! ```no_run
//! use std::sync::Arc;
//! use widl::{FileFetcher, WsdlParser};
//!
//! # fn main() -> widl::Result<()> {
//! let parser = WsdlParser::new(Arc::new(FileFetcher));
//! let model = parser.parse_location("service.wsdl")?;
//! for service in model.services() {
//!     println!("{}", service.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod error;
pub mod extensions;
pub mod fallback;
pub mod model;
pub mod names;
pub mod parser;
pub mod qname;
pub mod resolver;

pub use cursor::{Token, XmlCursor};
pub use error::{Error, Locator, Result};
pub use extensions::{ContractChecked, ExtensionHandler, ExtensionPipeline};
pub use fallback::{MetadataResolver, ServiceDescriptor, WsdlParser, WsdlSource};
pub use model::{
    Binding, BoundFault, BoundOperation, Fault, Message, MessageRef, Operation, ParameterBinding,
    Part, PartDescriptor, Port, PortType, Service, SoapVersion, Style, WsdlModel,
    WsdlModelBuilder,
};
pub use parser::{BindingIdFactory, ParseSession};
pub use qname::QName;
pub use resolver::{DocumentFetcher, DocumentResolver, FileFetcher};

/// Schnelle Hash-Kollektionen (ahash) fuer heisse Lookups.
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
pub(crate) type FastHashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
/// IndexMap mit ahash-Hasher: Lookup per QName, Iteration in Dokumentreihenfolge.
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
