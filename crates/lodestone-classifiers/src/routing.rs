//! Content-type routing table for the sidecar classifiers

use lodestone_core::{ContentSubtype, ContentType, Domain};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// A classifier that runs after the core stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sidecar {
    Hybrid(Domain),
    Location,
}

impl Sidecar {
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "location" {
            Some(Self::Location)
        } else {
            Domain::from_name(name).map(Self::Hybrid)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hybrid(domain) => domain.name(),
            Self::Location => "location",
        }
    }
}

impl fmt::Display for Sidecar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Route key for a content type and optional subtype (`article:event`)
pub fn route_key(content_type: ContentType, subtype: Option<ContentSubtype>) -> String {
    match subtype {
        Some(subtype) => format!("{}:{}", content_type.as_str(), subtype.as_str()),
        None => content_type.as_str().to_string(),
    }
}

/// Resolved routing table: route key to the sidecars that run
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: BTreeMap<String, Vec<Sidecar>>,
}

impl Router {
    /// Resolve sidecar names. Unknown names and names of disabled domains are
    /// warned about and dropped; location is always available.
    pub fn new(table: &BTreeMap<String, Vec<String>>, enabled: &[Domain]) -> Self {
        let mut routes = BTreeMap::new();

        for (key, names) in table {
            let mut sidecars = Vec::with_capacity(names.len());
            for name in names {
                match Sidecar::from_name(name) {
                    None => warn!(route = %key, sidecar = %name, "Unknown sidecar in routing table, ignoring"),
                    Some(Sidecar::Hybrid(domain)) if !enabled.contains(&domain) => {
                        warn!(route = %key, sidecar = %name, "Routing table names a disabled classifier")
                    }
                    Some(sidecar) => {
                        if !sidecars.contains(&sidecar) {
                            sidecars.push(sidecar);
                        }
                    }
                }
            }
            routes.insert(key.clone(), sidecars);
        }

        Self { routes }
    }

    /// Sidecars for a document: `type:subtype` first, then `type`, else none
    pub fn sidecars(&self, content_type: ContentType, subtype: Option<ContentSubtype>) -> &[Sidecar] {
        let specific = subtype.and_then(|_| self.routes.get(&route_key(content_type, subtype)));
        specific
            .or_else(|| self.routes.get(content_type.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
