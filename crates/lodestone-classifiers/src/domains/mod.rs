//! Local rule sets of the hybrid domain classifiers

pub mod crime;
pub mod keyword;

pub use crime::CrimeRules;
pub use keyword::{KeywordRules, TermSet};

use crate::classifier::DomainRules;
use lodestone_core::{Domain, Result};
use std::sync::Arc;

/// Body characters the rules (and model services) look at
pub const RULE_BODY_CHARS: usize = 500;

/// Build the rule set for a domain
pub fn rules_for(domain: Domain) -> Result<Arc<dyn DomainRules>> {
    match keyword::term_set(domain) {
        Some(set) => Ok(Arc::new(KeywordRules::new(domain, set)?)),
        None => Ok(Arc::new(CrimeRules::new()?)),
    }
}

/// Domains where a confident model may lift a peripheral rule verdict to core
pub fn allows_ml_upgrade(domain: Domain) -> bool {
    matches!(domain, Domain::Mining | Domain::Industry)
}
