//! Domain stratification - verifiability tiers and effort weights

use ouro_core::Domain;

/// Verifiability tier. Fully verifiable domains get the bulk of the
/// effort weight; weakly verifiable ones get the remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stratum {
    Full,
    Partial,
    Weak,
}

impl Stratum {
    pub fn weight(&self) -> f64 {
        match self {
            Stratum::Full => 0.60,
            Stratum::Partial => 0.30,
            Stratum::Weak => 0.10,
        }
    }
}

/// Explicit dispatch table. Code and math have machine-checkable outcomes;
/// logic and planning are partially checkable; the rest is weak.
pub fn stratum_for(domain: Domain) -> Stratum {
    match domain {
        Domain::Code | Domain::Math => Stratum::Full,
        Domain::Logic | Domain::Planning => Stratum::Partial,
        Domain::Creative | Domain::General => Stratum::Weak,
    }
}

pub fn get_domain_weight(domain: Domain) -> f64 {
    stratum_for(domain).weight()
}

/// True only for fully verifiable domains.
pub fn should_prioritize(domain: Domain) -> bool {
    stratum_for(domain) == Stratum::Full
}
