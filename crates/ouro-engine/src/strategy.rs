//! Evolving strategy store - crystallized heuristics with a size budget

use ouro_core::Domain;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Heuristic {
    pub domain: Domain,
    pub content: String,
}

/// Keeps crystallized heuristics in arrival order. When the budget is
/// exceeded the oldest entries are pruned first.
pub struct StrategyStore {
    heuristics: Vec<Heuristic>,
    budget: usize,
}

impl StrategyStore {
    pub fn new(budget: usize) -> Self {
        Self {
            heuristics: Vec::new(),
            budget: budget.max(1),
        }
    }

    /// Merge a heuristic: identical content for the same domain is
    /// deduplicated, new content appends, overflow prunes from the front.
    pub fn merge(&mut self, domain: Domain, content: &str) {
        let exists = self
            .heuristics
            .iter()
            .any(|h| h.domain == domain && h.content == content);
        if exists {
            return;
        }

        self.heuristics.push(Heuristic {
            domain,
            content: content.to_string(),
        });

        while self.heuristics.len() > self.budget {
            let dropped = self.heuristics.remove(0);
            debug!(domain = %dropped.domain, "pruned oldest heuristic over budget");
        }
    }

    pub fn for_domain(&self, domain: Domain) -> Vec<&Heuristic> {
        self.heuristics.iter().filter(|h| h.domain == domain).collect()
    }

    pub fn len(&self) -> usize {
        self.heuristics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heuristics.is_empty()
    }
}
