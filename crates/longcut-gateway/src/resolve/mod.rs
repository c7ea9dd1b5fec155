//! Shortcut -> longcut resolution over a node and its dependency graph.
//!
//! Order of evaluation is fixed:
//! 1. exact shortcut match on the node itself,
//! 2. first prefix match in the node's insertion order,
//! 3. the node's dependencies in declaration order, depth-first, skipping any
//!    node already on the current path and never descending past `max_depth`.
//!
//! The root sits at depth 1. Dependencies that are not registered are skipped.
//! Resolution is pure and never suspends; callers pass the registry snapshot
//! they want to resolve against.

use serde::Serialize;

use longcut_core::{RuleScope, RuleTable, TransformationRule};

use crate::registry::{RegistryNode, Snapshot};

/// Prefix applied to service-graph hits surfaced through an ecosystem.
pub const MACRO_EMBED_PREFIX: &str = "/macro/enterprise/governance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTransformation {
    pub rule: TransformationRule,
    /// Node whose table matched.
    pub owner: String,
    /// Rule template plus the unmatched path suffix.
    pub longcut: String,
    /// Nodes walked after the root, ending at `owner`. Empty for a local hit.
    pub via: Vec<String>,
    pub depth: usize,
    pub exact: bool,
}

impl ResolvedTransformation {
    /// Wrap a service-graph hit found from an ecosystem root.
    pub fn into_macro_embedded(mut self) -> Self {
        self.longcut = format!("{MACRO_EMBED_PREFIX}{}", self.longcut);
        self.rule.scope = RuleScope::Ecosystem;
        self.rule.requires_governance = true;
        self.rule.requires_blockchain_validation = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedTransformation),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn found(self) -> Option<ResolvedTransformation> {
        match self {
            Resolution::Found(t) => Some(t),
            Resolution::NotFound => None,
        }
    }
}

impl From<Option<ResolvedTransformation>> for Resolution {
    fn from(v: Option<ResolvedTransformation>) -> Self {
        v.map_or(Resolution::NotFound, Resolution::Found)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformationResolver {
    max_depth: usize,
}

impl Default for TransformationResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH)
    }
}

impl TransformationResolver {
    pub const DEFAULT_MAX_DEPTH: usize = 5;

    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Single-table match, no traversal.
    pub fn resolve_local(owner: &str, rules: &RuleTable, path: &str) -> Option<ResolvedTransformation> {
        let rule = rules.lookup(path)?;
        let longcut = rule.expand(path)?;
        Some(ResolvedTransformation {
            exact: rule.shortcut == path,
            rule: rule.clone(),
            owner: owner.to_string(),
            longcut,
            via: Vec::new(),
            depth: 1,
        })
    }

    /// Resolve `path` starting at `root`, falling back into `graph` along the
    /// root's edges. `root` need not live in `graph`.
    pub fn resolve<R, N>(&self, root: &R, graph: &Snapshot<N>, path: &str) -> Resolution
    where
        R: RegistryNode + ?Sized,
        N: RegistryNode,
    {
        let mut chain = vec![root.name().to_string()];
        self.walk(root.name(), root.rules(), root.edges(), graph, path, 1, &mut chain)
            .into()
    }

    #[allow(clippy::too_many_arguments)]
    fn walk<N: RegistryNode>(
        &self,
        name: &str,
        rules: &RuleTable,
        edges: &[String],
        graph: &Snapshot<N>,
        path: &str,
        depth: usize,
        chain: &mut Vec<String>,
    ) -> Option<ResolvedTransformation> {
        if let Some(mut hit) = Self::resolve_local(name, rules, path) {
            hit.depth = depth;
            hit.via = chain.iter().skip(1).cloned().collect();
            return Some(hit);
        }

        if depth >= self.max_depth {
            return None;
        }

        for dep in edges {
            if chain.iter().any(|seen| seen == dep) {
                continue;
            }
            let Some(node) = graph.get(dep) else { continue };

            chain.push(dep.clone());
            let found = self.walk(
                node.name(),
                node.rules(),
                node.edges(),
                graph,
                path,
                depth + 1,
                chain,
            );
            chain.pop();

            if found.is_some() {
                return found;
            }
        }

        None
    }
}
