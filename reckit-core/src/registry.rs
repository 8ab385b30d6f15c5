//! Component registry — a tree of named factories behind a capability seam.
//!
//! Leaf nodes map component names to factories; branch nodes group leaves
//! into namespaces (algorithms by provider, providers by experiment kind).
//! The tree is built once at start-up, validated for duplicates as it is
//! built, and read-only afterwards, so concurrent runs may share it freely.

use crate::error::{AlgorithmError, RegistryError};
use crate::params::ParameterSet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Implementation hints passed to a factory at construction time.
///
/// The registry itself never interprets these; they let an algorithm size
/// its own internal parallelism and clamp its outputs to the dataset's
/// rating scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateContext {
    /// Maximum threads the constructed instance may use internally.
    /// Zero means "no limit requested".
    pub max_threads: usize,
    /// (min, max) of the rating scale the instance will be trained on.
    pub rating_scale: (f64, f64),
}

impl Default for CreateContext {
    fn default() -> Self {
        Self {
            max_threads: 0,
            rating_scale: (1.0, 5.0),
        }
    }
}

/// Factory for one registered component.
///
/// `T` is the capability type the registry hands out — the core never
/// needs to know what a constructed instance can do.
pub trait ComponentFactory<T>: Send + Sync {
    /// The unique component name within its leaf.
    fn name(&self) -> &str;

    /// A fresh parameter set describing this component's tunables.
    ///
    /// The default (empty) set means the component takes no parameters.
    fn default_params(&self) -> ParameterSet {
        ParameterSet::new()
    }

    /// Construct an instance from validated parameters.
    ///
    /// `params` has already been defaulted and validated against
    /// [`ComponentFactory::default_params`]; construction failures
    /// propagate to the caller untouched.
    fn create(
        &self,
        params: &BTreeMap<String, Value>,
        ctx: &CreateContext,
    ) -> Result<T, AlgorithmError>;
}

/// A node in the component registry tree.
pub enum RegistryNode<T> {
    /// Terminal node: component name -> factory, in registration order.
    Leaf(Vec<(String, Arc<dyn ComponentFactory<T>>)>),
    /// Intermediate node: namespace name -> child node, in mount order.
    Branch(Vec<(String, RegistryNode<T>)>),
}

impl<T> RegistryNode<T> {
    /// An empty leaf node.
    pub fn leaf() -> Self {
        Self::Leaf(Vec::new())
    }

    /// An empty branch node.
    pub fn branch() -> Self {
        Self::Branch(Vec::new())
    }

    /// Register a factory into this leaf.
    pub fn register(&mut self, factory: Arc<dyn ComponentFactory<T>>) -> Result<(), RegistryError> {
        let name = factory.name().to_string();
        match self {
            Self::Branch(_) => Err(RegistryError::LeafExpected { name }),
            Self::Leaf(components) => {
                if components.iter().any(|(n, _)| *n == name) {
                    return Err(RegistryError::DuplicateComponent { name });
                }
                debug!(component = %name, "registered component");
                components.push((name, factory));
                Ok(())
            }
        }
    }

    /// Mount a child node under this branch.
    pub fn mount(&mut self, name: &str, node: RegistryNode<T>) -> Result<(), RegistryError> {
        match self {
            Self::Leaf(_) => Err(RegistryError::BranchExpected {
                name: name.to_string(),
            }),
            Self::Branch(children) => {
                if children.iter().any(|(n, _)| n == name) {
                    return Err(RegistryError::DuplicateBranch {
                        name: name.to_string(),
                    });
                }
                debug!(branch = %name, "mounted registry branch");
                children.push((name.to_string(), node));
                Ok(())
            }
        }
    }

    /// Register a factory into the leaf at `path`, creating intermediate
    /// branches (and the final leaf) as needed.
    pub fn register_at(
        &mut self,
        path: &[&str],
        factory: Arc<dyn ComponentFactory<T>>,
    ) -> Result<(), RegistryError> {
        let Some((head, rest)) = path.split_first() else {
            return self.register(factory);
        };
        let children = match self {
            Self::Leaf(_) => {
                return Err(RegistryError::BranchExpected {
                    name: head.to_string(),
                });
            }
            Self::Branch(children) => children,
        };
        if !children.iter().any(|(n, _)| n == head) {
            let node = if rest.is_empty() {
                Self::leaf()
            } else {
                Self::branch()
            };
            children.push((head.to_string(), node));
        }
        let child = children
            .iter_mut()
            .find(|(n, _)| n == head)
            .map(|(_, node)| node);
        match child {
            Some(node) => node.register_at(rest, factory),
            // Unreachable: the entry was just inserted above.
            None => Err(RegistryError::BranchExpected {
                name: head.to_string(),
            }),
        }
    }

    /// Walk branch names down the tree.
    ///
    /// Returns `None` when any path segment is missing; the caller decides
    /// how to report an unknown namespace.
    pub fn resolve(&self, path: &[&str]) -> Option<&RegistryNode<T>> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => children
                .iter()
                .find(|(n, _)| n == head)
                .and_then(|(_, node)| node.resolve(rest)),
        }
    }

    /// Names available at this node, in registration order.
    pub fn list_names(&self) -> Vec<String> {
        match self {
            Self::Leaf(components) => components.iter().map(|(n, _)| n.clone()).collect(),
            Self::Branch(children) => children.iter().map(|(n, _)| n.clone()).collect(),
        }
    }

    /// Look up a factory by name in this leaf.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ComponentFactory<T>>> {
        match self {
            Self::Branch(_) => None,
            Self::Leaf(components) => components
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, factory)| factory),
        }
    }

    /// Construct a named component from this leaf.
    ///
    /// `None` means the name is unknown here — the caller reports it.
    /// Construction errors are nested and propagate; fault isolation
    /// happens one layer up, in the pipeline that asked.
    pub fn create(
        &self,
        name: &str,
        params: &BTreeMap<String, Value>,
        ctx: &CreateContext,
    ) -> Option<Result<T, AlgorithmError>> {
        let factory = self.get(name)?;
        debug!(component = %name, "constructing component");
        Some(factory.create(params, ctx))
    }

    /// Nested description of everything reachable from this node:
    /// leaves render as `[{name, params}]`, branches as objects keyed by
    /// namespace. This is the sole introspection surface consumed by
    /// presentation layers.
    pub fn available(&self) -> Value {
        match self {
            Self::Leaf(components) => Value::Array(
                components
                    .iter()
                    .map(|(name, factory)| {
                        serde_json::json!({
                            "name": name,
                            "params": factory.default_params(),
                        })
                    })
                    .collect(),
            ),
            Self::Branch(children) => {
                let mut map = serde_json::Map::new();
                for (name, node) in children {
                    map.insert(name.clone(), node.available());
                }
                Value::Object(map)
            }
        }
    }
}
