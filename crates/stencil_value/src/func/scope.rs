//! Layered function registries.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{check_entry, FuncError, FuncValue};

type FuncLayer = FxHashMap<String, FuncValue>;

/// Named functions to register, kept in insertion order.
#[derive(Clone, Default)]
pub struct FuncMap {
    entries: Vec<(String, FuncValue)>,
}

impl FuncMap {
    pub fn new() -> Self {
        FuncMap::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, f: impl Into<FuncValue>) -> Self {
        self.insert(name, f);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, f: impl Into<FuncValue>) {
        self.entries.push((name.into(), f.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FuncValue)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }
}

impl<S: Into<String>, F: Into<FuncValue>> FromIterator<(S, F)> for FuncMap {
    fn from_iter<I: IntoIterator<Item = (S, F)>>(iter: I) -> Self {
        FuncMap {
            entries: iter
                .into_iter()
                .map(|(n, f)| (n.into(), f.into()))
                .collect(),
        }
    }
}

/// Ordered chain of function layers.
///
/// Lookup walks the layers front to back, so layer 0 shadows the rest.
/// Layers are shared between scopes; writing to a shared layer 0 copies it
/// first, so other holders never observe the change.
#[derive(Clone, Default)]
pub struct FuncScope {
    layers: Vec<Arc<FuncLayer>>,
}

impl FuncScope {
    pub fn new() -> Self {
        FuncScope::default()
    }

    /// A scope with a fresh empty layer 0 followed by the non-empty layers
    /// of `scopes`, in order.
    pub fn merged<'a, I>(scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a FuncScope>,
    {
        let mut layers = vec![Arc::new(FuncLayer::default())];
        for scope in scopes {
            layers.extend(scope.layers.iter().filter(|l| !l.is_empty()).cloned());
        }
        FuncScope { layers }
    }

    pub fn get(&self, name: &str) -> Option<&FuncValue> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register one function in layer 0.
    pub fn set(&mut self, name: impl Into<String>, f: impl Into<FuncValue>) -> Result<(), FuncError> {
        let name = name.into();
        let f = f.into();
        check_entry(&name, &f)?;
        self.front().insert(name, f);
        Ok(())
    }

    /// Register every entry of `map` in layer 0. Stops at the first
    /// invalid entry; earlier entries stay registered.
    pub fn extend(&mut self, map: &FuncMap) -> Result<(), FuncError> {
        tracing::trace!(count = map.entries.len(), "registering functions");
        for (name, f) in map.iter() {
            self.set(name, f.clone())?;
        }
        Ok(())
    }

    /// Append the layers of `other` after this scope's own.
    pub fn append(&mut self, other: &FuncScope) {
        self.layers
            .extend(other.layers.iter().filter(|l| !l.is_empty()).cloned());
    }

    /// A single-layer scope holding `names` as resolved through this scope.
    ///
    /// With no names, the whole chain is flattened, nearer layers winning.
    pub fn filter<S: AsRef<str>>(&self, names: &[S]) -> Result<FuncScope, FuncError> {
        let mut layer = FuncLayer::default();
        if names.is_empty() {
            for l in self.layers.iter().rev() {
                layer.extend(l.iter().map(|(n, f)| (n.clone(), f.clone())));
            }
        } else {
            for name in names {
                let name = name.as_ref();
                let f = self
                    .get(name)
                    .ok_or_else(|| FuncError::Undefined(name.to_string()))?;
                layer.insert(name.to_string(), f.clone());
            }
        }
        Ok(FuncScope {
            layers: vec![Arc::new(layer)],
        })
    }

    /// Every visible name, sorted.
    pub fn names(&self) -> BTreeSet<&str> {
        self.layers
            .iter()
            .flat_map(|l| l.keys().map(String::as_str))
            .collect()
    }

    /// Whether no layer holds a function.
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|l| l.is_empty())
    }

    fn front(&mut self) -> &mut FuncLayer {
        if self.layers.is_empty() {
            self.layers.push(Arc::new(FuncLayer::default()));
        }
        let first = &mut self.layers[0];
        Arc::make_mut(first)
    }
}

impl fmt::Debug for FuncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncScope")
            .field("layers", &self.layers.len())
            .field("names", &self.names())
            .finish()
    }
}

impl TryFrom<FuncMap> for FuncScope {
    type Error = FuncError;

    fn try_from(map: FuncMap) -> Result<Self, FuncError> {
        let mut scope = FuncScope::new();
        scope.extend(&map)?;
        Ok(scope)
    }
}
