//! Entity registry.
//!
//! Holds every declared entity for the lifetime of the adapter and is passed
//! explicitly to the compiler, differ and applier.

use std::collections::BTreeMap;

use super::types::{
    AttrType, Attribute, EntityOptions, EntitySchema, IndexDef, NumberKind, PRIMARY_KEY,
};
use crate::error::{AdapterError, AdapterResult};

#[derive(Debug, Clone, Default)]
/// Declared entities by name.
pub struct Registry {
    entities: BTreeMap<String, EntitySchema>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare or replace an entity.
    ///
    /// The primary key `id` is always present, first, non-null and
    /// auto-incrementing. Single-column `index`/`unique` attribute flags are
    /// folded into the index list as `<entity>_<attr>_idx` / `<entity>_<attr>_key`
    /// unless an index of that name was declared explicitly.
    pub fn register_entity(
        &mut self,
        name: impl Into<String>,
        attributes: Vec<Attribute>,
        options: EntityOptions,
    ) -> &EntitySchema {
        let name = name.into();

        let mut attrs: Vec<Attribute> = Vec::with_capacity(attributes.len() + 1);
        attrs.push(
            Attribute::new(PRIMARY_KEY, AttrType::Number(NumberKind::Integer))
                .not_null()
                .auto_increment(),
        );
        for attr in attributes {
            if attr.is_primary_key() {
                continue;
            }
            match attrs.iter_mut().find(|a| a.name == attr.name) {
                Some(existing) => *existing = attr,
                None => attrs.push(attr),
            }
        }

        let mut indexes: Vec<IndexDef> = Vec::new();
        for index in options.indexes {
            if !indexes.iter().any(|i| i.name == index.name) {
                indexes.push(index);
            }
        }
        for attr in attrs.iter().filter(|a| !a.is_primary_key()) {
            if !(attr.index || attr.unique) {
                continue;
            }
            let index = if attr.unique {
                IndexDef::new(format!("{}_{}_key", name, attr.name), [attr.name.as_str()]).unique()
            } else {
                IndexDef::new(format!("{}_{}_idx", name, attr.name), [attr.name.as_str()])
            };
            if !indexes.iter().any(|i| i.name == index.name) {
                indexes.push(index);
            }
        }

        let schema = EntitySchema {
            table: options.table.unwrap_or_else(|| name.clone()),
            name: name.clone(),
            attributes: attrs,
            indexes,
        };
        tracing::debug!(
            entity = %schema.name,
            attributes = schema.attributes.len(),
            indexes = schema.indexes.len(),
            "registered entity"
        );
        self.entities.insert(name.clone(), schema);
        &self.entities[&name]
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Look up an entity, failing with [`AdapterError::UnknownEntity`].
    pub fn entity(&self, name: &str) -> AdapterResult<&EntitySchema> {
        self.get(name)
            .ok_or_else(|| AdapterError::UnknownEntity(name.to_string()))
    }

    /// All entities, ordered by name.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
