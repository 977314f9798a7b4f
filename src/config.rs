//! Adapter configuration
//!
//! A TOML file with a `[connection]` table and any number of `[[entities]]`:
//!
//! ```toml
//! [connection]
//! host = "localhost"
//! database = "blog"
//!
//! [[entities]]
//! name = "posts"
//!
//! [[entities.attributes]]
//! name = "title"
//! type = "string"
//! nullable = false
//! index = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AdapterError, AdapterResult};
use crate::schema::{AttrType, Attribute, EntityOptions, IndexDef, IndexKind, NumberKind, Registry};

/// Main adapter configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub entities: Vec<EntityDecl>,
}

/// Database connection settings. Explicit fields override the URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Require TLS
    #[serde(default)]
    pub ssl: bool,
}

fn default_pool_size() -> u32 {
    ConnectionConfig::DEFAULT_POOL_SIZE
}

fn default_true() -> bool {
    true
}

impl ConnectionConfig {
    pub const DEFAULT_POOL_SIZE: u32 = 10;
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            pool_size: Self::DEFAULT_POOL_SIZE,
            ssl: false,
        }
    }
}

/// An `[[entities]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDecl {
    pub name: String,
    /// Physical table, possibly `schema.table`.
    pub table: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default)]
    pub indexes: Vec<IndexDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Number storage: `integer`, `float`/`double` or `numeric`.
    #[serde(default, alias = "dataType")]
    pub data_type: Option<NumberKind>,
    pub size: Option<u32>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDecl {
    pub name: String,
    /// Empty for a plain index, `unique` otherwise.
    #[serde(default)]
    pub kind: String,
    /// Access method, e.g. `btree` or `gin`.
    #[serde(rename = "type")]
    pub method: Option<String>,
    pub columns: IndexColumns,
}

/// Either `["a", "b"]` or `"a,b"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexColumns {
    List(Vec<String>),
    Joined(String),
}

impl IndexColumns {
    fn to_vec(&self) -> Vec<String> {
        match self {
            IndexColumns::List(columns) => columns.clone(),
            IndexColumns::Joined(columns) => columns.split(',').map(|c| c.trim().to_string()).collect(),
        }
    }
}

impl AttributeDecl {
    pub fn to_attribute(&self) -> Attribute {
        Attribute {
            name: self.name.clone(),
            ty: AttrType::from_name(&self.ty, self.data_type),
            size: self.size,
            nullable: self.nullable,
            auto_increment: self.auto_increment,
            unique: self.unique,
            index: self.index,
        }
    }
}

impl IndexDecl {
    pub fn to_index(&self) -> AdapterResult<IndexDef> {
        let kind = IndexKind::parse(&self.kind).ok_or_else(|| {
            AdapterError::Config(format!("index '{}': unknown kind '{}'", self.name, self.kind))
        })?;
        let mut index = IndexDef::new(self.name.clone(), self.columns.to_vec());
        index.kind = kind;
        index.method = self.method.clone();
        Ok(index)
    }
}

impl EntityDecl {
    /// Attributes and options ready for [`Registry::register_entity`].
    pub fn to_parts(&self) -> AdapterResult<(Vec<Attribute>, EntityOptions)> {
        let attributes = self
            .attributes
            .iter()
            .map(AttributeDecl::to_attribute)
            .collect::<Vec<_>>();
        let mut options = EntityOptions {
            table: self.table.clone(),
            ..EntityOptions::default()
        };
        for index in &self.indexes {
            options = options.index(index.to_index()?);
        }
        Ok((attributes, options))
    }
}

impl AdapterConfig {
    pub fn from_toml(source: &str) -> AdapterResult<Self> {
        toml::from_str(source).map_err(|e| AdapterError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&source)
    }

    /// `<config dir>/pgadapter/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pgadapter").join("config.toml"))
    }

    /// Use this URL instead of whatever the file says.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.connection = ConnectionConfig {
            url: Some(url.into()),
            pool_size: self.connection.pool_size,
            ssl: self.connection.ssl,
            ..ConnectionConfig::default()
        };
        self
    }

    /// Register every declared entity.
    pub fn register_entities(&self, registry: &mut Registry) -> AdapterResult<()> {
        for entity in &self.entities {
            let (attributes, options) = entity.to_parts()?;
            registry.register_entity(entity.name.clone(), attributes, options);
        }
        Ok(())
    }
}
