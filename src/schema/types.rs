//! Declared entity schema: attributes, indexes and the entity itself.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::transpiler::encode::escape_identifier;

/// Storage flavour of a `Number` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    #[default]
    Integer,
    #[serde(alias = "double")]
    Float,
    Numeric,
}

/// Abstract attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Text,
    Number(NumberKind),
    Date,
    Boolean,
    Json,
    /// Stored serialized, like `Json`.
    Array,
}

impl AttrType {
    /// Parse a type name as written in entity definitions (`"string"`, `"number"`, ...).
    /// Unrecognized names fall back to `String`, stored as `varchar`.
    pub fn from_name(name: &str, kind: Option<NumberKind>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" | "varchar" => Self::String,
            "text" => Self::Text,
            "number" => Self::Number(kind.unwrap_or_default()),
            "integer" | "int" => Self::Number(NumberKind::Integer),
            "float" | "double" => Self::Number(NumberKind::Float),
            "numeric" | "decimal" => Self::Number(NumberKind::Numeric),
            "date" | "timestamp" => Self::Date,
            "boolean" | "bool" => Self::Boolean,
            "json" | "object" => Self::Json,
            "array" => Self::Array,
            _ => {
                warn!(type_name = name, "unknown attribute type, using varchar");
                Self::String
            }
        }
    }

    /// JSON and Array values are stored as their serialized JSON text.
    pub fn is_serialized(&self) -> bool {
        matches!(self, Self::Json | Self::Array)
    }
}

/// A declared attribute (column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub size: Option<u32>,
    pub nullable: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub index: bool,
}

impl Attribute {
    /// A nullable attribute with no size and no index.
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            size: None,
            nullable: true,
            auto_increment: false,
            unique: false,
            index: false,
        }
    }

    /// `varchar`, sized with [`Attribute::size`].
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::String)
    }

    /// Unbounded `text`.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Text)
    }

    /// A number stored as `integer`, `float` or `numeric`.
    pub fn number(name: impl Into<String>, kind: NumberKind) -> Self {
        Self::new(name, AttrType::Number(kind))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::number(name, NumberKind::Integer)
    }

    /// `timestamp with time zone`.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Date)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Boolean)
    }

    /// Structured data serialized into a `varchar` column.
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Json)
    }

    /// A list serialized into a `varchar` column.
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Array)
    }

    /// Length for strings, precision for numbers. Ignored for dates and booleans.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Declare the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Absent values are written as `DEFAULT`.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Derive a `<entity>_<attr>_key` unique constraint.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Derive a `<entity>_<attr>_idx` index.
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// `id` is always the serial primary key.
    pub fn is_primary_key(&self) -> bool {
        self.name == PRIMARY_KEY
    }
}

/// Name of the implicit primary key column.
pub const PRIMARY_KEY: &str = "id";

/// Plain or unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Plain,
    Unique,
}

impl IndexKind {
    /// `""` is plain, `"UNIQUE"` (any case) is unique.
    pub fn parse(kind: &str) -> Option<Self> {
        if kind.is_empty() || kind.eq_ignore_ascii_case("plain") {
            Some(Self::Plain)
        } else if kind.eq_ignore_ascii_case("unique") {
            Some(Self::Unique)
        } else {
            None
        }
    }
}

/// A declared index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub kind: IndexKind,
    /// Access method (`btree`, `gin`, ...); `None` means the default B-tree.
    pub method: Option<String>,
    pub columns: Vec<String>,
}

impl IndexDef {
    /// A plain B-tree index over `columns`, in key order.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: IndexKind::Plain,
            method: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.kind = IndexKind::Unique;
        self
    }

    /// Use a non-default access method such as `gin` or `hash`.
    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Whether the index is unique, whatever its access method.
    pub fn is_unique(&self) -> bool {
        self.kind == IndexKind::Unique
    }

    /// Unique B-tree indexes are realized as `UNIQUE` constraints.
    pub fn is_constraint(&self) -> bool {
        self.is_unique()
            && self
                .method
                .as_deref()
                .is_none_or(|m| m.eq_ignore_ascii_case("btree"))
    }
}

/// Options accepted alongside an entity's attributes at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityOptions {
    /// Physical table name; defaults to the entity name.
    pub table: Option<String>,
    /// Explicit (possibly multi-column) indexes.
    pub indexes: Vec<IndexDef>,
}

impl EntityOptions {
    /// Store the entity in `table`, which may be `schema.table`.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declare an explicit index. An index with the same name as a derived
    /// one takes precedence over it.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A registered entity: ordered attributes plus named indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub attributes: Vec<Attribute>,
    pub indexes: Vec<IndexDef>,
}

impl EntitySchema {
    /// The declared attribute called `name`, including `id`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The declared index called `name`.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Attributes other than the primary key.
    pub fn columns(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.is_primary_key())
    }

    /// The quoted, possibly schema-qualified table name.
    pub fn table_escaped(&self) -> String {
        escape_identifier(&self.table)
    }

    /// Schema and bare table name, splitting a dotted `schema.table`.
    pub fn table_parts(&self) -> (Option<&str>, &str) {
        match self.table.rsplit_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, &self.table),
        }
    }
}
