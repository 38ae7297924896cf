//! Read-only lookup cache for the host app's type taxonomy.
//!
//! Built once from the schema payload the host app serves, then shared
//! freely: nothing mutates after [`TypeSchema::init`]. The wire format
//! uses positional arrays; they are converted to named records here and
//! never escape this module.
//!
//! Every record is indexed under both its numeric ID and its name in
//! the same map, so lookups accept either key form transparently.

use crate::error::schema::SchemaError;

use common::ErrorLocation;

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

const ITEM_TYPES_KEY: &str = "itemTypes";
const CREATOR_TYPES_KEY: &str = "creatorTypes";
const FIELDS_KEY: &str = "fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    ItemTypes,
    CreatorTypes,
    Fields,
}

impl Display for TypeCategory {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let label = match self {
            TypeCategory::ItemTypes => "item type",
            TypeCategory::CreatorTypes => "creator type",
            TypeCategory::Fields => "field",
        };
        write!(formatter, "{label}")
    }
}

/// Key accepted by schema lookups: numeric ID or string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Id(u32),
    Name(String),
}

impl From<u32> for TypeKey {
    fn from(id: u32) -> Self {
        TypeKey::Id(id)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::Name(name.to_string())
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        TypeKey::Name(name)
    }
}

impl Display for TypeKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            TypeKey::Id(id) => write!(formatter, "{id}"),
            TypeKey::Name(name) => write!(formatter, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemTypeRecord {
    pub id: u32,
    pub name: String,
    pub localized: String,
    /// Creator types this item type accepts; empty when the type allows
    /// no creators at all.
    pub creator_type_ids: Vec<u32>,
    pub field_ids: Vec<u32>,
    /// Field ID -> base field ID for fields that map onto a base field.
    pub base_field_map: BTreeMap<u32, u32>,
    /// Icon reference; resolution to an asset path is the embedder's job.
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatorTypeRecord {
    pub id: u32,
    pub name: String,
    pub localized: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub id: u32,
    pub name: String,
    pub localized: Option<String>,
    pub base_field: bool,
}

/// Record returned by the category-generic [`TypeSchema::lookup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaRecord<'a> {
    ItemType(&'a ItemTypeRecord),
    CreatorType(&'a CreatorTypeRecord),
    Field(&'a FieldRecord),
}

impl SchemaRecord<'_> {
    pub fn id(&self) -> u32 {
        match self {
            SchemaRecord::ItemType(record) => record.id,
            SchemaRecord::CreatorType(record) => record.id,
            SchemaRecord::Field(record) => record.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SchemaRecord::ItemType(record) => &record.name,
            SchemaRecord::CreatorType(record) => &record.name,
            SchemaRecord::Field(record) => &record.name,
        }
    }

    pub fn localized(&self) -> Option<&str> {
        match self {
            SchemaRecord::ItemType(record) => Some(&record.localized),
            SchemaRecord::CreatorType(record) => Some(&record.localized),
            SchemaRecord::Field(record) => record.localized.as_deref(),
        }
    }
}

/// Creator type summary as exposed to save dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorTypeSummary {
    pub id: u32,
    pub name: String,
}

/// The taxonomy cache. Immutable after construction; concurrent lookups
/// are safe because nothing mutates post-init.
#[derive(Debug, Default)]
pub struct TypeSchema {
    item_types: HashMap<TypeKey, Arc<ItemTypeRecord>>,
    creator_types: HashMap<TypeKey, Arc<CreatorTypeRecord>>,
    fields: HashMap<TypeKey, Arc<FieldRecord>>,
}

impl TypeSchema {
    /// Build the cache from the host app's schema payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidPayload`] if the payload shape is
    /// wrong or a name collides with another key in the same category.
    pub fn init(payload: &Value) -> Result<Self, SchemaError> {
        let mut schema = TypeSchema::default();

        for (id, entry) in category_entries(payload, ITEM_TYPES_KEY)? {
            let record = Arc::new(parse_item_type(id, entry)?);
            insert_dual(&mut schema.item_types, record.id, record.name.clone(), record)?;
        }

        for (id, entry) in category_entries(payload, CREATOR_TYPES_KEY)? {
            let record = Arc::new(parse_creator_type(id, entry)?);
            insert_dual(
                &mut schema.creator_types,
                record.id,
                record.name.clone(),
                record,
            )?;
        }

        for (id, entry) in category_entries(payload, FIELDS_KEY)? {
            let record = Arc::new(parse_field(id, entry)?);
            insert_dual(&mut schema.fields, record.id, record.name.clone(), record)?;
        }

        Ok(schema)
    }

    /// Category-generic lookup by ID or name.
    pub fn lookup(
        &self,
        category: TypeCategory,
        key: impl Into<TypeKey>,
    ) -> Option<SchemaRecord<'_>> {
        let key = key.into();
        match category {
            TypeCategory::ItemTypes => self
                .item_types
                .get(&key)
                .map(|record| SchemaRecord::ItemType(record)),
            TypeCategory::CreatorTypes => self
                .creator_types
                .get(&key)
                .map(|record| SchemaRecord::CreatorType(record)),
            TypeCategory::Fields => self
                .fields
                .get(&key)
                .map(|record| SchemaRecord::Field(record)),
        }
    }

    pub fn item_type(&self, key: impl Into<TypeKey>) -> Option<&ItemTypeRecord> {
        self.item_types.get(&key.into()).map(Arc::as_ref)
    }

    pub fn creator_type(&self, key: impl Into<TypeKey>) -> Option<&CreatorTypeRecord> {
        self.creator_types.get(&key.into()).map(Arc::as_ref)
    }

    pub fn field(&self, key: impl Into<TypeKey>) -> Option<&FieldRecord> {
        self.fields.get(&key.into()).map(Arc::as_ref)
    }

    pub fn id(&self, category: TypeCategory, key: impl Into<TypeKey>) -> Option<u32> {
        self.lookup(category, key).map(|record| record.id())
    }

    pub fn name(&self, category: TypeCategory, key: impl Into<TypeKey>) -> Option<&str> {
        self.lookup(category, key).map(|record| match record {
            SchemaRecord::ItemType(record) => record.name.as_str(),
            SchemaRecord::CreatorType(record) => record.name.as_str(),
            SchemaRecord::Field(record) => record.name.as_str(),
        })
    }

    pub fn localized_string(
        &self,
        category: TypeCategory,
        key: impl Into<TypeKey>,
    ) -> Option<&str> {
        match self.lookup(category, key)? {
            SchemaRecord::ItemType(record) => Some(record.localized.as_str()),
            SchemaRecord::CreatorType(record) => Some(record.localized.as_str()),
            SchemaRecord::Field(record) => record.localized.as_deref(),
        }
    }

    /// Creator types valid for an item type, in schema order. `None` for
    /// an unknown item type; empty for a type that allows no creators.
    pub fn creator_types_for_item_type(
        &self,
        key: impl Into<TypeKey>,
    ) -> Option<Vec<CreatorTypeSummary>> {
        let item_type = self.item_type(key)?;
        Some(
            item_type
                .creator_type_ids
                .iter()
                .filter_map(|id| self.creator_type(*id))
                .map(|record| CreatorTypeSummary {
                    id: record.id,
                    name: record.name.clone(),
                })
                .collect(),
        )
    }

    /// Primary (first-listed) creator type for an item type.
    pub fn primary_creator_type(&self, key: impl Into<TypeKey>) -> Option<u32> {
        self.item_type(key)?.creator_type_ids.first().copied()
    }

    /// Whether `creator` is a valid creator type for `item_type`.
    /// Answers `false` for unknown keys rather than failing.
    pub fn creator_is_valid_for_item_type(
        &self,
        creator: impl Into<TypeKey>,
        item_type: impl Into<TypeKey>,
    ) -> bool {
        let (Some(creator), Some(item_type)) =
            (self.creator_type(creator), self.item_type(item_type))
        else {
            return false;
        };
        item_type.creator_type_ids.contains(&creator.id)
    }

    /// Whether `field` applies to `item_type`. Answers `false` for
    /// unknown keys rather than failing.
    pub fn field_is_valid_for_type(
        &self,
        field: impl Into<TypeKey>,
        item_type: impl Into<TypeKey>,
    ) -> bool {
        let (Some(field), Some(item_type)) = (self.field(field), self.item_type(item_type)) else {
            return false;
        };
        item_type.field_ids.contains(&field.id)
    }

    pub fn is_base_field(&self, key: impl Into<TypeKey>) -> Option<bool> {
        self.field(key).map(|record| record.base_field)
    }

    /// Type-specific field that maps onto `base_field` for `item_type`,
    /// if any.
    pub fn field_id_from_type_and_base(
        &self,
        item_type: impl Into<TypeKey>,
        base_field: impl Into<TypeKey>,
    ) -> Option<u32> {
        let item_type = self.item_type(item_type)?;
        let base_field = self.field(base_field)?;
        item_type
            .base_field_map
            .iter()
            .find(|(_, base_id)| **base_id == base_field.id)
            .map(|(field_id, _)| *field_id)
    }

    /// Base field that `field` maps onto for `item_type`; `Ok(None)` when
    /// the field has no base mapping for that type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] if either key is unresolvable —
    /// unlike the validity queries, this cannot answer `false` honestly.
    pub fn base_id_from_type_and_field(
        &self,
        item_type: impl Into<TypeKey>,
        field: impl Into<TypeKey>,
    ) -> Result<Option<u32>, SchemaError> {
        let item_type_key = item_type.into();
        let item_type =
            self.item_type(item_type_key.clone())
                .ok_or_else(|| SchemaError::UnknownType {
                    category: TypeCategory::ItemTypes,
                    key: item_type_key.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        let field_key = field.into();
        let field = self
            .field(field_key.clone())
            .ok_or_else(|| SchemaError::UnknownType {
                category: TypeCategory::Fields,
                key: field_key.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(item_type.base_field_map.get(&field.id).copied())
    }

    /// All fields valid for an item type, in schema order.
    pub fn item_type_fields(&self, key: impl Into<TypeKey>) -> Option<Vec<u32>> {
        self.item_type(key).map(|record| record.field_ids.clone())
    }
}

fn category_entries<'a>(
    payload: &'a Value,
    category: &str,
) -> Result<Vec<(u32, &'a Vec<Value>)>, SchemaError> {
    let map = payload
        .get(category)
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("missing or non-object '{category}' category")))?;

    let mut entries = Vec::with_capacity(map.len());
    for (id, entry) in map {
        let id = id
            .parse::<u32>()
            .map_err(|_| invalid(format!("non-numeric {category} ID '{id}'")))?;
        let entry = entry
            .as_array()
            .ok_or_else(|| invalid(format!("{category} entry {id} is not an array")))?;
        entries.push((id, entry));
    }
    Ok(entries)
}

fn insert_dual<R>(
    map: &mut HashMap<TypeKey, Arc<R>>,
    id: u32,
    name: String,
    record: Arc<R>,
) -> Result<(), SchemaError> {
    if map
        .insert(TypeKey::Id(id), Arc::clone(&record))
        .is_some()
    {
        return Err(invalid(format!("duplicate ID {id}")));
    }
    let collision = format!("name '{name}' collides with another key");
    if map.insert(TypeKey::Name(name), record).is_some() {
        return Err(invalid(collision));
    }
    Ok(())
}

fn parse_item_type(id: u32, entry: &[Value]) -> Result<ItemTypeRecord, SchemaError> {
    let name = entry_str(entry, 0, id, "item type name")?;
    let localized = entry_str(entry, 1, id, "item type label")?;
    let creator_type_ids = parse_creator_type_ids(entry.get(2), id)?;
    let field_ids = parse_id_list(entry.get(3), id, "item type field list")?;
    let base_field_map = parse_base_field_map(entry.get(4), id)?;
    let icon = entry
        .get(5)
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ItemTypeRecord {
        id,
        name,
        localized,
        creator_type_ids,
        field_ids,
        base_field_map,
        icon,
    })
}

fn parse_creator_type(id: u32, entry: &[Value]) -> Result<CreatorTypeRecord, SchemaError> {
    Ok(CreatorTypeRecord {
        id,
        name: entry_str(entry, 0, id, "creator type name")?,
        localized: entry_str(entry, 1, id, "creator type label")?,
    })
}

fn parse_field(id: u32, entry: &[Value]) -> Result<FieldRecord, SchemaError> {
    Ok(FieldRecord {
        id,
        name: entry_str(entry, 0, id, "field name")?,
        localized: entry.get(1).and_then(Value::as_str).map(str::to_string),
        base_field: entry.get(2).and_then(Value::as_bool).unwrap_or(false),
    })
}

fn entry_str(entry: &[Value], index: usize, id: u32, what: &str) -> Result<String, SchemaError> {
    entry
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("entry {id}: missing {what}")))
}

/// Creator lists use a single `false` element to encode "no creators
/// allowed"; that collapses to an empty list here.
fn parse_creator_type_ids(value: Option<&Value>, id: u32) -> Result<Vec<u32>, SchemaError> {
    let list = value
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("entry {id}: missing creator type list")))?;

    if list.len() == 1 && list[0] == Value::Bool(false) {
        return Ok(Vec::new());
    }

    list.iter()
        .map(|value| {
            value
                .as_u64()
                .map(|id| id as u32)
                .ok_or_else(|| invalid(format!("entry {id}: non-numeric creator type reference")))
        })
        .collect()
}

fn parse_id_list(value: Option<&Value>, id: u32, what: &str) -> Result<Vec<u32>, SchemaError> {
    let list = value
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("entry {id}: missing {what}")))?;

    list.iter()
        .map(|value| {
            value
                .as_u64()
                .map(|id| id as u32)
                .ok_or_else(|| invalid(format!("entry {id}: non-numeric reference in {what}")))
        })
        .collect()
}

fn parse_base_field_map(value: Option<&Value>, id: u32) -> Result<BTreeMap<u32, u32>, SchemaError> {
    let map = value
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("entry {id}: missing base field map")))?;

    let mut base_fields = BTreeMap::new();
    for (field_id, base_id) in map {
        let field_id = field_id
            .parse::<u32>()
            .map_err(|_| invalid(format!("entry {id}: non-numeric base field key")))?;
        let base_id = base_id
            .as_u64()
            .map(|base_id| base_id as u32)
            .ok_or_else(|| invalid(format!("entry {id}: non-numeric base field value")))?;
        base_fields.insert(field_id, base_id);
    }
    Ok(base_fields)
}

#[track_caller]
fn invalid(message: String) -> SchemaError {
    SchemaError::InvalidPayload {
        message,
        location: ErrorLocation::capture(),
    }
}
