//! Declarative entity schema.
//!
//! A `Schema` is assembled once at start-up from caller-supplied entity
//! definitions merged over the built-in `user` and `asset` entities, and is
//! immutable afterwards. Merge rules:
//! - every entity owns the reserved columns `id`, `ownerid` and `createdtime`;
//!   callers cannot redefine them
//! - built-in fields and built-in role sets win over caller definitions of the
//!   same name; callers may only add fields and roles for actions the built-in
//!   leaves open

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builtins;
use crate::errors::{QueryError, SchemaError};

/// A row as exchanged with callers: column name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Id,
    Int,
    Float,
    String,
    Secret,
    Boolean,
    Timestamp,
    RichText,
}

impl FieldType {
    /// Integer-backed types; condition values for them are parsed as `i64`.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, FieldType::Id | FieldType::Int | FieldType::Timestamp)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Id => "id",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Secret => "secret",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::RichText => "richtext",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateRequirement {
    /// Set by the system; callers may not supply it on create.
    None,
    #[default]
    Optional,
    Required,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub entity: String,
    /// Name under which the resolved record is exposed, and the SQL alias of
    /// the joined table.
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default = "default_editable")]
    pub editable: bool,
    #[serde(default)]
    pub create: CreateRequirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

fn default_editable() -> bool {
    true
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            editable: true,
            create: CreateRequirement::Optional,
            foreign_key: None,
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    #[must_use]
    pub fn create(mut self, create: CreateRequirement) -> Self {
        self.create = create;
        self
    }

    #[must_use]
    pub fn references(mut self, entity: impl Into<String>, alias: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            entity: entity.into(),
            alias: alias.into(),
        });
        self
    }

    #[must_use]
    pub fn is_secret(&self) -> bool {
        self.kind == FieldType::Secret
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Per-entity custom authorization predicates.
pub trait EntityHooks: Send + Sync {
    /// Extra condition string AND-ed into every non-admin read.
    fn read_condition(&self, _roles: &[String], _user_id: Option<i64>) -> Option<String> {
        None
    }

    /// Final say on a write, consulted after the role check. `existing` is
    /// `None` on create.
    fn is_write_allowed(
        &self,
        _action: Action,
        _roles: &[String],
        _user_id: Option<i64>,
        _existing: Option<&Record>,
        _incoming: &Record,
    ) -> bool {
        true
    }
}

/// Caller-supplied entity definition, before merging with built-ins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub roles: BTreeMap<Action, Vec<String>>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn roles(mut self, action: Action, roles: &[&str]) -> Self {
        self.roles
            .insert(action, roles.iter().map(|r| (*r).to_owned()).collect());
        self
    }
}

#[derive(Clone)]
pub struct EntitySchema {
    name: String,
    table: String,
    fields: Vec<FieldSchema>,
    roles: BTreeMap<Action, Vec<String>>,
    hooks: Option<Arc<dyn EntityHooks>>,
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .field("roles", &self.roles)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

/// Backing table of an entity, `<entity>table`.
#[must_use]
pub fn table_name(entity: &str) -> String {
    format!("{entity}table")
}

impl EntitySchema {
    fn from_def(def: EntityDef) -> Self {
        Self {
            table: table_name(&def.name),
            name: def.name,
            fields: def.fields,
            roles: def.roles,
            hooks: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// # Errors
    /// Returns `QueryError::UnknownField` if the entity has no such field.
    pub fn require_field(&self, name: &str) -> Result<&FieldSchema, QueryError> {
        self.field(name).ok_or_else(|| QueryError::UnknownField {
            entity: self.name.clone(),
            field: name.to_owned(),
        })
    }

    #[must_use]
    pub fn allowed_roles(&self, action: Action) -> &[String] {
        self.roles.get(&action).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn hooks(&self) -> Option<&Arc<dyn EntityHooks>> {
        self.hooks.as_ref()
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.foreign_key.is_some())
    }

    /// Column that identifies the record owner: `id` for users, `ownerid`
    /// for everything else.
    #[must_use]
    pub fn owner_key(&self) -> &'static str {
        if self.name == builtins::USER {
            "id"
        } else {
            builtins::OWNER_ID
        }
    }
}

/// Immutable registry of every entity.
#[derive(Clone, Debug)]
pub struct Schema {
    entities: BTreeMap<String, EntitySchema>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// # Errors
    /// Returns `QueryError::UnknownEntity` if the entity is not configured.
    pub fn require(&self, name: &str) -> Result<&EntitySchema, QueryError> {
        self.entity(name)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_owned()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    defs: Vec<EntityDef>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, def: EntityDef) -> Self {
        self.defs.push(def);
        self
    }

    #[must_use]
    pub fn entities(mut self, defs: impl IntoIterator<Item = EntityDef>) -> Self {
        self.defs.extend(defs);
        self
    }

    #[must_use]
    pub fn hooks(mut self, entity: impl Into<String>, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks.insert(entity.into(), hooks);
        self
    }

    /// Merge caller definitions over the built-ins and validate the result.
    ///
    /// # Errors
    /// Returns `SchemaError` for invalid names, dangling foreign keys,
    /// ambiguous join aliases, or hooks attached to an unknown entity.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut entities: BTreeMap<String, EntitySchema> = builtins::entities()
            .into_iter()
            .map(|def| (def.name.clone(), EntitySchema::from_def(def)))
            .collect();

        for def in self.defs {
            if !validate_identifier(&def.name) {
                return Err(SchemaError::InvalidEntityName(def.name));
            }

            match entities.get_mut(&def.name) {
                Some(existing) => merge_into(existing, def),
                None => {
                    let mut schema = EntitySchema::from_def(builtins::base_entity(&def.name));
                    merge_into(&mut schema, def);
                    entities.insert(schema.name.clone(), schema);
                }
            }
        }

        for schema in entities.values_mut() {
            for action in Action::ALL {
                schema
                    .roles
                    .entry(action)
                    .or_insert_with(|| vec![builtins::FALLBACK_ROLE.to_owned()]);
            }
        }

        validate(&entities)?;

        for (entity, hooks) in self.hooks {
            let schema = entities
                .get_mut(&entity)
                .ok_or(SchemaError::HooksForUnknownEntity(entity))?;
            schema.hooks = Some(hooks);
        }

        tracing::debug!(entities = entities.len(), "schema assembled");
        Ok(Schema { entities })
    }
}

fn merge_into(existing: &mut EntitySchema, def: EntityDef) {
    for field in def.fields {
        if existing.field(&field.name).is_some() {
            tracing::warn!(
                entity = %existing.name,
                field = %field.name,
                "ignoring redefinition of a built-in field"
            );
            continue;
        }
        existing.fields.push(field);
    }
    for (action, roles) in def.roles {
        if existing.roles.contains_key(&action) {
            tracing::warn!(
                entity = %existing.name,
                %action,
                "ignoring override of a built-in role set"
            );
            continue;
        }
        existing.roles.insert(action, roles);
    }
}

fn validate_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn validate(entities: &BTreeMap<String, EntitySchema>) -> Result<(), SchemaError> {
    for schema in entities.values() {
        let mut aliases = HashSet::new();
        for field in &schema.fields {
            if !validate_identifier(&field.name) {
                return Err(SchemaError::InvalidFieldName {
                    entity: schema.name.clone(),
                    field: field.name.clone(),
                });
            }
            let Some(fk) = &field.foreign_key else {
                continue;
            };
            if !entities.contains_key(&fk.entity) {
                return Err(SchemaError::UnknownForeignKeyTarget {
                    entity: schema.name.clone(),
                    field: field.name.clone(),
                    target: fk.entity.clone(),
                });
            }
            if !validate_identifier(&fk.alias) {
                return Err(SchemaError::InvalidFieldName {
                    entity: schema.name.clone(),
                    field: fk.alias.clone(),
                });
            }
            if schema.field(&fk.alias).is_some() {
                return Err(SchemaError::AliasCollidesWithField {
                    entity: schema.name.clone(),
                    alias: fk.alias.clone(),
                });
            }
            if !aliases.insert(fk.alias.as_str()) {
                return Err(SchemaError::DuplicateAlias {
                    entity: schema.name.clone(),
                    alias: fk.alias.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn item_def() -> EntityDef {
        EntityDef::new("item")
            .field(FieldSchema::new("name", FieldType::String).create(CreateRequirement::Required))
            .field(FieldSchema::new("price", FieldType::Float))
            .roles(Action::Read, &["guest", "member"])
    }

    #[test]
    fn caller_entity_gets_reserved_columns() {
        let schema = Schema::builder().entity(item_def()).build().unwrap();
        let item = schema.entity("item").unwrap();
        let names: Vec<_> = item.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "ownerid", "createdtime", "name", "price"]);
        assert_eq!(item.table(), "itemtable");
        assert_eq!(item.owner_key(), "ownerid");
    }

    #[test]
    fn reserved_columns_cannot_be_redefined() {
        let def = item_def().field(FieldSchema::new("id", FieldType::String));
        let schema = Schema::builder().entity(def).build().unwrap();
        let id = schema.entity("item").unwrap().field("id").unwrap();
        assert_eq!(id.kind, FieldType::Id);
        assert!(!id.editable);
    }

    #[test]
    fn builtin_roles_win_and_new_actions_are_added() {
        let def = EntityDef::new("user")
            .field(FieldSchema::new("nickname", FieldType::String))
            .roles(Action::Delete, &["member"]);
        let schema = Schema::builder().entity(def).build().unwrap();
        let user = schema.entity("user").unwrap();
        assert_eq!(user.allowed_roles(Action::Delete), ["admin"]);
        assert!(user.field("nickname").is_some());
        assert_eq!(user.owner_key(), "id");
    }

    #[test]
    fn missing_role_sets_fall_back_to_admin() {
        let schema = Schema::builder().entity(item_def()).build().unwrap();
        let item = schema.entity("item").unwrap();
        assert_eq!(item.allowed_roles(Action::Read), ["guest", "member"]);
        assert_eq!(item.allowed_roles(Action::Delete), ["admin"]);
    }

    #[test]
    fn dangling_foreign_key_is_rejected() {
        let def = item_def()
            .field(FieldSchema::new("categoryid", FieldType::Id).references("category", "category"));
        let err = Schema::builder().entity(def).build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownForeignKeyTarget { .. }));
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let def = item_def()
            .field(FieldSchema::new("buyerid", FieldType::Id).references("user", "person"))
            .field(FieldSchema::new("sellerid", FieldType::Id).references("user", "person"));
        let err = Schema::builder().entity(def).build().unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateAlias {
                entity: "item".to_owned(),
                alias: "person".to_owned()
            }
        );
    }

    #[test]
    fn identifiers_are_restricted() {
        let err = Schema::builder()
            .entity(EntityDef::new("bad name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidEntityName(_)));

        let def = item_def().field(FieldSchema::new("x;drop", FieldType::String));
        let err = Schema::builder().entity(def).build().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldName { .. }));
    }

    #[test]
    fn hooks_require_known_entity() {
        struct Nop;
        impl EntityHooks for Nop {}
        let err = Schema::builder()
            .hooks("ghost", Arc::new(Nop))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::HooksForUnknownEntity(_)));
    }
}
