//! Built-in entities and reserved columns.

use crate::schema::{Action, CreateRequirement, EntityDef, FieldSchema, FieldType};

pub const USER: &str = "user";
pub const ASSET: &str = "asset";

pub const ID: &str = "id";
pub const OWNER_ID: &str = "ownerid";
pub const CREATED_TIME: &str = "createdtime";
/// Alias under which the resolved owner record appears.
pub const OWNER_ALIAS: &str = "owner";

/// Role set used for any action an entity leaves unconfigured.
pub const FALLBACK_ROLE: &str = "admin";

/// Reserved columns every entity owns, in table order.
#[must_use]
pub fn reserved_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::new(ID, FieldType::Id)
            .read_only()
            .create(CreateRequirement::None),
        FieldSchema::new(OWNER_ID, FieldType::Id)
            .read_only()
            .create(CreateRequirement::None)
            .references(USER, OWNER_ALIAS),
        FieldSchema::new(CREATED_TIME, FieldType::Timestamp)
            .read_only()
            .create(CreateRequirement::None),
    ]
}

/// Empty entity carrying only the reserved columns.
#[must_use]
pub fn base_entity(name: &str) -> EntityDef {
    EntityDef {
        name: name.to_owned(),
        fields: reserved_fields(),
        roles: std::collections::BTreeMap::new(),
    }
}

fn user() -> EntityDef {
    let mut def = base_entity(USER)
        .field(FieldSchema::new("domain", FieldType::String).read_only())
        .field(FieldSchema::new("domainid", FieldType::String).read_only())
        .field(FieldSchema::new("roles", FieldType::String).read_only())
        .field(
            FieldSchema::new("username", FieldType::String)
                .read_only()
                .create(CreateRequirement::Required),
        )
        .field(FieldSchema::new("password", FieldType::Secret).create(CreateRequirement::Required))
        .field(FieldSchema::new("email", FieldType::String))
        .roles(Action::Create, &["guest", "admin"])
        .roles(Action::Read, &["owner", "admin"])
        .roles(Action::Update, &["owner", "admin"])
        .roles(Action::Delete, &["admin"]);
    // roles and domain are assigned by the auth collaborator, never by the caller
    for f in &mut def.fields {
        if matches!(f.name.as_str(), "domain" | "domainid" | "roles") {
            f.create = CreateRequirement::None;
        }
    }
    def
}

fn asset() -> EntityDef {
    base_entity(ASSET)
        .field(
            FieldSchema::new("filename", FieldType::String)
                .read_only()
                .create(CreateRequirement::None),
        )
        .field(FieldSchema::new("originalname", FieldType::String).create(CreateRequirement::Required))
        .field(
            FieldSchema::new("contenttype", FieldType::String)
                .read_only()
                .create(CreateRequirement::None),
        )
        .field(
            FieldSchema::new("size", FieldType::Int)
                .read_only()
                .create(CreateRequirement::None),
        )
        .roles(Action::Create, &["member", "admin"])
        .roles(Action::Read, &["guest", "member", "owner", "admin"])
        .roles(Action::Update, &["owner", "admin"])
        .roles(Action::Delete, &["owner", "admin"])
}

/// The built-in entities, before any caller merge.
#[must_use]
pub fn entities() -> Vec<EntityDef> {
    vec![user(), asset()]
}
