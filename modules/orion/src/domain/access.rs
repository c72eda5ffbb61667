//! Role gates, field projection per action, ownership scoping and custom
//! entity hooks.

use orion_query::ast::{CompareOperator, Condition};
use orion_query::{Action, EntitySchema, Record, parse};
use orion_security::{RequestContext, intersects};

use crate::domain::error::DomainError;

/// Fields an action may touch: `read` hides secrets, `update` additionally
/// hides non-editable fields; `create` and `delete` are not filtered here.
#[must_use]
pub fn allowed_fields(entity: &EntitySchema, action: Action) -> Vec<String> {
    entity
        .fields()
        .iter()
        .filter(|f| match action {
            Action::Read => !f.is_secret(),
            Action::Update => f.editable && !f.is_secret(),
            Action::Create | Action::Delete => true,
        })
        .map(|f| f.name.clone())
        .collect()
}

/// # Errors
/// `Unauthorized` unless the caller holds one of the roles allowed for the
/// action.
pub fn validate_roles(
    ctx: &RequestContext,
    entity: &EntitySchema,
    action: Action,
) -> Result<(), DomainError> {
    let allowed = entity.allowed_roles(action);
    if intersects(ctx.user_roles(), allowed) {
        return Ok(());
    }
    tracing::warn!(
        entity = entity.name(),
        %action,
        user_id = ?ctx.user_id(),
        roles = ?ctx.user_roles(),
        "role check failed"
    );
    Err(DomainError::unauthorized(format!(
        "{action} on {} requires one of: {}",
        entity.name(),
        allowed.join(", ")
    )))
}

/// Private mode needs an identity.
///
/// # Errors
/// `Unauthorized` for an anonymous caller in private mode.
pub fn require_identity(ctx: &RequestContext) -> Result<Option<i64>, DomainError> {
    match ctx.user_id() {
        None if ctx.mode().is_private() => Err(DomainError::unauthorized(
            "private access requires an authenticated user",
        )),
        user_id => Ok(user_id),
    }
}

/// Narrow a read condition to what the caller may see.
///
/// In private mode the condition is always AND-ed with `owner = caller` and
/// the owner role is granted; any term on the owner column that binds a
/// different user is refused. The entity's custom read condition is AND-ed
/// in for every caller except admins.
///
/// # Errors
/// `Unauthorized` for a missing identity or an ownership override;
/// `Query` when the custom read condition does not parse.
pub fn scope_read(
    ctx: &mut RequestContext,
    entity: &EntitySchema,
    condition: Condition,
) -> Result<Condition, DomainError> {
    let mut condition = condition;

    if ctx.mode().is_private() {
        let user_id = require_identity(ctx)?
            .ok_or_else(|| DomainError::unauthorized("private access requires an authenticated user"))?;
        let owner_key = entity.owner_key();
        let expected = user_id.to_string();
        if let Some(bound) = condition
            .values_for(owner_key)
            .into_iter()
            .find(|v| v.to_string() != expected)
        {
            tracing::warn!(
                entity = entity.name(),
                user_id,
                requested = %bound,
                "ownership override refused"
            );
            return Err(DomainError::unauthorized(format!(
                "{owner_key} is restricted to the caller"
            )));
        }

        // Caller terms on the owner key never stand in for the pin.
        let own = Condition::leaf(entity.name(), owner_key, CompareOperator::Eq, user_id);
        condition = if condition == Condition::always_true() {
            own
        } else {
            condition.and_also(own)
        };
        ctx.grant_owner();
    }

    if !ctx.is_admin() {
        if let Some(raw) = entity
            .hooks()
            .and_then(|h| h.read_condition(ctx.user_roles(), ctx.user_id()))
        {
            if let Some(extra) = parse(entity, &raw)? {
                condition = condition.and_also(extra);
            }
        }
    }

    Ok(condition)
}

/// Grant the owner role when the caller owns `record`.
pub fn establish_ownership(ctx: &mut RequestContext, entity: &EntitySchema, record: &Record) {
    let owner = record.get(entity.owner_key()).and_then(json_id);
    if owner.is_some() && owner == ctx.user_id() {
        ctx.grant_owner();
    }
}

/// Run the entity's write hook.
///
/// # Errors
/// `Unauthorized` when the hook rejects the write.
pub fn check_write_hook(
    ctx: &RequestContext,
    entity: &EntitySchema,
    action: Action,
    existing: Option<&Record>,
    incoming: &Record,
) -> Result<(), DomainError> {
    let Some(hooks) = entity.hooks() else {
        return Ok(());
    };
    if hooks.is_write_allowed(action, ctx.user_roles(), ctx.user_id(), existing, incoming) {
        return Ok(());
    }
    tracing::warn!(entity = entity.name(), %action, user_id = ?ctx.user_id(), "write hook rejected request");
    Err(DomainError::unauthorized(format!(
        "{action} on {} rejected",
        entity.name()
    )))
}

/// Integer id from a JSON number or numeric string.
#[must_use]
pub fn json_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use orion_query::{EntityDef, EntityHooks, FieldSchema, FieldType, Schema};
    use orion_security::AccessMode;
    use serde_json::json;
    use std::sync::Arc;

    struct OnlyPublished;

    impl EntityHooks for OnlyPublished {
        fn read_condition(&self, _roles: &[String], _user_id: Option<i64>) -> Option<String> {
            Some("published=1".to_owned())
        }

        fn is_write_allowed(
            &self,
            action: Action,
            _roles: &[String],
            _user_id: Option<i64>,
            _existing: Option<&Record>,
            incoming: &Record,
        ) -> bool {
            action != Action::Create || incoming.get("published") != Some(&json!(1))
        }
    }

    fn schema() -> Schema {
        Schema::builder()
            .entity(
                EntityDef::new("item")
                    .field(FieldSchema::new("name", FieldType::String))
                    .field(FieldSchema::new("published", FieldType::Boolean))
                    .field(FieldSchema::new("apikey", FieldType::Secret))
                    .roles(Action::Read, &["guest", "member", "owner"])
                    .roles(Action::Update, &["owner"]),
            )
            .hooks("item", Arc::new(OnlyPublished))
            .build()
            .unwrap()
    }

    #[test]
    fn read_and_update_projections() {
        let schema = schema();
        let user = schema.entity("user").unwrap();

        let read = allowed_fields(user, Action::Read);
        assert!(!read.contains(&"password".to_owned()));
        assert!(read.contains(&"createdtime".to_owned()));

        let update = allowed_fields(user, Action::Update);
        assert!(!update.contains(&"password".to_owned()));
        assert!(!update.contains(&"createdtime".to_owned()));
        assert!(update.contains(&"email".to_owned()));

        assert_eq!(
            allowed_fields(user, Action::Create).len(),
            user.fields().len()
        );
    }

    #[test]
    fn roles_must_intersect() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let member = RequestContext::builder("item").user_id(1).role("member").build();
        assert!(validate_roles(&member, item, Action::Read).is_ok());
        let err = validate_roles(&member, item, Action::Delete).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn private_read_without_condition_is_pinned_to_caller() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let mut ctx = RequestContext::builder("item")
            .user_id(7)
            .role("admin")
            .mode(AccessMode::Private)
            .build();

        let scoped = scope_read(&mut ctx, item, Condition::always_true()).unwrap();
        assert_eq!(
            scoped,
            Condition::leaf("item", "ownerid", CompareOperator::Eq, 7)
        );
        assert!(ctx.has_role("owner"));
    }

    #[test]
    fn private_read_refuses_foreign_owner() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let mut ctx = RequestContext::builder("item")
            .user_id(7)
            .role("member")
            .mode(AccessMode::Private)
            .build();
        let explicit = Condition::leaf("item", "ownerid", CompareOperator::Eq, 9);
        let err = scope_read(&mut ctx, item, explicit).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
        assert!(!ctx.has_role("owner"));
    }

    #[test]
    fn private_read_pins_even_with_owner_terms() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let mut ctx = RequestContext::builder("item")
            .user_id(7)
            .role("member")
            .mode(AccessMode::Private)
            .build();
        let not_mine = Condition::leaf("item", "ownerid", CompareOperator::Ne, 7);

        let scoped = scope_read(&mut ctx, item, not_mine.clone()).unwrap();
        assert_eq!(
            scoped,
            not_mine.and_also(Condition::leaf("item", "ownerid", CompareOperator::Eq, 7))
        );
    }

    #[test]
    fn private_read_refuses_foreign_owner_inside_or() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let mut ctx = RequestContext::builder("item")
            .user_id(7)
            .role("member")
            .mode(AccessMode::Private)
            .build();
        let either = Condition::or(vec![
            Condition::leaf("item", "ownerid", CompareOperator::Eq, 7),
            Condition::leaf("item", "ownerid", CompareOperator::Eq, 9),
        ]);
        assert!(scope_read(&mut ctx, item, either).is_err());
    }

    #[test]
    fn private_read_requires_identity() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let mut ctx = RequestContext::builder("item")
            .role("guest")
            .mode(AccessMode::Private)
            .build();
        assert!(scope_read(&mut ctx, item, Condition::always_true()).is_err());
    }

    #[test]
    fn custom_read_condition_skipped_for_admin() {
        let schema = schema();
        let item = schema.entity("item").unwrap();

        let mut guest = RequestContext::anonymous("item");
        let scoped = scope_read(&mut guest, item, Condition::always_true()).unwrap();
        assert!(scoped.get_value("published").is_some());

        let mut admin = RequestContext::builder("item").user_id(1).role("admin").build();
        let scoped = scope_read(&mut admin, item, Condition::always_true()).unwrap();
        assert_eq!(scoped, Condition::always_true());
    }

    #[test]
    fn ownership_is_established_from_record() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let user = schema.entity("user").unwrap();
        let mut ctx = RequestContext::builder("item").user_id(4).role("member").build();

        establish_ownership(&mut ctx, item, json!({"ownerid": 5}).as_object().unwrap());
        assert!(!ctx.has_role("owner"));

        establish_ownership(&mut ctx, user, json!({"id": "4"}).as_object().unwrap());
        assert!(ctx.has_role("owner"));
    }

    #[test]
    fn write_hook_can_reject() {
        let schema = schema();
        let item = schema.entity("item").unwrap();
        let ctx = RequestContext::builder("item").user_id(1).role("member").build();
        let body = json!({"published": 1});
        let err = check_write_hook(&ctx, item, Action::Create, None, body.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
        assert!(
            check_write_hook(&ctx, item, Action::Update, None, body.as_object().unwrap()).is_ok()
        );
    }
}
