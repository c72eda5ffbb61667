use crate::AccessMode;
use crate::roles;

/// Per-request identity and target.
///
/// Built by the auth layer at request start and dropped at request end. The
/// role list is the only part that changes mid-request: the synthetic
/// `owner` role is appended once ownership of the target record is known.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RequestContext {
    entity: String,
    user_id: Option<i64>,
    user_roles: Vec<String>,
    user_domain: Option<String>,
    mode: AccessMode,
}

impl RequestContext {
    #[must_use]
    pub fn builder(entity: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder {
            entity: entity.into(),
            ..RequestContextBuilder::default()
        }
    }

    /// Anonymous caller with only the guest role.
    #[must_use]
    pub fn anonymous(entity: impl Into<String>) -> Self {
        Self::builder(entity).role(roles::GUEST).build()
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    #[must_use]
    pub fn user_roles(&self) -> &[String] {
        &self.user_roles
    }

    #[must_use]
    pub fn user_domain(&self) -> Option<&str> {
        self.user_domain.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.user_roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(roles::ADMIN)
    }

    /// Append the owner role. Idempotent.
    pub fn grant_owner(&mut self) {
        if !self.has_role(roles::OWNER) {
            tracing::debug!(entity = %self.entity, user_id = ?self.user_id, "owner role granted");
            self.user_roles.push(roles::OWNER.to_owned());
        }
    }
}

#[derive(Default)]
pub struct RequestContextBuilder {
    entity: String,
    user_id: Option<i64>,
    user_roles: Vec<String>,
    user_domain: Option<String>,
    mode: AccessMode,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn role(mut self, role: &str) -> Self {
        self.user_roles.push(role.to_owned());
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.user_domain = Some(domain.to_owned());
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            entity: self.entity,
            user_id: self.user_id,
            user_roles: self.user_roles,
            user_domain: self.user_domain,
            mode: self.mode,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn builder_populates_every_field() {
        let ctx = RequestContext::builder("item")
            .user_id(7)
            .roles(["member", "editor"])
            .domain("local")
            .mode(AccessMode::Private)
            .build();

        assert_eq!(ctx.entity(), "item");
        assert_eq!(ctx.user_id(), Some(7));
        assert_eq!(ctx.user_roles(), ["member", "editor"]);
        assert_eq!(ctx.user_domain(), Some("local"));
        assert!(ctx.mode().is_private());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn grant_owner_is_idempotent() {
        let mut ctx = RequestContext::builder("item").user_id(1).role("member").build();
        ctx.grant_owner();
        ctx.grant_owner();
        assert_eq!(
            ctx.user_roles().iter().filter(|r| *r == roles::OWNER).count(),
            1
        );
    }

    #[test]
    fn anonymous_is_guest() {
        let ctx = RequestContext::anonymous("asset");
        assert!(ctx.has_role(roles::GUEST));
        assert_eq!(ctx.user_id(), None);
        assert_eq!(ctx.mode(), AccessMode::Public);
    }
}
