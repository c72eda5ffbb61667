//! Role names and set helpers.

/// Full access to every entity; also bypasses custom read conditions.
pub const ADMIN: &str = "admin";
/// Synthetic role granted while the caller owns the record in play.
pub const OWNER: &str = "owner";
/// Any authenticated user.
pub const MEMBER: &str = "member";
/// Anonymous caller.
pub const GUEST: &str = "guest";

/// True when the two role sets share at least one entry.
#[must_use]
pub fn intersects<A, B>(a: &[A], b: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    a.iter()
        .any(|x| b.iter().any(|y| x.as_ref() == y.as_ref()))
}
