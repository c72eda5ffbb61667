//! Error catalog: one static definition per error kind.

use crate::problem::Problem;
use http::StatusCode;

/// Static error definition from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
}

impl ErrDef {
    /// Convert this error definition into a Problem with the given detail
    #[inline]
    pub fn as_problem(&self, detail: impl Into<String>) -> Problem {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Problem::new(status, self.title, detail.into())
            .with_code(self.code)
            .with_type(self.type_url)
    }
}

/// Request-facing error kinds. The mapping to status and tag is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid field, unknown condition field, malformed condition.
    BadRequest,
    /// Role check failure, ownership mismatch, write hook rejection.
    Unauthorized,
    /// Record lookup miss.
    NotFound,
    /// SQL connectivity or execution failure.
    StorageBackend,
    /// Duplicate unique value.
    Conflict,
}

pub const BAD_REQUEST: ErrDef = ErrDef {
    status: 400,
    title: "Bad Request",
    code: "ORION_BAD_REQUEST",
    type_url: "urn:orion:errors:bad-request",
};

pub const UNAUTHORIZED: ErrDef = ErrDef {
    status: 401,
    title: "Unauthorized",
    code: "ORION_UNAUTHORIZED",
    type_url: "urn:orion:errors:unauthorized",
};

pub const NOT_FOUND: ErrDef = ErrDef {
    status: 404,
    title: "Not Found",
    code: "ORION_NOT_FOUND",
    type_url: "urn:orion:errors:not-found",
};

pub const CONFLICT: ErrDef = ErrDef {
    status: 409,
    title: "Conflict",
    code: "ORION_CONFLICT",
    type_url: "urn:orion:errors:conflict",
};

pub const STORAGE_BACKEND: ErrDef = ErrDef {
    status: 500,
    title: "Query Execution Failed",
    code: "ORION_STORAGE_BACKEND",
    type_url: "urn:orion:errors:storage-backend",
};

impl ErrorKind {
    #[must_use]
    pub const fn def(self) -> &'static ErrDef {
        match self {
            ErrorKind::BadRequest => &BAD_REQUEST,
            ErrorKind::Unauthorized => &UNAUTHORIZED,
            ErrorKind::NotFound => &NOT_FOUND,
            ErrorKind::StorageBackend => &STORAGE_BACKEND,
            ErrorKind::Conflict => &CONFLICT,
        }
    }

    #[must_use]
    pub const fn status(self) -> u16 {
        self.def().status
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        self.def().code
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn err_def_to_problem_works() {
        let problem = NOT_FOUND.as_problem("item 12 missing");
        assert_eq!(problem.status, StatusCode::NOT_FOUND);
        assert_eq!(problem.title, "Not Found");
        assert_eq!(problem.detail, "item 12 missing");
        assert_eq!(problem.code, "ORION_NOT_FOUND");
        assert_eq!(problem.type_url, "urn:orion:errors:not-found");
    }

    #[test]
    fn kind_mapping_is_stable() {
        assert_eq!(ErrorKind::BadRequest.status(), 400);
        assert_eq!(ErrorKind::Unauthorized.status(), 401);
        assert_eq!(ErrorKind::NotFound.status(), 404);
        assert_eq!(ErrorKind::Conflict.status(), 409);
        assert_eq!(ErrorKind::StorageBackend.status(), 500);
        assert_eq!(ErrorKind::Conflict.tag(), "ORION_CONFLICT");
    }
}
