//! Session-derived identity resolution.
//!
//! A [`SessionContext`] is an immutable snapshot of the identity markers a
//! session carries. Every function here is a pure projection over that
//! snapshot: nothing in this module writes session state or touches the
//! store. Guards return a typed [`AuthDecision`] which the middleware layer
//! turns into a redirect; the resolver itself never terminates a request.
//!
//! The precedence rules are load-bearing. A hospital or pharmacy session may
//! incidentally carry a `user_id` or `user_role`, and must not be
//! misclassified as a patient or admin, so the hospital/pharmacy markers are
//! checked before the patient/admin fallthrough.

pub mod middleware;
pub mod sessions;

use serde::{Deserialize, Serialize};

/// `user_role` value that marks an account as an administrator.
pub const ADMIN_ROLE_FLAG: i32 = 1;
/// `user_role` value for a regular patient account.
pub const PATIENT_ROLE_FLAG: i32 = 2;

pub const LOGIN_URL: &str = "/login";
pub const HOME_URL: &str = "/";
pub const ADMIN_URL: &str = "/admin";
pub const PATIENT_DASHBOARD_URL: &str = "/patients/dashboard";
pub const HOSPITAL_DASHBOARD_URL: &str = "/hospitals/dashboard";
pub const PHARMACY_DASHBOARD_URL: &str = "/pharmacies/dashboard";

/// Identity markers attached to one session. Markers are not mutually
/// exclusive: a patient session also carries its `user_role`, and an admin
/// may hold a `patient_id` while acting as a patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub patient_id: Option<i32>,
    pub user_id: Option<i32>,
    pub hospital_id: Option<i32>,
    pub pharmacy_id: Option<i32>,
    pub admin_id: Option<i32>,
    pub user_role: Option<i32>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Admin,
    Hospital,
    Pharmacy,
    Patient,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Hospital => "hospital",
            UserType::Pharmacy => "pharmacy",
            UserType::Patient => "patient",
        }
    }
}

/// Outcome of a guard check. `Denied` carries the redirect target the
/// calling layer must send before dropping the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision<'a> {
    Allowed,
    Denied { redirect: &'a str },
}

/// True iff the session carries at least one identity marker.
pub fn is_logged_in(ctx: &SessionContext) -> bool {
    ctx.patient_id.is_some()
        || ctx.user_id.is_some()
        || ctx.hospital_id.is_some()
        || ctx.pharmacy_id.is_some()
        || ctx.admin_id.is_some()
}

/// Any one of the admin conditions suffices; they are checked in order:
/// role flag, dedicated admin marker, then the textual role.
pub fn is_admin(ctx: &SessionContext) -> bool {
    if !is_logged_in(ctx) {
        return false;
    }
    if ctx.user_role == Some(ADMIN_ROLE_FLAG) {
        return true;
    }
    if ctx.admin_id.is_some() {
        return true;
    }
    matches!(ctx.role.as_deref(), Some("admin") | Some("super_admin"))
}

/// Resolve the session to exactly one principal type, or `None` when
/// anonymous. Hospital and pharmacy markers win over the patient/admin
/// fallthrough; the role flag only promotes sessions that reached it.
pub fn user_type(ctx: &SessionContext) -> Option<UserType> {
    if ctx.admin_id.is_some() {
        return Some(UserType::Admin);
    }
    if ctx.hospital_id.is_some() {
        return Some(UserType::Hospital);
    }
    if ctx.pharmacy_id.is_some() {
        return Some(UserType::Pharmacy);
    }
    if ctx.patient_id.is_some() || ctx.user_id.is_some() {
        if ctx.user_role == Some(ADMIN_ROLE_FLAG) {
            return Some(UserType::Admin);
        }
        return Some(UserType::Patient);
    }
    None
}

/// First present identity marker, in fixed order.
pub fn user_id(ctx: &SessionContext) -> Option<i32> {
    ctx.admin_id
        .or(ctx.patient_id)
        .or(ctx.user_id)
        .or(ctx.hospital_id)
        .or(ctx.pharmacy_id)
}

/// Patient id usable for cart/order operations. Covers plain patients and
/// admins acting as a patient; hospitals and pharmacies have no cart.
pub fn patient_scope(ctx: &SessionContext) -> Option<i32> {
    match user_type(ctx) {
        Some(UserType::Patient) | Some(UserType::Admin) => ctx.patient_id.or(ctx.user_id),
        _ => None,
    }
}

pub fn require_login<'a>(ctx: &SessionContext, redirect: &'a str) -> AuthDecision<'a> {
    if is_logged_in(ctx) {
        AuthDecision::Allowed
    } else {
        AuthDecision::Denied { redirect }
    }
}

pub fn require_admin<'a>(ctx: &SessionContext, redirect: &'a str) -> AuthDecision<'a> {
    if is_admin(ctx) {
        AuthDecision::Allowed
    } else {
        AuthDecision::Denied { redirect }
    }
}

/// Destination for the resolved principal. Admin wins over patient even
/// when the session also holds a patient marker.
pub fn dashboard_url(ctx: &SessionContext) -> &'static str {
    match user_type(ctx) {
        Some(UserType::Admin) => ADMIN_URL,
        Some(UserType::Patient) => PATIENT_DASHBOARD_URL,
        Some(UserType::Hospital) => HOSPITAL_DASHBOARD_URL,
        Some(UserType::Pharmacy) => PHARMACY_DASHBOARD_URL,
        None => HOME_URL,
    }
}

/// Where to send an already-authenticated visitor of a login page.
pub fn redirect_if_logged_in(ctx: &SessionContext) -> Option<&'static str> {
    is_logged_in(ctx).then(|| dashboard_url(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anonymous() -> SessionContext {
        SessionContext::default()
    }

    fn patient(id: i32) -> SessionContext {
        SessionContext {
            patient_id: Some(id),
            user_role: Some(PATIENT_ROLE_FLAG),
            ..SessionContext::default()
        }
    }

    #[test]
    fn anonymous_session_resolves_to_nothing() {
        let ctx = anonymous();
        assert!(!is_logged_in(&ctx));
        assert!(!is_admin(&ctx));
        assert_eq!(user_type(&ctx), None);
        assert_eq!(user_id(&ctx), None);
        assert_eq!(dashboard_url(&ctx), HOME_URL);
        assert_eq!(redirect_if_logged_in(&ctx), None);
    }

    #[test]
    fn each_marker_counts_as_logged_in() {
        let contexts = [
            SessionContext {
                patient_id: Some(1),
                ..SessionContext::default()
            },
            SessionContext {
                user_id: Some(1),
                ..SessionContext::default()
            },
            SessionContext {
                hospital_id: Some(1),
                ..SessionContext::default()
            },
            SessionContext {
                pharmacy_id: Some(1),
                ..SessionContext::default()
            },
            SessionContext {
                admin_id: Some(1),
                ..SessionContext::default()
            },
        ];
        for ctx in contexts {
            assert!(is_logged_in(&ctx), "marker not recognized in {ctx:?}");
        }
    }

    #[test]
    fn user_type_is_always_a_single_variant() {
        // A session with every marker set still resolves to exactly one type.
        let ctx = SessionContext {
            patient_id: Some(1),
            user_id: Some(2),
            hospital_id: Some(3),
            pharmacy_id: Some(4),
            admin_id: Some(5),
            user_role: Some(ADMIN_ROLE_FLAG),
            role: Some("admin".into()),
        };
        assert_eq!(user_type(&ctx), Some(UserType::Admin));
    }

    #[test]
    fn hospital_marker_wins_over_admin_role_flag() {
        let ctx = SessionContext {
            hospital_id: Some(7),
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        assert_eq!(user_type(&ctx), Some(UserType::Hospital));
        assert_eq!(dashboard_url(&ctx), HOSPITAL_DASHBOARD_URL);
    }

    #[test]
    fn pharmacy_marker_wins_over_incidental_user_id() {
        let ctx = SessionContext {
            pharmacy_id: Some(9),
            user_id: Some(12),
            ..SessionContext::default()
        };
        assert_eq!(user_type(&ctx), Some(UserType::Pharmacy));
    }

    #[test]
    fn patient_with_admin_role_flag_resolves_to_admin() {
        let ctx = SessionContext {
            patient_id: Some(4),
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        assert_eq!(user_type(&ctx), Some(UserType::Admin));
        assert_eq!(dashboard_url(&ctx), ADMIN_URL);
    }

    #[test]
    fn plain_patient_resolves_to_patient() {
        let ctx = patient(4);
        assert_eq!(user_type(&ctx), Some(UserType::Patient));
        assert!(!is_admin(&ctx));
        assert_eq!(dashboard_url(&ctx), PATIENT_DASHBOARD_URL);
    }

    #[test]
    fn is_admin_requires_a_live_session() {
        // A bare role flag with no identity marker is not an admin.
        let ctx = SessionContext {
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        assert!(!is_logged_in(&ctx));
        assert!(!is_admin(&ctx));
    }

    #[test]
    fn is_admin_accepts_any_one_condition() {
        let by_flag = SessionContext {
            patient_id: Some(1),
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        let by_marker = SessionContext {
            admin_id: Some(1),
            ..SessionContext::default()
        };
        let by_role = SessionContext {
            user_id: Some(1),
            role: Some("super_admin".into()),
            ..SessionContext::default()
        };
        assert!(is_admin(&by_flag));
        assert!(is_admin(&by_marker));
        assert!(is_admin(&by_role));

        let unrelated_role = SessionContext {
            user_id: Some(1),
            role: Some("auditor".into()),
            ..SessionContext::default()
        };
        assert!(!is_admin(&unrelated_role));
    }

    #[test]
    fn user_id_follows_marker_precedence() {
        let ctx = SessionContext {
            admin_id: Some(10),
            patient_id: Some(20),
            user_id: Some(30),
            hospital_id: Some(40),
            pharmacy_id: Some(50),
            ..SessionContext::default()
        };
        assert_eq!(user_id(&ctx), Some(10));

        let ctx = SessionContext {
            user_id: Some(30),
            hospital_id: Some(40),
            ..SessionContext::default()
        };
        assert_eq!(user_id(&ctx), Some(30));
    }

    #[test]
    fn patient_scope_excludes_hospitals_and_pharmacies() {
        assert_eq!(patient_scope(&patient(4)), Some(4));

        let admin_as_patient = SessionContext {
            patient_id: Some(4),
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        assert_eq!(patient_scope(&admin_as_patient), Some(4));

        let hospital = SessionContext {
            hospital_id: Some(7),
            user_id: Some(4),
            ..SessionContext::default()
        };
        assert_eq!(patient_scope(&hospital), None);
    }

    #[test]
    fn require_login_denies_anonymous_and_runs_nothing() {
        let mut sentinel = false;
        match require_login(&anonymous(), LOGIN_URL) {
            AuthDecision::Allowed => {
                // Would be the guarded handler body.
                sentinel = true;
            }
            AuthDecision::Denied { redirect } => assert_eq!(redirect, LOGIN_URL),
        }
        assert!(!sentinel);
    }

    #[test]
    fn require_admin_denies_plain_patients() {
        assert_eq!(
            require_admin(&patient(4), LOGIN_URL),
            AuthDecision::Denied {
                redirect: LOGIN_URL
            }
        );
        let admin = SessionContext {
            admin_id: Some(1),
            ..SessionContext::default()
        };
        assert_eq!(require_admin(&admin, LOGIN_URL), AuthDecision::Allowed);
    }

    #[test]
    fn logged_in_visitors_are_sent_to_their_dashboard() {
        assert_eq!(
            redirect_if_logged_in(&patient(4)),
            Some(PATIENT_DASHBOARD_URL)
        );
        let admin_with_patient_marker = SessionContext {
            patient_id: Some(4),
            user_role: Some(ADMIN_ROLE_FLAG),
            ..SessionContext::default()
        };
        assert_eq!(
            redirect_if_logged_in(&admin_with_patient_marker),
            Some(ADMIN_URL)
        );
    }
}
