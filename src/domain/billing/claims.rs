//! Authorization claims derived from billing state.
//!
//! Claims are recomputed wholesale from the user document on every
//! transition. The four owned keys always overwrite whatever the identity
//! provider had; any other existing claim is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::BillingUser;

/// Role assigned when neither the user document nor existing claims have one.
pub const DEFAULT_ROLE: &str = "regular";

/// Gender values mirrored into claims.
pub const ALLOWED_GENDERS: [&str; 2] = ["masculino", "femenino"];

/// Custom-claim keys owned by billing.
pub const OWNED_CLAIM_KEYS: [&str; 4] = [
    "role",
    "hasActiveSubscription",
    "hasAntiGhostingInsurance",
    "gender",
];

/// Custom claims pushed to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationClaims {
    pub role: String,
    pub has_active_subscription: bool,
    pub has_anti_ghosting_insurance: bool,
    pub gender: Option<String>,
}

impl AuthorizationClaims {
    /// Projects a user document onto claims, falling back to `existing` for
    /// role and gender.
    pub fn derive(user: &BillingUser, existing: &Map<String, Value>) -> Self {
        let role = non_blank(user.role.as_deref())
            .or_else(|| non_blank(existing.get("role").and_then(Value::as_str)))
            .unwrap_or(DEFAULT_ROLE)
            .to_string();

        let gender = allowed_gender(user.gender.as_deref())
            .or_else(|| allowed_gender(existing.get("gender").and_then(Value::as_str)))
            .map(str::to_string);

        Self {
            role,
            has_active_subscription: user.billing.has_active_subscription,
            has_anti_ghosting_insurance: user.billing.has_anti_ghosting_insurance,
            gender,
        }
    }

    /// Overlays the owned keys onto an existing claims map.
    pub fn merge_into(&self, mut existing: Map<String, Value>) -> Map<String, Value> {
        existing.insert("role".to_string(), Value::String(self.role.clone()));
        existing.insert(
            "hasActiveSubscription".to_string(),
            Value::Bool(self.has_active_subscription),
        );
        existing.insert(
            "hasAntiGhostingInsurance".to_string(),
            Value::Bool(self.has_anti_ghosting_insurance),
        );
        existing.insert(
            "gender".to_string(),
            self.gender
                .as_ref()
                .map(|g| Value::String(g.clone()))
                .unwrap_or(Value::Null),
        );
        existing
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn allowed_gender(value: Option<&str>) -> Option<&str> {
    value.filter(|v| ALLOWED_GENDERS.contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{CanonicalEvent, Money, Provider};
    use crate::domain::foundation::UserId;
    use serde_json::json;

    fn user() -> BillingUser {
        BillingUser::new(UserId::new("user123").unwrap())
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn fresh_user_gets_default_role_and_no_access() {
        let claims = AuthorizationClaims::derive(&user(), &Map::new());

        assert_eq!(claims.role, "regular");
        assert!(!claims.has_active_subscription);
        assert!(!claims.has_anti_ghosting_insurance);
        assert_eq!(claims.gender, None);
    }

    #[test]
    fn reflects_billing_flags() {
        let mut user = user();
        user.billing.apply(
            Provider::Stripe,
            &CanonicalEvent::InsurancePurchased {
                user_id: user.user_id.clone(),
                payment_id: "pi_1".to_string(),
                amount: Money::from_minor_units(12000, "eur").unwrap(),
            },
        );

        let claims = AuthorizationClaims::derive(&user, &Map::new());

        assert!(claims.has_anti_ghosting_insurance);
        assert!(!claims.has_active_subscription);
    }

    #[test]
    fn document_role_wins_over_existing_claim() {
        let user = user().with_role("admin");
        let existing = as_map(json!({ "role": "regular" }));

        assert_eq!(AuthorizationClaims::derive(&user, &existing).role, "admin");
    }

    #[test]
    fn existing_role_is_kept_when_document_has_none() {
        let existing = as_map(json!({ "role": "concierge" }));

        assert_eq!(
            AuthorizationClaims::derive(&user(), &existing).role,
            "concierge"
        );
    }

    #[test]
    fn unknown_gender_is_not_mirrored() {
        let user = user().with_gender("otro");

        assert_eq!(AuthorizationClaims::derive(&user, &Map::new()).gender, None);
    }

    #[test]
    fn allowed_gender_is_mirrored() {
        let user = user().with_gender("femenino");

        assert_eq!(
            AuthorizationClaims::derive(&user, &Map::new()).gender.as_deref(),
            Some("femenino")
        );
    }

    #[test]
    fn existing_gender_is_used_as_fallback() {
        let existing = as_map(json!({ "gender": "masculino" }));

        assert_eq!(
            AuthorizationClaims::derive(&user(), &existing).gender.as_deref(),
            Some("masculino")
        );
    }

    #[test]
    fn merge_preserves_unrelated_claims_and_overwrites_owned_ones() {
        let existing = as_map(json!({
            "hasActiveSubscription": true,
            "betaTester": true,
        }));
        let claims = AuthorizationClaims::derive(&user(), &existing);

        let merged = claims.merge_into(existing);

        assert_eq!(merged["betaTester"], json!(true));
        assert_eq!(merged["hasActiveSubscription"], json!(false));
        assert_eq!(merged["gender"], Value::Null);
        for key in OWNED_CLAIM_KEYS {
            assert!(merged.contains_key(key));
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let claims = AuthorizationClaims::derive(&user(), &Map::new());
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["hasActiveSubscription"], json!(false));
        assert_eq!(json["hasAntiGhostingInsurance"], json!(false));
    }
}
