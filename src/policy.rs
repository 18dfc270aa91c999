//! Policy compiler: turns the policies bound to a role into permission
//! grants, collecting non-fatal warnings for anything skipped along the way.

use crate::action::{requires_stream_info, resolve_actions};
use crate::context::RequestContext;
use crate::model::PolicyRecord;
use crate::permission::{js_api_info_permission, map_action_to_permissions, PermissionSet};
use crate::resource::{parse_resource, validate as validate_resource};
use crate::template::{contains_variables, interpolate_with_context, InterpolationOutcome};

/// Compile `policies` against `ctx`, accumulating grants into `set`.
/// Returns human-readable warnings for anything skipped (mismatched account,
/// unresolved template, invalid resource) — these never abort compilation.
#[must_use]
pub fn compile(policies: &[PolicyRecord], ctx: &RequestContext, set: &mut PermissionSet) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut granted_stream_info = false;

    if !ctx.user_id.is_empty() {
        set.allow(crate::permission::Permission::subscribe(
            format!("_INBOX_{}.>", ctx.user_id),
            None,
        ));
    }

    for policy in policies {
        if ctx.account_id.is_empty() {
            warnings.push("policy skipped (missing account.id)".to_string());
            continue;
        }
        if policy.account != "*" && policy.account != ctx.account_id {
            warnings.push(format!(
                "policy {} skipped (account mismatch: policy={}, request={})",
                policy.id, policy.account, ctx.account_id
            ));
            continue;
        }

        for statement in &policy.statements {
            if statement.effect != "allow" {
                continue;
            }

            let actions = resolve_actions(&statement.actions);

            for raw_resource in &statement.resources {
                let resolved = if contains_variables(raw_resource) {
                    match interpolate_with_context(raw_resource, ctx) {
                        InterpolationOutcome::Ok(value) => value,
                        InterpolationOutcome::Excluded(reason) => {
                            warnings.push(format!("resource excluded: {raw_resource} ({reason})"));
                            continue;
                        }
                    }
                } else {
                    raw_resource.clone()
                };

                let resource = match parse_resource(&resolved).and_then(|r| {
                    validate_resource(&r)?;
                    Ok(r)
                }) {
                    Ok(r) => r,
                    Err(e) => {
                        warnings.push(format!("invalid resource {resolved}: {e}"));
                        continue;
                    }
                };

                for action in &actions {
                    let perms = map_action_to_permissions(*action, &resource);
                    if perms.is_empty() {
                        continue;
                    }
                    if requires_stream_info(*action) && !granted_stream_info {
                        set.allow(js_api_info_permission());
                        granted_stream_info = true;
                    }
                    for perm in perms {
                        set.allow(perm);
                    }
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatementRecord;
    use std::collections::HashMap;

    fn ctx() -> RequestContext {
        RequestContext {
            user_id: "alice".to_string(),
            user_account: "ACME".to_string(),
            user_attrs: HashMap::new(),
            role_name: "reader".to_string(),
            role_account: "ACME".to_string(),
            account_id: "ACME".to_string(),
        }
    }

    fn policy(account: &str, effect: &str, actions: &[&str], resources: &[&str]) -> PolicyRecord {
        PolicyRecord {
            id: "p1".to_string(),
            account: account.to_string(),
            name: "p1".to_string(),
            statements: vec![StatementRecord {
                effect: effect.to_string(),
                actions: actions.iter().map(|s| (*s).to_string()).collect(),
                resources: resources.iter().map(|s| (*s).to_string()).collect(),
            }],
        }
    }

    #[test]
    fn grants_inbox_subscription_unconditionally() {
        let mut set = PermissionSet::new();
        compile(&[], &ctx(), &mut set);
        let out = set.serialize();
        assert!(out.subscribe.allow.iter().any(|s| s == "_INBOX_alice.>"));
    }

    #[test]
    fn compiles_matching_policy() {
        let mut set = PermissionSet::new();
        let warnings = compile(
            &[policy("ACME", "allow", &["msg.pub"], &["msg:orders.new"])],
            &ctx(),
            &mut set,
        );
        assert!(warnings.is_empty());
        let out = set.serialize();
        assert!(out.publish.allow.iter().any(|s| s == "orders.new"));
    }

    #[test]
    fn skips_policy_with_account_mismatch() {
        let mut set = PermissionSet::new();
        let warnings = compile(
            &[policy("OTHER", "allow", &["msg.pub"], &["msg:orders.new"])],
            &ctx(),
            &mut set,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("account mismatch"));
    }

    #[test]
    fn global_policy_applies_to_any_account() {
        let mut set = PermissionSet::new();
        let warnings = compile(
            &[policy("*", "allow", &["msg.pub"], &["msg:public.>"])],
            &ctx(),
            &mut set,
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn skips_statement_with_non_allow_effect() {
        let mut set = PermissionSet::new();
        compile(
            &[policy("ACME", "deny", &["msg.pub"], &["msg:orders.new"])],
            &ctx(),
            &mut set,
        );
        let out = set.serialize();
        assert!(!out.publish.allow.iter().any(|s| s == "orders.new"));
    }

    #[test]
    fn warns_and_skips_unresolvable_template() {
        let mut set = PermissionSet::new();
        let warnings = compile(
            &[policy(
                "ACME",
                "allow",
                &["msg.pub"],
                &["msg:{{ user.attr.missing }}.>"],
            )],
            &ctx(),
            &mut set,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("resource excluded"));
    }

    #[test]
    fn warns_and_skips_invalid_resource() {
        let mut set = PermissionSet::new();
        let warnings = compile(
            &[policy("ACME", "allow", &["js.manage"], &["js:orders.>"])],
            &ctx(),
            &mut set,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid resource"));
    }

    #[test]
    fn grants_stream_info_once_per_compilation() {
        let mut set = PermissionSet::new();
        compile(
            &[policy(
                "ACME",
                "allow",
                &["js.view"],
                &["js:orders", "js:invoices"],
            )],
            &ctx(),
            &mut set,
        );
        let out = set.serialize();
        let count = out
            .publish
            .allow
            .iter()
            .filter(|s| *s == "$JS.API.INFO")
            .count();
        assert_eq!(count, 1);
    }
}
