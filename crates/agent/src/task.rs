use nbx_core::Scope;

/// Build the single user message that starts a compliance session.
///
/// ```text
/// Check this compliance rule: <rule>
///
/// Scope: site=DM-Akron, rack=R01
/// Limit: Check up to 5 objects only (demo mode)
/// ```
///
/// The limit line is present only for a positive limit.
pub fn build_task_message(rule: &str, scope: &Scope, limit: Option<usize>) -> String {
    let mut message = format!("Check this compliance rule: {}\n\nScope: {}", rule, scope.render());
    if let Some(n) = limit.filter(|n| *n > 0) {
        message.push_str(&format!("\nLimit: Check up to {} objects only (demo mode)", n));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, &str)]) -> Scope {
        Scope::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_scope_rendered_in_insertion_order() {
        let msg = build_task_message(
            "every device must have a primary IP",
            &scope(&[("site", "DM-Akron"), ("rack", "R01"), ("device", "sw1")]),
            None,
        );
        assert_eq!(
            msg,
            "Check this compliance rule: every device must have a primary IP\n\n\
             Scope: site=DM-Akron, rack=R01, device=sw1"
        );
    }

    #[test]
    fn test_order_follows_scope_not_alphabet() {
        let msg = build_task_message("r", &scope(&[("rack", "R2"), ("device", "d")]), None);
        assert!(msg.ends_with("Scope: rack=R2, device=d"));
    }

    #[test]
    fn test_limit_line() {
        let s = scope(&[("site", "DM-Akron")]);
        assert!(build_task_message("r", &s, Some(5))
            .ends_with("\nLimit: Check up to 5 objects only (demo mode)"));
        assert!(!build_task_message("r", &s, Some(0)).contains("Limit:"));
        assert!(!build_task_message("r", &s, None).contains("Limit:"));
    }

    #[test]
    fn test_rule_passed_through_unmodified() {
        let rule = "  Interfaces named \"eth*\" need\nan IP  ";
        let msg = build_task_message(rule, &scope(&[("site", "x")]), None);
        assert!(msg.starts_with(&format!("Check this compliance rule: {}\n\n", rule)));
    }
}
