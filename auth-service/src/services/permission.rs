//! Wildcard permission matching. A permission key is `resource:action`
//! (e.g. `invoices:read`). A grant of `resource:*` covers every action on
//! that resource; `*:*` covers everything.

const WILDCARD_ACTION: &str = "*";
const GLOBAL_WILDCARD: &str = "*:*";

/// Returns true if any of `granted` covers `required`.
pub fn is_permitted(granted: &[String], required: &str) -> bool {
    granted.iter().any(|g| grant_covers(g, required))
}

fn grant_covers(grant: &str, required: &str) -> bool {
    if grant == GLOBAL_WILDCARD || grant == required {
        return true;
    }

    let (Some((grant_resource, grant_action)), Some((req_resource, _req_action))) =
        (grant.split_once(':'), required.split_once(':'))
    else {
        return false;
    };

    grant_resource == req_resource && grant_action == WILDCARD_ACTION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_permitted() {
        let granted = vec!["invoices:read".to_string()];
        assert!(is_permitted(&granted, "invoices:read"));
        assert!(!is_permitted(&granted, "invoices:write"));
    }

    #[test]
    fn resource_wildcard_covers_all_actions() {
        let granted = vec!["invoices:*".to_string()];
        assert!(is_permitted(&granted, "invoices:read"));
        assert!(is_permitted(&granted, "invoices:delete"));
        assert!(!is_permitted(&granted, "payroll:read"));
    }

    #[test]
    fn global_wildcard_covers_everything() {
        let granted = vec!["*:*".to_string()];
        assert!(is_permitted(&granted, "invoices:read"));
        assert!(is_permitted(&granted, "anything:at-all"));
    }

    #[test]
    fn malformed_keys_never_match() {
        let granted = vec!["not-a-permission".to_string()];
        assert!(!is_permitted(&granted, "invoices:read"));
    }

    #[test]
    fn empty_grants_permit_nothing() {
        let granted: Vec<String> = vec![];
        assert!(!is_permitted(&granted, "invoices:read"));
    }
}
