//! `evaluate(policy, server_name, tool_name) -> Verdict`: first-match-wins
//! server and tool rule lookup, fail-closed when no server matches.

use super::{glob::glob_match, Action, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
    Passthrough,
}

/// Walk server policies in declared order; within the first matching server,
/// walk tool rules in declared order. Fails closed when no server matches.
pub fn evaluate(policy: &Policy, server_name: &str, tool_name: Option<&str>) -> Verdict {
    let Some(server) = policy
        .servers
        .iter()
        .find(|s| glob_match(&s.server, server_name))
    else {
        return Verdict::Deny;
    };

    let Some(tool_name) = tool_name else {
        return Verdict::Passthrough;
    };

    for rule in &server.tools {
        if glob_match(&rule.tool, tool_name) {
            return action_to_verdict(rule.action);
        }
    }

    action_to_verdict(server.default)
}

fn action_to_verdict(action: Action) -> Verdict {
    match action {
        Action::Allow => Verdict::Allow,
        Action::Deny => Verdict::Deny,
    }
}
