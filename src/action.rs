//! Action registry: the atomic actions policy statements can grant, and the
//! convenience groups (`msg.*`, `js.*`, `kv.*`) that expand to them.

use crate::resource::ResourceType;

/// An atomic, resource-family-scoped action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Publish to a `msg` resource.
    MsgPub,
    /// Subscribe to a `msg` resource.
    MsgSub,
    /// Subscribe to a `msg` resource and receive the ability to reply.
    MsgService,
    /// Administer a JetStream stream (create/update/delete, consumer management).
    JsManage,
    /// Read JetStream stream/consumer metadata without consuming messages.
    JsView,
    /// Consume messages from a JetStream stream via a consumer.
    JsConsume,
    /// Read KV values.
    KvRead,
    /// Read and write KV values.
    KvEdit,
    /// Read KV bucket metadata without reading values.
    KvView,
    /// Administer a KV bucket (bucket-level stream management).
    KvManage,
}

impl Action {
    /// The resource family this action applies to.
    #[must_use]
    pub fn family(self) -> ResourceType {
        match self {
            Self::MsgPub | Self::MsgSub | Self::MsgService => ResourceType::Msg,
            Self::JsManage | Self::JsView | Self::JsConsume => ResourceType::Js,
            Self::KvRead | Self::KvEdit | Self::KvView | Self::KvManage => ResourceType::Kv,
        }
    }
}

/// Whether this action's permission mapping needs `$JS.API.INFO` visibility
/// (i.e. it touches JetStream or KV in any way).
#[must_use]
pub fn requires_stream_info(action: Action) -> bool {
    !matches!(action, Action::MsgPub | Action::MsgSub | Action::MsgService)
}

fn expand_token(token: &str) -> &'static [Action] {
    match token {
        "msg.pub" => &[Action::MsgPub],
        "msg.sub" => &[Action::MsgSub],
        "msg.service" => &[Action::MsgService],
        "msg.*" => &[Action::MsgPub, Action::MsgSub, Action::MsgService],
        "js.manage" => &[Action::JsManage],
        "js.view" => &[Action::JsView],
        "js.consume" => &[Action::JsConsume],
        "js.*" => &[Action::JsManage],
        "kv.read" => &[Action::KvRead],
        "kv.edit" => &[Action::KvEdit],
        "kv.view" => &[Action::KvView],
        "kv.manage" => &[Action::KvManage],
        "kv.*" => &[Action::KvManage],
        _ => &[],
    }
}

/// Expand a statement's raw action tokens into a deduplicated, order-stable
/// list of atomic actions. Unknown tokens are silently dropped.
#[must_use]
pub fn resolve_actions<S: AsRef<str>>(tokens: &[S]) -> Vec<Action> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for token in tokens {
        for action in expand_token(token.as_ref()) {
            if seen.insert(*action) {
                out.push(*action);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_msg_group_to_atoms() {
        let actions = resolve_actions(&["msg.*"]);
        assert_eq!(
            actions,
            vec![Action::MsgPub, Action::MsgSub, Action::MsgService]
        );
    }

    #[test]
    fn drops_unknown_tokens_silently() {
        let actions = resolve_actions(&["msg.pub", "not.a.real.action"]);
        assert_eq!(actions, vec![Action::MsgPub]);
    }

    #[test]
    fn dedups_across_explicit_and_group_tokens() {
        let actions = resolve_actions(&["msg.pub", "msg.*"]);
        assert_eq!(
            actions,
            vec![Action::MsgPub, Action::MsgSub, Action::MsgService]
        );
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let tokens = ["msg.*", "js.view"];
        let once = resolve_actions(&tokens);
        let token_strs: Vec<String> = once
            .iter()
            .map(|a| match a {
                Action::MsgPub => "msg.pub",
                Action::MsgSub => "msg.sub",
                Action::MsgService => "msg.service",
                Action::JsView => "js.view",
                _ => unreachable!(),
            })
            .map(str::to_string)
            .collect();
        let twice = resolve_actions(&token_strs);
        assert_eq!(once, twice);
    }

    #[test]
    fn stream_info_required_for_js_and_kv_actions() {
        assert!(!requires_stream_info(Action::MsgPub));
        assert!(!requires_stream_info(Action::MsgService));
        assert!(requires_stream_info(Action::JsView));
        assert!(requires_stream_info(Action::KvRead));
    }
}
