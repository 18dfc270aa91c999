//! Permission aggregator: collects the permissions the mapper emits across a
//! compilation into per-kind allow-lists, removes entries already covered by
//! a broader wildcard, and serializes the result into broker credential
//! shape.

mod mapper;

use std::collections::HashSet;

use serde::Serialize;

pub use mapper::{js_api_info_permission, map_action_to_permissions};

/// The three kinds of broker permission a [`Permission`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    /// Publish permission on a subject.
    Pub,
    /// Subscribe permission on a subject, optionally scoped to a queue group.
    Sub,
    /// The ability to reply to a request (no subject of its own).
    Resp,
}

/// A single grant. Two permissions are equal iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    /// Which allow-list this permission belongs to.
    pub kind: PermissionKind,
    /// The subject this permission grants, empty for `Resp`.
    pub subject: String,
    /// Queue group, only meaningful for `Sub` permissions.
    pub queue: Option<String>,
}

impl Permission {
    /// Build a publish permission.
    #[must_use]
    pub fn publish(subject: impl Into<String>) -> Self {
        Self {
            kind: PermissionKind::Pub,
            subject: subject.into(),
            queue: None,
        }
    }

    /// Build a subscribe permission, optionally scoped to a queue group.
    #[must_use]
    pub fn subscribe(subject: impl Into<String>, queue: Option<String>) -> Self {
        Self {
            kind: PermissionKind::Sub,
            subject: subject.into(),
            queue,
        }
    }

    /// Build the response-permission sentinel.
    #[must_use]
    pub fn responses() -> Self {
        Self {
            kind: PermissionKind::Resp,
            subject: String::new(),
            queue: None,
        }
    }
}

/// The accumulated permission grants for one user's compiled session, keyed
/// by kind.
#[derive(Debug, Default)]
pub struct PermissionSet {
    pub_allow: HashSet<Permission>,
    sub_allow: HashSet<Permission>,
    allow_responses: bool,
}

impl PermissionSet {
    /// An empty permission set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission, routing it into the list its kind belongs to.
    pub fn allow(&mut self, permission: Permission) {
        match permission.kind {
            PermissionKind::Pub => {
                self.pub_allow.insert(permission);
            }
            PermissionKind::Sub => {
                self.sub_allow.insert(permission);
            }
            PermissionKind::Resp => {
                self.allow_responses = true;
            }
        }
    }

    /// Remove every permission already covered by a broader wildcard
    /// permission of the same kind. Idempotent: deduplicating an
    /// already-deduplicated set is a no-op.
    pub fn deduplicate(&mut self) {
        self.pub_allow = dedup(&self.pub_allow, false);
        self.sub_allow = dedup(&self.sub_allow, true);
    }

    /// Serialize into the broker credential shape: allow-lists plus a
    /// deny-all wildcard for any kind whose allow-list ended up empty.
    #[must_use]
    pub fn serialize(&self) -> SerializedPermissions {
        let mut pub_subjects: Vec<String> = self.pub_allow.iter().map(|p| p.subject.clone()).collect();
        pub_subjects.sort();

        let mut sub_subjects: Vec<String> = self
            .sub_allow
            .iter()
            .map(|p| match &p.queue {
                Some(q) => format!("{} {q}", p.subject),
                None => p.subject.clone(),
            })
            .collect();
        sub_subjects.sort();

        SerializedPermissions {
            publish: AllowDenyList::new(pub_subjects),
            subscribe: AllowDenyList::new(sub_subjects),
            allow_responses: self.allow_responses,
        }
    }
}

/// Whether `q` covers `p`: every subject `p` would match is also matched by
/// `q`, and (for subscribe permissions) `q`'s queue group is compatible with
/// `p`'s.
fn covers(q: &Permission, p: &Permission, is_sub: bool) -> bool {
    if q == p {
        return false;
    }
    if is_sub && !queue_covers(&q.queue, &p.queue) {
        return false;
    }
    subject_covers(&q.subject, &p.subject)
}

fn queue_covers(q_queue: &Option<String>, p_queue: &Option<String>) -> bool {
    match (q_queue, p_queue) {
        (None, _) => true,
        (Some(a), Some(b)) => a == b,
        (Some(_), None) => false,
    }
}

fn subject_covers(q: &str, p: &str) -> bool {
    let qt: Vec<&str> = q.split('.').collect();
    let pt: Vec<&str> = p.split('.').collect();
    let q_gt = qt.last() == Some(&">");
    let p_gt = pt.last() == Some(&">");

    if p_gt {
        if !q_gt {
            return false;
        }
        let qp = &qt[..qt.len() - 1];
        let pp = &pt[..pt.len() - 1];
        qp.len() <= pp.len() && qp.iter().zip(pp.iter()).all(|(a, b)| a == b || *a == "*")
    } else if q_gt {
        let qp = &qt[..qt.len() - 1];
        pt.len() > qp.len() && qp.iter().zip(pt.iter()).all(|(a, b)| a == b || *a == "*" || *b == "*")
    } else {
        qt.len() == pt.len() && qt.iter().zip(pt.iter()).all(|(a, b)| a == b || *a == "*" || *b == "*")
    }
}

fn dedup(set: &HashSet<Permission>, is_sub: bool) -> HashSet<Permission> {
    let items: Vec<&Permission> = set.iter().collect();
    items
        .iter()
        .filter(|p| !items.iter().any(|q| covers(q, p, is_sub)))
        .map(|p| (*p).clone())
        .collect()
}

/// An allow-list with a deny-all wildcard present iff the allow-list is
/// empty.
#[derive(Debug, Clone, Serialize)]
pub struct AllowDenyList {
    /// Allowed subjects (or `subject queue` pairs for subscribe lists).
    pub allow: Vec<String>,
    /// `Some([">"])` when `allow` is empty; omitted from the wire shape
    /// otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
}

impl AllowDenyList {
    fn new(allow: Vec<String>) -> Self {
        let deny = allow.is_empty().then(|| vec![">".to_string()]);
        Self { allow, deny }
    }
}

/// The broker-credential-shaped serialization of a [`PermissionSet`].
#[derive(Debug, Clone, Serialize)]
pub struct SerializedPermissions {
    /// Publish allow/deny list.
    #[serde(rename = "pub")]
    pub publish: AllowDenyList,
    /// Subscribe allow/deny list.
    #[serde(rename = "sub")]
    pub subscribe: AllowDenyList,
    /// Whether the response permission was granted.
    pub allow_responses: bool,
}
