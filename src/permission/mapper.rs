//! Action→permission mapper: turns a resolved `(action, resource)` pair into
//! the concrete broker permissions it grants, using the reserved subject
//! templates of the JetStream/KV API namespace.

use crate::action::Action;
use crate::resource::{Resource, ResourceType};

use super::Permission;

fn kv_stream_name(bucket: &str) -> String {
    format!("KV_{bucket}")
}

fn js_stream_info(stream: &str) -> String {
    format!("$JS.API.STREAM.INFO.{stream}")
}

fn js_stream_list() -> &'static str {
    "$JS.API.STREAM.LIST"
}

fn js_stream_names() -> &'static str {
    "$JS.API.STREAM.NAMES"
}

fn js_stream_mgmt(stream: &str) -> String {
    format!("$JS.API.STREAM.*.{stream}")
}

fn js_stream_msg_mgmt(stream: &str) -> String {
    format!("$JS.API.STREAM.MSG.*.{stream}")
}

fn js_consumer_info(stream: &str, consumer: &str) -> String {
    format!("$JS.API.CONSUMER.INFO.{stream}.{consumer}")
}

fn js_consumer_create(stream: &str, consumer: &str) -> String {
    format!("$JS.API.CONSUMER.DURABLE.CREATE.{stream}.{consumer}")
}

fn js_consumer_next(stream: &str, consumer: &str) -> String {
    format!("$JS.API.CONSUMER.MSG.NEXT.{stream}.{consumer}")
}

fn js_consumer_list(stream: &str) -> String {
    format!("$JS.API.CONSUMER.LIST.{stream}")
}

fn js_consumer_names(stream: &str) -> String {
    format!("$JS.API.CONSUMER.NAMES.{stream}")
}

fn js_ack(stream: &str, consumer: &str) -> String {
    format!("$JS.ACK.{stream}.{consumer}.>")
}

fn js_fc(stream: &str) -> String {
    format!("$JS.FC.{stream}.>")
}

fn js_direct_get(stream: &str) -> String {
    format!("$JS.API.DIRECT.GET.{stream}")
}

fn kv_stream_info(bucket: &str) -> String {
    js_stream_info(&kv_stream_name(bucket))
}

fn kv_direct_get(bucket: &str, key: &str) -> String {
    format!("{}.$KV.{bucket}.{key}", js_direct_get(&kv_stream_name(bucket)))
}

fn kv_fc(bucket: &str) -> String {
    js_fc(&kv_stream_name(bucket))
}

fn kv_subject(bucket: &str, key: &str) -> String {
    format!("$KV.{bucket}.{key}")
}

/// The full consumer-facing permission set for a stream/consumer pair. When
/// `consumer` is absent, the wildcarded forms are emitted instead, plus the
/// consumer listing subjects (which only make sense unscoped).
fn consume_permission_set(stream: &str, consumer: Option<&str>) -> Vec<Permission> {
    let c = consumer.unwrap_or("*");
    let mut perms = vec![
        Permission::publish(js_consumer_info(stream, c)),
        Permission::publish(js_consumer_create(stream, c)),
        Permission::publish(js_consumer_next(stream, c)),
        Permission::publish(js_ack(stream, c)),
        Permission::publish(js_fc(stream)),
        Permission::publish(js_direct_get(stream)),
    ];
    if consumer.is_none() {
        perms.push(Permission::publish(js_consumer_list(stream)));
        perms.push(Permission::publish(js_consumer_names(stream)));
    }
    perms
}

fn js_manage_permissions(stream: &str) -> Vec<Permission> {
    let mut perms = consume_permission_set(stream, None);
    perms.push(Permission::publish(js_stream_mgmt(stream)));
    perms.push(Permission::publish(js_stream_msg_mgmt(stream)));
    if stream == "*" {
        perms.push(Permission::publish(js_stream_list()));
        perms.push(Permission::publish(js_stream_names()));
    }
    perms
}

fn js_view_permissions(resource: &Resource) -> Vec<Permission> {
    let stream = resource.identifier.as_str();
    let consumer = resource.sub_identifier.as_deref().unwrap_or("*");
    let mut perms = vec![
        Permission::publish(js_stream_info(stream)),
        Permission::publish(js_consumer_info(stream, consumer)),
        Permission::publish(js_consumer_list(stream)),
        Permission::publish(js_consumer_names(stream)),
    ];
    if stream == "*" {
        perms.push(Permission::publish(js_stream_list()));
        perms.push(Permission::publish(js_stream_names()));
    }
    perms
}

fn kv_admin_permissions(bucket: &str, key: Option<&str>) -> Vec<Permission> {
    let k = key.unwrap_or(">");
    vec![
        Permission::publish(kv_stream_info(bucket)),
        Permission::publish(kv_direct_get(bucket, k)),
        Permission::publish(js_consumer_create(&kv_stream_name(bucket), "*")),
        Permission::publish(kv_fc(bucket)),
    ]
}

fn kv_read_permissions(bucket: &str, key: Option<&str>) -> Vec<Permission> {
    let k = key.unwrap_or(">");
    let mut perms = kv_admin_permissions(bucket, key);
    perms.push(Permission::subscribe(kv_subject(bucket, k), None));
    perms
}

/// Map a resolved action/resource pair to the permissions it grants. Returns
/// an empty list when the action's family doesn't match the resource's.
#[must_use]
pub fn map_action_to_permissions(action: Action, resource: &Resource) -> Vec<Permission> {
    if action.family() != resource.kind {
        return Vec::new();
    }

    match action {
        Action::MsgPub => vec![Permission::publish(resource.identifier.clone())],
        Action::MsgSub => vec![Permission::subscribe(
            resource.identifier.clone(),
            resource.sub_identifier.clone(),
        )],
        Action::MsgService => vec![
            Permission::subscribe(resource.identifier.clone(), resource.sub_identifier.clone()),
            Permission::responses(),
        ],
        Action::JsManage => js_manage_permissions(&resource.identifier),
        Action::JsView => js_view_permissions(resource),
        Action::JsConsume => {
            consume_permission_set(&resource.identifier, resource.sub_identifier.as_deref())
        }
        Action::KvRead => {
            kv_read_permissions(&resource.identifier, resource.sub_identifier.as_deref())
        }
        Action::KvEdit => {
            let bucket = &resource.identifier;
            let key = resource.sub_identifier.as_deref().unwrap_or(">");
            let mut perms = kv_read_permissions(bucket, resource.sub_identifier.as_deref());
            perms.push(Permission::publish(kv_subject(bucket, key)));
            perms
        }
        Action::KvView => {
            kv_admin_permissions(&resource.identifier, resource.sub_identifier.as_deref())
        }
        Action::KvManage => {
            let bucket = &resource.identifier;
            let mut perms = kv_read_permissions(bucket, resource.sub_identifier.as_deref());
            perms.push(Permission::publish(js_stream_mgmt(&kv_stream_name(bucket))));
            perms
        }
    }
}

/// `$JS.API.INFO`, granted once per compilation whenever at least one
/// JetStream/KV action was resolved (see [`crate::action::requires_stream_info`]).
#[must_use]
pub fn js_api_info_permission() -> Permission {
    Permission::publish("$JS.API.INFO".to_string())
}
