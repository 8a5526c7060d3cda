use serde_json::Value;
use tracing::{debug, trace};

use super::object::{Accessor, Export, Getter, Method, Object, Setter, Slot, WrapRecord};

/// Replaces `owner.name` with `make_wrapper(original)`.
///
/// Missing or non-callable members are skipped. If the slot already holds
/// a wrapper the existing one is returned untouched. Every property of the
/// original is copied onto the replacement.
pub fn wrap_method<F>(owner: &Object, label: &str, name: &str, make_wrapper: F) -> Option<Method>
where
    F: FnOnce(Method) -> Method,
{
    let original = match owner.slot(name) {
        Some(Slot::Method(m)) => m,
        Some(_) => {
            debug!(label, name, "not wrapping non-callable member");
            return None;
        }
        None => {
            debug!(label, name, "not wrapping missing member");
            return None;
        }
    };

    if original.is_wrapped() {
        trace!(label, name, "member already wrapped");
        return Some(original);
    }

    let mut wrapper = make_wrapper(original.clone());
    for (key, value) in original.props() {
        wrapper.set_prop(key.clone(), value.clone());
    }
    wrapper.mark_wrapped(WrapRecord {
        label: label.to_string(),
        original,
    });

    owner.set_method(name, wrapper.clone());
    trace!(label, name, "wrapped member");
    Some(wrapper)
}

/// Puts the original back if `owner.name` currently holds one of our
/// wrappers. Returns whether anything was restored.
pub fn unwrap_method(owner: &Object, label: &str, name: &str) -> bool {
    let Some(current) = owner.method(name) else {
        return false;
    };
    let Some(record) = current.wrap_record() else {
        trace!(label, name, "nothing to unwrap");
        return false;
    };
    owner.set_method(name, record.original.clone());
    trace!(label, name, "unwrapped member");
    true
}

/// Substitutes a whole export.
pub fn wrap_export<F>(original: Export, make_replacement: F) -> Export
where
    F: FnOnce(Export) -> Export,
{
    make_replacement(original)
}

/// Turns a plain data property into an accessor pair. Omitted pieces pass
/// the stored value through. Returns whether the property was replaced;
/// false means a missing owner/name or a conflicting existing member.
pub fn wrap_deprecated(
    owner: Option<&Object>,
    label: Option<&str>,
    name: Option<&str>,
    get: Option<Getter>,
    set: Option<Setter>,
) -> bool {
    let (Some(owner), Some(name)) = (owner, name) else {
        return false;
    };
    let label = label.unwrap_or("unlabeled");

    let initial = match owner.slot(name) {
        Some(Slot::Data(v)) => v,
        None => Value::Null,
        Some(_) => {
            debug!(label, name, "property already has a non-data descriptor");
            return false;
        }
    };

    owner.set_slot(name, Slot::Accessor(Accessor::new(initial, get, set)));
    trace!(label, name, "replaced data property with accessor");
    true
}
