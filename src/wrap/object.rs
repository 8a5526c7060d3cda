use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

/// Signature every host callable shares.
pub type MethodFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut Value, Value) + Send + Sync>;

/// Bookkeeping attached to a wrapper so it can be detected and undone.
#[derive(Debug, Clone)]
pub struct WrapRecord {
    pub label: String,
    pub original: Method,
}

/// A callable with its own enumerable properties.
///
/// Cloning shares the function body; [`Method::same_fn`] compares bodies.
#[derive(Clone)]
pub struct Method {
    func: Arc<MethodFn>,
    props: Map<String, Value>,
    record: Option<Arc<WrapRecord>>,
}

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            props: Map::new(),
            record: None,
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.func)(args)
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    pub fn set_prop(&mut self, key: impl Into<String>, value: Value) {
        self.props.insert(key.into(), value);
    }

    pub fn wrap_record(&self) -> Option<&WrapRecord> {
        self.record.as_deref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.record.is_some()
    }

    pub fn same_fn(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn mark_wrapped(&mut self, record: WrapRecord) {
        self.record = Some(Arc::new(record));
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("props", &self.props)
            .field("wrapped", &self.record.as_ref().map(|r| r.label.as_str()))
            .finish()
    }
}

/// Get/set pair standing in for a plain data property.
#[derive(Clone)]
pub struct Accessor {
    get: Option<Getter>,
    set: Option<Setter>,
    stored: Arc<Mutex<Value>>,
}

impl Accessor {
    pub(crate) fn new(initial: Value, get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            get,
            set,
            stored: Arc::new(Mutex::new(initial)),
        }
    }

    /// The custom getter runs with the stored value unlocked, so it may
    /// read the owner again.
    pub fn read(&self) -> Value {
        let stored = self.stored.lock().clone();
        match &self.get {
            Some(get) => get(&stored),
            None => stored,
        }
    }

    pub fn write(&self, value: Value) {
        let next = match &self.set {
            Some(set) => {
                let mut next = self.stored.lock().clone();
                set(&mut next, value);
                next
            }
            None => value,
        };
        *self.stored.lock() = next;
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("custom_get", &self.get.is_some())
            .field("custom_set", &self.set.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Slot {
    Data(Value),
    Method(Method),
    Accessor(Accessor),
}

/// Shared, mutable owner of named slots: the surface of a loaded target
/// that instrumentation can patch. Clones alias the same slots.
#[derive(Debug, Clone, Default)]
pub struct Object {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(self, name: impl Into<String>, method: Method) -> Self {
        self.set_method(name, method);
        self
    }

    pub fn with_data(self, name: impl Into<String>, value: Value) -> Self {
        self.set_slot(name, Slot::Data(value));
        self
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.read().get(name).cloned()
    }

    pub fn set_slot(&self, name: impl Into<String>, slot: Slot) {
        self.slots.write().insert(name.into(), slot);
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        match self.slots.read().get(name) {
            Some(Slot::Method(m)) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn set_method(&self, name: impl Into<String>, method: Method) {
        self.set_slot(name, Slot::Method(method));
    }

    /// Reads a data or accessor property.
    pub fn get(&self, name: &str) -> Option<Value> {
        let slot = self.slot(name)?;
        match slot {
            Slot::Data(v) => Some(v),
            Slot::Accessor(acc) => Some(acc.read()),
            Slot::Method(_) => None,
        }
    }

    /// Writes a property; accessor slots route through their setter.
    /// Returns false when `name` holds a method.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut slots = self.slots.write();
        match slots.get(name) {
            Some(Slot::Method(_)) => false,
            Some(Slot::Accessor(acc)) => {
                let acc = acc.clone();
                drop(slots);
                acc.write(value);
                true
            }
            _ => {
                slots.insert(name.to_string(), Slot::Data(value));
                true
            }
        }
    }

    /// Calls the method stored under `name`. The slot lock is released
    /// before the body runs, so bodies may patch or call the owner again.
    pub fn call(&self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        match self.method(name) {
            Some(method) => method.call(args),
            None => anyhow::bail!("`{name}` is not a callable member"),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Copies the slot table. Slot contents are shared, not deep-copied.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot(self.slots.read().clone())
    }

    /// Puts every slot back the way `snapshot` saw it, dropping slots
    /// added since.
    pub fn restore(&self, snapshot: SlotSnapshot) {
        *self.slots.write() = snapshot.0;
    }
}

/// Saved slot table of an [`Object`].
#[derive(Debug, Clone)]
pub struct SlotSnapshot(HashMap<String, Slot>);

/// Whatever a target load produces.
#[derive(Debug, Clone)]
pub enum Export {
    Object(Object),
    Function(Method),
    Value(Value),
}

impl Export {
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Export::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Method> {
        match self {
            Export::Function(m) => Some(m),
            _ => None,
        }
    }
}
