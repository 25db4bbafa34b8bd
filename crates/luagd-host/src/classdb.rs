//! Class database and object storage of the reference host.
//!
//! Classes are plain tables of named methods over a property bag; objects
//! are property bags keyed by [`ObjectId`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use luagd_core::{HostError, ObjectId, Variant, Vector2};
use rustc_hash::FxHashMap;

/// Native implementation of a class method.
///
/// Runs while the object table is locked: it may query class metadata
/// through the [`ClassDb`] but must not touch other objects.
pub type MethodFn =
    Arc<dyn Fn(&ClassDb, &mut ObjectData, &[Variant]) -> Result<Variant, HostError> + Send + Sync>;

/// State of one live object.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub id: ObjectId,
    pub class: String,
    properties: FxHashMap<String, Variant>,
}

impl ObjectData {
    pub fn get(&self, property: &str) -> Variant {
        self.properties.get(property).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, property: &str, value: Variant) {
        self.properties.insert(property.to_owned(), value);
    }
}

/// A class definition.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    parent: Option<String>,
    instantiable: bool,
    methods: FxHashMap<String, MethodFn>,
    defaults: Vec<(String, Variant)>,
}

impl ClassDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            instantiable: true,
            methods: FxHashMap::default(),
            defaults: Vec::new(),
        }
    }

    pub fn inherits(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_owned());
        self
    }

    /// Mark the class as abstract: it can be inherited but not constructed.
    pub fn not_instantiable(mut self) -> Self {
        self.instantiable = false;
        self
    }

    /// Initial value of a property on every new instance.
    pub fn property(mut self, name: &str, value: impl Into<Variant>) -> Self {
        self.defaults.push((name.to_owned(), value.into()));
        self
    }

    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ClassDb, &mut ObjectData, &[Variant]) -> Result<Variant, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.to_owned(), Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("instantiable", &self.instantiable)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Registered classes plus the live object table.
#[derive(Debug, Default)]
pub struct ClassDb {
    classes: FxHashMap<String, ClassDef>,
    objects: Mutex<FxHashMap<ObjectId, ObjectData>>,
    next_id: AtomicU64,
}

impl ClassDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class.
    pub fn register(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Whether `class` is `ancestor` or derives from it.
    pub fn is_parent_class(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.classes.get(name).and_then(ClassDef::parent);
        }
        false
    }

    fn objects(&self) -> MutexGuard<'_, FxHashMap<ObjectId, ObjectData>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an instance of `class` with its (inherited) default properties.
    pub fn instantiate(&self, class: &str) -> Result<ObjectId, HostError> {
        let def = self
            .classes
            .get(class)
            .ok_or_else(|| HostError::ClassNotFound(class.to_owned()))?;
        if !def.instantiable {
            return Err(HostError::NotInstantiable(class.to_owned()));
        }

        let mut chain = Vec::new();
        let mut current = Some(def);
        while let Some(def) = current {
            chain.push(def);
            current = def.parent().and_then(|parent| self.classes.get(parent));
        }

        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut object = ObjectData {
            id,
            class: class.to_owned(),
            properties: FxHashMap::default(),
        };
        // Root first so derived defaults win.
        for def in chain.iter().rev() {
            for (name, value) in &def.defaults {
                object.set(name, value.clone());
            }
        }

        self.objects().insert(id, object);
        Ok(id)
    }

    /// Call `method` as declared on `class` (or one of its ancestors).
    pub fn call(
        &self,
        object: ObjectId,
        class: &str,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        let mut objects = self.objects();
        let data = objects
            .get_mut(&object)
            .ok_or(HostError::InvalidObject(object.0))?;

        if !self.is_parent_class(&data.class, class) {
            return Err(HostError::call_failed(
                method,
                format!("object of class {} is not a {}", data.class, class),
            ));
        }

        let mut current = self.classes.get(class);
        while let Some(def) = current {
            if let Some(f) = def.methods.get(method) {
                return f(self, data, args);
            }
            current = def.parent().and_then(|parent| self.classes.get(parent));
        }
        Err(HostError::method_not_found(class, method))
    }

    pub fn class_of(&self, object: ObjectId) -> Result<String, HostError> {
        self.objects()
            .get(&object)
            .map(|data| data.class.clone())
            .ok_or(HostError::InvalidObject(object.0))
    }

    /// Snapshot of an object's state.
    pub fn object(&self, object: ObjectId) -> Option<ObjectData> {
        self.objects().get(&object).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects().len()
    }

    /// Free an object. Returns false if it was not alive.
    pub fn free(&self, object: ObjectId) -> bool {
        self.objects().remove(&object).is_some()
    }

    /// The built-in hierarchy: `Object`, `RefCounted`, `Node`,
    /// `CanvasItem` (abstract) and `Node2D`.
    pub fn with_core_classes() -> Self {
        let mut db = Self::new();
        db.register(object_class());
        db.register(
            ClassDef::new("RefCounted")
                .inherits("Object")
                .method("get_reference_count", |_, _, _| Ok(Variant::Int(1))),
        );
        db.register(node_class());
        db.register(
            ClassDef::new("CanvasItem")
                .inherits("Node")
                .not_instantiable()
                .property("visible", true)
                .method("show", |_, obj, _| {
                    obj.set("visible", Variant::Bool(true));
                    Ok(Variant::Nil)
                })
                .method("hide", |_, obj, _| {
                    obj.set("visible", Variant::Bool(false));
                    Ok(Variant::Nil)
                })
                .method("is_visible", |_, obj, _| Ok(obj.get("visible"))),
        );
        db.register(node2d_class());
        db
    }
}

// ============================================================================
// Core Classes
// ============================================================================

fn invalid(method: &str, index: usize, reason: &str) -> HostError {
    HostError::InvalidArgument {
        method: method.to_owned(),
        index,
        reason: reason.to_owned(),
    }
}

fn string_arg(method: &str, args: &[Variant], index: usize) -> Result<String, HostError> {
    args.get(index)
        .and_then(Variant::as_str)
        .map(str::to_owned)
        .ok_or_else(|| invalid(method, index, "expected a string"))
}

fn int_arg(method: &str, args: &[Variant], index: usize) -> Result<i64, HostError> {
    args.get(index)
        .and_then(Variant::as_int)
        .ok_or_else(|| invalid(method, index, "expected an int"))
}

fn object_class() -> ClassDef {
    ClassDef::new("Object")
        .method("get_class", |_, obj, _| {
            Ok(Variant::String(obj.class.clone()))
        })
        .method("is_class", |db, obj, args| {
            let name = string_arg("is_class", args, 0)?;
            Ok(Variant::Bool(db.is_parent_class(&obj.class, &name)))
        })
        .method("get_instance_id", |_, obj, _| {
            Ok(Variant::Int(obj.id.0 as i64))
        })
        .method("set_meta", |_, obj, args| {
            let name = string_arg("set_meta", args, 0)?;
            let value = args.get(1).cloned().unwrap_or_default();
            obj.set(&format!("meta/{name}"), value);
            Ok(Variant::Nil)
        })
        .method("get_meta", |_, obj, args| {
            let name = string_arg("get_meta", args, 0)?;
            match obj.properties.get(&format!("meta/{name}")) {
                Some(value) => Ok(value.clone()),
                None => Ok(args.get(1).cloned().unwrap_or_default()),
            }
        })
        .method("notify", |_, obj, args| {
            let what = int_arg("notify", args, 0)?;
            obj.set("last_notification", Variant::Int(what));
            Ok(Variant::Int(args.len() as i64 - 1))
        })
}

fn node_class() -> ClassDef {
    ClassDef::new("Node")
        .inherits("Object")
        .property("name", Variant::StringName(String::new()))
        .property("child_count", 0_i64)
        .property("process_mode", 0_i64)
        .method("set_name", |_, obj, args| {
            let name = string_arg("set_name", args, 0)?;
            obj.set("name", Variant::StringName(name));
            Ok(Variant::Nil)
        })
        .method("get_name", |_, obj, _| Ok(obj.get("name")))
        .method("add_child", |_, obj, args| {
            match args.first() {
                Some(Variant::Object(child)) if *child == obj.id => {
                    return Err(invalid("add_child", 0, "can't add a node as its own child"));
                }
                Some(Variant::Object(_)) => {}
                _ => return Err(invalid("add_child", 0, "expected a Node")),
            }
            let count = obj.get("child_count").as_int().unwrap_or(0);
            obj.set("child_count", Variant::Int(count + 1));
            Ok(Variant::Nil)
        })
        .method("get_child_count", |_, obj, _| Ok(obj.get("child_count")))
        .method("set_process_mode", |_, obj, args| {
            let mode = int_arg("set_process_mode", args, 0)?;
            if !(0..=4).contains(&mode) {
                return Err(invalid("set_process_mode", 0, "unknown process mode"));
            }
            obj.set("process_mode", Variant::Int(mode));
            Ok(Variant::Nil)
        })
        .method("get_process_mode", |_, obj, _| Ok(obj.get("process_mode")))
}

fn node2d_class() -> ClassDef {
    ClassDef::new("Node2D")
        .inherits("CanvasItem")
        .property("position", Vector2::ZERO)
        .property("rotation", 0.0_f64)
        .method("set_position", |_, obj, args| match args.first() {
            Some(Variant::Vector2(position)) => {
                obj.set("position", Variant::Vector2(*position));
                Ok(Variant::Nil)
            }
            _ => Err(invalid("set_position", 0, "expected a Vector2")),
        })
        .method("get_position", |_, obj, _| Ok(obj.get("position")))
        .method("rotate", |_, obj, args| {
            let radians = args
                .first()
                .and_then(Variant::as_float)
                .ok_or_else(|| invalid("rotate", 0, "expected a float"))?;
            let current = obj.get("rotation").as_float().unwrap_or(0.0);
            obj.set("rotation", Variant::Float(current + radians));
            Ok(Variant::Nil)
        })
        .method("get_rotation", |_, obj, _| Ok(obj.get("rotation")))
}
