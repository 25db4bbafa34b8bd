//! Script values.
//!
//! - [`Value`]: anything that can sit in a stack slot
//! - [`TableRef`]: shared handle to a [`Table`]
//! - [`UserdataRef`]: shared handle to a native payload with a metatable
//! - [`Key`]: the hashable subset of values usable as table keys

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::error::{LuaError, LuaResult};
use crate::native_fn::NativeFn;

/// A script value.
///
/// Tables, functions and userdata are reference types: cloning a `Value`
/// clones the handle, not the contents.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(NativeFn),
    Userdata(UserdataRef),
}

impl Value {
    /// The script-visible type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Userdata(_) => "userdata",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Script truthiness: everything except `nil` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// The metatable attached to a table or userdata.
    pub fn metatable(&self) -> Option<TableRef> {
        match self {
            Value::Table(table) => table.metatable(),
            Value::Userdata(ud) => ud.metatable(),
            _ => None,
        }
    }

    /// Raw equality: by value for primitives, by identity for references.
    pub fn raw_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Userdata(a), Value::Userdata(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equal(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Number(v) => write!(f, "Number({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Table(t) => write!(f, "Table({:p})", t.as_ptr()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Userdata(ud) => write!(f, "Userdata({:p})", ud.as_ptr()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", format_number(*v)),
            Value::String(s) => write!(f, "{}", s),
            Value::Table(t) => write!(f, "table: {:p}", t.as_ptr()),
            Value::Function(func) => write!(f, "function: builtin: {}", func.name()),
            Value::Userdata(ud) => write!(f, "userdata: {:p}", ud.as_ptr()),
        }
    }
}

/// Format a number the way scripts print it: integral values without a
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<TableRef> for Value {
    fn from(value: TableRef) -> Self {
        Value::Table(value)
    }
}

impl From<NativeFn> for Value {
    fn from(value: NativeFn) -> Self {
        Value::Function(value)
    }
}

// ============================================================================
// Keys
// ============================================================================

/// A table key.
///
/// Only booleans, numbers and strings are hashable; NaN and nil are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(Rc<str>),
}

impl Key {
    pub fn from_value(value: &Value) -> LuaResult<Self> {
        match value {
            Value::Boolean(b) => Ok(Key::Boolean(*b)),
            Value::Number(n) if n.is_nan() => Err(LuaError::InvalidKey("NaN")),
            Value::Number(n) => Ok(Key::Number(OrderedFloat(*n))),
            Value::String(s) => Ok(Key::String(s.clone())),
            other => Err(LuaError::InvalidKey(other.type_name())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Boolean(b) => Value::Boolean(*b),
            Key::Number(n) => Value::Number(n.into_inner()),
            Key::String(s) => Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.into())
    }
}

// ============================================================================
// Tables
// ============================================================================

/// A hash table with an optional metatable.
#[derive(Debug, Default)]
pub struct Table {
    entries: FxHashMap<Key, Value>,
    metatable: Option<TableRef>,
    readonly: bool,
}

impl Table {
    pub fn get(&self, key: &Key) -> Value {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Assign `value` to `key`; assigning nil removes the entry.
    pub fn set(&mut self, key: Key, value: Value) -> LuaResult<()> {
        if self.readonly {
            return Err(LuaError::ReadOnly);
        }
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }
}

/// Shared handle to a [`Table`].
#[derive(Clone, Default)]
pub struct TableRef(Rc<RefCell<Table>>);

impl TableRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Key) -> Value {
        self.0.borrow().get(key)
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get(&Key::from(key))
    }

    pub fn set(&self, key: Key, value: Value) -> LuaResult<()> {
        self.0.borrow_mut().set(key, value)
    }

    pub fn set_str(&self, key: &str, value: Value) -> LuaResult<()> {
        self.set(Key::from(key), value)
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.0.borrow().metatable.clone()
    }

    /// Replace the metatable. Fails on read-only tables.
    pub fn set_metatable(&self, metatable: Option<TableRef>) -> LuaResult<()> {
        let mut table = self.0.borrow_mut();
        if table.readonly {
            return Err(LuaError::ReadOnly);
        }
        table.metatable = metatable;
        Ok(())
    }

    pub fn is_readonly(&self) -> bool {
        self.0.borrow().readonly
    }

    pub fn set_readonly(&self, readonly: bool) {
        self.0.borrow_mut().readonly = readonly;
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of the keys currently in the table.
    pub fn keys(&self) -> Vec<Key> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const RefCell<Table> {
        Rc::as_ptr(&self.0)
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRef")
            .field("len", &self.len())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

// ============================================================================
// Userdata
// ============================================================================

/// A native payload owned by the script, with an optional metatable.
pub struct Userdata {
    data: Box<dyn Any>,
    metatable: Option<TableRef>,
}

/// Shared handle to a [`Userdata`].
#[derive(Clone)]
pub struct UserdataRef(Rc<RefCell<Userdata>>);

impl UserdataRef {
    pub fn new<T: Any>(value: T, metatable: Option<TableRef>) -> Self {
        Self(Rc::new(RefCell::new(Userdata {
            data: Box::new(value),
            metatable,
        })))
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.0.borrow().metatable.clone()
    }

    pub fn set_metatable(&self, metatable: Option<TableRef>) {
        self.0.borrow_mut().metatable = metatable;
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.borrow().data.is::<T>()
    }

    /// Borrow the payload as `T`. Returns None if the payload has another type.
    pub fn borrow<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.borrow(), |ud| ud.data.downcast_ref::<T>()).ok()
    }

    /// Mutably borrow the payload as `T`.
    pub fn borrow_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.0.borrow_mut(), |ud| ud.data.downcast_mut::<T>()).ok()
    }

    pub fn ptr_eq(&self, other: &UserdataRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const RefCell<Userdata> {
        Rc::as_ptr(&self.0)
    }
}

impl fmt::Debug for UserdataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserdataRef").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Boolean(true).type_name(), "boolean");
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::from("s").type_name(), "string");
        assert_eq!(Value::Table(TableRef::new()).type_name(), "table");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn reference_equality() {
        let a = TableRef::new();
        let b = TableRef::new();
        assert_eq!(Value::Table(a.clone()), Value::Table(a));
        assert_ne!(Value::Table(b), Value::Table(TableRef::new()));
    }

    #[test]
    fn key_rejects_nil_and_nan() {
        assert!(matches!(
            Key::from_value(&Value::Nil),
            Err(LuaError::InvalidKey("nil"))
        ));
        assert!(matches!(
            Key::from_value(&Value::Number(f64::NAN)),
            Err(LuaError::InvalidKey("NaN"))
        ));
        assert_eq!(
            Key::from_value(&Value::Number(1.0)).unwrap().to_value(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn table_set_nil_removes() {
        let table = TableRef::new();
        table.set_str("a", Value::Number(1.0)).unwrap();
        assert_eq!(table.len(), 1);
        table.set_str("a", Value::Nil).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn readonly_table_rejects_writes() {
        let table = TableRef::new();
        table.set_readonly(true);
        assert_eq!(
            table.set_str("a", Value::Boolean(true)),
            Err(LuaError::ReadOnly)
        );
        assert_eq!(
            table.set_metatable(Some(TableRef::new())),
            Err(LuaError::ReadOnly)
        );
    }

    #[test]
    fn userdata_downcast() {
        let ud = UserdataRef::new(42i32, None);
        assert!(ud.is::<i32>());
        assert_eq!(*ud.borrow::<i32>().unwrap(), 42);
        assert!(ud.borrow::<String>().is_none());

        *ud.borrow_mut::<i32>().unwrap() = 7;
        assert_eq!(*ud.borrow::<i32>().unwrap(), 7);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }
}
