//! The script state: value stack, call frames, globals and registry.
//!
//! Indexing follows the runtime's calling convention:
//!
//! - positive indices count from the bottom of the current frame (1 is the
//!   first argument of the running native function),
//! - negative indices count from the top of the stack (-1 is the top),
//! - 0 is never valid.
//!
//! A native function consumes its arguments in place, pushes its results
//! and reports how many it pushed. [`LuaState::call`] then replaces the
//! function and its arguments with those results.

use std::any::{Any, TypeId};
use std::rc::Rc;

use log::trace;
use rustc_hash::FxHashMap;

use crate::error::{LuaError, LuaResult};
use crate::native_fn::NativeFn;
use crate::value::{Key, TableRef, UserdataRef, Value, format_number};

/// Maximum depth of nested native calls.
pub const MAX_CALL_DEPTH: usize = 200;

/// Maximum length of an `__index` chain.
const MAX_INDEX_CHAIN: usize = 100;

/// Request every result of a call.
pub const MULTRET: Option<usize> = None;

struct Frame {
    /// Absolute slot of the first argument.
    base: usize,
    upvalues: Rc<[Value]>,
}

/// A script execution state.
pub struct LuaState {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: TableRef,
    /// Named metatables (`luaL_newmetatable` registry).
    registry: FxHashMap<String, TableRef>,
    app_data: FxHashMap<TypeId, Box<dyn Any>>,
    /// Method name of the namecall in progress.
    namecall: Option<Rc<str>>,
}

impl LuaState {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: TableRef::new(),
            registry: FxHashMap::default(),
            app_data: FxHashMap::default(),
            namecall: None,
        }
    }

    // ==========================================================================
    // Stack Geometry
    // ==========================================================================

    fn base(&self) -> usize {
        self.frames.last().map(|frame| frame.base).unwrap_or(0)
    }

    /// Number of values in the current frame.
    pub fn get_top(&self) -> i32 {
        (self.stack.len() - self.base()) as i32
    }

    /// Grow (with nils) or shrink the current frame to `top` values.
    /// Negative values are relative to the current top.
    pub fn set_top(&mut self, top: i32) -> LuaResult<()> {
        let base = self.base();
        let new_len = if top >= 0 {
            base + top as usize
        } else {
            self.abs_index(top)? + 1
        };
        self.stack.resize(new_len, Value::Nil);
        Ok(())
    }

    /// Convert a stack index into an absolute slot.
    fn abs_index(&self, index: i32) -> LuaResult<usize> {
        let base = self.base();
        let len = self.stack.len();
        let slot = if index > 0 {
            base + index as usize - 1
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            if back > len - base {
                return Err(LuaError::InvalidIndex(index));
            }
            len - back
        } else {
            return Err(LuaError::InvalidIndex(index));
        };
        if slot >= len {
            return Err(LuaError::InvalidIndex(index));
        }
        Ok(slot)
    }

    /// Normalize a possibly negative index into a positive one for the
    /// current frame.
    pub fn absolute(&self, index: i32) -> LuaResult<i32> {
        Ok((self.abs_index(index)? - self.base() + 1) as i32)
    }

    /// The value at `index`, or None if the index is outside the frame.
    pub fn value(&self, index: i32) -> Option<&Value> {
        self.abs_index(index).ok().map(|slot| &self.stack[slot])
    }

    fn value_or_nil(&self, index: i32) -> Value {
        self.value(index).cloned().unwrap_or_default()
    }

    /// Script type name at `index`; `"no value"` outside the frame.
    pub fn type_name(&self, index: i32) -> &'static str {
        self.value(index).map_or("no value", Value::type_name)
    }

    pub fn is_none(&self, index: i32) -> bool {
        self.value(index).is_none()
    }

    pub fn is_none_or_nil(&self, index: i32) -> bool {
        self.value(index).is_none_or(Value::is_nil)
    }

    // ==========================================================================
    // Push / Pop
    // ==========================================================================

    pub fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }

    pub fn push_nil(&mut self) {
        self.stack.push(Value::Nil);
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.stack.push(Value::Boolean(value));
    }

    pub fn push_number(&mut self, value: f64) {
        self.stack.push(Value::Number(value));
    }

    pub fn push_string(&mut self, value: &str) {
        self.stack.push(Value::String(value.into()));
    }

    pub fn push_function(&mut self, function: NativeFn) {
        self.stack.push(Value::Function(function));
    }

    /// Push a copy of the value at `index`.
    pub fn push_value(&mut self, index: i32) -> LuaResult<()> {
        let slot = self.abs_index(index)?;
        let value = self.stack[slot].clone();
        self.stack.push(value);
        Ok(())
    }

    /// Pop `n` values. Popping more than the frame holds is an error.
    pub fn pop(&mut self, n: usize) -> LuaResult<()> {
        if n > self.get_top() as usize {
            return Err(LuaError::InvalidIndex(-(n as i32)));
        }
        let len = self.stack.len();
        self.stack.truncate(len - n);
        Ok(())
    }

    /// Pop and return the top value.
    pub fn pop_value(&mut self) -> LuaResult<Value> {
        if self.get_top() == 0 {
            return Err(LuaError::InvalidIndex(-1));
        }
        Ok(self.stack.pop().unwrap_or_default())
    }

    /// Remove the value at `index`, shifting the values above it down.
    pub fn remove(&mut self, index: i32) -> LuaResult<()> {
        let slot = self.abs_index(index)?;
        self.stack.remove(slot);
        Ok(())
    }

    /// Move the top value into `index`, shifting the values above it up.
    pub fn insert(&mut self, index: i32) -> LuaResult<()> {
        let slot = self.abs_index(index)?;
        let top = self.pop_value()?;
        self.stack.insert(slot, top);
        Ok(())
    }

    // ==========================================================================
    // Reading Values
    // ==========================================================================

    pub fn to_boolean(&self, index: i32) -> bool {
        self.value(index).is_some_and(Value::is_truthy)
    }

    /// Number at `index`; numeric strings are converted.
    pub fn to_number(&self, index: i32) -> Option<f64> {
        match self.value(index)? {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String at `index`; numbers are converted.
    pub fn to_str(&self, index: i32) -> Option<Rc<str>> {
        match self.value(index)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n).into()),
            _ => None,
        }
    }

    pub fn to_table(&self, index: i32) -> Option<TableRef> {
        match self.value(index)? {
            Value::Table(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn to_userdata(&self, index: i32) -> Option<UserdataRef> {
        match self.value(index)? {
            Value::Userdata(ud) => Some(ud.clone()),
            _ => None,
        }
    }

    /// Build an argument type error for `index`.
    pub fn arg_error(&self, index: i32, expected: impl Into<String>) -> LuaError {
        LuaError::ArgumentType {
            index,
            expected: expected.into(),
            actual: self.type_name(index),
        }
    }

    pub fn check_number(&self, index: i32) -> LuaResult<f64> {
        self.to_number(index).ok_or_else(|| self.arg_error(index, "number"))
    }

    /// Number at `index` truncated toward zero.
    pub fn check_integer(&self, index: i32) -> LuaResult<i64> {
        let n = self.check_number(index)?;
        if !n.is_finite() {
            return Err(self.arg_error(index, "integer"));
        }
        Ok(n.trunc() as i64)
    }

    pub fn check_string(&self, index: i32) -> LuaResult<Rc<str>> {
        self.to_str(index).ok_or_else(|| self.arg_error(index, "string"))
    }

    pub fn check_table(&self, index: i32) -> LuaResult<TableRef> {
        self.to_table(index).ok_or_else(|| self.arg_error(index, "table"))
    }

    // ==========================================================================
    // Tables and Metatables
    // ==========================================================================

    pub fn globals(&self) -> TableRef {
        self.globals.clone()
    }

    /// Push a new empty table and return a handle to it.
    pub fn new_table(&mut self) -> TableRef {
        let table = TableRef::new();
        self.stack.push(Value::Table(table.clone()));
        table
    }

    /// Push `t[key]` for the value at `index`, honoring `__index`.
    pub fn get_field(&mut self, index: i32, key: &str) -> LuaResult<()> {
        let target = self.value_or_nil(index);
        let value = self.index_value(&target, Value::from(key))?;
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value and store it as `t[key]` in the table at `index`.
    pub fn set_field(&mut self, index: i32, key: &str) -> LuaResult<()> {
        let table = self.check_table(index)?;
        let value = self.pop_value()?;
        table.set_str(key, value)
    }

    /// Push the global `name`.
    pub fn get_global(&mut self, name: &str) -> LuaResult<()> {
        let value = self.index_value(&Value::Table(self.globals.clone()), Value::from(name))?;
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value and assign it to the global `name`.
    pub fn set_global(&mut self, name: &str) -> LuaResult<()> {
        let value = self.pop_value()?;
        self.globals.set_str(name, value)
    }

    /// Pop a table (or nil) and make it the metatable of the table or
    /// userdata at `index`.
    pub fn set_metatable(&mut self, index: i32) -> LuaResult<()> {
        let target = self.value_or_nil(index);
        let metatable = match self.pop_value()? {
            Value::Nil => None,
            Value::Table(t) => Some(t),
            other => {
                let found = other.type_name();
                return Err(LuaError::runtime(format!("metatable must be a table, got {found}")));
            }
        };
        match target {
            Value::Table(t) => t.set_metatable(metatable),
            Value::Userdata(ud) => {
                ud.set_metatable(metatable);
                Ok(())
            }
            other => Err(LuaError::runtime(format!(
                "cannot set the metatable of a {} value",
                other.type_name()
            ))),
        }
    }

    /// Create or fetch the named metatable and push it.
    ///
    /// Returns false if a metatable with this name already existed.
    pub fn new_metatable(&mut self, name: &str) -> bool {
        if let Some(existing) = self.registry.get(name) {
            self.stack.push(Value::Table(existing.clone()));
            return false;
        }
        let table = TableRef::new();
        self.registry.insert(name.to_owned(), table.clone());
        self.stack.push(Value::Table(table));
        true
    }

    /// Push the named metatable (or nil). Returns whether it exists.
    pub fn get_metatable_named(&mut self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(mt) => {
                self.stack.push(Value::Table(mt.clone()));
                true
            }
            None => {
                self.stack.push(Value::Nil);
                false
            }
        }
    }

    /// The named metatable, without touching the stack.
    pub fn metatable_named(&self, name: &str) -> Option<TableRef> {
        self.registry.get(name).cloned()
    }

    pub fn set_readonly(&mut self, index: i32, readonly: bool) -> LuaResult<()> {
        self.check_table(index)?.set_readonly(readonly);
        Ok(())
    }

    pub fn is_readonly(&self, index: i32) -> bool {
        self.to_table(index).is_some_and(|t| t.is_readonly())
    }

    /// Push a new userdata carrying `value`, with no metatable.
    pub fn new_userdata<T: Any>(&mut self, value: T) -> UserdataRef {
        let ud = UserdataRef::new(value, None);
        self.stack.push(Value::Userdata(ud.clone()));
        ud
    }

    /// Userdata at `index` whose metatable is the one registered as
    /// `metatable_name` (`luaL_testudata`).
    pub fn test_udata(&self, index: i32, metatable_name: &str) -> Option<UserdataRef> {
        let ud = self.to_userdata(index)?;
        let expected = self.registry.get(metatable_name)?;
        match ud.metatable() {
            Some(mt) if mt.ptr_eq(expected) => Some(ud),
            _ => None,
        }
    }

    /// Like [`test_udata`](Self::test_udata), raising an argument error
    /// naming `metatable_name` on mismatch.
    pub fn check_udata(&self, index: i32, metatable_name: &str) -> LuaResult<UserdataRef> {
        self.test_udata(index, metatable_name).ok_or_else(|| self.arg_error(index, metatable_name))
    }

    /// Raw field of the metatable of `value`.
    pub fn metafield(&self, value: &Value, event: &str) -> Option<Value> {
        let mt = value.metatable()?;
        match mt.get_str(event) {
            Value::Nil => None,
            field => Some(field),
        }
    }

    /// `target[key]` with `__index` resolution.
    pub fn index_value(&mut self, target: &Value, key: Value) -> LuaResult<Value> {
        let mut current = target.clone();
        for _ in 0..MAX_INDEX_CHAIN {
            if let Value::Table(table) = &current {
                let raw = table.get(&Key::from_value(&key)?);
                if !raw.is_nil() {
                    return Ok(raw);
                }
            }

            let handler = match self.metafield(&current, "__index") {
                Some(handler) => handler,
                None => {
                    return match current {
                        Value::Table(_) => Ok(Value::Nil),
                        other => Err(LuaError::NotIndexable(other.type_name())),
                    };
                }
            };

            match handler {
                Value::Function(f) => {
                    self.push_function(f);
                    self.stack.push(current);
                    self.stack.push(key);
                    self.call(2, Some(1))?;
                    return self.pop_value();
                }
                next => current = next,
            }
        }
        Err(LuaError::runtime("'__index' chain too long; possible loop"))
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Call the function sitting below the top `nargs` values.
    ///
    /// On return the function and its arguments are replaced by the results:
    /// exactly `nresults` of them (padded with nil), or all of them with
    /// [`MULTRET`]. On error the function and its arguments are discarded.
    pub fn call(&mut self, nargs: usize, nresults: Option<usize>) -> LuaResult<()> {
        let func_slot = self
            .stack
            .len()
            .checked_sub(nargs + 1)
            .filter(|slot| *slot >= self.base())
            .ok_or(LuaError::InvalidIndex(-(nargs as i32) - 1))?;

        let callee = self.stack[func_slot].clone();
        let function = match callee {
            Value::Function(f) => f,
            other => match self.metafield(&other, "__call") {
                Some(Value::Function(f)) => {
                    // The called object becomes the first argument.
                    self.stack.insert(func_slot, Value::Function(f.clone()));
                    f
                }
                _ => {
                    self.stack.truncate(func_slot);
                    return Err(LuaError::NotCallable(other.type_name()));
                }
            },
        };

        self.invoke(func_slot, function, nresults)
    }

    fn invoke(
        &mut self,
        func_slot: usize,
        function: NativeFn,
        nresults: Option<usize>,
    ) -> LuaResult<()> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            self.stack.truncate(func_slot);
            return Err(LuaError::StackOverflow(MAX_CALL_DEPTH));
        }

        trace!(
            "call {} ({} args)",
            function.name(),
            self.stack.len() - func_slot - 1
        );

        let base = func_slot + 1;
        self.frames.push(Frame {
            base,
            upvalues: function.upvalues(),
        });
        let outcome = function.callable().call(self);
        self.frames.pop();

        let pushed = match outcome {
            Ok(pushed) => pushed,
            Err(err) => {
                self.stack.truncate(func_slot);
                return Err(err);
            }
        };

        let top = self.stack.len();
        if top < base || pushed > top - base {
            self.stack.truncate(func_slot);
            return Err(LuaError::runtime(format!(
                "{} returned {} results but left fewer on the stack",
                function.name(),
                pushed
            )));
        }

        let mut results: Vec<Value> = self.stack.drain(top - pushed..).collect();
        self.stack.truncate(func_slot);
        if let Some(wanted) = nresults {
            results.resize(wanted, Value::Nil);
        }
        self.stack.extend(results);
        Ok(())
    }

    /// Invoke method `method` on the value below the top `nargs` values.
    ///
    /// If the receiver's metatable has `__namecall`, it is called with the
    /// receiver and the arguments while [`namecall_atom`](Self::namecall_atom)
    /// reports `method`. Otherwise `receiver[method]` is looked up and
    /// called with the receiver as the first argument.
    pub fn call_method(
        &mut self,
        method: &str,
        nargs: usize,
        nresults: Option<usize>,
    ) -> LuaResult<()> {
        let self_slot = self
            .stack
            .len()
            .checked_sub(nargs + 1)
            .filter(|slot| *slot >= self.base())
            .ok_or(LuaError::InvalidIndex(-(nargs as i32) - 1))?;
        let receiver = self.stack[self_slot].clone();

        let function = match self.metafield(&receiver, "__namecall") {
            Some(Value::Function(f)) => {
                let previous = self.namecall.replace(method.into());
                self.stack.insert(self_slot, Value::Function(f));
                let result = self.call(nargs + 1, nresults);
                self.namecall = previous;
                return result;
            }
            _ => match self.index_value(&receiver, Value::from(method)) {
                Ok(function) => function,
                Err(err) => {
                    self.stack.truncate(self_slot);
                    return Err(err);
                }
            },
        };

        self.stack.insert(self_slot, function);
        self.call(nargs + 1, nresults)
    }

    /// Method name of the namecall being dispatched, if any.
    pub fn namecall_atom(&self) -> Option<Rc<str>> {
        self.namecall.clone()
    }

    /// Upvalue `n` (1-based) of the running native function.
    pub fn upvalue(&self, n: usize) -> Option<Value> {
        let frame = self.frames.last()?;
        n.checked_sub(1).and_then(|i| frame.upvalues.get(i)).cloned()
    }

    /// Render the value at `index` for printing, honoring `__tostring`.
    pub fn to_display_string(&mut self, index: i32) -> LuaResult<String> {
        let value = self.value_or_nil(index);
        if let Some(Value::Function(f)) = self.metafield(&value, "__tostring") {
            self.push_function(f);
            self.stack.push(value);
            self.call(1, Some(1))?;
            let rendered = self.to_str(-1).map(|s| s.to_string());
            self.pop(1)?;
            return rendered.ok_or_else(|| LuaError::runtime("'__tostring' must return a string"));
        }
        Ok(value.to_string())
    }

    /// Compare two values, honoring `__eq` for userdata and tables that
    /// share the same handler.
    pub fn equal(&mut self, index1: i32, index2: i32) -> LuaResult<bool> {
        let a = self.value_or_nil(index1);
        let b = self.value_or_nil(index2);
        if a.raw_equal(&b) {
            return Ok(true);
        }
        let same_kind = matches!(
            (&a, &b),
            (Value::Userdata(_), Value::Userdata(_)) | (Value::Table(_), Value::Table(_))
        );
        if !same_kind {
            return Ok(false);
        }
        match (self.metafield(&a, "__eq"), self.metafield(&b, "__eq")) {
            (Some(Value::Function(fa)), Some(Value::Function(fb))) if fa.ptr_eq(&fb) => {
                self.push_function(fa);
                self.stack.push(a);
                self.stack.push(b);
                self.call(2, Some(1))?;
                let result = self.to_boolean(-1);
                self.pop(1)?;
                Ok(result)
            }
            _ => Ok(false),
        }
    }

    // ==========================================================================
    // Application Data
    // ==========================================================================

    /// Attach embedder data to the state, replacing any previous value of
    /// the same type.
    pub fn set_app_data<T: Any>(&mut self, data: T) {
        self.app_data.insert(TypeId::of::<T>(), Box::new(data));
    }

    pub fn app_data<T: Any>(&self) -> Option<&T> {
        self.app_data
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T>())
    }

    pub fn remove_app_data<T: Any>(&mut self) -> Option<T> {
        self.app_data
            .remove(&TypeId::of::<T>())
            .and_then(|data| data.downcast::<T>().ok())
            .map(|data| *data)
    }
}

impl Default for LuaState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LuaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaState")
            .field("stack_len", &self.stack.len())
            .field("depth", &self.frames.len())
            .field("metatables", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &mut LuaState) -> LuaResult<usize> {
        let a = state.check_number(1)?;
        let b = state.check_number(2)?;
        state.push_number(a + b);
        Ok(1)
    }

    #[test]
    fn indices_are_frame_relative() {
        let mut state = LuaState::new();
        state.push_number(1.0);
        state.push_number(2.0);
        state.push_string("three");

        assert_eq!(state.get_top(), 3);
        assert_eq!(state.to_number(1), Some(1.0));
        assert_eq!(state.to_str(-1).as_deref(), Some("three"));
        assert_eq!(state.absolute(-2).unwrap(), 2);
        assert!(state.value(0).is_none());
        assert!(state.value(4).is_none());
        assert_eq!(state.type_name(4), "no value");
    }

    #[test]
    fn set_top_grows_and_shrinks() {
        let mut state = LuaState::new();
        state.set_top(3).unwrap();
        assert_eq!(state.get_top(), 3);
        assert!(state.is_none_or_nil(2));

        state.set_top(-2).unwrap();
        assert_eq!(state.get_top(), 2);
        state.set_top(0).unwrap();
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn insert_and_remove() {
        let mut state = LuaState::new();
        state.push_number(1.0);
        state.push_number(2.0);
        state.push_number(3.0);

        state.insert(1).unwrap();
        assert_eq!(state.to_number(1), Some(3.0));
        assert_eq!(state.to_number(3), Some(2.0));

        state.remove(1).unwrap();
        assert_eq!(state.get_top(), 2);
        assert_eq!(state.to_number(1), Some(1.0));
    }

    #[test]
    fn pop_past_frame_fails() {
        let mut state = LuaState::new();
        state.push_nil();
        assert!(state.pop(2).is_err());
        assert!(state.pop(1).is_ok());
    }

    #[test]
    fn call_replaces_function_and_args() {
        let mut state = LuaState::new();
        state.push_string("below");
        state.push_function(NativeFn::new("add", add));
        state.push_number(2.0);
        state.push_number(3.5);

        state.call(2, Some(1)).unwrap();
        assert_eq!(state.get_top(), 2);
        assert_eq!(state.to_number(-1), Some(5.5));
        assert_eq!(state.to_str(1).as_deref(), Some("below"));
    }

    #[test]
    fn call_pads_results() {
        let mut state = LuaState::new();
        state.push_function(NativeFn::new("add", add));
        state.push_number(1.0);
        state.push_number(1.0);

        state.call(2, Some(3)).unwrap();
        assert_eq!(state.get_top(), 3);
        assert!(state.is_none_or_nil(3));
    }

    #[test]
    fn call_error_unwinds() {
        let mut state = LuaState::new();
        state.push_function(NativeFn::new("add", add));
        state.push_number(1.0);
        state.push_boolean(true);

        let err = state.call(2, Some(1)).unwrap_err();
        assert_eq!(
            err,
            LuaError::ArgumentType {
                index: 2,
                expected: "number".into(),
                actual: "boolean",
            }
        );
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn calling_a_non_function_fails() {
        let mut state = LuaState::new();
        state.push_number(4.0);
        assert_eq!(state.call(0, None), Err(LuaError::NotCallable("number")));
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn recursion_is_bounded() {
        fn recurse(state: &mut LuaState) -> LuaResult<usize> {
            state.get_global("recurse")?;
            state.call(0, Some(0))?;
            Ok(0)
        }

        let mut state = LuaState::new();
        state.push_function(NativeFn::new("recurse", recurse));
        state.set_global("recurse").unwrap();
        state.get_global("recurse").unwrap();

        assert_eq!(
            state.call(0, Some(0)),
            Err(LuaError::StackOverflow(MAX_CALL_DEPTH))
        );
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn upvalues_visible_during_call() {
        let mut state = LuaState::new();
        let f = NativeFn::with_upvalues(
            "greet",
            |state: &mut LuaState| {
                let name = state.upvalue(1).unwrap_or_default();
                state.push(name);
                Ok(1)
            },
            vec![Value::from("Node2D")],
        );
        state.push_function(f);
        state.call(0, Some(1)).unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("Node2D"));
        assert!(state.upvalue(1).is_none());
    }

    #[test]
    fn index_function_receives_key() {
        let mut state = LuaState::new();
        let target = state.new_table();
        let mt = TableRef::new();
        mt.set_str(
            "__index",
            Value::Function(NativeFn::new("index", |state: &mut LuaState| {
                let key = state.check_string(2)?;
                state.push_string(&format!("<{key}>"));
                Ok(1)
            })),
        )
        .unwrap();
        target.set_metatable(Some(mt)).unwrap();
        target.set_str("present", Value::from(1.0)).unwrap();

        state.get_field(-1, "present").unwrap();
        assert_eq!(state.to_number(-1), Some(1.0));
        state.get_field(-2, "missing").unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("<missing>"));
    }

    #[test]
    fn index_table_chain() {
        let mut state = LuaState::new();
        let base = TableRef::new();
        base.set_str("inherited", Value::from(true)).unwrap();
        let mt = TableRef::new();
        mt.set_str("__index", Value::Table(base)).unwrap();

        let child = state.new_table();
        child.set_metatable(Some(mt)).unwrap();
        state.get_field(-1, "inherited").unwrap();
        assert!(state.to_boolean(-1));
    }

    #[test]
    fn indexing_a_number_fails() {
        let mut state = LuaState::new();
        state.push_number(1.0);
        assert_eq!(
            state.get_field(-1, "x"),
            Err(LuaError::NotIndexable("number"))
        );
    }

    #[test]
    fn named_metatables() {
        let mut state = LuaState::new();
        assert!(state.new_metatable("Vector2"));
        assert!(!state.new_metatable("Vector2"));
        let first = state.to_table(-2).unwrap();
        let second = state.to_table(-1).unwrap();
        assert!(first.ptr_eq(&second));
        state.pop(2).unwrap();

        assert!(!state.get_metatable_named("Color"));
        assert_eq!(state.type_name(-1), "nil");
    }

    #[test]
    fn test_udata_checks_metatable_identity() {
        let mut state = LuaState::new();
        state.new_metatable("Tagged");
        let tagged = state.to_table(-1).unwrap();
        state.pop(1).unwrap();

        let ud = state.new_userdata(7_u32);
        ud.set_metatable(Some(tagged));
        assert!(state.test_udata(-1, "Tagged").is_some());
        assert!(state.test_udata(-1, "Other").is_none());

        state.new_userdata(8_u32);
        assert!(state.test_udata(-1, "Tagged").is_none());
        let err = state.check_udata(2, "Tagged").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument #2 (Tagged expected, got userdata)"
        );
    }

    #[test]
    fn readonly_tables_reject_writes() {
        let mut state = LuaState::new();
        state.new_table();
        state.set_readonly(-1, true).unwrap();
        assert!(state.is_readonly(-1));

        state.push_number(1.0);
        assert_eq!(state.set_field(-2, "x"), Err(LuaError::ReadOnly));
    }

    #[test]
    fn namecall_dispatch_sets_atom() {
        let mut state = LuaState::new();
        let mt = TableRef::new();
        mt.set_str(
            "__namecall",
            Value::Function(NativeFn::new("namecall", |state: &mut LuaState| {
                let method = state.namecall_atom().unwrap_or_else(|| "?".into());
                let argc = state.get_top() - 1;
                state.push_string(&format!("{method}/{argc}"));
                Ok(1)
            })),
        )
        .unwrap();
        let ud = state.new_userdata(());
        ud.set_metatable(Some(mt));
        state.push_number(1.0);

        state.call_method("length", 1, Some(1)).unwrap();
        assert_eq!(state.to_str(-1).as_deref(), Some("length/1"));
        assert!(state.namecall_atom().is_none());
    }

    #[test]
    fn method_call_falls_back_to_index() {
        let mut state = LuaState::new();
        let object = state.new_table();
        object
            .set_str(
                "count",
                Value::Function(NativeFn::new("count", |state: &mut LuaState| {
                    state.check_table(1)?;
                    state.push_number((state.get_top() - 1) as f64);
                    Ok(1)
                })),
            )
            .unwrap();
        state.push_nil();
        state.push_nil();

        state.call_method("count", 2, Some(1)).unwrap();
        assert_eq!(state.to_number(-1), Some(2.0));
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn tostring_and_eq_metamethods() {
        let mut state = LuaState::new();
        let mt = TableRef::new();
        mt.set_str(
            "__tostring",
            Value::Function(NativeFn::new("tostring", |state: &mut LuaState| {
                state.push_string("thing");
                Ok(1)
            })),
        )
        .unwrap();
        mt.set_str(
            "__eq",
            Value::Function(NativeFn::new("eq", |state: &mut LuaState| {
                state.push_boolean(true);
                Ok(1)
            })),
        )
        .unwrap();

        let a = state.new_userdata(1_i32);
        a.set_metatable(Some(mt.clone()));
        let b = state.new_userdata(2_i32);
        b.set_metatable(Some(mt));

        assert_eq!(state.to_display_string(-1).unwrap(), "thing");
        assert!(state.equal(1, 2).unwrap());

        state.push_number(1.0);
        assert!(!state.equal(1, 3).unwrap());
    }

    #[test]
    fn app_data_by_type() {
        let mut state = LuaState::new();
        state.set_app_data(5_u64);
        state.set_app_data(String::from("host"));
        assert_eq!(state.app_data::<u64>(), Some(&5));
        assert_eq!(state.remove_app_data::<String>().as_deref(), Some("host"));
        assert!(state.app_data::<String>().is_none());
    }
}
