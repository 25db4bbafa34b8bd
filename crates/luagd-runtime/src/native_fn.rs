//! Native function storage and callable trait.

use std::fmt;
use std::rc::Rc;

use crate::error::LuaResult;
use crate::state::LuaState;
use crate::value::Value;

/// Trait for callable native functions.
///
/// A native function reads its arguments from the current frame of the
/// state (index 1 is the first argument), pushes its results and returns
/// how many it pushed. The results are the top `n` values of the frame.
pub trait NativeCallable {
    fn call(&self, state: &mut LuaState) -> LuaResult<usize>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut LuaState) -> LuaResult<usize>,
{
    fn call(&self, state: &mut LuaState) -> LuaResult<usize> {
        (self)(state)
    }
}

/// Type-erased native function with optional upvalues.
///
/// Cloning shares the callable and the upvalues.
#[derive(Clone)]
pub struct NativeFn {
    name: Rc<str>,
    inner: Rc<dyn NativeCallable>,
    upvalues: Rc<[Value]>,
}

impl NativeFn {
    /// Create a function without upvalues.
    ///
    /// `name` only shows up in diagnostics.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut LuaState) -> LuaResult<usize> + 'static,
    {
        Self::with_upvalues(name, f, Vec::new())
    }

    /// Create a closure; `upvalues` are visible through
    /// [`LuaState::upvalue`] while the function runs.
    pub fn with_upvalues<F>(name: &str, f: F, upvalues: Vec<Value>) -> Self
    where
        F: Fn(&mut LuaState) -> LuaResult<usize> + 'static,
    {
        Self::from_callable(name, f, upvalues)
    }

    /// Wrap any [`NativeCallable`], closure or not.
    pub fn from_callable<C>(name: &str, callable: C, upvalues: Vec<Value>) -> Self
    where
        C: NativeCallable + 'static,
    {
        Self {
            name: name.into(),
            inner: Rc::new(callable),
            upvalues: upvalues.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn upvalues(&self) -> Rc<[Value]> {
        Rc::clone(&self.upvalues)
    }

    pub(crate) fn callable(&self) -> Rc<dyn NativeCallable> {
        Rc::clone(&self.inner)
    }

    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) && Rc::ptr_eq(&self.upvalues, &other.upvalues)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("upvalues", &self.upvalues.len())
            .finish_non_exhaustive()
    }
}
