//! Binding registry: per-type binding tables built from the API description.
//!
//! Built once from an [`ExtensionApi`] and immutable afterwards. All tables
//! are keyed by [`TypeHash`]:
//!
//! - builtins by type name, their constants/methods/members by
//!   `(type, name)`
//! - classes by class name, their methods by `(class, name)`
//!
//! Classes are kept in parents-first order, computed with a topological sort
//! over the inheritance graph.
//!
//! [`BindingRegistry::shared`] hands out one registry per distinct
//! description for the whole process, so the lazy constants it owns are
//! fetched from the host at most once per process.

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use luagd_core::api::{
    ArgType, ArgumentApi, BuiltinClassApi, ClassApi, EnumApi, ExtensionApi, MethodFlags,
};
use luagd_core::{ApiError, TypeHash, VariantType};
use once_cell::sync::Lazy;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::constant::BuiltinConstant;

// ============================================================================
// Methods and Constructors
// ============================================================================

/// A callable method of a builtin type or class.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    name: String,
    hash: TypeHash,
    flags: MethodFlags,
    arguments: Vec<ArgType>,
    /// Leading arguments without a default value.
    required: usize,
    return_type: Option<ArgType>,
}

impl MethodBinding {
    fn new(
        owner: (&str, TypeHash),
        name: &str,
        flags: MethodFlags,
        arguments: &[ArgumentApi],
        return_type: Option<&str>,
    ) -> Result<Self, ApiError> {
        let item = || format!("{}.{}", owner.0, name);
        let required = arguments
            .iter()
            .position(|arg| arg.default_value.is_some())
            .unwrap_or(arguments.len());
        Ok(Self {
            name: name.to_owned(),
            hash: TypeHash::from_method(owner.1, name),
            flags,
            arguments: parse_types(arguments.iter().map(|arg| arg.ty.as_str()), item)?,
            required,
            return_type: return_type.map(|ty| parse_type(ty, item)).transpose()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(MethodFlags::CONST)
    }

    pub fn is_vararg(&self) -> bool {
        self.flags.contains(MethodFlags::VARARG)
    }

    pub fn arguments(&self) -> &[ArgType] {
        &self.arguments
    }

    pub fn required_arguments(&self) -> usize {
        self.required
    }

    pub fn return_type(&self) -> Option<&ArgType> {
        self.return_type.as_ref()
    }

    /// Whether a call with `count` arguments is acceptable.
    pub fn accepts_count(&self, count: usize) -> bool {
        count >= self.required && (self.is_vararg() || count <= self.arguments.len())
    }

    /// Declared type of argument `index` (0-based). Extra vararg arguments
    /// accept anything.
    pub fn argument_type(&self, index: usize) -> &ArgType {
        self.arguments.get(index).unwrap_or(&ArgType::Any)
    }
}

/// Resolve a declared type, rejecting builtin types without a value model.
fn parse_type(spelling: &str, item: impl Fn() -> String) -> Result<ArgType, ApiError> {
    let ty = ArgType::parse(spelling);
    if let Some(variant_type) = ty.variant_type().filter(|t| !t.has_value_model()) {
        return Err(ApiError::UnsupportedType {
            item: item(),
            ty: variant_type,
        });
    }
    Ok(ty)
}

fn parse_types<'a>(
    spellings: impl Iterator<Item = &'a str>,
    item: impl Fn() -> String,
) -> Result<Vec<ArgType>, ApiError> {
    spellings.map(|ty| parse_type(ty, &item)).collect()
}

/// One constructor overload of a builtin type.
#[derive(Debug, Clone)]
pub struct ConstructorBinding {
    pub index: u32,
    pub arguments: Vec<ArgType>,
}

// ============================================================================
// Builtins
// ============================================================================

/// Binding table of one builtin type.
#[derive(Debug)]
pub struct BuiltinBinding {
    name: String,
    hash: TypeHash,
    variant_type: VariantType,
    constants: FxHashMap<TypeHash, BuiltinConstant>,
    enum_values: FxHashMap<TypeHash, i64>,
    constructors: Vec<ConstructorBinding>,
    methods: FxHashMap<TypeHash, MethodBinding>,
    members: FxHashMap<TypeHash, ArgType>,
}

impl BuiltinBinding {
    fn from_api(api: &BuiltinClassApi) -> Result<Self, ApiError> {
        let variant_type = api.variant_type()?;
        if !variant_type.has_value_model() {
            return Err(ApiError::UnsupportedType {
                item: api.name.clone(),
                ty: variant_type,
            });
        }
        let hash = TypeHash::from_name(&api.name);

        let mut constants = FxHashMap::default();
        for constant in &api.constants {
            let key = TypeHash::from_constant(hash, &constant.name);
            let accessor = BuiltinConstant::from_owned(variant_type, constant.name.clone());
            if constants.insert(key, accessor).is_some() {
                return Err(ApiError::Duplicate(format!("{}.{}", api.name, constant.name)));
            }
        }

        let mut enum_values = FxHashMap::default();
        for value in api.enums.iter().flat_map(|e| &e.values) {
            enum_values.insert(TypeHash::from_constant(hash, &value.name), value.value);
        }

        let mut methods = FxHashMap::default();
        for method in &api.methods {
            let binding = MethodBinding::new(
                (&api.name, hash),
                &method.name,
                method.flags(),
                &method.arguments,
                method.return_type.as_deref(),
            )?;
            if methods.insert(binding.hash, binding).is_some() {
                return Err(ApiError::Duplicate(format!("{}.{}", api.name, method.name)));
            }
        }

        let members = api
            .members
            .iter()
            .map(|member| {
                let ty = parse_type(&member.ty, || format!("{}.{}", api.name, member.name))?;
                Ok((TypeHash::from_member(hash, &member.name), ty))
            })
            .collect::<Result<_, ApiError>>()?;

        let constructors = api
            .constructors
            .iter()
            .map(|ctor| {
                let arguments = parse_types(ctor.arguments.iter().map(|arg| arg.ty.as_str()), || {
                    format!("{}.new#{}", api.name, ctor.index)
                })?;
                Ok(ConstructorBinding {
                    index: ctor.index,
                    arguments,
                })
            })
            .collect::<Result<_, ApiError>>()?;

        Ok(Self {
            name: api.name.clone(),
            hash,
            variant_type,
            constants,
            enum_values,
            constructors,
            methods,
            members,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn variant_type(&self) -> VariantType {
        self.variant_type
    }

    pub fn constant(&self, name: &str) -> Option<&BuiltinConstant> {
        self.constants.get(&TypeHash::from_constant(self.hash, name))
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enum_values
            .get(&TypeHash::from_constant(self.hash, name))
            .copied()
    }

    pub fn constructors(&self) -> &[ConstructorBinding] {
        &self.constructors
    }

    pub fn method(&self, name: &str) -> Option<&MethodBinding> {
        self.methods.get(&TypeHash::from_method(self.hash, name))
    }

    /// Declared type of member `name`.
    pub fn member(&self, name: &str) -> Option<&ArgType> {
        self.members.get(&TypeHash::from_member(self.hash, name))
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Binding table of one engine class.
#[derive(Debug)]
pub struct ClassBinding {
    name: String,
    hash: TypeHash,
    parent: Option<TypeHash>,
    instantiable: bool,
    refcounted: bool,
    /// Integer constants and enum values, in declaration order.
    constants: Vec<(String, i64)>,
    methods: FxHashMap<TypeHash, MethodBinding>,
}

impl ClassBinding {
    fn from_api(api: &ClassApi) -> Result<Self, ApiError> {
        let hash = TypeHash::from_name(&api.name);

        let constants = api
            .constants
            .iter()
            .map(|c| (c.name.clone(), c.value))
            .chain(
                api.enums
                    .iter()
                    .flat_map(|e| &e.values)
                    .map(|v| (v.name.clone(), v.value)),
            )
            .collect();

        let mut methods = FxHashMap::default();
        for method in &api.methods {
            let binding = MethodBinding::new(
                (&api.name, hash),
                &method.name,
                method.flags(),
                &method.arguments,
                method.return_value.as_ref().map(|ret| ret.ty.as_str()),
            )?;
            if methods.insert(binding.hash, binding).is_some() {
                return Err(ApiError::Duplicate(format!("{}.{}", api.name, method.name)));
            }
        }

        Ok(Self {
            name: api.name.clone(),
            hash,
            parent: api.inherits.as_deref().map(TypeHash::from_name),
            instantiable: api.is_instantiable,
            refcounted: api.is_refcounted,
            constants,
            methods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn parent(&self) -> Option<TypeHash> {
        self.parent
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub fn is_refcounted(&self) -> bool {
        self.refcounted
    }

    pub fn constants(&self) -> &[(String, i64)] {
        &self.constants
    }

    /// A method declared directly on this class.
    pub fn method(&self, name: &str) -> Option<&MethodBinding> {
        self.methods.get(&TypeHash::from_method(self.hash, name))
    }
}

/// A global enum.
#[derive(Debug, Clone)]
pub struct EnumBinding {
    pub name: String,
    pub is_bitfield: bool,
    pub values: Vec<(String, i64)>,
}

impl From<&EnumApi> for EnumBinding {
    fn from(api: &EnumApi) -> Self {
        Self {
            name: api.name.clone(),
            is_bitfield: api.is_bitfield,
            values: api.values.iter().map(|v| (v.name.clone(), v.value)).collect(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registries handed out by [`BindingRegistry::shared`], keyed by the
/// fingerprint of their description.
static SHARED_REGISTRIES: Lazy<Mutex<FxHashMap<u64, Arc<BindingRegistry>>>> =
    Lazy::new(Default::default);

/// All binding tables derived from one API description.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    builtins: FxHashMap<TypeHash, BuiltinBinding>,
    builtin_order: Vec<TypeHash>,
    classes: FxHashMap<TypeHash, ClassBinding>,
    /// Parents before children.
    class_order: Vec<TypeHash>,
    global_enums: Vec<EnumBinding>,
}

impl BindingRegistry {
    /// Build the registry, validating names and the class hierarchy.
    pub fn from_api(api: &ExtensionApi) -> Result<Self, ApiError> {
        let mut registry = Self::default();

        for builtin in &api.builtin_classes {
            let binding = BuiltinBinding::from_api(builtin)?;
            let hash = binding.hash;
            if registry.builtins.insert(hash, binding).is_some() {
                return Err(ApiError::Duplicate(builtin.name.clone()));
            }
            registry.builtin_order.push(hash);
        }

        let mut graph: DiGraph<TypeHash, ()> = DiGraph::new();
        let mut nodes: FxHashMap<TypeHash, NodeIndex> = FxHashMap::default();
        for class in &api.classes {
            let binding = ClassBinding::from_api(class)?;
            let hash = binding.hash;
            if registry.classes.insert(hash, binding).is_some() {
                return Err(ApiError::Duplicate(class.name.clone()));
            }
            nodes.insert(hash, graph.add_node(hash));
        }

        for class in &api.classes {
            let Some(parent) = class.inherits.as_deref() else {
                continue;
            };
            let Some(&parent_node) = nodes.get(&TypeHash::from_name(parent)) else {
                return Err(ApiError::UnknownParent {
                    class: class.name.clone(),
                    parent: parent.to_owned(),
                });
            };
            let child_node = nodes[&TypeHash::from_name(&class.name)];
            graph.add_edge(parent_node, child_node, ());
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            let hash = graph[cycle.node_id()];
            let name = registry
                .classes
                .get(&hash)
                .map(|class| class.name.clone())
                .unwrap_or_default();
            ApiError::InheritanceCycle(name)
        })?;
        registry.class_order = order.into_iter().map(|node| graph[node]).collect();

        registry.global_enums = api.global_enums.iter().map(EnumBinding::from).collect();
        Ok(registry)
    }

    /// The process-wide registry for `api`, built on first request.
    ///
    /// Equal descriptions share one registry and with it one constant cache.
    /// [`from_api`](Self::from_api) builds a private registry instead.
    /// Failed builds are not remembered.
    pub fn shared(api: &ExtensionApi) -> Result<Arc<Self>, ApiError> {
        let key = api.fingerprint()?;
        let mut shared = SHARED_REGISTRIES
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(registry) = shared.get(&key) {
            return Ok(Arc::clone(registry));
        }

        let registry = Arc::new(Self::from_api(api)?);
        debug!(
            "shared registry {key:016x}: {} builtins, {} classes",
            registry.builtin_count(),
            registry.class_count()
        );
        shared.insert(key, Arc::clone(&registry));
        Ok(registry)
    }

    pub fn builtin(&self, name: &str) -> Option<&BuiltinBinding> {
        self.builtins.get(&TypeHash::from_name(name))
    }

    pub fn builtin_by_type(&self, variant_type: VariantType) -> Option<&BuiltinBinding> {
        self.builtin(variant_type.api_name())
    }

    /// Builtins in declaration order.
    pub fn builtins(&self) -> impl Iterator<Item = &BuiltinBinding> {
        self.builtin_order.iter().filter_map(|hash| self.builtins.get(hash))
    }

    pub fn class(&self, name: &str) -> Option<&ClassBinding> {
        self.classes.get(&TypeHash::from_name(name))
    }

    /// Classes with every parent before its children.
    pub fn classes(&self) -> impl Iterator<Item = &ClassBinding> {
        self.class_order.iter().filter_map(|hash| self.classes.get(hash))
    }

    /// `name` followed by its ancestors, nearest first.
    pub fn ancestors(&self, name: &str) -> Ancestors<'_> {
        Ancestors {
            registry: self,
            next: self.class(name),
        }
    }

    /// Whether `class` is `ancestor` or derives from it.
    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        let target = TypeHash::from_name(ancestor);
        self.ancestors(class).any(|c| c.hash == target)
    }

    /// Resolve `method` on `class`, searching ancestors nearest first.
    /// Returns the declaring class with the method.
    pub fn find_class_method(
        &self,
        class: &str,
        method: &str,
    ) -> Option<(&ClassBinding, &MethodBinding)> {
        self.ancestors(class).find_map(|c| c.method(method).map(|m| (c, m)))
    }

    pub fn global_enums(&self) -> &[EnumBinding] {
        &self.global_enums
    }

    pub fn builtin_count(&self) -> usize {
        self.builtins.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

/// Iterator over a class and its ancestors.
pub struct Ancestors<'a> {
    registry: &'a BindingRegistry,
    next: Option<&'a ClassBinding>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ClassBinding;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current
            .parent
            .and_then(|parent| self.registry.classes.get(&parent));
        Some(current)
    }
}
