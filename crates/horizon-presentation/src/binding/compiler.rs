//! Binding accessor compilation.
//!
//! A binding expression is resolved against the data source type's
//! [`TypeInfo`] into a chain of member navigations ending in a target: a
//! member, a dependency property, or a precompiled accessor. The chain is
//! turned into a getter or setter and memoized per
//! [`BindingExpressionAccessorKey`], so the same expression on the same
//! types always yields the same `Arc`.
//!
//! Two strategies produce accessors with identical behavior:
//!
//! - [`AccessorStrategy::Compiled`] composes closures over the resolved
//!   member functions once;
//! - [`AccessorStrategy::Reflection`] keeps only the path and re-resolves it
//!   by name through the [`TypeRegistry`] on every access.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::binding::expression::BindingExpression;
use crate::binding::reflection::{
    DataSourceUnwrapper, MemberInfo, MemberLookup, MemberType, PrecompiledAccessor, TypeRegistry,
};
use crate::config::{AccessorStrategy, PresentationConfig};
use crate::dependency_property::DependencyProperty;
use crate::error::{PresentationError, Result};
use crate::logging::targets;
use crate::object::DependencyObject;

/// Memoization key for compiled accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingExpressionAccessorKey {
    bound_type: TypeId,
    data_source_type: TypeId,
    expression: String,
}

impl BindingExpressionAccessorKey {
    /// A key for accessors of `bound_type` values on `data_source_type`.
    pub fn new(bound_type: TypeId, data_source_type: TypeId, expression: impl Into<String>) -> Self {
        Self {
            bound_type,
            data_source_type,
            expression: expression.into(),
        }
    }

    /// The type the accessor produces or accepts.
    pub fn bound_type(&self) -> TypeId {
        self.bound_type
    }

    /// The data source type the expression is resolved against.
    pub fn data_source_type(&self) -> TypeId {
        self.data_source_type
    }

    /// The expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Reads a typed value from a data source.
pub trait BindingGetter<T>: Send + Sync {
    /// Read the value. Returns `None` when the path cannot be followed, for
    /// example through an empty `Option`.
    fn get(&self, source: &dyn Any) -> Option<T>;
}

/// Writes a typed value into a data source.
pub trait BindingSetter<T>: Send + Sync {
    /// Write the value. Writes through an absent intermediate member are dropped.
    fn set(&self, source: &dyn Any, value: T) -> Result<()>;
}

/// Reads a value of the expression's own type.
pub trait ErasedBindingGetter: Send + Sync {
    /// The static type of the values produced.
    fn value_type(&self) -> MemberType;

    /// Read the value as a box.
    fn get(&self, source: &dyn Any) -> Option<Box<dyn Any>>;
}

/// Writes a value of the expression's own type.
pub trait ErasedBindingSetter: Send + Sync {
    /// The static type of the values accepted.
    fn value_type(&self) -> MemberType;

    /// Write a boxed value.
    fn set(&self, source: &dyn Any, value: Box<dyn Any>) -> Result<()>;
}

#[derive(Clone)]
enum Target {
    Member(MemberInfo),
    DependencyProperty {
        property: DependencyProperty,
        unwrap: Option<DataSourceUnwrapper>,
    },
    Precompiled(PrecompiledAccessor),
}

#[derive(Clone)]
struct ResolvedPath {
    expression: String,
    steps: Vec<MemberInfo>,
    target: Target,
    target_name: String,
}

impl ResolvedPath {
    fn value_type(&self) -> MemberType {
        match &self.target {
            Target::Member(member) => member.value_type(),
            Target::DependencyProperty { property, .. } => property.value_type(),
            Target::Precompiled(accessor) => accessor.value_type(),
        }
    }

    fn is_writable(&self) -> bool {
        match &self.target {
            Target::Member(member) => member.is_writable(),
            Target::DependencyProperty { property, .. } => !property.is_read_only(),
            Target::Precompiled(accessor) => accessor.is_writable(),
        }
    }

    fn not_writable(&self) -> PresentationError {
        PresentationError::NotWritable {
            expression: self.expression.clone(),
            member: self.target_name.clone(),
        }
    }

    fn read(&self, source: &dyn Any) -> Option<Box<dyn Any>> {
        read_through(&self.steps, &self.target, source)
    }

    fn write(&self, source: &dyn Any, value: Box<dyn Any>) -> Result<()> {
        write_through(&self.steps, &self.target, source, value, self)
    }
}

fn read_through(steps: &[MemberInfo], target: &Target, source: &dyn Any) -> Option<Box<dyn Any>> {
    match steps.split_first() {
        Some((step, rest)) => {
            let mut out = None;
            step.navigate(source, &mut |inner| out = read_through(rest, target, inner));
            out
        }
        None => read_target(target, source),
    }
}

fn write_through(
    steps: &[MemberInfo],
    target: &Target,
    source: &dyn Any,
    value: Box<dyn Any>,
    path: &ResolvedPath,
) -> Result<()> {
    match steps.split_first() {
        Some((step, rest)) => {
            let mut value = Some(value);
            let mut result = Ok(());
            step.navigate(source, &mut |inner| {
                if let Some(value) = value.take() {
                    result = write_through(rest, target, inner, value, path);
                }
            });
            result
        }
        None => write_target(target, source, value, path),
    }
}

fn with_dependency_object<R>(
    source: &dyn Any,
    unwrap: Option<DataSourceUnwrapper>,
    f: impl FnOnce(&DependencyObject) -> R,
) -> Option<R> {
    match unwrap {
        None => source.downcast_ref::<DependencyObject>().map(f),
        Some(unwrap) => {
            let mut f = Some(f);
            let mut out = None;
            unwrap(source, &mut |inner| {
                if let (Some(object), Some(f)) = (inner.downcast_ref::<DependencyObject>(), f.take()) {
                    out = Some(f(object));
                }
            });
            out
        }
    }
}

fn read_target(target: &Target, source: &dyn Any) -> Option<Box<dyn Any>> {
    match target {
        Target::Member(member) => member.get(source),
        Target::Precompiled(accessor) => accessor.get(source),
        Target::DependencyProperty { property, unwrap } => {
            with_dependency_object(source, *unwrap, |object| object.get_value_boxed(*property)).flatten()
        }
    }
}

fn write_target(
    target: &Target,
    source: &dyn Any,
    value: Box<dyn Any>,
    path: &ResolvedPath,
) -> Result<()> {
    let written = match target {
        Target::Member(member) => member.set(source, value),
        Target::Precompiled(accessor) => accessor.set(source, value),
        Target::DependencyProperty { property, unwrap } => {
            return with_dependency_object(source, *unwrap, |object| {
                object.set_value_boxed(*property, value)
            })
            .unwrap_or(Ok(()));
        }
    };
    match written {
        Some(true) => Ok(()),
        Some(false) => Err(PresentationError::TypeMismatch {
            expected: path.value_type().name(),
            got: "a value of another type",
        }),
        None => Err(path.not_writable()),
    }
}

fn member_path(expression: &str) -> Result<String> {
    let parsed = if expression.starts_with("{{") {
        BindingExpression::parse(expression)?
    } else {
        BindingExpression::parse_with(expression, false)?
    };
    Ok(parsed.path().to_string())
}

fn type_name(type_id: TypeId) -> String {
    TypeRegistry::get(type_id)
        .map(|info| info.member_type().name().to_string())
        .unwrap_or_else(|| format!("{type_id:?}"))
}

/// Resolve `expression` against `data_source_type`.
fn resolve(data_source_type: TypeId, expression: &str) -> Result<ResolvedPath> {
    let path = member_path(expression)?;

    let root = TypeRegistry::wrapper_for(data_source_type).unwrap_or(data_source_type);
    if let Some(accessor) = TypeRegistry::get(root).and_then(|info| info.precompiled(&path).cloned()) {
        tracing::trace!(target: targets::BINDING, expression, "using precompiled accessor");
        return Ok(ResolvedPath {
            expression: expression.to_string(),
            steps: Vec::new(),
            target_name: path.clone(),
            target: Target::Precompiled(accessor),
        });
    }

    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    let mut declared = data_source_type;
    let mut steps = Vec::with_capacity(segments.len().saturating_sub(1));

    for (index, segment) in segments.iter().enumerate() {
        let is_last = index + 1 == segments.len();
        let runtime = TypeRegistry::wrapper_for(declared).unwrap_or(declared);
        let info = TypeRegistry::get(runtime);

        let lookup = info
            .as_deref()
            .map(|info| info.find_member(segment))
            .unwrap_or(MemberLookup::Missing);

        match lookup {
            MemberLookup::Found(member) if is_last => {
                return Ok(ResolvedPath {
                    expression: expression.to_string(),
                    steps,
                    target: Target::Member(member.clone()),
                    target_name: segment.to_string(),
                });
            }
            MemberLookup::Found(member) => {
                declared = member.navigation_type().id();
                steps.push(member.clone());
            }
            MemberLookup::Ambiguous => {
                return Err(PresentationError::ambiguous(expression, *segment, type_name(runtime)));
            }
            MemberLookup::Missing => {
                let property = is_last
                    .then(|| {
                        DependencyProperty::find(declared, segment)
                            .or_else(|| DependencyProperty::find(runtime, segment))
                    })
                    .flatten();
                let Some(property) = property else {
                    return Err(PresentationError::unresolvable(expression, *segment, type_name(runtime)));
                };
                let unwrap = if runtime != declared {
                    info.as_deref().and_then(|info| info.unwrapper())
                } else {
                    None
                };
                return Ok(ResolvedPath {
                    expression: expression.to_string(),
                    steps,
                    target: Target::DependencyProperty { property, unwrap },
                    target_name: segment.to_string(),
                });
            }
        }
    }

    Err(PresentationError::invalid_expression(expression))
}

type Reader = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;
type Writer = Arc<dyn Fn(&dyn Any, Box<dyn Any>) -> Result<()> + Send + Sync>;

/// Compose the resolved path into closures, innermost target first.
fn compile_reader(path: &ResolvedPath) -> Reader {
    let target = path.target.clone();
    let mut reader: Reader = Arc::new(move |source: &dyn Any| read_target(&target, source));
    for step in path.steps.iter().rev().cloned() {
        let inner = reader;
        reader = Arc::new(move |source: &dyn Any| {
            let mut out = None;
            step.navigate(source, &mut |value: &dyn Any| out = inner(value));
            out
        });
    }
    reader
}

fn compile_writer(path: &ResolvedPath) -> Writer {
    let target = path.target.clone();
    let target_path = path.clone();
    let mut writer: Writer = Arc::new(move |source: &dyn Any, value: Box<dyn Any>| {
        write_target(&target, source, value, &target_path)
    });
    for step in path.steps.iter().rev().cloned() {
        let inner = writer;
        writer = Arc::new(move |source: &dyn Any, value: Box<dyn Any>| {
            let mut value = Some(value);
            let mut result = Ok(());
            step.navigate(source, &mut |member: &dyn Any| {
                if let Some(value) = value.take() {
                    result = inner(member, value);
                }
            });
            result
        });
    }
    writer
}

struct CompiledAccessor {
    value_type: MemberType,
    reader: Reader,
    writer: Option<Writer>,
    read_only: PresentationError,
}

impl CompiledAccessor {
    fn new(path: &ResolvedPath, writable: bool) -> Self {
        Self {
            value_type: path.value_type(),
            reader: compile_reader(path),
            writer: writable.then(|| compile_writer(path)),
            read_only: path.not_writable(),
        }
    }
}

impl ErasedBindingGetter for CompiledAccessor {
    fn value_type(&self) -> MemberType {
        self.value_type
    }

    fn get(&self, source: &dyn Any) -> Option<Box<dyn Any>> {
        (self.reader)(source)
    }
}

impl ErasedBindingSetter for CompiledAccessor {
    fn value_type(&self) -> MemberType {
        self.value_type
    }

    fn set(&self, source: &dyn Any, value: Box<dyn Any>) -> Result<()> {
        match &self.writer {
            Some(writer) => writer(source, value),
            None => Err(self.read_only.clone()),
        }
    }
}

struct ReflectionAccessor {
    data_source_type: TypeId,
    expression: String,
    value_type: MemberType,
}

impl ReflectionAccessor {
    fn new(data_source_type: TypeId, path: &ResolvedPath) -> Self {
        Self {
            data_source_type,
            expression: path.expression.clone(),
            value_type: path.value_type(),
        }
    }
}

impl ErasedBindingGetter for ReflectionAccessor {
    fn value_type(&self) -> MemberType {
        self.value_type
    }

    fn get(&self, source: &dyn Any) -> Option<Box<dyn Any>> {
        resolve(self.data_source_type, &self.expression)
            .ok()?
            .read(source)
    }
}

impl ErasedBindingSetter for ReflectionAccessor {
    fn value_type(&self) -> MemberType {
        self.value_type
    }

    fn set(&self, source: &dyn Any, value: Box<dyn Any>) -> Result<()> {
        let path = resolve(self.data_source_type, &self.expression)?;
        if !path.is_writable() {
            return Err(path.not_writable());
        }
        path.write(source, value)
    }
}

struct TypedGetter<T> {
    erased: Arc<dyn ErasedBindingGetter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> BindingGetter<T> for TypedGetter<T> {
    fn get(&self, source: &dyn Any) -> Option<T> {
        self.erased
            .get(source)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

struct TypedSetter<T> {
    erased: Arc<dyn ErasedBindingSetter>,
    _marker: PhantomData<fn(T)>,
}

impl<T: 'static> BindingSetter<T> for TypedSetter<T> {
    fn set(&self, source: &dyn Any, value: T) -> Result<()> {
        self.erased.set(source, Box::new(value))
    }
}

type GetterCache = HashMap<BindingExpressionAccessorKey, Arc<dyn Any + Send + Sync>>;
type ErasedGetterCache = HashMap<BindingExpressionAccessorKey, Arc<dyn ErasedBindingGetter>>;
type ErasedSetterCache = HashMap<BindingExpressionAccessorKey, Arc<dyn ErasedBindingSetter>>;
type ExpressionTypeCache = HashMap<(TypeId, String), MemberType>;

static GETTERS: OnceLock<Mutex<GetterCache>> = OnceLock::new();
static SETTERS: OnceLock<Mutex<GetterCache>> = OnceLock::new();
static ERASED_GETTERS: OnceLock<Mutex<ErasedGetterCache>> = OnceLock::new();
static ERASED_SETTERS: OnceLock<Mutex<ErasedSetterCache>> = OnceLock::new();
static EXPRESSION_TYPES: OnceLock<Mutex<ExpressionTypeCache>> = OnceLock::new();

fn cache<V>(cell: &'static OnceLock<Mutex<V>>) -> &'static Mutex<V>
where
    V: Default,
{
    cell.get_or_init(|| Mutex::new(V::default()))
}

/// Marks erased cache keys, which are not tied to a bound type.
struct Erased;

/// Builds binding accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingAccessorCompiler {
    strategy: AccessorStrategy,
}

impl Default for BindingAccessorCompiler {
    fn default() -> Self {
        Self::current()
    }
}

impl BindingAccessorCompiler {
    /// A compiler using the given strategy.
    pub fn new(strategy: AccessorStrategy) -> Self {
        Self { strategy }
    }

    /// A compiler using the installed configuration's strategy.
    pub fn current() -> Self {
        Self::new(PresentationConfig::current().accessor_strategy)
    }

    /// The accessor strategy.
    pub fn strategy(&self) -> AccessorStrategy {
        self.strategy
    }

    /// Build an uncached type-erased getter.
    #[tracing::instrument(target = "horizon_presentation::binding", level = "debug", skip(self))]
    pub fn build_erased_getter(
        &self,
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn ErasedBindingGetter>> {
        let path = resolve(data_source_type, expression)?;
        Ok(match self.strategy {
            AccessorStrategy::Compiled => Arc::new(CompiledAccessor::new(&path, false)),
            AccessorStrategy::Reflection => Arc::new(ReflectionAccessor::new(data_source_type, &path)),
        })
    }

    /// Build an uncached type-erased setter.
    #[tracing::instrument(target = "horizon_presentation::binding", level = "debug", skip(self))]
    pub fn build_erased_setter(
        &self,
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn ErasedBindingSetter>> {
        let path = resolve(data_source_type, expression)?;
        if !path.is_writable() {
            return Err(path.not_writable());
        }
        Ok(match self.strategy {
            AccessorStrategy::Compiled => Arc::new(CompiledAccessor::new(&path, true)),
            AccessorStrategy::Reflection => Arc::new(ReflectionAccessor::new(data_source_type, &path)),
        })
    }

    /// Build an uncached getter producing `T`.
    pub fn build_getter<T: 'static>(
        &self,
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn BindingGetter<T>>> {
        let erased = self.build_erased_getter(data_source_type, expression)?;
        check_value_type::<T>(erased.value_type())?;
        Ok(Arc::new(TypedGetter {
            erased,
            _marker: PhantomData,
        }))
    }

    /// Build an uncached setter accepting `T`.
    pub fn build_setter<T: 'static>(
        &self,
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn BindingSetter<T>>> {
        let erased = self.build_erased_setter(data_source_type, expression)?;
        check_value_type::<T>(erased.value_type())?;
        Ok(Arc::new(TypedSetter {
            erased,
            _marker: PhantomData,
        }))
    }

    /// The cached getter for `expression` on `data_source_type`, producing `T`.
    pub fn create_binding_getter<T: 'static>(
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn BindingGetter<T>>> {
        let key = BindingExpressionAccessorKey::new(TypeId::of::<T>(), data_source_type, expression);
        if let Some(getter) = lookup_typed::<Arc<dyn BindingGetter<T>>>(&GETTERS, &key) {
            return Ok(getter);
        }
        let getter = Self::current().build_getter::<T>(data_source_type, expression)?;
        Ok(insert_typed(&GETTERS, key, getter))
    }

    /// The cached setter for `expression` on `data_source_type`, accepting `T`.
    pub fn create_binding_setter<T: 'static>(
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn BindingSetter<T>>> {
        let key = BindingExpressionAccessorKey::new(TypeId::of::<T>(), data_source_type, expression);
        if let Some(setter) = lookup_typed::<Arc<dyn BindingSetter<T>>>(&SETTERS, &key) {
            return Ok(setter);
        }
        let setter = Self::current().build_setter::<T>(data_source_type, expression)?;
        Ok(insert_typed(&SETTERS, key, setter))
    }

    /// The cached type-erased getter for `expression` on `data_source_type`.
    pub fn create_erased_binding_getter(
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn ErasedBindingGetter>> {
        let key = BindingExpressionAccessorKey::new(TypeId::of::<Erased>(), data_source_type, expression);
        if let Some(getter) = cache(&ERASED_GETTERS).lock().get(&key) {
            return Ok(getter.clone());
        }
        let getter = Self::current().build_erased_getter(data_source_type, expression)?;
        Ok(cache(&ERASED_GETTERS).lock().entry(key).or_insert(getter).clone())
    }

    /// The cached type-erased setter for `expression` on `data_source_type`.
    pub fn create_erased_binding_setter(
        data_source_type: TypeId,
        expression: &str,
    ) -> Result<Arc<dyn ErasedBindingSetter>> {
        let key = BindingExpressionAccessorKey::new(TypeId::of::<Erased>(), data_source_type, expression);
        if let Some(setter) = cache(&ERASED_SETTERS).lock().get(&key) {
            return Ok(setter.clone());
        }
        let setter = Self::current().build_erased_setter(data_source_type, expression)?;
        Ok(cache(&ERASED_SETTERS).lock().entry(key).or_insert(setter).clone())
    }

    /// The static type of the member `expression` resolves to.
    pub fn get_expression_type(data_source_type: TypeId, expression: &str) -> Result<MemberType> {
        let key = (data_source_type, expression.to_string());
        if let Some(member_type) = cache(&EXPRESSION_TYPES).lock().get(&key) {
            return Ok(*member_type);
        }
        let member_type = resolve(data_source_type, expression)?.value_type();
        cache(&EXPRESSION_TYPES).lock().insert(key, member_type);
        Ok(member_type)
    }

    /// Drop every cached accessor.
    pub fn clear_caches() {
        cache(&GETTERS).lock().clear();
        cache(&SETTERS).lock().clear();
        cache(&ERASED_GETTERS).lock().clear();
        cache(&ERASED_SETTERS).lock().clear();
        cache(&EXPRESSION_TYPES).lock().clear();
    }
}

fn check_value_type<T: 'static>(value_type: MemberType) -> Result<()> {
    if value_type.is::<T>() {
        Ok(())
    } else {
        Err(PresentationError::TypeMismatch {
            expected: value_type.name(),
            got: std::any::type_name::<T>(),
        })
    }
}

fn lookup_typed<A: Clone + 'static>(
    cell: &'static OnceLock<Mutex<GetterCache>>,
    key: &BindingExpressionAccessorKey,
) -> Option<A> {
    cache(cell)
        .lock()
        .get(key)
        .and_then(|entry| entry.downcast_ref::<A>())
        .cloned()
}

fn insert_typed<A: Clone + Send + Sync + 'static>(
    cell: &'static OnceLock<Mutex<GetterCache>>,
    key: BindingExpressionAccessorKey,
    accessor: A,
) -> A {
    let mut cache = cache(cell).lock();
    let entry = cache.entry(key).or_insert_with(|| Arc::new(accessor.clone()));
    entry.downcast_ref::<A>().cloned().unwrap_or(accessor)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::binding::reflection::{MemberInfo, TypeInfo};

    struct Model {
        name: RefCell<String>,
        score: i32,
    }

    struct ViewModel {
        model: Option<Model>,
    }

    fn model_name(source: &dyn Any) -> Option<Box<dyn Any>> {
        let model = source.downcast_ref::<Model>()?;
        Some(Box::new(model.name.borrow().clone()))
    }

    fn set_model_name(source: &dyn Any, value: Box<dyn Any>) -> bool {
        match (source.downcast_ref::<Model>(), value.downcast::<String>()) {
            (Some(model), Ok(value)) => {
                *model.name.borrow_mut() = *value;
                true
            }
            _ => false,
        }
    }

    fn model_score(source: &dyn Any) -> Option<Box<dyn Any>> {
        source.downcast_ref::<Model>().map(|model| Box::new(model.score) as Box<dyn Any>)
    }

    fn view_model_model(_source: &dyn Any) -> Option<Box<dyn Any>> {
        None
    }

    fn navigate_model(source: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        if let Some(model) = source.downcast_ref::<ViewModel>().and_then(|vm| vm.model.as_ref()) {
            f(model);
        }
    }

    fn register() {
        TypeRegistry::register(
            TypeInfo::of::<Model>()
                .with_member(MemberInfo::property::<String>("Name", model_name).with_setter(set_model_name))
                .with_member(MemberInfo::field::<i32>("Score", model_score)),
        );
        TypeRegistry::register(
            TypeInfo::of::<ViewModel>().with_member(
                MemberInfo::field::<Option<Model>>("Model", view_model_model)
                    .with_navigation::<Model>(navigate_model),
            ),
        );
    }

    fn view_model(name: &str) -> ViewModel {
        ViewModel {
            model: Some(Model {
                name: RefCell::new(name.to_string()),
                score: 7,
            }),
        }
    }

    #[test]
    fn test_getter_follows_path() {
        register();
        let getter = BindingAccessorCompiler::create_binding_getter::<String>(
            TypeId::of::<ViewModel>(),
            "{{Model.Name}}",
        )
        .unwrap();
        assert_eq!(getter.get(&view_model("Alice")), Some("Alice".to_string()));
        assert_eq!(getter.get(&ViewModel { model: None }), None);
    }

    #[test]
    fn test_setter_writes_through_path() {
        register();
        let setter = BindingAccessorCompiler::create_binding_setter::<String>(
            TypeId::of::<ViewModel>(),
            "Model.Name",
        )
        .unwrap();
        let vm = view_model("Alice");
        setter.set(&vm, "Bob".to_string()).unwrap();
        assert_eq!(*vm.model.as_ref().unwrap().name.borrow(), "Bob");
    }

    #[test]
    fn test_cache_returns_same_instance() {
        register();
        let ds = TypeId::of::<ViewModel>();
        let a = BindingAccessorCompiler::create_binding_getter::<i32>(ds, "{{Model.Score}}").unwrap();
        let b = BindingAccessorCompiler::create_binding_getter::<i32>(ds, "{{Model.Score}}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let a = BindingAccessorCompiler::create_binding_setter::<String>(ds, "{{Model.Name}}").unwrap();
        let b = BindingAccessorCompiler::create_binding_setter::<String>(ds, "{{Model.Name}}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_resolution_errors() {
        register();
        let ds = TypeId::of::<ViewModel>();
        let err = BindingAccessorCompiler::create_binding_getter::<String>(ds, "{{Model.Nme}}")
            .err()
            .unwrap();
        assert!(matches!(err, PresentationError::UnresolvableBinding { ref member, .. } if member == "Nme"));

        let err = BindingAccessorCompiler::create_binding_getter::<f64>(ds, "{{Model.Score}}")
            .err()
            .unwrap();
        assert!(matches!(err, PresentationError::TypeMismatch { .. }));

        let err = BindingAccessorCompiler::create_binding_setter::<i32>(ds, "{{Model.Score}}")
            .err()
            .unwrap();
        assert!(matches!(err, PresentationError::NotWritable { .. }));

        let err = BindingAccessorCompiler::create_binding_getter::<String>(ds, "{{Model.Name")
            .err()
            .unwrap();
        assert!(matches!(err, PresentationError::InvalidExpression { .. }));
    }

    #[test]
    fn test_expression_type() {
        register();
        let ty = BindingAccessorCompiler::get_expression_type(TypeId::of::<ViewModel>(), "{{Model.Score}}")
            .unwrap();
        assert!(ty.is::<i32>());
    }

    #[test]
    fn test_reflection_strategy_matches_compiled() {
        register();
        let ds = TypeId::of::<ViewModel>();
        let compiled = BindingAccessorCompiler::new(AccessorStrategy::Compiled)
            .build_getter::<String>(ds, "Model.Name")
            .unwrap();
        let reflected = BindingAccessorCompiler::new(AccessorStrategy::Reflection)
            .build_getter::<String>(ds, "Model.Name")
            .unwrap();
        let vm = view_model("Carol");
        assert_eq!(compiled.get(&vm), reflected.get(&vm));

        let setter = BindingAccessorCompiler::new(AccessorStrategy::Reflection)
            .build_setter::<String>(ds, "Model.Name")
            .unwrap();
        setter.set(&vm, "Dave".to_string()).unwrap();
        assert_eq!(compiled.get(&vm), Some("Dave".to_string()));
    }

    #[test]
    fn test_erased_getter_reports_type() {
        register();
        let getter =
            BindingAccessorCompiler::create_erased_binding_getter(TypeId::of::<Model>(), "{{Score}}").unwrap();
        assert!(getter.value_type().is::<i32>());
        let model = Model {
            name: RefCell::new(String::new()),
            score: 3,
        };
        let value = getter.get(&model).and_then(|v| v.downcast::<i32>().ok());
        assert_eq!(value.map(|v| *v), Some(3));
    }
}
