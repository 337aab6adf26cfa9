//! Runtime type information for binding data sources.
//!
//! Binding expressions are resolved against [`TypeInfo`] records: one per
//! data source type, listing the members a path segment may name. Records
//! are usually produced by `#[derive(DataSource)]` and registered with
//! [`DataSource::register_type`], but they can also be assembled by hand.
//!
//! Member access is type-erased. A getter receives the containing value as
//! `&dyn Any` and returns a boxed clone of the member; a navigator passes a
//! borrowed view of the member (with `Rc`, `Option` and
//! [`Property`](crate::property::Property) layers stripped) to a continuation,
//! so paths can descend without cloning intermediate objects.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::logging::targets;

/// Read a member, returning a boxed clone of its value.
pub type MemberGetter = fn(&dyn Any) -> Option<Box<dyn Any>>;

/// Write a member. Returns `false` if the boxed value has the wrong type.
pub type MemberSetter = fn(&dyn Any, Box<dyn Any>) -> bool;

/// Pass a borrowed view of a member to a continuation.
///
/// The continuation is not called when the member is absent (for example an
/// empty `Option`).
pub type MemberNavigator = fn(&dyn Any, &mut dyn FnMut(&dyn Any));

/// Pass the data source wrapped by a wrapper type to a continuation.
pub type DataSourceUnwrapper = fn(&dyn Any, &mut dyn FnMut(&dyn Any));

/// A type identity with its name, for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberType {
    id: TypeId,
    name: &'static str,
}

impl MemberType {
    /// The member type of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type identity.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is the type `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What kind of member a path segment resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// An accessor-backed member. Preferred when names collide.
    Property,
    /// A plain field.
    Field,
    /// A dependency property of a [`DependencyObject`](crate::DependencyObject) data source.
    DependencyProperty,
}

/// A member of a data source type.
#[derive(Clone)]
pub struct MemberInfo {
    name: &'static str,
    kind: MemberKind,
    value_type: MemberType,
    navigation_type: MemberType,
    getter: MemberGetter,
    setter: Option<MemberSetter>,
    navigator: Option<MemberNavigator>,
}

impl MemberInfo {
    /// A field member whose value has type `V`.
    pub fn field<V: 'static>(name: &'static str, getter: MemberGetter) -> Self {
        Self::new::<V>(name, MemberKind::Field, getter)
    }

    /// A property member whose value has type `V`.
    pub fn property<V: 'static>(name: &'static str, getter: MemberGetter) -> Self {
        Self::new::<V>(name, MemberKind::Property, getter)
    }

    fn new<V: 'static>(name: &'static str, kind: MemberKind, getter: MemberGetter) -> Self {
        Self {
            name,
            kind,
            value_type: MemberType::of::<V>(),
            navigation_type: MemberType::of::<V>(),
            getter,
            setter: None,
            navigator: None,
        }
    }

    /// Make the member writable.
    pub fn with_setter(mut self, setter: MemberSetter) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Navigate into the member as a value of type `N`.
    pub fn with_navigation<N: 'static>(mut self, navigator: MemberNavigator) -> Self {
        self.navigation_type = MemberType::of::<N>();
        self.navigator = Some(navigator);
        self
    }

    /// The member name as it appears in binding paths.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The member kind.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// The type of the member's value.
    pub fn value_type(&self) -> MemberType {
        self.value_type
    }

    /// The type a path descends into through this member.
    pub fn navigation_type(&self) -> MemberType {
        self.navigation_type
    }

    /// Returns `true` if the member has a setter.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the member from its containing value.
    pub fn get(&self, source: &dyn Any) -> Option<Box<dyn Any>> {
        (self.getter)(source)
    }

    /// Write the member. Returns `None` if the member has no setter.
    pub fn set(&self, source: &dyn Any, value: Box<dyn Any>) -> Option<bool> {
        self.setter.map(|setter| setter(source, value))
    }

    /// Descend into the member.
    pub fn navigate(&self, source: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        match self.navigator {
            Some(navigator) => navigator(source, f),
            None => {
                if let Some(value) = (self.getter)(source) {
                    f(&*value);
                }
            }
        }
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// An accessor generated ahead of time for one exact member path.
#[derive(Clone)]
pub struct PrecompiledAccessor {
    path: &'static str,
    value_type: MemberType,
    getter: MemberGetter,
    setter: Option<MemberSetter>,
}

impl PrecompiledAccessor {
    /// A precompiled accessor for `path` producing values of type `V`.
    pub fn new<V: 'static>(path: &'static str, getter: MemberGetter) -> Self {
        Self {
            path,
            value_type: MemberType::of::<V>(),
            getter,
            setter: None,
        }
    }

    /// Make the accessor writable.
    pub fn with_setter(mut self, setter: MemberSetter) -> Self {
        self.setter = Some(setter);
        self
    }

    /// The member path this accessor serves.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The type of the value the accessor produces.
    pub fn value_type(&self) -> MemberType {
        self.value_type
    }

    /// Returns `true` if the accessor has a setter.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read through the accessor.
    pub fn get(&self, source: &dyn Any) -> Option<Box<dyn Any>> {
        (self.getter)(source)
    }

    /// Write through the accessor. Returns `None` if it is read-only.
    pub fn set(&self, source: &dyn Any, value: Box<dyn Any>) -> Option<bool> {
        self.setter.map(|setter| setter(source, value))
    }
}

impl fmt::Debug for PrecompiledAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrecompiledAccessor")
            .field("path", &self.path)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Outcome of looking a member up by name.
#[derive(Debug)]
pub enum MemberLookup<'a> {
    /// Exactly one best member matched.
    Found(&'a MemberInfo),
    /// More than one member of the preferred kind matched.
    Ambiguous,
    /// Nothing matched.
    Missing,
}

/// Binding metadata for one data source type.
#[derive(Clone)]
pub struct TypeInfo {
    ty: MemberType,
    members: Vec<MemberInfo>,
    precompiled: Vec<PrecompiledAccessor>,
    unwrapper: Option<DataSourceUnwrapper>,
}

impl TypeInfo {
    /// Empty metadata for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            ty: MemberType::of::<T>(),
            members: Vec::new(),
            precompiled: Vec::new(),
            unwrapper: None,
        }
    }

    /// Add a member.
    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    /// Add a precompiled accessor.
    pub fn with_precompiled(mut self, accessor: PrecompiledAccessor) -> Self {
        self.precompiled.push(accessor);
        self
    }

    /// Mark the type as a wrapper around another data source.
    pub fn with_unwrapper(mut self, unwrapper: DataSourceUnwrapper) -> Self {
        self.unwrapper = Some(unwrapper);
        self
    }

    /// The described type.
    pub fn member_type(&self) -> MemberType {
        self.ty
    }

    /// All members, in declaration order.
    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    /// Find the precompiled accessor for an exact member path.
    pub fn precompiled(&self, path: &str) -> Option<&PrecompiledAccessor> {
        self.precompiled.iter().find(|accessor| accessor.path == path)
    }

    /// The unwrapper, if this type wraps another data source.
    pub fn unwrapper(&self) -> Option<DataSourceUnwrapper> {
        self.unwrapper
    }

    /// Look up a member by name, preferring properties over fields.
    pub fn find_member(&self, name: &str) -> MemberLookup<'_> {
        for kind in [MemberKind::Property, MemberKind::Field] {
            let mut matches = self
                .members
                .iter()
                .filter(|member| member.kind == kind && member.name == name);
            match (matches.next(), matches.next()) {
                (Some(_), Some(_)) => return MemberLookup::Ambiguous,
                (Some(member), None) => return MemberLookup::Found(member),
                _ => {}
            }
        }
        MemberLookup::Missing
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("type", &self.ty)
            .field("members", &self.members)
            .field("precompiled", &self.precompiled)
            .field("is_wrapper", &self.unwrapper.is_some())
            .finish()
    }
}

/// A type that describes itself to the binding system.
///
/// Usually implemented with `#[derive(DataSource)]`.
pub trait DataSource: 'static {
    /// Build the type's binding metadata.
    fn type_info() -> TypeInfo;

    /// Register the type's metadata in the [`TypeRegistry`].
    fn register_type()
    where
        Self: Sized,
    {
        TypeRegistry::register(Self::type_info());
    }
}

static TYPES: OnceLock<Mutex<HashMap<TypeId, Arc<TypeInfo>>>> = OnceLock::new();
static WRAPPERS: OnceLock<Mutex<HashMap<TypeId, TypeId>>> = OnceLock::new();

fn types() -> &'static Mutex<HashMap<TypeId, Arc<TypeInfo>>> {
    TYPES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn wrappers() -> &'static Mutex<HashMap<TypeId, TypeId>> {
    WRAPPERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The process-wide registry of data source metadata.
pub struct TypeRegistry;

impl TypeRegistry {
    /// Register (or replace) a type's metadata.
    pub fn register(info: TypeInfo) {
        tracing::trace!(
            target: targets::BINDING,
            type_name = info.ty.name,
            members = info.members.len(),
            "registered data source type"
        );
        types().lock().insert(info.ty.id, Arc::new(info));
    }

    /// Metadata for a type, if registered.
    pub fn get(type_id: TypeId) -> Option<Arc<TypeInfo>> {
        types().lock().get(&type_id).cloned()
    }

    /// Returns `true` if the type has registered metadata.
    pub fn contains(type_id: TypeId) -> bool {
        types().lock().contains_key(&type_id)
    }

    /// Declare that values of type `Wrapped` appear at runtime wrapped in `Wrapper`.
    ///
    /// Path resolution substitutes `Wrapper` whenever it descends into `Wrapped`.
    pub fn register_wrapper<Wrapped: 'static, Wrapper: 'static>() {
        wrappers()
            .lock()
            .insert(TypeId::of::<Wrapped>(), TypeId::of::<Wrapper>());
    }

    /// The wrapper registered for a type, if any.
    pub fn wrapper_for(type_id: TypeId) -> Option<TypeId> {
        wrappers().lock().get(&type_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i32,
        y: i32,
    }

    fn point_x(source: &dyn Any) -> Option<Box<dyn Any>> {
        source.downcast_ref::<Point>().map(|p| Box::new(p.x) as Box<dyn Any>)
    }

    fn point_y(source: &dyn Any) -> Option<Box<dyn Any>> {
        source.downcast_ref::<Point>().map(|p| Box::new(p.y) as Box<dyn Any>)
    }

    #[test]
    fn test_member_access() {
        let member = MemberInfo::field::<i32>("X", point_x);
        let point = Point { x: 3, y: 4 };

        let value = member.get(&point).and_then(|b| b.downcast::<i32>().ok());
        assert_eq!(value.map(|b| *b), Some(3));
        assert!(!member.is_writable());
        assert_eq!(member.set(&point, Box::new(1)), None);
        assert!(member.value_type().is::<i32>());

        let mut seen = None;
        member.navigate(&point, &mut |inner| seen = inner.downcast_ref::<i32>().copied());
        assert_eq!(seen, Some(3));
    }

    #[test]
    fn test_find_member_prefers_property() {
        let info = TypeInfo::of::<Point>()
            .with_member(MemberInfo::field::<i32>("X", point_x))
            .with_member(MemberInfo::property::<i32>("X", point_y));

        match info.find_member("X") {
            MemberLookup::Found(member) => assert_eq!(member.kind(), MemberKind::Property),
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert!(matches!(info.find_member("Z"), MemberLookup::Missing));
    }

    #[test]
    fn test_find_member_ambiguous() {
        let info = TypeInfo::of::<Point>()
            .with_member(MemberInfo::field::<i32>("X", point_x))
            .with_member(MemberInfo::field::<i32>("X", point_y));
        assert!(matches!(info.find_member("X"), MemberLookup::Ambiguous));
    }

    #[test]
    fn test_registry() {
        struct Registered;
        struct RegisteredWrapper;

        TypeRegistry::register(TypeInfo::of::<Registered>());
        assert!(TypeRegistry::contains(TypeId::of::<Registered>()));
        assert!(TypeRegistry::get(TypeId::of::<Point>()).is_none());

        TypeRegistry::register_wrapper::<Registered, RegisteredWrapper>();
        assert_eq!(
            TypeRegistry::wrapper_for(TypeId::of::<Registered>()),
            Some(TypeId::of::<RegisteredWrapper>())
        );
    }
}
