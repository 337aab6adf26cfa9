//! Property values that wrap externally-owned, mutable resources.
//!
//! Such values can change meaning without the property value itself being
//! replaced: a texture is re-uploaded, a text buffer is edited in place. The
//! value engine treats them as resource wrappers. It digests them every
//! cycle and raises a change notification when
//! [`PropertyValue::resource_version`] moves, even though the wrapper still
//! compares equal.
//!
//! - [`SourcedResource<R>`] wraps any shared [`VersionedResource`].
//! - [`VersionedStringBuilder`] is an editable text buffer;
//!   [`VersionedStringSource`] is a snapshot handle to it that refuses to be
//!   read once the buffer has moved on.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{PresentationError, Result};
use crate::value::PropertyValue;

/// A resource that reports a version which changes whenever its contents do.
pub trait VersionedResource: fmt::Debug + 'static {
    /// The current contents version.
    fn version(&self) -> u64;
}

/// A property value referring to a shared resource.
pub struct SourcedResource<R: ?Sized> {
    resource: Option<Rc<R>>,
}

impl<R: VersionedResource> SourcedResource<R> {
    /// Wrap a resource.
    pub fn new(resource: Rc<R>) -> Self {
        Self {
            resource: Some(resource),
        }
    }

    /// A wrapper referring to nothing.
    pub fn empty() -> Self {
        Self { resource: None }
    }

    /// The wrapped resource.
    pub fn resource(&self) -> Option<&Rc<R>> {
        self.resource.as_ref()
    }
}

impl<R: ?Sized> Clone for SourcedResource<R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

impl<R: VersionedResource> Default for SourcedResource<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: VersionedResource> fmt::Debug for SourcedResource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "SourcedResource({resource:?})"),
            None => f.write_str("SourcedResource(<empty>)"),
        }
    }
}

impl<R: VersionedResource> PropertyValue for SourcedResource<R> {
    const IS_RESOURCE_WRAPPER: bool = true;

    fn property_eq(&self, other: &Self) -> bool {
        match (&self.resource, &other.resource) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn resource_version(&self) -> Option<u64> {
        self.resource.as_ref().map(|resource| resource.version())
    }
}

#[derive(Debug, Default)]
struct StringBuffer {
    text: RefCell<String>,
    version: Cell<u64>,
}

/// An editable text buffer whose edits bump a version.
#[derive(Debug, Clone, Default)]
pub struct VersionedStringBuilder {
    buffer: Rc<StringBuffer>,
}

impl VersionedStringBuilder {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current version.
    pub fn version(&self) -> u64 {
        self.buffer.version.get()
    }

    fn edit(&self, f: impl FnOnce(&mut String)) {
        f(&mut self.buffer.text.borrow_mut());
        self.buffer.version.set(self.buffer.version.get() + 1);
    }

    /// Append text.
    pub fn push_str(&self, text: &str) {
        self.edit(|buffer| buffer.push_str(text));
    }

    /// Replace the contents.
    pub fn set(&self, text: &str) {
        self.edit(|buffer| {
            buffer.clear();
            buffer.push_str(text);
        });
    }

    /// Remove all text.
    pub fn clear(&self) {
        self.edit(String::clear);
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.text.borrow().len()
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.text.borrow().is_empty()
    }

    /// A snapshot handle valid until the next edit.
    pub fn to_source(&self) -> VersionedStringSource {
        VersionedStringSource {
            buffer: Some(self.buffer.clone()),
            captured: self.version(),
        }
    }
}

/// A handle to a [`VersionedStringBuilder`]'s contents at one version.
#[derive(Clone, Default)]
pub struct VersionedStringSource {
    buffer: Option<Rc<StringBuffer>>,
    captured: u64,
}

impl VersionedStringSource {
    /// A source with no buffer, reading as the empty string.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The version captured when the source was created.
    pub fn captured_version(&self) -> u64 {
        self.captured
    }

    /// Returns `true` if the buffer has been edited since capture.
    pub fn is_stale(&self) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|buffer| buffer.version.get() != self.captured)
    }

    fn check(&self) -> Result<Option<&StringBuffer>> {
        match &self.buffer {
            Some(buffer) if buffer.version.get() != self.captured => Err(PresentationError::StaleCache {
                captured: self.captured,
                current: buffer.version.get(),
            }),
            buffer => Ok(buffer.as_deref()),
        }
    }

    /// Run `f` with the text.
    ///
    /// Fails with [`PresentationError::StaleCache`] if the buffer was edited
    /// after this source was created.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> Result<R> {
        Ok(match self.check()? {
            Some(buffer) => f(&buffer.text.borrow()),
            None => f(""),
        })
    }

    /// The text, copied.
    pub fn to_string_checked(&self) -> Result<String> {
        self.with_str(str::to_string)
    }
}

impl fmt::Debug for VersionedStringSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.check() {
            Ok(Some(buffer)) => write!(f, "{:?}@{}", buffer.text.borrow(), self.captured),
            Ok(None) => f.write_str("\"\""),
            Err(_) => write!(f, "<stale @{}>", self.captured),
        }
    }
}

impl PropertyValue for VersionedStringSource {
    const IS_RESOURCE_WRAPPER: bool = true;

    fn property_eq(&self, other: &Self) -> bool {
        let same_buffer = match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_buffer && self.captured == other.captured
    }

    fn resource_version(&self) -> Option<u64> {
        self.buffer.as_ref().map(|buffer| buffer.version.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Texture {
        generation: Cell<u64>,
    }

    impl VersionedResource for Texture {
        fn version(&self) -> u64 {
            self.generation.get()
        }
    }

    #[test]
    fn test_sourced_resource_identity_and_version() {
        let texture = Rc::new(Texture::default());
        let a = SourcedResource::new(texture.clone());
        let b = SourcedResource::new(texture.clone());
        let other = SourcedResource::new(Rc::new(Texture::default()));

        assert!(a.property_eq(&b));
        assert!(!a.property_eq(&other));
        assert!(SourcedResource::<Texture>::empty().property_eq(&SourcedResource::empty()));

        assert_eq!(a.resource_version(), Some(0));
        texture.generation.set(3);
        assert_eq!(b.resource_version(), Some(3));
    }

    #[test]
    fn test_stale_source_fails() {
        let builder = VersionedStringBuilder::new();
        builder.push_str("Hello");
        let source = builder.to_source();
        assert_eq!(source.to_string_checked().unwrap(), "Hello");
        assert!(!source.is_stale());

        builder.push_str(", world");
        assert!(source.is_stale());
        assert_eq!(
            source.to_string_checked(),
            Err(PresentationError::StaleCache { captured: 1, current: 2 })
        );
        assert_eq!(builder.to_source().to_string_checked().unwrap(), "Hello, world");
    }

    #[test]
    fn test_source_equality_tracks_version() {
        let builder = VersionedStringBuilder::new();
        let first = builder.to_source();
        assert!(first.property_eq(&builder.to_source()));
        builder.set("edited");
        assert!(!first.property_eq(&builder.to_source()));
        assert_eq!(first.resource_version(), Some(1));
        assert_eq!(VersionedStringSource::empty().to_string_checked().unwrap(), "");
    }
}
