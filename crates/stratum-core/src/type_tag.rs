//! Type identity helpers shared by component, system and event kinds.

use std::any::{self, Any};

/// Upcast to [`Any`] for trait objects.
///
/// Implemented for every sized `'static` type, so [`Component`](crate::entity::Component)
/// and [`System`](crate::system::System) implementors never write it by hand.
/// Call it through the trait object (`(**boxed).as_any()`), not through the
/// `Box`, or the box itself becomes the downcast target.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Converts a boxed value into `Box<dyn Any>`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Type name without its module path.
///
/// Generic arguments are kept verbatim: `a::b::Probe<c::D>` becomes
/// `Probe<c::D>`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    let start = head.rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}
