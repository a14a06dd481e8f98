use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased pipeline object.
///
/// Cloning is a reference-count bump, so one item can fan out to several
/// outputs without copying the value. The concrete `TypeId` is captured at
/// construction and drives output routing.
#[derive(Clone)]
pub struct Item {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Item {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Bundles several results into one item. Routing unpacks the bundle and
    /// offers each element separately.
    pub fn many(items: Vec<Item>) -> Self {
        Self::new(items)
    }

    /// Wraps an already shared value without another allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Identity comparison: true when both items share one allocation.
    pub fn same_as(&self, other: &Item) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Address of the shared value. Stable for as long as any clone of the
    /// item is alive, and equal exactly when `same_as` holds.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>().addr()
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

type Predicate = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// Matches items by concrete type, optionally narrowed by a predicate over
/// the typed value.
#[derive(Clone)]
pub struct TypeMatcher {
    type_id: Option<TypeId>,
    label: &'static str,
    predicate: Option<Predicate>,
}

impl TypeMatcher {
    /// Matches every item.
    pub fn any() -> Self {
        Self {
            type_id: None,
            label: "any",
            predicate: None,
        }
    }

    pub fn of<T: Any>() -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            label: std::any::type_name::<T>(),
            predicate: None,
        }
    }

    /// Matches values of `T` for which `predicate` holds.
    pub fn when<T: Any>(label: &'static str, predicate: fn(&T) -> bool) -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            label,
            predicate: Some(Arc::new(move |item: &Item| {
                item.downcast_ref::<T>().is_some_and(predicate)
            })),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(type_id) = self.type_id
            && type_id != item.type_id()
        {
            return false;
        }

        match &self.predicate {
            Some(predicate) => predicate(item),
            None => true,
        }
    }
}

impl fmt::Debug for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// Allow-list plus deny-list for one output.
///
/// An empty allow-list admits everything; a deny match always wins.
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    allowed: Vec<TypeMatcher>,
    denied: Vec<TypeMatcher>,
}

impl TypeFilter {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn only(allowed: impl IntoIterator<Item = TypeMatcher>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            denied: Vec::new(),
        }
    }

    pub fn denying(mut self, denied: impl IntoIterator<Item = TypeMatcher>) -> Self {
        self.deny(denied);
        self
    }

    pub fn deny(&mut self, denied: impl IntoIterator<Item = TypeMatcher>) {
        self.denied.extend(denied);
    }

    pub fn admits(&self, item: &Item) -> bool {
        let allowed =
            self.allowed.is_empty() || self.allowed.iter().any(|matcher| matcher.matches(item));
        allowed && !self.denied.iter().any(|matcher| matcher.matches(item))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Item, TypeFilter, TypeMatcher};

    #[derive(Debug, PartialEq)]
    struct Ping(u8);

    #[test]
    fn item_keeps_concrete_type() {
        let item = Item::new(Ping(3));
        assert!(item.is::<Ping>());
        assert!(!item.is::<u8>());
        assert_eq!(item.downcast_ref::<Ping>(), Some(&Ping(3)));
        assert!(item.type_name().ends_with("Ping"));
    }

    #[test]
    fn clones_share_identity() {
        let shared = Arc::new(Ping(1));
        let a = Item::from_arc(Arc::clone(&shared));
        let b = a.clone();
        let c = Item::new(Ping(1));

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
        let back = a.downcast::<Ping>().expect("downcast should succeed");
        assert!(Arc::ptr_eq(&back, &shared));
    }

    #[test]
    fn predicate_narrows_type_match() {
        let even = TypeMatcher::when::<Ping>("even ping", |p| p.0 % 2 == 0);
        assert!(even.matches(&Item::new(Ping(2))));
        assert!(!even.matches(&Item::new(Ping(3))));
        assert!(!even.matches(&Item::new(2u8)));
    }

    #[test]
    fn deny_list_overrides_allow_list() {
        let filter = TypeFilter::only([TypeMatcher::of::<Ping>()])
            .denying([TypeMatcher::when::<Ping>("zero", |p| p.0 == 0)]);

        assert!(filter.admits(&Item::new(Ping(1))));
        assert!(!filter.admits(&Item::new(Ping(0))));
        assert!(!filter.admits(&Item::new("text")));
        assert!(TypeFilter::allow_all().admits(&Item::new("text")));
        assert!(!TypeFilter::allow_all().denying([TypeMatcher::any()]).admits(&Item::new(1u32)));
    }
}
