use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::core::types::TypeKey;

/// A host value tagged with its exact runtime type.
#[derive(Clone)]
pub struct Value {
    ty: TypeKey,
    data: Arc<dyn Any + Send + Sync>,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(ty: TypeKey, data: T) -> Self {
        Self {
            ty,
            data: Arc::new(data),
        }
    }

    pub fn from_arc(ty: TypeKey, data: Arc<dyn Any + Send + Sync>) -> Self {
        Self { ty, data }
    }

    /// The concrete runtime type of this value.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.data.is::<T>()
    }

    pub fn payload(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.data
    }

    /// Same type and same payload allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        self.ty == other.ty && Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("ty", &self.ty).finish_non_exhaustive()
    }
}

/// What an event getter yields.
#[derive(Debug, Clone)]
pub enum Extracted {
    One(Value),
    Many(SmallVec<[Value; 4]>),
}

impl Extracted {
    pub fn len(&self) -> usize {
        match self {
            Extracted::One(_) => 1,
            Extracted::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        match self {
            Extracted::One(value) => std::slice::from_ref(value).iter(),
            Extracted::Many(values) => values.iter(),
        }
    }

    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Extracted::One(value) => vec![value],
            Extracted::Many(values) => values.into_vec(),
        }
    }

    /// Apply `f` to every value, dropping the ones it rejects.
    pub fn filter_map(self, mut f: impl FnMut(Value) -> Option<Value>) -> Option<Extracted> {
        match self {
            Extracted::One(value) => f(value).map(Extracted::One),
            Extracted::Many(values) => {
                let mapped: SmallVec<[Value; 4]> = values.into_iter().filter_map(f).collect();
                if mapped.is_empty() {
                    None
                } else {
                    Some(Extracted::Many(mapped))
                }
            }
        }
    }
}

impl From<Value> for Extracted {
    fn from(value: Value) -> Self {
        Extracted::One(value)
    }
}

impl FromIterator<Value> for Extracted {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Extracted::Many(iter.into_iter().collect())
    }
}
