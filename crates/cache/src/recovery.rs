//! Type recovery for the in-process store
//!
//! The memory backend keeps values in native form behind `dyn Any` and has to
//! hand them back into a destination whose type it never saw at `put` time.
//! Recovery runs in two steps:
//!
//! 1. a direct match against a fixed table of common scalar and container
//!    shapes, assigning when source and destination are exactly that shape;
//! 2. a generic assignment that accepts the destination type itself, or one
//!    level of indirection around it (`Arc<T>`, `Box<T>`, `Option<T>`).
//!
//! Anything else is a [`CacheError::TypeRecovery`], never a panic.

use crate::errors::{CacheError, Result};
use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A value held natively by the in-process store
#[derive(Clone)]
pub struct NativeValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl NativeValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type that was stored
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Transfer the stored value into `dest`
    pub fn recover_into<T: Any + Clone>(&self, dest: &mut T) -> Result<()> {
        let source: &(dyn Any + Send + Sync) = self.value.as_ref();

        if assign_direct(source, &mut *dest) || assign_generic(source, dest) {
            return Ok(());
        }

        Err(CacheError::TypeRecovery {
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

macro_rules! direct_shapes {
    ($source:expr, $dest:expr; $($shape:ty),+ $(,)?) => {
        $(
            if let Some(slot) = $dest.downcast_mut::<$shape>() {
                return match $source.downcast_ref::<$shape>() {
                    Some(value) => {
                        slot.clone_from(value);
                        true
                    }
                    None => false,
                };
            }
        )+
    };
}

/// Step 1: the destination is one of the well-known shapes and the source is
/// exactly the same shape
fn assign_direct(source: &(dyn Any + Send + Sync), dest: &mut dyn Any) -> bool {
    direct_shapes!(source, dest;
        String, Vec<u8>, bool,
        i8, i16, i32, i64, isize,
        u8, u16, u32, u64, usize,
        f32, f64,
        Duration, SystemTime,
        Vec<String>,
        HashMap<String, String>,
        BTreeMap<String, String>,
    );
    false
}

/// Step 2: the source is the destination type, or one level of indirection
/// around it. A `None` source leaves the destination untouched.
fn assign_generic<T: Any + Clone>(source: &(dyn Any + Send + Sync), dest: &mut T) -> bool {
    if let Some(value) = source.downcast_ref::<T>() {
        dest.clone_from(value);
        return true;
    }
    if let Some(value) = source.downcast_ref::<Arc<T>>() {
        dest.clone_from(value.as_ref());
        return true;
    }
    if let Some(value) = source.downcast_ref::<Box<T>>() {
        dest.clone_from(value.as_ref());
        return true;
    }
    if let Some(value) = source.downcast_ref::<Option<T>>() {
        if let Some(inner) = value {
            dest.clone_from(inner);
        }
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Session {
        user: String,
        roles: Vec<String>,
    }

    fn recover<T: Any + Clone + Default>(stored: &NativeValue) -> Result<T> {
        let mut dest = T::default();
        stored.recover_into(&mut dest)?;
        Ok(dest)
    }

    #[test]
    fn direct_shapes_are_assigned() {
        assert_eq!(recover::<i64>(&NativeValue::new(10_000i64)).unwrap(), 10_000);
        assert_eq!(recover::<u8>(&NativeValue::new(7u8)).unwrap(), 7);
        assert_eq!(recover::<f32>(&NativeValue::new(1.5f32)).unwrap(), 1.5);
        assert!(recover::<bool>(&NativeValue::new(true)).unwrap());
        assert_eq!(
            recover::<String>(&NativeValue::new("test".to_string())).unwrap(),
            "test"
        );
        assert_eq!(
            recover::<Vec<u8>>(&NativeValue::new(vec![1u8, 2, 3])).unwrap(),
            vec![1, 2, 3]
        );

        let labels = HashMap::from([("k".to_string(), "v".to_string())]);
        assert_eq!(
            recover::<HashMap<String, String>>(&NativeValue::new(labels.clone())).unwrap(),
            labels
        );
    }

    #[test]
    fn integer_widths_are_not_converted() {
        let err = recover::<i64>(&NativeValue::new(5i32)).unwrap_err();
        match err {
            CacheError::TypeRecovery { expected, found } => {
                assert_eq!(expected, "i64");
                assert_eq!(found, "i32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn arbitrary_types_use_the_generic_path() {
        let session = Session {
            user: "ada".to_string(),
            roles: vec!["admin".to_string()],
        };
        assert_eq!(recover::<Session>(&NativeValue::new(session.clone())).unwrap(), session);
    }

    #[test]
    fn one_level_of_indirection_is_followed() {
        let boxed = NativeValue::new(Box::new("boxed".to_string()));
        assert_eq!(recover::<String>(&boxed).unwrap(), "boxed");

        let shared = NativeValue::new(Arc::new(Session::default()));
        assert_eq!(recover::<Session>(&shared).unwrap(), Session::default());

        let nested = NativeValue::new(Box::new(Box::new(1u32)));
        assert!(matches!(
            recover::<u32>(&nested),
            Err(CacheError::TypeRecovery { .. })
        ));
    }

    #[test]
    fn none_leaves_the_destination_alone() {
        let stored = NativeValue::new(Option::<Session>::None);
        let mut dest = Session {
            user: "kept".to_string(),
            roles: vec![],
        };
        stored.recover_into(&mut dest).unwrap();
        assert_eq!(dest.user, "kept");
    }

    #[test]
    fn mismatched_shapes_leave_the_destination_alone() {
        let stored = NativeValue::new("text".to_string());
        let mut dest = 42u64;
        assert!(stored.recover_into(&mut dest).is_err());
        assert_eq!(dest, 42);
        assert!(stored.type_name().ends_with("String"));
    }
}
