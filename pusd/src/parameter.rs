//! Observable onboard parameters
//!
//! A parameter holds one typed value. Observers registered with
//! [`Parameter::subscribe`] are called synchronously, in subscription order,
//! every time [`Parameter::set`] changes the value. Observers that report
//! themselves inactive are dropped after the notification round.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use puscommon::{FieldType, ParamValue, PusError, PusResult};

/// Receiver of parameter change notifications
pub trait ParameterObserver: Send + Sync {
    fn notify(&self, old: &ParamValue, new: &ParamValue);

    /// Whether the observer still wants notifications
    fn is_active(&self) -> bool {
        true
    }
}

/// A named, typed, observable value
pub struct Parameter {
    name: String,
    field_type: FieldType,
    value: Mutex<ParamValue>,
    observers: Mutex<Vec<Arc<dyn ParameterObserver>>>,
}

impl Parameter {
    /// Create a parameter; its type is fixed by the initial value
    pub fn new(name: impl Into<String>, initial: ParamValue) -> Self {
        Self {
            name: name.into(),
            field_type: initial.field_type(),
            value: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Current value
    pub fn value(&self) -> ParamValue {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new value and notify observers if it differs from the old one.
    /// Returns whether the value changed.
    pub fn set(&self, value: ParamValue) -> PusResult<bool> {
        if value.field_type() != self.field_type {
            return Err(PusError::TypeMismatch {
                expected: self.field_type.name(),
                actual: value.field_type().name(),
            });
        }

        let old = {
            let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == value {
                return Ok(false);
            }
            std::mem::replace(&mut *current, value)
        };

        // Observers may read this parameter, so no lock is held while notifying
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let mut stale = false;
        for observer in &observers {
            if observer.is_active() {
                observer.notify(&old, &value);
            } else {
                stale = true;
            }
        }
        if stale {
            self.observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|observer| observer.is_active());
        }
        Ok(true)
    }

    pub fn subscribe(&self, observer: Arc<dyn ParameterObserver>) {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &self.value())
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Changes(Mutex<Vec<(ParamValue, ParamValue)>>);

    impl ParameterObserver for Changes {
        fn notify(&self, old: &ParamValue, new: &ParamValue) {
            self.0.lock().unwrap().push((*old, *new));
        }
    }

    #[test]
    fn test_set_notifies_on_change() {
        let param = Parameter::new("mode", ParamValue::U8(0));
        let changes = Arc::new(Changes::default());
        param.subscribe(changes.clone());

        assert!(param.set(ParamValue::U8(1)).unwrap());
        assert!(!param.set(ParamValue::U8(1)).unwrap());
        assert!(param.set(ParamValue::U8(2)).unwrap());

        assert_eq!(param.value(), ParamValue::U8(2));
        let seen = changes.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(ParamValue::U8(0), ParamValue::U8(1)), (ParamValue::U8(1), ParamValue::U8(2))]
        );
    }

    #[test]
    fn test_set_rejects_other_type() {
        let param = Parameter::new("temperature", ParamValue::F32(20.0));
        assert!(matches!(param.set(ParamValue::U8(1)), Err(PusError::TypeMismatch { .. })));
        assert_eq!(param.value(), ParamValue::F32(20.0));
    }

    #[test]
    fn test_observer_may_read_parameter() {
        struct Reader(Arc<Parameter>, Mutex<Option<ParamValue>>);
        impl ParameterObserver for Reader {
            fn notify(&self, _old: &ParamValue, _new: &ParamValue) {
                *self.1.lock().unwrap() = Some(self.0.value());
            }
        }

        let param = Arc::new(Parameter::new("mode", ParamValue::U8(0)));
        let reader = Arc::new(Reader(param.clone(), Mutex::new(None)));
        param.subscribe(reader.clone());

        param.set(ParamValue::U8(3)).unwrap();
        assert_eq!(*reader.1.lock().unwrap(), Some(ParamValue::U8(3)));
    }

    #[test]
    fn test_inactive_observer_removed() {
        struct Expiring(AtomicBool, Mutex<u32>);
        impl ParameterObserver for Expiring {
            fn notify(&self, _old: &ParamValue, _new: &ParamValue) {
                *self.1.lock().unwrap() += 1;
            }
            fn is_active(&self) -> bool {
                self.0.load(Ordering::SeqCst)
            }
        }

        let param = Parameter::new("mode", ParamValue::U8(0));
        let observer = Arc::new(Expiring(AtomicBool::new(true), Mutex::new(0)));
        param.subscribe(observer.clone());
        param.subscribe(Arc::new(Changes::default()));

        param.set(ParamValue::U8(1)).unwrap();
        observer.0.store(false, Ordering::SeqCst);
        param.set(ParamValue::U8(2)).unwrap();

        assert_eq!(*observer.1.lock().unwrap(), 1);
        assert_eq!(param.observer_count(), 1);
    }
}
