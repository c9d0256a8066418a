//! Extra key/value fields attached to the current unit of execution.
//!
//! Synchronous code uses a thread-local slot ([`run_with_extras`],
//! [`set_active_extras`]); async code that may hop between worker threads
//! uses a tokio task-local ([`run_with_extras_async`], [`scope_extras`]).
//! [`active_extras`] checks the task-local first.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Value of one extra field.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    Null,
    String(String),
    /// Encoded as an integral JSON number.
    Integer(i64),
    /// Always encoded with a decimal part, `5.0` rather than `5`.
    Float(f64),
    Bool(bool),
    /// Any other numeric type, encoded as-is.
    Number(serde_json::Number),
    /// Encoded through the layout's date format.
    DateTime(DateTime<Utc>),
    /// Arbitrary nested structure.
    Structured(serde_json::Value),
}

impl ExtraValue {
    /// Encode any serializable value as a structured extra.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(ExtraValue::Structured)
    }
}

impl From<&str> for ExtraValue {
    fn from(v: &str) -> Self {
        ExtraValue::String(v.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(v: String) -> Self {
        ExtraValue::String(v)
    }
}

impl From<i64> for ExtraValue {
    fn from(v: i64) -> Self {
        ExtraValue::Integer(v)
    }
}

impl From<f64> for ExtraValue {
    fn from(v: f64) -> Self {
        ExtraValue::Float(v)
    }
}

impl From<bool> for ExtraValue {
    fn from(v: bool) -> Self {
        ExtraValue::Bool(v)
    }
}

impl From<f32> for ExtraValue {
    fn from(v: f32) -> Self {
        serde_json::Number::from_f64(f64::from(v))
            .map(ExtraValue::Number)
            .unwrap_or(ExtraValue::Null)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ExtraValue {
                fn from(v: $t) -> Self {
                    ExtraValue::Number(serde_json::Number::from(v))
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, u8, u16, u32, u64, usize, isize);

impl From<DateTime<Utc>> for ExtraValue {
    fn from(v: DateTime<Utc>) -> Self {
        ExtraValue::DateTime(v)
    }
}

impl From<serde_json::Value> for ExtraValue {
    fn from(v: serde_json::Value) -> Self {
        ExtraValue::Structured(v)
    }
}

impl<T: Into<ExtraValue>> From<Option<T>> for ExtraValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ExtraValue::Null)
    }
}

/// Shared, mutable mapping of extra fields.
///
/// Cloning is cheap and yields a handle to the same mapping, so the code
/// that populates it and the layout that reads it see the same entries.
#[derive(Debug, Clone, Default)]
pub struct ExtraFields {
    inner: Arc<RwLock<BTreeMap<String, ExtraValue>>>,
}

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Option<ExtraValue> {
        self.write().insert(key.into(), value.into())
    }

    /// Insert any `Serialize` value as a structured field.
    pub fn insert_serialized<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = ExtraValue::structured(value)?;
        self.write().insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<ExtraValue> {
        self.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<ExtraValue> {
        self.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current entries, in key order.
    pub fn snapshot(&self) -> BTreeMap<String, ExtraValue> {
        self.read().clone()
    }

    // A writer that panicked cannot leave the map half-updated, so a
    // poisoned lock is still safe to read.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ExtraValue>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ExtraValue>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

thread_local! {
    static THREAD_EXTRAS: RefCell<Option<ExtraFields>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_EXTRAS: ExtraFields;
}

/// Make `extras` the active mapping of the current thread.
pub fn set_active_extras(extras: ExtraFields) {
    THREAD_EXTRAS.with(|slot| *slot.borrow_mut() = Some(extras));
}

/// Detach the active mapping of the current thread, if any.
pub fn clear_active_extras() {
    // The slot may already be gone while the thread is shutting down.
    let _ = THREAD_EXTRAS.try_with(|slot| slot.borrow_mut().take());
}

/// Mapping visible to log calls made right now: the task-local one inside
/// [`scope_extras`], otherwise the thread-local one.
pub fn active_extras() -> Option<ExtraFields> {
    TASK_EXTRAS
        .try_with(|extras| extras.clone())
        .ok()
        .or_else(|| THREAD_EXTRAS.try_with(|slot| slot.borrow().clone()).ok().flatten())
}

struct ClearOnDrop;

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        clear_active_extras();
    }
}

/// Run `body` with a fresh, empty mapping active on this thread.
///
/// The mapping is cleared when `body` returns or unwinds. Nested calls
/// clear rather than restore the outer mapping, so don't nest them.
pub fn run_with_extras<T>(body: impl FnOnce(&ExtraFields) -> T) -> T {
    let extras = ExtraFields::new();
    set_active_extras(extras.clone());
    let _guard = ClearOnDrop;
    body(&extras)
}

/// Run `fut` with `extras` active for the current tokio task.
pub async fn scope_extras<F: Future>(extras: ExtraFields, fut: F) -> F::Output {
    TASK_EXTRAS.scope(extras, fut).await
}

/// Async counterpart of [`run_with_extras`]: the future built by `body`
/// sees a fresh mapping for as long as it runs, on whichever worker thread.
pub async fn run_with_extras_async<F, Fut>(body: F) -> Fut::Output
where
    F: FnOnce(ExtraFields) -> Fut,
    Fut: Future,
{
    let extras = ExtraFields::new();
    scope_extras(extras.clone(), body(extras)).await
}
