//! Free lists for entity structs.
//!
//! Values are reset when they are acquired and again when they are released,
//! so a recycled instance never carries state from a previous request.
//! Usage counters live in an injected [`PoolStats`] so tests and callers can
//! keep isolated instances.

use crate::config::PoolConfig;
use crate::models::{Department, DepartmentKey, Employee, EmployeeKey};
use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A type the [`ModelPool`] can recycle.
pub trait Poolable: Default + Send + 'static {
    /// Return to the zero state. With `cascade`, nested pooled values go back
    /// to `models`; without it they are dropped.
    fn reset(&mut self, models: &ModelPool, cascade: bool);

    /// Free list holding idle instances; `None` means values are never kept.
    fn free_list(_models: &ModelPool) -> Option<&FreeList<Self>> {
        None
    }
}

impl Poolable for i64 {
    fn reset(&mut self, _models: &ModelPool, _cascade: bool) {
        *self = 0;
    }
}

/// A bounded, mutex-protected stack of idle values.
#[derive(Debug)]
pub struct FreeList<T> {
    items: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> FreeList<T> {
    pub fn new(max_idle: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    pub(crate) fn pop(&self) -> Option<T> {
        self.items.lock().pop()
    }

    /// Keep `value` unless the list is full. Returns whether it was kept.
    pub(crate) fn push(&self, value: T) -> bool {
        let mut items = self.items.lock();
        if items.len() >= self.max_idle {
            return false;
        }
        items.push(value);
        true
    }

    /// Number of idle values.
    pub fn idle(&self) -> usize {
        self.items.lock().len()
    }
}

/// Atomic usage counters shared by one or more pools.
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
    discarded: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquire(&self, allocated: bool) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        if allocated {
            self.allocated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_release(&self, kept: bool) {
        self.released.fetch_add(1, Ordering::Relaxed);
        if !kept {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquired: self.acquired(),
            released: self.released(),
            allocated: self.allocated(),
            discarded: self.discarded(),
        }
    }
}

/// Counter values at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatsSnapshot {
    pub acquired: u64,
    pub released: u64,
    /// Acquisitions served by a fresh allocation
    pub allocated: u64,
    /// Releases dropped because the free list was full or the value too small
    pub discarded: u64,
}

/// Free lists for every entity type.
#[derive(Debug)]
pub struct ModelPool {
    departments: FreeList<Department>,
    employees: FreeList<Employee>,
    department_keys: FreeList<DepartmentKey>,
    employee_keys: FreeList<EmployeeKey>,
    stats: Arc<PoolStats>,
}

impl ModelPool {
    /// Each free list keeps at most `max_idle` values.
    pub fn new(max_idle: usize, stats: Arc<PoolStats>) -> Self {
        Self {
            departments: FreeList::new(max_idle),
            employees: FreeList::new(max_idle),
            department_keys: FreeList::new(max_idle),
            employee_keys: FreeList::new(max_idle),
            stats,
        }
    }

    pub fn from_config(config: &PoolConfig, stats: Arc<PoolStats>) -> Self {
        Self::new(config.max_idle_objects, stats)
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// A reset instance, recycled when one is idle.
    pub fn acquire<T: Poolable>(&self) -> T {
        match T::free_list(self).and_then(FreeList::pop) {
            Some(mut value) => {
                value.reset(self, true);
                self.stats.record_acquire(false);
                value
            }
            None => {
                self.stats.record_acquire(true);
                T::default()
            }
        }
    }

    /// Reset `value` and keep it for reuse.
    pub fn release<T: Poolable>(&self, mut value: T, cascade: bool) {
        value.reset(self, cascade);
        let kept = match T::free_list(self) {
            Some(list) => list.push(value),
            None => false,
        };
        self.stats.record_release(kept);
    }

    /// Release every element of `items`, leaving it empty.
    pub fn release_all<T: Poolable>(&self, items: &mut Vec<T>, cascade: bool) {
        for value in items.drain(..) {
            self.release(value, cascade);
        }
    }

    /// Acquire a value that returns itself to the pool when dropped.
    pub fn guard<T: Poolable>(&self) -> Pooled<'_, T> {
        Pooled {
            value: self.acquire(),
            models: self,
            detached: false,
        }
    }

    pub(crate) fn departments(&self) -> &FreeList<Department> {
        &self.departments
    }

    pub(crate) fn employees(&self) -> &FreeList<Employee> {
        &self.employees
    }

    pub(crate) fn department_keys(&self) -> &FreeList<DepartmentKey> {
        &self.department_keys
    }

    pub(crate) fn employee_keys(&self) -> &FreeList<EmployeeKey> {
        &self.employee_keys
    }
}

/// Pooled value released with cascade on drop.
pub struct Pooled<'p, T: Poolable> {
    value: T,
    models: &'p ModelPool,
    detached: bool,
}

impl<T: Poolable> Pooled<'_, T> {
    /// Take the value out; it will not be returned to the pool.
    pub fn into_inner(mut self) -> T {
        self.detached = true;
        std::mem::take(&mut self.value)
    }
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if !self.detached {
            let value = std::mem::take(&mut self.value);
            self.models.release(value, true);
        }
    }
}
