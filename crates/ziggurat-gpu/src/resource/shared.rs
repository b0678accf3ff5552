use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering, fence};

use super::leaks;

struct RefCntBox<T> {
    ref_cnt: AtomicI32,
    value: T,
}

/// Shared-ownership handle over an intrusive atomic reference count.
///
/// A resource is created with count 1. `Clone` takes another reference
/// (`ref`), `Drop` releases one (`unref`); when the count hits zero the
/// value is deallocated exactly once, on the thread performing the final
/// release. The final release pairs an acquire fence with every other
/// owner's release decrement, so the deallocating thread observes all
/// writes those owners made.
///
/// Taking a reference on a resource whose count already reached zero is a
/// use-after-free and aborts via panic rather than corrupting memory.
pub struct Shared<T> {
    ptr: NonNull<RefCntBox<T>>,
    _marker: PhantomData<RefCntBox<T>>,
}

unsafe impl<T: Send + Sync> Send for Shared<T> {}
unsafe impl<T: Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Wraps `value` with an initial reference count of 1.
    pub fn new(value: T) -> Self {
        let boxed = Box::new(RefCntBox {
            ref_cnt: AtomicI32::new(1),
            value,
        });
        let ptr = NonNull::from(Box::leak(boxed));
        leaks::register(ptr.as_ptr() as usize, std::any::type_name::<T>());
        Shared {
            ptr,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn inner(&self) -> &RefCntBox<T> {
        // Invariant: self holds one of the counted references, so the box
        // is alive for as long as self is.
        unsafe { self.ptr.as_ref() }
    }

    /// Current reference count. Diagnostic only; racy by nature.
    #[inline]
    pub fn ref_cnt(&self) -> i32 {
        self.inner().ref_cnt.load(Ordering::Acquire)
    }

    /// True iff this handle is the only owner.
    ///
    /// Acquire ordering: when this returns true, all writes made by prior
    /// owners before they released are visible to the caller.
    #[inline]
    pub fn unique(&self) -> bool {
        self.inner().ref_cnt.load(Ordering::Acquire) == 1
    }

    /// Pointer identity: true iff both handles share one allocation.
    #[inline]
    pub fn ptr_eq(a: &Shared<T>, b: &Shared<T>) -> bool {
        a.ptr == b.ptr
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        let old = self.inner().ref_cnt.fetch_add(1, Ordering::Acquire);
        assert!(old >= 1, "ref() on a resource whose count already reached zero");
        Shared {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let old = self.inner().ref_cnt.fetch_sub(1, Ordering::Release);
        debug_assert!(old >= 1, "unref() past zero");
        if old == 1 {
            fence(Ordering::Acquire);
            leaks::unregister(self.ptr.as_ptr() as usize);
            // Last owner; reconstitute the box and run the destructor once.
            unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
        }
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("ref_cnt", &self.ref_cnt())
            .field("value", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts destructor runs for the deallocate-exactly-once property.
    struct DropCounter(Rc<Cell<u32>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn deallocates_exactly_once_after_balanced_refs() {
        let drops = Rc::new(Cell::new(0));
        let a = Shared::new(DropCounter(drops.clone()));
        assert_eq!(a.ref_cnt(), 1);
        assert!(a.unique());

        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.ref_cnt(), 3);
        assert!(!a.unique());

        drop(b);
        drop(c);
        assert_eq!(drops.get(), 0, "live owner remains");
        assert!(a.unique());

        drop(a);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn unique_reflects_single_ownership() {
        let a = Shared::new(17u32);
        assert!(a.unique());
        let b = a.clone();
        assert!(!a.unique());
        drop(b);
        assert!(a.unique());
        assert_eq!(*a, 17);
    }

    #[test]
    fn ptr_eq_distinguishes_allocations() {
        let a = Shared::new(1u8);
        let b = a.clone();
        let c = Shared::new(1u8);
        assert!(Shared::ptr_eq(&a, &b));
        assert!(!Shared::ptr_eq(&a, &c));
    }

    #[test]
    fn leak_registry_sees_live_instances() {
        // Other tests allocate concurrently, so only lower-bound the count
        // while this allocation is provably alive.
        let a = Shared::new([0u8; 16]);
        assert!(leaks::live_count() >= 1);
        drop(a);
    }
}
