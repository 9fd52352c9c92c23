mod cap;
pub mod types;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

pub use cap::RaplCap;
pub use types::RaplLimit;

use crate::config::Config;

/// Process-wide default context
///
/// Built uninitialized on first use from [`Config::from_env`]. The
/// read-only hint is read again on every `init`. The mutex
/// only serialises individual calls; callers sharing the default context
/// across threads still have to order `init` and `destroy` themselves.
pub fn default_instance() -> &'static Mutex<RaplCap> {
    static INSTANCE: Lazy<Mutex<RaplCap>> =
        Lazy::new(|| Mutex::new(RaplCap::new(Config::from_env()).with_env_read_only()));
    &INSTANCE
}

/// Run `f` on `rc`, or on the default context if `rc` is `None`
///
/// The default context stays locked for the duration of `f`.
pub fn with_context<R>(rc: Option<&mut RaplCap>, f: impl FnOnce(&mut RaplCap) -> R) -> R {
    match rc {
        Some(rc) => f(rc),
        None => f(&mut default_instance().lock()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StaticTopology;

    #[test]
    fn test_default_singleton() {
        let rc1 = default_instance();
        let rc2 = default_instance();
        assert!(std::ptr::eq(rc1, rc2));
    }

    #[test]
    fn test_with_context_selects_instance() {
        let mut own = RaplCap::with_topology(Config::default(), StaticTopology::uniform(3));
        let own_ptr: *const RaplCap = &own;

        let used = with_context(Some(&mut own), |rc| rc as *const RaplCap);
        assert_eq!(used, own_ptr);

        let used = with_context(None, |rc| rc as *const RaplCap);
        let default_ptr: *const RaplCap = &*default_instance().lock();
        assert_eq!(used, default_ptr);
        assert_ne!(used, own_ptr);
    }
}
