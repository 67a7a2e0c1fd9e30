//! Reference-counted subsystem handles.
//!
//! Each call to [`Subsystem::init`] starts an independent subsystem instance;
//! cloning a handle is another init of the same instance and dropping it a
//! deinit. The instance shuts down when the last handle drops.

use std::fmt;
use std::rc::Rc;

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    Video,
    Font,
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubsystemKind::Video => "video",
            SubsystemKind::Font => "font",
        })
    }
}

pub struct Subsystem;

impl Subsystem {
    pub fn init(kind: SubsystemKind) -> SubsystemHandle {
        info!("{} subsystem initialized", kind);
        SubsystemHandle { inner: Rc::new(Instance { kind }) }
    }
}

#[derive(Debug)]
struct Instance {
    kind: SubsystemKind,
}

impl Drop for Instance {
    fn drop(&mut self) {
        info!("{} subsystem shut down", self.kind);
    }
}

#[derive(Debug, Clone)]
pub struct SubsystemHandle {
    inner: Rc<Instance>,
}

impl SubsystemHandle {
    pub fn kind(&self) -> SubsystemKind { self.inner.kind }

    /// Number of live handles, i.e. outstanding inits.
    pub fn init_count(&self) -> usize { Rc::strong_count(&self.inner) }

    pub fn same_instance(&self, other: &SubsystemHandle) -> bool { Rc::ptr_eq(&self.inner, &other.inner) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_count_follows_handles() {
        let first = Subsystem::init(SubsystemKind::Font);
        assert_eq!(first.init_count(), 1);
        let second = first.clone();
        assert_eq!(first.init_count(), 2);
        assert!(first.same_instance(&second));
        drop(second);
        assert_eq!(first.init_count(), 1);
        assert_eq!(first.kind(), SubsystemKind::Font);
    }

    #[test]
    fn test_separate_inits_are_independent() {
        let a = Subsystem::init(SubsystemKind::Video);
        let b = Subsystem::init(SubsystemKind::Video);
        assert!(!a.same_instance(&b));
        assert_eq!(b.init_count(), 1);
    }
}
