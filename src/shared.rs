//! Single shared-pointer alias, switched between `Rc` and `Arc` by the
//! `sync` feature — mirrors the `Rc`/`Arc` split the teacher crate uses for
//! its own `Header` handle.

#[cfg(not(feature = "sync"))]
pub type Shared<T> = std::rc::Rc<T>;

#[cfg(feature = "sync")]
pub type Shared<T> = std::sync::Arc<T>;
