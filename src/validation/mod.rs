//! Lock-time checks of the global ordering invariants.

pub use self::validator::Validator;

mod validator;
pub(crate) mod rules {
    pub mod ordering;
    pub mod references;
    pub mod temporal;
}
