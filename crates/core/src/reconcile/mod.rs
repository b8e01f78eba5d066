//! Pure reconciliation: enrollment facts to desired state, desired state to actions.

pub mod derive;
pub mod patch;
