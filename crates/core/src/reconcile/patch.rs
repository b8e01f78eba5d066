//! Diff desired against observed account state into directory actions.

use serde::{Deserialize, Serialize};

use crate::config::DistrictConfig;
use crate::models::account::{
    DesiredAccountState, GroupRef, NewAccount, ObservedAccountState, UpdatePatch,
};

/// One directory operation for a student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "action", content = "detail")]
pub enum Action {
    CreateAccount(NewAccount),
    UpdateAccount { email: String, patch: UpdatePatch },
    RemoveFromGroups { email: String, groups: Vec<GroupRef> },
    NoOp(NoOpReason),
}

/// Why nothing needs to be sent for a student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The directory already matches the desired state.
    InSync,
    /// Inactive student with no account; accounts are never created just to suspend them.
    MissingSuspendedAccount,
}

/// Conditions worth a warning that do not stop the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "warning")]
pub enum PlanWarning {
    /// The account sits in a frozen OU, so the move was held back.
    FrozenOrgUnit {
        current: String,
        desired: String,
        frozen: String,
    },
    /// The custom attribute category was missing and will be written fresh.
    MissingCustomAttributes,
}

/// Actions for one student plus any warnings raised while diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPlan {
    pub actions: Vec<Action>,
    pub warnings: Vec<PlanWarning>,
}

impl PatchPlan {
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(|a| matches!(a, Action::NoOp(_)))
    }
}

/// True when applying `desired` would move an active account to suspended.
pub fn suspends_account(desired: &DesiredAccountState, observed: &ObservedAccountState) -> bool {
    desired.suspended && !observed.suspended
}

/// Build the minimal set of actions that brings `observed` in line with `desired`.
///
/// New accounts get the configured initial password and must change it at first login.
pub fn build_patch(
    desired: &DesiredAccountState,
    observed: Option<&ObservedAccountState>,
    config: &DistrictConfig,
) -> PatchPlan {
    let Some(observed) = observed else {
        let action = if desired.suspended {
            Action::NoOp(NoOpReason::MissingSuspendedAccount)
        } else {
            Action::CreateAccount(NewAccount {
                email: desired.email.clone(),
                given_name: desired.given_name.clone(),
                family_name: desired.family_name.clone(),
                password: config.new_user_password.clone().unwrap_or_default(),
                change_password_at_next_login: true,
                org_unit_path: desired.org_unit_path.clone(),
                custom_attributes: desired.custom_attributes,
            })
        };
        return PatchPlan {
            actions: vec![action],
            warnings: Vec::new(),
        };
    };

    let mut patch = UpdatePatch::default();
    let mut warnings = Vec::new();

    if desired.suspended != observed.suspended {
        patch.suspended = Some(desired.suspended);
    }

    if desired.org_unit_path != observed.org_unit_path {
        match config.frozen_match(&observed.org_unit_path) {
            Some(frozen) => warnings.push(PlanWarning::FrozenOrgUnit {
                current: observed.org_unit_path.clone(),
                desired: desired.org_unit_path.clone(),
                frozen: frozen.to_string(),
            }),
            None => patch.org_unit_path = Some(desired.org_unit_path.clone()),
        }
    }

    if !names_match(&desired.given_name, &observed.given_name) {
        patch.given_name = Some(desired.given_name.clone());
    }
    if !names_match(&desired.family_name, &observed.family_name) {
        patch.family_name = Some(desired.family_name.clone());
    }

    match observed.custom_attributes {
        None => {
            warnings.push(PlanWarning::MissingCustomAttributes);
            patch.custom_attributes = Some(desired.custom_attributes);
        }
        Some(current) if current != desired.custom_attributes => {
            patch.custom_attributes = Some(desired.custom_attributes);
        }
        Some(_) => {}
    }

    if patch.is_empty() {
        return PatchPlan {
            actions: vec![Action::NoOp(NoOpReason::InSync)],
            warnings,
        };
    }

    let mut actions = vec![Action::UpdateAccount {
        email: observed.email.clone(),
        patch,
    }];
    if suspends_account(desired, observed) {
        actions.push(Action::RemoveFromGroups {
            email: observed.email.clone(),
            groups: observed.groups.clone(),
        });
    }

    PatchPlan { actions, warnings }
}

fn names_match(desired: &str, observed: &str) -> bool {
    desired.to_uppercase() == observed.to_uppercase()
}
