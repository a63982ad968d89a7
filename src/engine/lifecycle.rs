//! Trip state machine.
//!
//! `Assigned -> In Transit <-> Paused`, `In Transit -> Reached -> Completed`.
//! Completion is only reachable through delivery-code verification.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::load::LoadStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripAction {
    Start,
    Pause,
    Resume,
    MarkReached,
    ConfirmDelivery,
}

impl TripAction {
    pub fn target(&self) -> LoadStatus {
        match self {
            TripAction::Start | TripAction::Resume => LoadStatus::InTransit,
            TripAction::Pause => LoadStatus::Paused,
            TripAction::MarkReached => LoadStatus::Reached,
            TripAction::ConfirmDelivery => LoadStatus::Completed,
        }
    }
}

impl LoadStatus {
    pub fn apply(self, action: TripAction) -> Result<LoadStatus, AppError> {
        let allowed = matches!(
            (self, action),
            (LoadStatus::Assigned, TripAction::Start)
                | (LoadStatus::InTransit, TripAction::Pause)
                | (LoadStatus::Paused, TripAction::Resume)
                | (LoadStatus::InTransit, TripAction::MarkReached)
                | (LoadStatus::Reached, TripAction::ConfirmDelivery)
        );

        if allowed {
            Ok(action.target())
        } else {
            Err(AppError::InvalidTransition {
                from: self,
                to: action.target(),
            })
        }
    }

    /// Resolves a requested status change to the action that performs it.
    pub fn action_towards(self, target: LoadStatus) -> Result<TripAction, AppError> {
        let action = match (self, target) {
            (LoadStatus::Assigned, LoadStatus::InTransit) => TripAction::Start,
            (LoadStatus::Paused, LoadStatus::InTransit) => TripAction::Resume,
            (LoadStatus::InTransit, LoadStatus::Paused) => TripAction::Pause,
            (LoadStatus::InTransit, LoadStatus::Reached) => TripAction::MarkReached,
            (LoadStatus::Reached, LoadStatus::Completed) => TripAction::ConfirmDelivery,
            (from, to) => return Err(AppError::InvalidTransition { from, to }),
        };
        Ok(action)
    }

    pub fn can_transition_to(self, target: LoadStatus) -> bool {
        self.action_towards(target).is_ok()
    }
}
