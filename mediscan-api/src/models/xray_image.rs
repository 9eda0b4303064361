//! Uploaded X-ray image record and its lifecycle

use chrono::{DateTime, Utc};
use mediscan_common::events::ImageStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A status change applied to an image
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub image_id: Uuid,
    pub old_status: ImageStatus,
    pub new_status: ImageStatus,
    pub transitioned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ImageStatus,
    pub to: ImageStatus,
}

/// Row in `xray_images`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrayImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    /// Object store key, `xray-images/<user_id>/<uuid>.<ext>`
    pub storage_path: String,
    pub status: ImageStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Set when analysis starts
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl XrayImage {
    pub fn new_pending(
        user_id: Uuid,
        file_name: String,
        file_size: i64,
        file_type: String,
        storage_path: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            file_name,
            file_size,
            file_type,
            storage_path,
            status: ImageStatus::Pending,
            uploaded_at: now,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `new_status` if the lifecycle allows it
    pub fn transition_to(
        &mut self,
        new_status: ImageStatus,
    ) -> Result<StatusTransition, InvalidTransition> {
        if !self.status.can_transition_to(new_status) {
            return Err(InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        let transition = StatusTransition {
            image_id: self.id,
            old_status: self.status,
            new_status,
            transitioned_at: now,
        };
        self.status = new_status;
        self.updated_at = now;
        if new_status == ImageStatus::Analyzing {
            self.processed_at = Some(now);
        }

        Ok(transition)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
