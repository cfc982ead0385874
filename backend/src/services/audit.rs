use crate::error::{AppError, AppResult};
use crate::models::{EmergencyService, Wallet};
use crate::repositories::WalletChange;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry, one JSON object per line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "wallet_change", "emergency_dispatched", "status_changed", ...
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Append-only audit trail of money movements, dispatches and status changes
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    pub fn new(log_directory: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Write an entry, downgrading failures to a warning. The audited action
    /// has already been committed at this point.
    async fn record(
        &self,
        event_type: &str,
        entity_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: event_type.to_string(),
            entity_id,
            actor_id,
            details,
        };

        if let Err(e) = self.log(entry).await {
            warn!("Audit write failed for {}: {}", event_type, e);
        }
    }

    pub async fn log_wallet_change(&self, user_id: Uuid, wallet: &Wallet, change: &WalletChange) {
        self.record(
            "wallet_change",
            Some(wallet.id),
            Some(user_id),
            serde_json::json!({
                "transaction_type": change.tx_type.as_str(),
                "money_delta": change.money_delta.to_string(),
                "points_delta": change.points_delta,
                "money_balance": wallet.money_balance.to_string(),
                "points_balance": wallet.points_balance,
                "tier": wallet.tier,
                "reference_id": change.reference_id.map(|id| id.to_string()),
            }),
        )
        .await
    }

    pub async fn log_emergency_dispatched(&self, emergency: &EmergencyService, distance_km: f64) {
        self.record(
            "emergency_dispatched",
            Some(emergency.id),
            emergency.provider_id,
            serde_json::json!({
                "emergency_type": emergency.emergency_type,
                "priority": emergency.priority,
                "distance_km": distance_km,
                "estimated_arrival_minutes": emergency.estimated_arrival_minutes,
            }),
        )
        .await
    }

    /// Status change of a booking, emergency, help request or consultation
    pub async fn log_status_change(
        &self,
        entity: &str,
        entity_id: Uuid,
        actor_id: Uuid,
        from: &str,
        to: &str,
    ) {
        self.record(
            "status_changed",
            Some(entity_id),
            Some(actor_id),
            serde_json::json!({
                "entity": entity,
                "from": from,
                "to": to,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_are_appended_as_json_lines() {
        let dir = std::env::temp_dir().join(format!("helphive-audit-{}", Uuid::new_v4()));
        let audit = AuditTrailService::new(&dir).unwrap();

        let id = Uuid::new_v4();
        audit
            .log_status_change("booking", id, Uuid::new_v4(), "pending", "confirmed")
            .await;
        audit
            .log_status_change("booking", id, Uuid::new_v4(), "confirmed", "in_progress")
            .await;

        let contents = std::fs::read_to_string(audit.log_file()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, "status_changed");
        assert_eq!(first.entity_id, Some(id));
        assert_eq!(first.details["to"], "confirmed");

        std::fs::remove_dir_all(dir).ok();
    }
}
