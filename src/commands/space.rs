use super::Roots;
use crate::error::SyncError;
use crate::storage::FreeSpace;
use crate::AppState;

/// Free space on the volume holding the SD card root
pub async fn free_space(state: &AppState, roots: &Roots) -> Result<FreeSpace, String> {
    if !state.storage.is_dir(&roots.sd).await {
        return Err(SyncError::PathInvalid {
            role: "SD",
            path: roots.sd.clone(),
        }
        .to_string());
    }

    let bytes = state
        .storage
        .available_space(&roots.sd)
        .await
        .map_err(|e| e.to_string())?;
    Ok(FreeSpace::new(bytes))
}
