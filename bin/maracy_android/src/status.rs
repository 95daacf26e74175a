/// `DownloadManager.COLUMN_STATUS` values, as seen by the download monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    InProgress,
    Successful,
    Failed,
}

impl DownloadStatus {
    /// `None` when the row is gone, which happens when the user cancels the download.
    pub fn from_row(code: Option<i32>) -> Self {
        match code {
            // STATUS_PENDING, STATUS_RUNNING, STATUS_PAUSED
            Some(1 | 2 | 4) => DownloadStatus::InProgress,
            Some(8) => DownloadStatus::Successful,
            _ => DownloadStatus::Failed,
        }
    }
}
