use std::future::Future;

/// Host hook asked before anything is written to the download directory.
pub trait PermissionGate: Send + Sync + 'static {
    fn request_write_permission(&self) -> impl Future<Output = bool> + Send;
}

/// Desktop hosts need no runtime permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    async fn request_write_permission(&self) -> bool {
        true
    }
}
