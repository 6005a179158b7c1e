use std::{path::PathBuf, sync::Arc};

use crate::{credentials::CredentialStore, session::SessionStore, sheets::SheetService};

#[derive(Clone)]
pub struct AppState {
    pub site_root: PathBuf,
    /// Canonicalized (symlink-resolved) version of `site_root`.
    /// Used for security checks in path validation.
    pub canonical_root: PathBuf,
    pub sheets: Arc<dyn SheetService>,
    pub credentials: Arc<CredentialStore>,
    pub sessions: SessionStore,
    pub admin: AdminOptions,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AdminOptions {
    /// Reject add submissions that lack a title or URL.
    pub require_title_url: bool,
}
