use std::fs;

use tracing::{debug, info};

use super::{Context, write_new};
use crate::config;
use crate::error::{CaError, Result};
use crate::hosts::HostList;
use crate::ledger::Ledger;

/// Creates the directory structure, the empty ledger and `openssl.cfg`.
///
/// `host_name` defaults to the name of this machine.
pub fn setup(ctx: &Context, host_name: Option<&str>) -> Result<String> {
    let layout = &ctx.layout;
    let root = layout.root();
    if root.exists() {
        return Err(CaError::AlreadyExists {
            what: "CA directory",
            path: root.to_path_buf(),
        });
    }

    fs::create_dir_all(root).map_err(CaError::io(root))?;
    for dir in [
        layout.certs_dir(),
        layout.private_dir(),
        layout.newcerts_dir(),
        layout.crl_dir(),
    ] {
        fs::create_dir(&dir).map_err(CaError::io(&dir))?;
        debug!(path = %dir.display(), "created directory");
    }
    restrict_private_dir(&layout.private_dir())?;

    Ledger::new(layout).initialize()?;

    let host_name = host_name
        .map(str::to_string)
        .unwrap_or_else(config::machine_host_name);
    let rendered = config::render(root, &host_name, &HostList::default());
    write_new(&layout.config_file(), &rendered, Some(0o600))?;

    info!(root = %root.display(), host = %host_name, "directory structure created");
    Ok(format!("* Directory structure created in {root:?}\n"))
}

#[cfg(unix)]
fn restrict_private_dir(dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o710)).map_err(CaError::io(dir))
}

#[cfg(not(unix))]
fn restrict_private_dir(dir: &std::path::Path) -> Result<()> {
    super::set_mode(dir, 0o710);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::layout::CaLayout;

    #[test]
    fn test_setup_creates_structure_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("ca-home")));

        let out = setup(&ctx, Some("box.example")).unwrap();
        assert!(out.starts_with("* Directory structure created in"));
        ctx.layout.ensure_initialized().unwrap();
        assert!(ctx.layout.newcerts_dir().is_dir());
        assert!(ctx.layout.crl_dir().is_dir());
        assert_eq!(fs::read_to_string(ctx.layout.index_file()).unwrap(), "");
        assert_eq!(fs::read_to_string(ctx.layout.serial_file()).unwrap(), "01\n");

        let settings: Settings = ctx.settings().unwrap();
        assert_eq!(settings.distinguished_name.common_name, "box.example");

        let err = setup(&ctx, Some("box.example")).unwrap_err();
        assert!(matches!(err, CaError::AlreadyExists { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_setup_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("ca-home")));
        setup(&ctx, Some("box.example")).unwrap();

        let mode = |path: std::path::PathBuf| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(ctx.layout.private_dir()), 0o710);
        assert_eq!(mode(ctx.layout.config_file()), 0o600);
    }
}
