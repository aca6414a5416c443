use tracing::debug;

use super::{Context, load_certificate, load_key, load_request};
use crate::error::Result;
use crate::inspect::{self, InfoFields};
use crate::layout::{CA_NAME, FileKind};

/// Categories printed by `ls`; none selected means all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub cert: bool,
    pub req: bool,
    pub key: bool,
}

impl ListFilter {
    fn kinds(self) -> Vec<FileKind> {
        let all = self == Self::default();
        [
            (self.cert, FileKind::Cert),
            (self.req, FileKind::Request),
            (self.key, FileKind::Key),
        ]
        .into_iter()
        .filter(|(selected, _)| all || *selected)
        .map(|(_, kind)| kind)
        .collect()
    }
}

/// Decoded text of a certificate, request or key.
pub fn cat(ctx: &Context, kind: FileKind, file: &str) -> Result<String> {
    let path = ctx.layout.resolve(kind, file)?;
    debug!(path = %path.display(), kind = kind.describe(), "dumping");
    match kind {
        FileKind::Cert => inspect::certificate_text(&load_certificate(&path)?),
        FileKind::Request => inspect::request_text(&load_request(&path)?),
        FileKind::Key => inspect::key_text(&load_key(&path)?),
    }
}

/// Selected metadata of a certificate.
pub fn info(ctx: &Context, fields: InfoFields, file: &str) -> Result<String> {
    let path = ctx.layout.resolve(FileKind::Cert, file)?;
    inspect::certificate_info(&load_certificate(&path)?, fields)
}

/// Verifies a certificate against the CA, a request's self-signature or a
/// key's consistency.
pub fn chk(ctx: &Context, kind: FileKind, file: &str) -> Result<String> {
    let path = ctx.layout.resolve(kind, file)?;
    debug!(path = %path.display(), kind = kind.describe(), "checking");
    match kind {
        FileKind::Cert => {
            let cert = load_certificate(&path)?;
            let ca = load_certificate(&ctx.layout.cert_path(CA_NAME))?;
            inspect::check_certificate(&cert, &ca)?;
            Ok(format!("{}: OK\n", path.display()))
        }
        FileKind::Request => {
            inspect::check_request(&load_request(&path)?)?;
            Ok("Certificate request self-signature verify OK\n".to_string())
        }
        FileKind::Key => {
            let key = load_key(&path)?;
            inspect::check_key(&key)?;
            Ok(format!("{}\n", inspect::key_ok_message(&key)))
        }
    }
}

/// Base names with extension, one tab-separated line per category.
pub fn ls(ctx: &Context, filter: ListFilter) -> Result<String> {
    ctx.layout.ensure_initialized()?;
    let mut out = String::new();
    for kind in filter.kinds() {
        let names: Vec<String> = ctx
            .layout
            .list(kind)?
            .into_iter()
            .map(|name| format!("{name}.{}", kind.extension()))
            .collect();
        if names.is_empty() {
            continue;
        }
        out.push_str(&names.join("\t"));
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CaOptions, ReqOptions, create_ca, create_request, setup};
    use crate::error::CaError;
    use crate::key::KeyAlgorithm;
    use crate::layout::CaLayout;

    fn populated() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();
        create_ca(
            &ctx,
            &CaOptions::builder().key_type(KeyAlgorithm::EcdsaP256).build(),
        )
        .unwrap();
        create_request(
            &ctx,
            &ReqOptions::builder()
                .name("web".to_string())
                .key_type(KeyAlgorithm::EcdsaP256)
                .build(),
        )
        .unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_ls_filters() {
        let (_dir, ctx) = populated();
        assert_eq!(
            ls(&ctx, ListFilter::default()).unwrap(),
            "ca.crt\nweb.csr\nca.key\tweb.key\n"
        );
        let certs_only = ListFilter {
            cert: true,
            ..Default::default()
        };
        assert_eq!(ls(&ctx, certs_only).unwrap(), "ca.crt\n");
    }

    #[test]
    fn test_chk_each_kind() {
        let (_dir, ctx) = populated();
        assert!(chk(&ctx, FileKind::Cert, "ca").unwrap().ends_with(": OK\n"));
        assert_eq!(
            chk(&ctx, FileKind::Request, "web").unwrap(),
            "Certificate request self-signature verify OK\n"
        );
        assert_eq!(chk(&ctx, FileKind::Key, "web").unwrap(), "EC Key valid.\n");
    }

    #[test]
    fn test_cat_and_info() {
        let (_dir, ctx) = populated();
        let text = cat(&ctx, FileKind::Cert, "ca").unwrap();
        assert!(text.contains("CA:TRUE"));
        let text = cat(&ctx, FileKind::Request, "web").unwrap();
        assert!(text.starts_with("Certificate Request:"));

        let out = info(
            &ctx,
            InfoFields {
                subject: true,
                ..Default::default()
            },
            "ca",
        )
        .unwrap();
        assert_eq!(out, "subject=O = Local CA, CN = box.example Root CA\n");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let (_dir, ctx) = populated();
        let err = cat(&ctx, FileKind::Cert, "nope").unwrap_err();
        assert!(matches!(err, CaError::NotFound { .. }));
    }
}
