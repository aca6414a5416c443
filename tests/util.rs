use localca::commands::{self, CaOptions, Context, ReqOptions, SignOptions};
use localca::key::KeyAlgorithm;
use localca::layout::CaLayout;
use tempfile::TempDir;

/// A throw-away CA home with the structure and the CA certificate in place.
pub struct TestCa {
    // Removed on drop.
    pub dir: TempDir,
    pub ctx: Context,
}

pub fn setup_ca(key_type: KeyAlgorithm) -> TestCa {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(CaLayout::new(dir.path().join("cert-home")));
    commands::setup(&ctx, Some("myca.local")).unwrap();
    let opts = CaOptions::builder().key_type(key_type).build();
    commands::create_ca(&ctx, &opts).unwrap();
    TestCa { dir, ctx }
}

/// Requests and signs `name` for `hosts`.
#[allow(dead_code)]
pub fn issue(ca: &TestCa, name: &str, hosts: &str, key_type: KeyAlgorithm) {
    let opts = ReqOptions::builder()
        .name(name.to_string())
        .hosts(hosts.parse().unwrap())
        .key_type(key_type)
        .build();
    commands::create_request(&ca.ctx, &opts).unwrap();
    let opts = SignOptions::builder().name(name.to_string()).build();
    commands::sign_request(&ca.ctx, &opts).unwrap();
}
