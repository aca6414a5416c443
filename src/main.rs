//! localca CLI.
//!
//! Runs a small certificate authority out of a home directory laid out the
//! way `openssl ca` expects it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use localca::commands::{
    self, CaOptions, Context, LangOptions, ListFilter, ReqOptions, SignOptions,
};
use localca::emit::Lang;
use localca::error::Result;
use localca::hosts::HostList;
use localca::inspect::InfoFields;
use localca::key::{KeyAlgorithm, RsaKeySize};
use localca::layout::{CaLayout, FileKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "localca", version)]
#[command(about = "Local certificate authority for development TLS", long_about = None)]
struct Cli {
    /// CA home directory (default: $HOME/.cert)
    #[arg(long, global = true, env = "LOCALCA_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory structure and configuration
    Setup {
        /// Host name written into the configuration
        #[arg(long)]
        host_name: Option<String>,
    },

    /// Generate the self-signed CA certificate
    Ca {
        #[command(flatten)]
        key: KeyArgs,

        /// Validity in years
        #[arg(long, default_value_t = 10)]
        years: u32,

        /// Common name of the CA
        #[arg(long)]
        common_name: Option<String>,
    },

    /// Generate a key and a certificate request
    Req {
        /// Certificate name
        name: String,

        /// Comma-separated IP addresses and DNS names
        #[arg(long = "host")]
        hosts: Option<HostList>,

        #[command(flatten)]
        key: KeyArgs,

        /// Common name of the subject
        #[arg(long)]
        common_name: Option<String>,

        /// Sign the request right away
        #[arg(long)]
        sign: bool,

        /// Validity in years when signing
        #[arg(long, requires = "sign")]
        years: Option<u32>,
    },

    /// Sign a pending request with the CA
    Sign {
        /// Certificate name
        name: String,

        /// Validity in years
        #[arg(long)]
        years: Option<u32>,
    },

    /// Print a certificate, request or key as text
    Cat {
        #[command(flatten)]
        kind: KindArgs,

        /// Name or path
        file: String,
    },

    /// Print certificate metadata
    Info {
        #[arg(long)]
        end_date: bool,

        #[arg(long)]
        hash: bool,

        #[arg(long)]
        issuer: bool,

        #[arg(long)]
        subject: bool,

        /// Name or path
        file: String,
    },

    /// Verify a certificate, request or key
    Chk {
        #[command(flatten)]
        kind: KindArgs,

        /// Name or path
        file: String,
    },

    /// List certificates, requests and keys
    Ls {
        #[arg(long)]
        cert: bool,

        #[arg(long)]
        req: bool,

        #[arg(long)]
        key: bool,
    },

    /// Generate source files embedding the CA and a server certificate
    Lang {
        /// CA certificate, name or path
        #[arg(long, default_value = "ca")]
        ca: String,

        /// Server certificate name
        #[arg(long)]
        server: Option<String>,

        /// Also generate the client file
        #[arg(long)]
        client: bool,

        /// rust or go
        #[arg(long, default_value_t = Lang::Rust)]
        lang: Lang,

        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// rsa, ecdsa-p256 or ecdsa-p384
    #[arg(long, default_value_t = KeyAlgorithm::Rsa)]
    key_type: KeyAlgorithm,

    /// RSA key size in bits (default from the configuration)
    #[arg(long)]
    rsa_size: Option<RsaKeySize>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct KindArgs {
    #[arg(long)]
    cert: bool,

    #[arg(long)]
    req: bool,

    #[arg(long)]
    key: bool,
}

impl KindArgs {
    fn kind(&self) -> FileKind {
        if self.cert {
            FileKind::Cert
        } else if self.req {
            FileKind::Request
        } else {
            FileKind::Key
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("FAIL! {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let root = match cli.home {
        Some(home) => home,
        None => CaLayout::default_root()?,
    };
    let ctx = Context::new(CaLayout::new(root));

    match cli.command {
        Commands::Setup { host_name } => commands::setup(&ctx, host_name.as_deref()),
        Commands::Ca {
            key,
            years,
            common_name,
        } => {
            let opts = CaOptions::builder()
                .key_type(key.key_type)
                .maybe_rsa_size(key.rsa_size)
                .years(years)
                .maybe_common_name(common_name)
                .build();
            commands::create_ca(&ctx, &opts)
        }
        Commands::Req {
            name,
            hosts,
            key,
            common_name,
            sign,
            years,
        } => {
            let opts = ReqOptions::builder()
                .name(name)
                .hosts(hosts.unwrap_or_default())
                .key_type(key.key_type)
                .maybe_rsa_size(key.rsa_size)
                .maybe_common_name(common_name)
                .sign(sign)
                .maybe_years(years)
                .build();
            commands::create_request(&ctx, &opts)
        }
        Commands::Sign { name, years } => {
            let opts = SignOptions::builder().name(name).maybe_years(years).build();
            commands::sign_request(&ctx, &opts)
        }
        Commands::Cat { kind, file } => commands::cat(&ctx, kind.kind(), &file),
        Commands::Info {
            end_date,
            hash,
            issuer,
            subject,
            file,
        } => {
            let fields = InfoFields {
                end_date,
                hash,
                issuer,
                subject,
            };
            commands::info(&ctx, fields, &file)
        }
        Commands::Chk { kind, file } => commands::chk(&ctx, kind.kind(), &file),
        Commands::Ls { cert, req, key } => commands::ls(&ctx, ListFilter { cert, req, key }),
        Commands::Lang {
            ca,
            server,
            client,
            lang,
            out_dir,
        } => {
            let opts = LangOptions::builder()
                .ca(ca)
                .maybe_server(server)
                .client(client)
                .lang(lang)
                .out_dir(out_dir)
                .build();
            commands::lang(&ctx, &opts)
        }
    }
}
