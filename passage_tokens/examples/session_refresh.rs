use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use passage_clock::{Clock, System};
use passage_tokens::{
    resolver::{
        BrowserCredentials, CredentialResolver, DurableStorage, FileStorage, AUTH_TOKEN_KEY,
    },
    ApiConfig, BundleStatus, Email, HttpAuthApi, Password, SharedSession,
};
use tokio::time;

#[derive(Debug, Parser)]
struct Opts {
    /// The authority's base URL
    #[arg(short, long, env = "PASSAGE_API_BASE_URL")]
    base_url: reqwest::Url,

    /// Request timeout in seconds
    #[arg(short, long, env = "PASSAGE_API_TIMEOUT_SECS", default_value_t = 10)]
    timeout: u64,

    /// The email address to log in with
    #[arg(short, long, env = "PASSAGE_EMAIL")]
    email: String,

    /// The password to log in with
    #[arg(short, long, env = "PASSAGE_PASSWORD", hide_env_values = true)]
    password: String,

    /// The local file used to persist a fallback token
    #[arg(short = 'f', long, env, default_value = ".passage-tokens.json")]
    credentials_file: PathBuf,

    /// Seconds between accesses
    #[arg(short, long, default_value_t = 30)]
    interval: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = ApiConfig::new(opts.base_url).with_timeout(Duration::from_secs(opts.timeout));
    let api = HttpAuthApi::from_config(&config)?;
    let session = SharedSession::new(api);

    let view = session
        .login(Email::new(opts.email), Password::new(opts.password))
        .await?;
    tracing::info!(user = ?view.user, "logged in");

    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::new(opts.credentials_file));
    if let Some(token) = session.token_projection().access_token {
        storage.set_item(AUTH_TOKEN_KEY, token.as_str()).await?;
    }

    let resolver = CredentialResolver::browser(
        BrowserCredentials::new()
            .with_session(session.clone())
            .with_storage(storage),
    );

    let mut interval = time::interval(Duration::from_secs(opts.interval));
    loop {
        interval.tick().await;

        let token = resolver.resolve().await;
        let now = System.now();
        let (status, stale, expiry) = session.inspect(|state| {
            state
                .bundle()
                .map(|b| (Some(b.status_at(now)), b.stale().0, b.expiry().0))
                .unwrap_or((None, 0, 0))
        });

        match (status, session.session_projection().error) {
            (_, Some(kind)) => {
                tracing::error!(%kind, message = kind.message(), "session needs a new login");
                break;
            }
            (Some(BundleStatus::Fresh), None) => {
                tracing::debug!(?status, stale, expiry, "pulled token")
            }
            (Some(_), None) => tracing::warn!(?status, stale, expiry, "pulled token"),
            (None, None) => tracing::warn!("session ended"),
        }

        tracing::info!(
            token = format_args!("{:#?}", token),
            "resolved bearer token"
        );
    }

    resolver.forget_persisted().await;

    Ok(())
}
