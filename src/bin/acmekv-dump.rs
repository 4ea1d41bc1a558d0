use acmekv::{KvBackend, StoreConfig, StoredData};
use envconfig::Envconfig;
use std::{error::Error, time::Duration};

#[derive(Envconfig, Debug)]
struct DumpConfig {
    #[envconfig(from = "ACMEKV_BACKEND")]
    backend: String,

    /// Comma-separated list of store endpoints.
    #[envconfig(from = "ACMEKV_ENDPOINTS")]
    endpoints: String,

    #[envconfig(from = "ACMEKV_WATCH", default = "false")]
    watch: bool,

    #[envconfig(from = "ACMEKV_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[envconfig(from = "ACMEKV_BUCKET")]
    bucket: Option<String>,

    #[envconfig(from = "ACMEKV_USERNAME")]
    username: Option<String>,

    #[envconfig(from = "ACMEKV_PASSWORD")]
    password: Option<String>,

    #[envconfig(from = "ACMEKV_TOKEN")]
    token: Option<String>,

    #[envconfig(from = "ACMEKV_TLS", default = "false")]
    tls: bool,
}

impl DumpConfig {
    fn store_config(&self) -> StoreConfig {
        let mut builder = StoreConfig::builder().with_tls(self.tls);
        if let Some(secs) = self.timeout_secs {
            builder = builder.with_connection_timeout(Duration::from_secs(secs));
        }
        if let Some(bucket) = &self.bucket {
            builder = builder.with_bucket(bucket);
        }
        if let (Some(user), Some(password)) = (&self.username, &self.password) {
            builder = builder.with_credentials(user, password);
        }
        if let Some(token) = &self.token {
            builder = builder.with_token(token);
        }
        builder.build()
    }

    fn backend(&self) -> KvBackend {
        let endpoints = self
            .endpoints
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .collect::<Vec<_>>();

        KvBackend::builder()
            .with_name(&self.backend)
            .with_endpoints(endpoints)
            .with_config(self.store_config())
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let conf = DumpConfig::init_from_env()?;
    let backend = conf.backend();
    log::info!(
        "Reading ACME data from {} at {:?} (watch={})",
        backend.name(),
        backend.endpoints(),
        conf.watch
    );

    let mut receiver = backend.get_stored_data::<StoredData>(conf.watch);
    let mut failed = false;
    while let Some(item) = receiver.next().await {
        match item {
            Ok(data) => println!("{}", serde_json::to_string_pretty(&data)?),
            Err(e) => {
                log::error!("{}", e);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
