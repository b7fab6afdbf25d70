//! Shared harness for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use sdk_rust::TaskClient;
use task_api::auth::{Role, SigningSecret, TokenCodec};
use task_api::config::AppConfig;
use task_api::lifecycle::Shutdown;
use task_api::store::{bootstrap_admin, SqliteStore};
use task_api::HttpServer;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Config for tests: fast bcrypt, fixed secret, in-memory admin.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.jwt_secret = Some(TEST_SECRET.to_string());
    config.auth.bcrypt_cost = 4;
    config.bootstrap.email = ADMIN_EMAIL.to_string();
    config.bootstrap.password = ADMIN_PASSWORD.to_string();
    config
}

/// A server running on a random local port. Shuts down on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: AppConfig) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        bootstrap_admin(&store, &config.bootstrap, config.auth.bcrypt_cost).unwrap();

        let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(config, store);
        let server_shutdown = shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            base_url: format!("http://{}", addr),
            shutdown,
            handle,
        }
    }

    /// Default test config with a burst large enough to never trip the limiter.
    pub async fn start_unlimited() -> Self {
        let mut config = test_config();
        config.rate_limit.burst_size = 10_000;
        config.rate_limit.requests_per_second = 10_000;
        Self::start(config).await
    }

    pub fn client(&self) -> TaskClient {
        TaskClient::new(&self.base_url)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register `username` and return a client logged in as them.
    pub async fn user_client(&self, username: &str) -> TaskClient {
        let email = format!("{}@example.com", username);
        let mut client = self.client();
        client
            .register(username, &email, "password1", None)
            .await
            .unwrap();
        client.login(&email, "password1").await.unwrap();
        client
    }

    pub async fn admin_client(&self) -> TaskClient {
        let mut client = self.client();
        client.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.handle.abort();
    }
}

/// A codec sharing the test secret, for minting tokens directly.
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(
        &SigningSecret::resolve(Some(TEST_SECRET)),
        Duration::from_secs(3600),
    )
}

/// A token signed with the test secret that expired long ago.
pub fn expired_token(user_id: i64, role: Role) -> String {
    test_codec().issue_at(user_id, role, 1_000).unwrap()
}
